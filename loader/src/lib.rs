//! Vorto loader library.
//!
//! This crate acquires a prebuilt, platform-specific extension module from a
//! remote repository, caches it locally, loads it into the running process,
//! and invokes its entry point. It is used by the `vorto-loader` binary and
//! can be driven programmatically with injected collaborators for testing.
//!
//! # Modules
//!
//! - [`artefact`] - Module names, artefact naming, locations, and downloads
//! - [`cache`] - Local cache lookup for previously downloaded artefacts
//! - [`cli`] - Command-line argument definitions
//! - [`config`] - Loader configuration and validation
//! - [`deps`] - External command execution seam
//! - [`dirs`] - Directory resolution abstraction for platform-specific paths
//! - [`error`] - Top-level error type aggregating each stage
//! - [`fetcher`] - Retrieval chain with fallback and atomic persistence
//! - [`module`] - In-process loading, entry resolution, and invocation
//! - [`output`] - Progress and diagnostic formatting
//! - [`pipeline`] - End-to-end orchestration
//! - [`platform`] - Host platform profiling

pub mod artefact;
pub mod cache;
pub mod cli;
pub mod config;
pub mod deps;
pub mod dirs;
pub mod error;
pub mod fetcher;
pub mod module;
pub mod output;
pub mod pipeline;
pub mod platform;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
