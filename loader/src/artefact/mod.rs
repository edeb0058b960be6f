//! Artefact naming, location, and download policy.
//!
//! This module holds the type-safe domain model for the remote extension
//! artefact: which file a platform needs, where it lives, and how its bytes
//! are transferred.
//!
//! # Sub-modules
//!
//! - [`error`] - Semantic error types for naming and location failures.
//! - [`module_name`] - Validated module name newtype (`ModuleName`).
//! - [`naming`] - Deterministic artefact filename policy (`ArtefactFilename`).
//! - [`locator`] - Repository layout and candidate URLs (`ArtefactDescriptor`).
//! - [`download`] - Downloader trait, HTTP and external-tool transports.

pub mod download;
pub mod error;
pub mod locator;
pub mod module_name;
pub mod naming;
