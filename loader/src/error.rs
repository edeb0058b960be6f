//! Error types for the loader.
//!
//! Each stage owns its error enum; [`LoaderError`] aggregates them so the
//! binary deals with a single type and a single exit-code mapping.

use crate::artefact::error::ArtefactError;
use crate::cache::CacheError;
use crate::config::ConfigError;
use crate::fetcher::FetchError;
use crate::module::invoker::InvocationError;
use crate::module::loader::LoadError;
use crate::module::resolver::ResolutionReport;
use thiserror::Error;

/// Errors that can end a loader run.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// Configuration could not be loaded or is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// No artefact exists for this platform.
    #[error(transparent)]
    Artefact(#[from] ArtefactError),

    /// The artefact could not be retrieved.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The local cache could not be used.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The artefact could not be loaded.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// The artefact loaded but exposes no usable entry point.
    #[error("{0}")]
    EntryNotFound(ResolutionReport),

    /// The entry point failed.
    #[error(transparent)]
    Invocation(#[from] InvocationError),

    /// The dry-run plan could not be rendered as JSON.
    #[error("failed to render plan: {0}")]
    Render(#[from] serde_json::Error),

    /// No install directory is configured and none can be derived.
    #[error("could not determine an install directory; set install_dir or pass --install-dir")]
    DataDirUnavailable,
}

impl LoaderError {
    /// Whether the run failed softly: the artefact loaded but nothing was
    /// invoked.
    #[must_use]
    pub fn is_soft_failure(&self) -> bool {
        matches!(self, Self::EntryNotFound(_))
    }
}

/// Result type alias using [`LoaderError`].
pub type Result<T> = std::result::Result<T, LoaderError>;
