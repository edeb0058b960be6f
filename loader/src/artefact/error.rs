//! Error types for artefact naming and location.
//!
//! Each variant provides a descriptive message identifying the invalid input
//! and the constraint that was violated.

use thiserror::Error;

/// Errors arising from invalid artefact-related values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArtefactError {
    /// No artefact filename mapping exists for the detected platform.
    #[error("unsupported platform: no artefact mapping for os \"{os}\" on arch \"{arch}\"")]
    UnsupportedPlatform {
        /// The detected operating system family.
        os: String,
        /// The detected CPU architecture.
        arch: String,
    },

    /// A module name is empty or contains characters that are unsafe in
    /// filenames, URLs, or cache patterns.
    #[error("invalid module name \"{value}\": {reason}")]
    InvalidModuleName {
        /// The rejected module name.
        value: String,
        /// Description of the validation failure.
        reason: String,
    },

    /// A repository path template is malformed.
    #[error("invalid path template \"{template}\": {reason}")]
    InvalidPathTemplate {
        /// The rejected template.
        template: String,
        /// Description of the validation failure.
        reason: String,
    },
}

/// Result type alias using [`ArtefactError`].
pub type Result<T> = std::result::Result<T, ArtefactError>;
