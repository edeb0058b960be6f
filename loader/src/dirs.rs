//! Directory resolution abstraction for platform-specific paths.
//!
//! Wraps `directories-next` behind [`BaseDirs`] so configuration lookup and
//! the default install directory can be redirected in tests.

use directories_next::ProjectDirs;
use std::path::PathBuf;

/// Application name used for platform directories.
pub const APP_NAME: &str = "vorto-loader";

/// Source of per-user application directories.
#[cfg_attr(test, mockall::automock)]
pub trait BaseDirs {
    /// Directory holding persistent application data, if determinable.
    fn data_dir(&self) -> Option<PathBuf>;

    /// Directory holding user configuration, if determinable.
    fn config_dir(&self) -> Option<PathBuf>;
}

/// Resolves directories using the platform conventions.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBaseDirs;

impl SystemBaseDirs {
    fn project() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", APP_NAME)
    }
}

impl BaseDirs for SystemBaseDirs {
    fn data_dir(&self) -> Option<PathBuf> {
        Self::project().map(|dirs| dirs.data_dir().to_path_buf())
    }

    fn config_dir(&self) -> Option<PathBuf> {
        Self::project().map(|dirs| dirs.config_dir().to_path_buf())
    }
}
