//! Local artefact cache.
//!
//! Downloaded artefacts live under `<install_dir>/modules/`, optionally
//! nested one level further by module name. The cache is never evicted and
//! never overwritten: the first file matching `{module}*{ext}` wins.

use crate::artefact::module_name::ModuleName;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, trace};

/// Directory below the install directory that holds cached artefacts.
pub const CACHE_SUBDIR: &str = "modules";

/// Errors raised while preparing or scanning the cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The cache directory could not be created.
    #[error("failed to create cache directory {path}: {source}")]
    CreateDir {
        /// Directory that could not be created.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The cache directory could not be scanned.
    #[error("failed to scan cache with pattern {pattern}: {reason}")]
    Scan {
        /// Glob pattern in use.
        pattern: String,
        /// Description of the failure.
        reason: String,
    },
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// The on-disk artefact cache rooted at an install directory.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use vorto_loader::artefact::module_name::ModuleName;
/// use vorto_loader::cache::CacheStore;
///
/// let module: ModuleName = "demo".try_into().expect("valid module name");
/// let flat = CacheStore::new(Utf8Path::new("/opt/app"), false);
/// let nested = CacheStore::new(Utf8Path::new("/opt/app"), true);
///
/// assert_eq!(flat.module_dir(&module), Utf8Path::new("/opt/app/modules"));
/// assert_eq!(nested.module_dir(&module), Utf8Path::new("/opt/app/modules/demo"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStore {
    root: Utf8PathBuf,
    per_module: bool,
}

impl CacheStore {
    /// Create a store for `install_dir`.
    #[must_use]
    pub fn new(install_dir: &Utf8Path, per_module: bool) -> Self {
        Self {
            root: install_dir.join(CACHE_SUBDIR),
            per_module,
        }
    }

    /// Return the directory holding artefacts for `module`.
    #[must_use]
    pub fn module_dir(&self, module: &ModuleName) -> Utf8PathBuf {
        if self.per_module {
            self.root.join(module.as_str())
        } else {
            self.root.clone()
        }
    }

    /// Create the module directory if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::CreateDir`] when the directory cannot be
    /// created.
    pub fn prepare(&self, module: &ModuleName) -> Result<Utf8PathBuf> {
        let dir = self.module_dir(module);
        std::fs::create_dir_all(&dir).map_err(|source| CacheError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        Ok(dir)
    }

    /// Find a cached artefact for `module` with the given extension.
    ///
    /// Returns the first regular file matching `{module}.*{extension}` in
    /// lexicographic order, or `None` when nothing matches. A missing cache
    /// directory is a miss.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Scan`] when the pattern is invalid.
    pub fn lookup(&self, module: &ModuleName, extension: &str) -> Result<Option<Utf8PathBuf>> {
        let dir = self.module_dir(module);
        let pattern = format!(
            "{}/{}.*{}",
            glob::Pattern::escape(dir.as_str()),
            module.as_str(),
            glob::Pattern::escape(extension),
        );
        trace!("cache lookup pattern: {pattern}");

        let entries = glob::glob(&pattern).map_err(|e| CacheError::Scan {
            pattern: pattern.clone(),
            reason: e.to_string(),
        })?;

        for entry in entries {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    debug!("skipping unreadable cache entry: {e}");
                    continue;
                }
            };
            if !path.is_file() {
                continue;
            }
            match Utf8PathBuf::from_path_buf(path) {
                Ok(path) => return Ok(Some(path)),
                Err(path) => debug!("skipping non-UTF-8 cache entry {}", path.display()),
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn demo() -> ModuleName {
        ModuleName::try_from("demo").expect("valid module name")
    }

    fn install_dir() -> (TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("UTF-8 path");
        (temp, path)
    }

    #[rstest]
    fn missing_directory_is_a_miss(demo: ModuleName) {
        let (_temp, root) = install_dir();
        let store = CacheStore::new(&root, false);
        assert_eq!(store.lookup(&demo, ".so").expect("lookup"), None);
    }

    #[rstest]
    #[case::flat(false)]
    #[case::nested(true)]
    fn finds_prepared_artefact(demo: ModuleName, #[case] per_module: bool) {
        let (_temp, root) = install_dir();
        let store = CacheStore::new(&root, per_module);
        let dir = store.prepare(&demo).expect("prepare");
        let artefact = dir.join("demo.cpython-311-x86_64-linux-gnu.so");
        std::fs::write(&artefact, b"\x7fELF").expect("write artefact");

        assert_eq!(store.lookup(&demo, ".so").expect("lookup"), Some(artefact));
    }

    #[rstest]
    fn ignores_other_modules_and_extensions(demo: ModuleName) {
        let (_temp, root) = install_dir();
        let store = CacheStore::new(&root, false);
        let dir = store.prepare(&demo).expect("prepare");
        std::fs::write(dir.join("other.cpython-311-x86_64-linux-gnu.so"), b"x").expect("write");
        std::fs::write(dir.join("demo.cp311-win_amd64.pyd"), b"x").expect("write");
        std::fs::create_dir(dir.join("demo.dir.so")).expect("mkdir");

        assert_eq!(store.lookup(&demo, ".so").expect("lookup"), None);
    }

    #[rstest]
    fn first_match_wins_lexicographically(demo: ModuleName) {
        let (_temp, root) = install_dir();
        let store = CacheStore::new(&root, false);
        let dir = store.prepare(&demo).expect("prepare");
        std::fs::write(dir.join("demo.cpython-312-x86_64-linux-gnu.so"), b"x").expect("write");
        std::fs::write(dir.join("demo.cpython-311-x86_64-linux-gnu.so"), b"x").expect("write");

        let hit = store.lookup(&demo, ".so").expect("lookup").expect("hit");
        assert_eq!(hit.file_name(), Some("demo.cpython-311-x86_64-linux-gnu.so"));
    }

    #[rstest]
    fn install_path_metacharacters_are_escaped(demo: ModuleName) {
        let (_temp, root) = install_dir();
        let root = root.join("odd[dir]");
        let store = CacheStore::new(&root, false);
        let dir = store.prepare(&demo).expect("prepare");
        std::fs::write(dir.join("demo.cpython-311-x86_64-linux-gnu.so"), b"x").expect("write");

        assert!(store.lookup(&demo, ".so").expect("lookup").is_some());
    }

    #[rstest]
    #[case::underscore("demo_v2.cpython-311-x86_64-linux-gnu.so")]
    #[case::hyphen("demo-extra.cpython-311-x86_64-linux-gnu.so")]
    fn sibling_modules_sharing_the_prefix_are_ignored(demo: ModuleName, #[case] sibling: &str) {
        let (_temp, root) = install_dir();
        let store = CacheStore::new(&root, false);
        let dir = store.prepare(&demo).expect("prepare");
        std::fs::write(dir.join(sibling), b"x").expect("write");

        assert_eq!(store.lookup(&demo, ".so").expect("lookup"), None);
    }
}
