//! Test support for loader behavioural tests.
//!
//! Integration tests cannot see the crate's mockall doubles, so this module
//! provides small scripted collaborators for the pipeline seams.

#![allow(dead_code, reason = "each behaviour suite uses a different subset")]

use camino::{Utf8Path, Utf8PathBuf};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;
use vorto_loader::artefact::download::{ArtefactDownloader, DownloadError, RetrievalStrategy};
use vorto_loader::config::{ConfigFile, LoaderConfig};
use vorto_loader::dirs::BaseDirs;
use vorto_loader::module::loader::{LoadError, LoadedUnit, ModuleLoader};
use vorto_loader::platform::HostProbe;
use vorto_loader::test_utils::FakeUnit;

/// Filename of the demo module on Linux x86-64 with runtime 3.11.
pub const DEMO_ARTEFACT: &str = "demo.cpython-311-x86_64-linux-gnu.so";

/// Bytes written by successful scripted transfers.
pub const PAYLOAD: &[u8] = b"\x7fELF fake extension";

/// Creates a temporary install directory with a UTF-8 path.
pub fn temp_install_dir() -> (TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().expect("temp dir");
    let path = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("UTF-8 path");
    (temp, path)
}

/// Places a fake artefact in the flat cache below `install_dir`.
pub fn seed_cache(install_dir: &Utf8Path, filename: &str) -> Utf8PathBuf {
    let dir = install_dir.join("modules");
    std::fs::create_dir_all(&dir).expect("create cache dir");
    let path = dir.join(filename);
    std::fs::write(&path, PAYLOAD).expect("seed artefact");
    path
}

/// Configuration for the demo module with a fixed runtime and no backoff.
pub fn demo_config(install_dir: &Utf8Path) -> ConfigFile {
    ConfigFile {
        module_name: Some("demo".to_owned()),
        repo_root: "https://raw.example.test".to_owned(),
        repo_owner: "acme".to_owned(),
        repo_name: "modules".to_owned(),
        install_dir: Some(install_dir.to_owned()),
        runtime_version: Some("3.11".to_owned()),
        backoff_ms: 0,
        ..ConfigFile::default()
    }
}

/// Validates `file`, panicking on configuration errors.
pub fn resolve(file: ConfigFile) -> LoaderConfig {
    LoaderConfig::try_from(file).expect("valid configuration")
}

/// A probe reporting fixed host facts and no interpreter.
pub struct FixedProbe {
    pub os: String,
    pub arch: String,
}

impl FixedProbe {
    pub fn new(os: &str, arch: &str) -> Self {
        Self {
            os: os.to_owned(),
            arch: arch.to_owned(),
        }
    }
}

impl HostProbe for FixedProbe {
    fn os(&self) -> String {
        self.os.clone()
    }

    fn arch(&self) -> String {
        self.arch.clone()
    }

    fn runtime_version(&self) -> Option<String> {
        None
    }
}

/// Directories that are never consulted because `install_dir` is set.
pub struct NoDirs;

impl BaseDirs for NoDirs {
    fn data_dir(&self) -> Option<PathBuf> {
        None
    }

    fn config_dir(&self) -> Option<PathBuf> {
        None
    }
}

/// How a scripted transfer responds.
#[derive(Debug, Clone)]
pub enum Transfer {
    /// Write the payload to the destination.
    Succeed,
    /// Succeed without writing anything.
    Empty,
    /// Report an HTTP 404.
    NotFound,
    /// Report a transport failure.
    Fail(String),
}

/// A downloader that replays scripted transfers and records each call.
#[derive(Default)]
pub struct ScriptedDownloader {
    script: Mutex<VecDeque<Transfer>>,
    calls: Mutex<Vec<(RetrievalStrategy, String)>>,
}

impl ScriptedDownloader {
    pub fn new(script: impl IntoIterator<Item = Transfer>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Strategies and URLs attempted so far, in order.
    pub fn calls(&self) -> Vec<(RetrievalStrategy, String)> {
        self.calls.lock().expect("lock").clone()
    }
}

impl ArtefactDownloader for ScriptedDownloader {
    fn download(
        &self,
        strategy: RetrievalStrategy,
        url: &str,
        dest: &Path,
    ) -> Result<(), DownloadError> {
        self.calls
            .lock()
            .expect("lock")
            .push((strategy, url.to_owned()));
        let transfer = self
            .script
            .lock()
            .expect("lock")
            .pop_front()
            .expect("unexpected download attempt");
        match transfer {
            Transfer::Succeed => std::fs::write(dest, PAYLOAD).map_err(DownloadError::Io),
            Transfer::Empty => Ok(()),
            Transfer::NotFound => Err(DownloadError::NotFound {
                url: url.to_owned(),
            }),
            Transfer::Fail(reason) => Err(DownloadError::HttpError {
                url: url.to_owned(),
                reason,
            }),
        }
    }
}

/// A loader that hands out a fresh [`FakeUnit`] and records loaded paths.
pub struct FakeLoader {
    unit: FakeUnit,
    loaded: Mutex<Vec<Utf8PathBuf>>,
}

impl FakeLoader {
    pub fn new(unit: FakeUnit) -> Self {
        Self {
            unit,
            loaded: Mutex::new(Vec::new()),
        }
    }

    /// Paths passed to `load`, in order.
    pub fn loaded(&self) -> Vec<Utf8PathBuf> {
        self.loaded.lock().expect("lock").clone()
    }
}

impl ModuleLoader for FakeLoader {
    fn load(&self, path: &Utf8Path) -> Result<Box<dyn LoadedUnit>, LoadError> {
        self.loaded.lock().expect("lock").push(path.to_owned());
        Ok(Box::new(self.unit.clone()))
    }
}
