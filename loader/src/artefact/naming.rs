//! Artefact naming policy for prebuilt extension modules.
//!
//! Constructs deterministic filenames from a module name and a
//! [`PlatformKey`], following the extension tag scheme used by the remote
//! repository:
//!
//! - Windows: `{module}.cp{MM}-{win_tag}.pyd`
//! - elsewhere: `{module}.cpython-{MM}-{arch}-{os}-gnu.so`
//!
//! where `{MM}` is the runtime version without a separator.

use super::error::{ArtefactError, Result};
use super::module_name::ModuleName;
use crate::platform::PlatformKey;
use std::fmt;

/// A fully-qualified artefact filename.
///
/// # Examples
///
/// ```
/// use vorto_loader::artefact::module_name::ModuleName;
/// use vorto_loader::artefact::naming::ArtefactFilename;
/// use vorto_loader::platform::{OsFamily, PlatformKey, RuntimeVersion};
///
/// let module: ModuleName = "demo".try_into().expect("valid module name");
/// let key = PlatformKey::new(OsFamily::Linux, "x86_64", RuntimeVersion::new(3, 11));
///
/// let name = ArtefactFilename::new(&module, &key).expect("supported platform");
/// assert_eq!(name.to_string(), "demo.cpython-311-x86_64-linux-gnu.so");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtefactFilename {
    module: ModuleName,
    runtime_tag: String,
    platform_tag: String,
    extension: &'static str,
}

impl ArtefactFilename {
    /// Derive the filename for `module` on the platform described by `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ArtefactError::UnsupportedPlatform`] when no artefact
    /// mapping exists for the platform: a Windows architecture without a
    /// platform tag, or an empty OS or architecture string.
    pub fn new(module: &ModuleName, key: &PlatformKey) -> Result<Self> {
        let os = key.os_family();
        let arch = key.cpu_arch();
        let unsupported = || ArtefactError::UnsupportedPlatform {
            os: os.to_string(),
            arch: arch.to_owned(),
        };

        if os.as_str().is_empty() || arch.is_empty() {
            return Err(unsupported());
        }

        let version = key.runtime_version().compact();
        let (runtime_tag, platform_tag) = if os.is_windows() {
            let win_tag = windows_platform_tag(arch).ok_or_else(unsupported)?;
            (format!("cp{version}"), win_tag.to_owned())
        } else {
            (format!("cpython-{version}"), format!("{arch}-{os}-gnu"))
        };

        Ok(Self {
            module: module.clone(),
            runtime_tag,
            platform_tag,
            extension: key.extension(),
        })
    }

    /// Return the module name component.
    #[must_use]
    pub fn module(&self) -> &ModuleName {
        &self.module
    }

    /// Return the loadable-extension suffix, including the leading dot.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        self.extension
    }

    /// Return the filename as a string without consuming the value.
    #[must_use]
    pub fn filename(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ArtefactFilename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}-{}{}",
            self.module, self.runtime_tag, self.platform_tag, self.extension
        )
    }
}

/// Map a Windows architecture to its extension platform tag.
fn windows_platform_tag(arch: &str) -> Option<&'static str> {
    match arch {
        "x86_64" | "amd64" => Some("win_amd64"),
        "aarch64" | "arm64" => Some("win_arm64"),
        "x86" | "i386" | "i586" | "i686" => Some("win32"),
        _ => None,
    }
}
