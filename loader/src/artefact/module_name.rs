//! Module name newtype for artefact naming and cache lookup.
//!
//! A module name is embedded in filenames, URL paths, and glob patterns, so
//! it must be non-empty and free of dots, path separators, whitespace, and
//! glob metacharacters. The first dot-delimited segment of an artefact
//! filename is always the module name.

use super::error::{ArtefactError, Result};
use std::fmt;

/// Characters that would change the meaning of a filename, URL segment, or
/// cache pattern built from the module name.
const FORBIDDEN: &[char] = &['.', '/', '\\', '*', '?', '[', ']', '{', '}', ':'];

/// A validated extension module name.
///
/// # Examples
///
/// ```
/// use vorto_loader::artefact::module_name::ModuleName;
///
/// let name: ModuleName = "sgxw_e122031e".try_into().expect("valid module name");
/// assert_eq!(name.as_str(), "sgxw_e122031e");
/// assert!(ModuleName::try_from("demo.v2").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleName(String);

impl ModuleName {
    /// Return the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the wrapper and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Derive the module name from an artefact filename.
    ///
    /// The module name is the first dot-delimited segment, so
    /// `demo.cpython-311-x86_64-linux-gnu.so` yields `demo`.
    ///
    /// # Errors
    ///
    /// Returns [`ArtefactError::InvalidModuleName`] when the leading segment
    /// is empty or otherwise invalid.
    pub fn from_filename(filename: &str) -> Result<Self> {
        let stem = filename.split('.').next().unwrap_or_default();
        Self::try_from(stem)
    }
}

impl TryFrom<&str> for ModuleName {
    type Error = ArtefactError;

    fn try_from(value: &str) -> Result<Self> {
        validate_module_name(value)?;
        Ok(Self(value.to_owned()))
    }
}

impl TryFrom<String> for ModuleName {
    type Error = ArtefactError;

    fn try_from(value: String) -> Result<Self> {
        validate_module_name(&value)?;
        Ok(Self(value))
    }
}

impl AsRef<str> for ModuleName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn validate_module_name(value: &str) -> Result<()> {
    let reject = |reason: &str| {
        Err(ArtefactError::InvalidModuleName {
            value: value.to_owned(),
            reason: reason.to_owned(),
        })
    };

    if value.is_empty() {
        return reject("module name must not be empty");
    }
    if value.chars().any(char::is_whitespace) {
        return reject("module name must not contain whitespace");
    }
    if let Some(c) = value.chars().find(|c| FORBIDDEN.contains(c)) {
        return reject(&format!("module name must not contain '{c}'"));
    }
    Ok(())
}
