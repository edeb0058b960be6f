//! Repository layout and candidate URL construction.
//!
//! The remote repository is a static file host addressed as
//! `{root}/{owner}/{repo}/{branch}/{path}{filename}`, where `{path}` comes
//! from a configurable [`PathTemplate`]. The locator performs no I/O: it only
//! turns a module name and a [`PlatformKey`] into an [`ArtefactDescriptor`].

use super::error::{ArtefactError, Result};
use super::module_name::ModuleName;
use super::naming::ArtefactFilename;
use crate::platform::PlatformKey;
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;

/// Placeholders recognised in a [`PathTemplate`].
const PLACEHOLDERS: &[&str] = &["module", "os", "arch", "runtime"];

/// A validated repository path template.
///
/// Supported placeholders are `{module}`, `{os}`, `{arch}`, and
/// `{runtime}`. Typical layouts are `{module}/` (flat), `build/{module}/`
/// (build-namespaced) and `{module}/{os}/{arch}/{runtime}/` (fully
/// platform-namespaced). An empty template places artefacts at the branch
/// root.
///
/// # Examples
///
/// ```
/// use vorto_loader::artefact::locator::PathTemplate;
///
/// assert!(PathTemplate::try_from("build/{module}/").is_ok());
/// assert!(PathTemplate::try_from("{module}/{abi}/").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate(String);

impl PathTemplate {
    /// Return the raw template text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Expand the template for a module on a platform.
    ///
    /// A non-empty expansion always ends with `/` so the filename can be
    /// appended directly.
    #[must_use]
    pub fn expand(&self, module: &ModuleName, key: &PlatformKey) -> String {
        let mut expanded = self
            .0
            .replace("{module}", module.as_str())
            .replace("{os}", key.os_family().as_str())
            .replace("{arch}", key.cpu_arch())
            .replace("{runtime}", &key.runtime_version().to_string());
        let trimmed = expanded.trim_start_matches('/');
        if trimmed.len() != expanded.len() {
            expanded = trimmed.to_owned();
        }
        if !expanded.is_empty() && !expanded.ends_with('/') {
            expanded.push('/');
        }
        expanded
    }
}

impl Default for PathTemplate {
    fn default() -> Self {
        Self("{module}/".to_owned())
    }
}

impl TryFrom<&str> for PathTemplate {
    type Error = ArtefactError;

    fn try_from(value: &str) -> Result<Self> {
        validate_template(value)?;
        Ok(Self(value.to_owned()))
    }
}

impl TryFrom<String> for PathTemplate {
    type Error = ArtefactError;

    fn try_from(value: String) -> Result<Self> {
        validate_template(&value)?;
        Ok(Self(value))
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate_template(template: &str) -> Result<()> {
    let reject = |reason: String| {
        Err(ArtefactError::InvalidPathTemplate {
            template: template.to_owned(),
            reason,
        })
    };

    let mut rest = template;
    while let Some(open) = rest.find(['{', '}']) {
        let (_, tail) = rest.split_at(open);
        if tail.starts_with('}') {
            return reject("unbalanced '}'".to_owned());
        }
        let Some(close) = tail.find('}') else {
            return reject("unterminated placeholder".to_owned());
        };
        let name = tail.get(1..close).unwrap_or_default();
        if !PLACEHOLDERS.contains(&name) {
            return reject(format!(
                "unknown placeholder {{{name}}}; expected one of: {}",
                PLACEHOLDERS.join(", ")
            ));
        }
        rest = tail.get(close + 1..).unwrap_or_default();
    }
    Ok(())
}

/// Coordinates and layout of the remote artefact repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryLayout {
    /// Base URL of the file host, e.g. `https://raw.githubusercontent.com`.
    pub root: String,
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub name: String,
    /// Branch holding the artefacts.
    pub branch: String,
    /// Directory layout below the branch.
    pub path_template: PathTemplate,
}

impl RepositoryLayout {
    /// Return the direct URL of `filename` for `module` on `key`.
    ///
    /// # Examples
    ///
    /// ```
    /// use vorto_loader::artefact::locator::{PathTemplate, RepositoryLayout};
    /// use vorto_loader::artefact::module_name::ModuleName;
    /// use vorto_loader::platform::{OsFamily, PlatformKey, RuntimeVersion};
    ///
    /// let layout = RepositoryLayout {
    ///     root: "https://raw.example.test".to_owned(),
    ///     owner: "acme".to_owned(),
    ///     name: "modules".to_owned(),
    ///     branch: "main".to_owned(),
    ///     path_template: PathTemplate::default(),
    /// };
    /// let module: ModuleName = "demo".try_into().expect("valid module name");
    /// let key = PlatformKey::new(OsFamily::Linux, "x86_64", RuntimeVersion::new(3, 11));
    ///
    /// assert_eq!(
    ///     layout.artefact_url(&module, &key, "demo.so"),
    ///     "https://raw.example.test/acme/modules/main/demo/demo.so"
    /// );
    /// ```
    #[must_use]
    pub fn artefact_url(&self, module: &ModuleName, key: &PlatformKey, filename: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}{filename}",
            self.root.trim_end_matches('/'),
            self.owner,
            self.name,
            self.branch,
            self.path_template.expand(module, key),
        )
    }
}

/// How a candidate URL reaches the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Through the mirror prefix.
    Proxied,
    /// Straight to the repository host.
    Direct,
}

/// One remote location the artefact may be fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateUrl {
    /// The full URL.
    pub url: String,
    /// Whether the URL goes through the mirror.
    pub route: Route,
}

/// Everything needed to find or fetch one artefact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtefactDescriptor {
    filename: ArtefactFilename,
    candidates: Vec<CandidateUrl>,
    local_cache_path: Utf8PathBuf,
}

impl ArtefactDescriptor {
    /// Return the module name.
    #[must_use]
    pub fn module_name(&self) -> &ModuleName {
        self.filename.module()
    }

    /// Return the artefact filename.
    #[must_use]
    pub fn filename(&self) -> &ArtefactFilename {
        &self.filename
    }

    /// Return the candidate URLs in precedence order.
    #[must_use]
    pub fn candidates(&self) -> &[CandidateUrl] {
        &self.candidates
    }

    /// Return the first candidate reached through `route`, if any.
    #[must_use]
    pub fn candidate(&self, route: Route) -> Option<&CandidateUrl> {
        self.candidates.iter().find(|c| c.route == route)
    }

    /// Return the path the artefact occupies once cached.
    #[must_use]
    pub fn local_cache_path(&self) -> &Utf8Path {
        &self.local_cache_path
    }
}

/// Build the descriptor for `module` on `key`.
///
/// When `proxy_prefix` is set, the proxied URL (prefix followed by the
/// direct URL) precedes the direct URL in the candidate list.
///
/// # Errors
///
/// Returns [`ArtefactError::UnsupportedPlatform`] when `key` has no
/// filename mapping.
pub fn locate(
    module: &ModuleName,
    key: &PlatformKey,
    layout: &RepositoryLayout,
    proxy_prefix: Option<&str>,
    cache_dir: &Utf8Path,
) -> Result<ArtefactDescriptor> {
    let filename = ArtefactFilename::new(module, key)?;
    let direct = layout.artefact_url(module, key, &filename.filename());

    let mut candidates = Vec::with_capacity(2);
    if let Some(prefix) = proxy_prefix {
        candidates.push(CandidateUrl {
            url: format!("{prefix}{direct}"),
            route: Route::Proxied,
        });
    }
    candidates.push(CandidateUrl {
        url: direct,
        route: Route::Direct,
    });

    Ok(ArtefactDescriptor {
        local_cache_path: cache_dir.join(filename.filename()),
        filename,
        candidates,
    })
}
