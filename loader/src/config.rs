//! Loader configuration.
//!
//! Settings come from a TOML file and are then overridden by command-line
//! flags. [`ConfigFile`] mirrors the file format; [`LoaderConfig`] is the
//! validated, immutable value the pipeline runs from.
//!
//! ```toml
//! module_name = "demo"
//! entry_function = "main"
//! proxy_enabled = true
//! proxy_url_prefix = "https://mirror.example/"
//! path_template = "build/{module}/"
//! retry_chain = ["proxied-http", "direct-http", "curl"]
//! ```

use crate::artefact::download::RetrievalStrategy;
use crate::artefact::error::ArtefactError;
use crate::artefact::locator::{PathTemplate, RepositoryLayout};
use crate::artefact::module_name::ModuleName;
use crate::dirs::BaseDirs;
use crate::fetcher::TransportPolicy;
use crate::module::resolver::{DEFAULT_ENTRY, ResolverOptions};
use crate::platform::{RuntimeVersion, default_interpreter};
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use serde::Deserialize;
use std::time::Duration;

/// Name of the configuration file looked up in the config directory.
pub const CONFIG_FILE_NAME: &str = "loader.toml";

/// Default host serving raw repository files.
pub const DEFAULT_REPO_ROOT: &str = "https://raw.githubusercontent.com";

/// Errors raised while reading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration {path}: {source}")]
    Read {
        /// File that was read.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for this schema.
    #[error("invalid configuration {path}: {reason}")]
    Parse {
        /// File that was parsed.
        path: Utf8PathBuf,
        /// Parser message.
        reason: String,
    },

    /// No module name was configured.
    #[error("no module name configured; set module_name or pass --module")]
    MissingModuleName,

    /// The proxy is enabled without a prefix.
    #[error("proxy_enabled is set but proxy_url_prefix is missing")]
    MissingProxyPrefix,

    /// The entry function name is blank.
    #[error("entry_function must not be empty")]
    EmptyEntryFunction,

    /// The runtime version override is malformed.
    #[error("invalid runtime_version: {reason}")]
    InvalidRuntimeVersion {
        /// Parser message.
        reason: String,
    },

    /// The retry chain has no strategies.
    #[error("retry_chain must list at least one strategy")]
    EmptyRetryChain,

    /// A module name or path template failed validation.
    #[error(transparent)]
    Artefact(#[from] ArtefactError),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration as written in the TOML file.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Extension module to load.
    pub module_name: Option<String>,
    /// Entry point name.
    pub entry_function: String,
    /// Whether to try the mirror first.
    pub proxy_enabled: bool,
    /// Mirror prefix prepended to the direct URL.
    pub proxy_url_prefix: Option<String>,
    /// Whether TLS certificates are verified.
    pub tls_verify: bool,
    /// Repository owner.
    pub repo_owner: String,
    /// Repository name.
    pub repo_name: String,
    /// Repository branch.
    pub branch: String,
    /// Base URL of the raw file host.
    pub repo_root: String,
    /// Directory layout below the branch.
    pub path_template: String,
    /// Root of the local cache [default: platform data directory].
    pub install_dir: Option<Utf8PathBuf>,
    /// Nest cached artefacts by module name.
    pub per_module_cache: bool,
    /// Runtime version override, `X.Y`.
    pub runtime_version: Option<String>,
    /// Interpreter probed for the runtime version.
    pub interpreter: Option<String>,
    /// Retrieval strategies in order [default: host-specific].
    pub retry_chain: Option<Vec<RetrievalStrategy>>,
    /// Pause between retrieval attempts in milliseconds.
    pub backoff_ms: u64,
    /// Fall back to the first public callable.
    pub first_callable_fallback: bool,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            module_name: None,
            entry_function: DEFAULT_ENTRY.to_owned(),
            proxy_enabled: false,
            proxy_url_prefix: None,
            tls_verify: true,
            repo_owner: "metwhale".to_owned(),
            repo_name: "Vorto_Loader".to_owned(),
            branch: "main".to_owned(),
            repo_root: DEFAULT_REPO_ROOT.to_owned(),
            path_template: PathTemplate::default().to_string(),
            install_dir: None,
            per_module_cache: false,
            runtime_version: None,
            interpreter: None,
            retry_chain: None,
            backoff_ms: 1000,
            first_callable_fallback: false,
        }
    }
}

impl ConfigFile {
    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML, unknown keys, or
    /// values of the wrong type.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8Path;
    /// use vorto_loader::config::ConfigFile;
    ///
    /// let file = ConfigFile::parse("module_name = \"demo\"\n", Utf8Path::new("loader.toml"))
    ///     .expect("valid configuration");
    /// assert_eq!(file.module_name.as_deref(), Some("demo"));
    /// assert_eq!(file.entry_function, "main");
    /// ```
    pub fn parse(source: &str, path: &Utf8Path) -> Result<Self> {
        toml::from_str(source).map_err(|e| ConfigError::Parse {
            path: path.to_owned(),
            reason: e.to_string(),
        })
    }

    /// Load configuration from `explicit`, or from the default location.
    ///
    /// An explicit path must exist. Without one, `loader.toml` in the
    /// platform config directory is read when present; otherwise defaults
    /// are used.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`] when the
    /// chosen file cannot be loaded.
    pub fn load(explicit: Option<&Utf8Path>, dirs: &dyn BaseDirs) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_owned(),
            None => match default_config_path(dirs) {
                Some(path) if path.is_file() => path,
                _ => {
                    debug!("no configuration file found; using defaults");
                    return Ok(Self::default());
                }
            },
        };

        debug!("reading configuration from {path}");
        let source = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::parse(&source, &path)
    }
}

fn default_config_path(dirs: &dyn BaseDirs) -> Option<Utf8PathBuf> {
    let dir = Utf8PathBuf::from_path_buf(dirs.config_dir()?).ok()?;
    Some(dir.join(CONFIG_FILE_NAME))
}

/// Validated configuration for one run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Extension module to load.
    pub module: ModuleName,
    /// Entry point resolution settings.
    pub resolver: ResolverOptions,
    /// Remote repository coordinates.
    pub layout: RepositoryLayout,
    /// Network retrieval settings.
    pub transport: TransportPolicy,
    /// Root of the local cache, when configured explicitly.
    pub install_dir: Option<Utf8PathBuf>,
    /// Nest cached artefacts by module name.
    pub per_module_cache: bool,
    /// Runtime version override.
    pub runtime_version: Option<RuntimeVersion>,
    /// Interpreter probed for the runtime version.
    pub interpreter: String,
}

impl TryFrom<ConfigFile> for LoaderConfig {
    type Error = ConfigError;

    fn try_from(file: ConfigFile) -> Result<Self> {
        let module_name = file
            .module_name
            .filter(|name| !name.trim().is_empty())
            .ok_or(ConfigError::MissingModuleName)?;
        let module = ModuleName::try_from(module_name.trim())?;

        let entry_name = file.entry_function.trim().to_owned();
        if entry_name.is_empty() {
            return Err(ConfigError::EmptyEntryFunction);
        }

        let proxy_prefix = if file.proxy_enabled {
            let prefix = file
                .proxy_url_prefix
                .filter(|prefix| !prefix.trim().is_empty())
                .ok_or(ConfigError::MissingProxyPrefix)?;
            Some(prefix.trim().to_owned())
        } else {
            None
        };

        let retry_chain = file
            .retry_chain
            .unwrap_or_else(RetrievalStrategy::default_chain);
        if retry_chain.is_empty() {
            return Err(ConfigError::EmptyRetryChain);
        }

        let runtime_version = file
            .runtime_version
            .as_deref()
            .map(str::parse::<RuntimeVersion>)
            .transpose()
            .map_err(|reason| ConfigError::InvalidRuntimeVersion { reason })?;

        Ok(Self {
            module,
            resolver: ResolverOptions {
                entry_name,
                first_callable_fallback: file.first_callable_fallback,
            },
            layout: RepositoryLayout {
                root: file.repo_root,
                owner: file.repo_owner,
                name: file.repo_name,
                branch: file.branch,
                path_template: PathTemplate::try_from(file.path_template)?,
            },
            transport: TransportPolicy {
                proxy_prefix,
                tls_verify: file.tls_verify,
                retry_chain,
                backoff: Duration::from_millis(file.backoff_ms),
            },
            install_dir: file.install_dir,
            per_module_cache: file.per_module_cache,
            runtime_version,
            interpreter: file
                .interpreter
                .unwrap_or_else(|| default_interpreter().to_owned()),
        })
    }
}
