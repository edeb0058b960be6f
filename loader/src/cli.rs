//! CLI argument definitions for the Vorto loader.
//!
//! This module defines the command-line interface using clap. Flags override
//! the matching settings of the configuration file.

use crate::config::{ConfigError, ConfigFile, LoaderConfig};
use camino::Utf8PathBuf;
use clap::Parser;

/// Fetch, cache, load, and run a prebuilt extension module.
#[derive(Parser, Debug, Clone)]
#[command(name = "vorto-loader")]
#[command(version, about)]
#[command(long_about = concat!(
    "Fetch, cache, load, and run a prebuilt extension module.\n\n",
    "The loader derives the artefact filename for this platform, reuses a ",
    "cached copy when one exists, and otherwise downloads it through the ",
    "configured retrieval chain (mirror, direct, then curl or wget). The ",
    "artefact is loaded in-process and its entry point is invoked; any string ",
    "it returns is printed on stdout.",
))]
#[command(after_help = concat!(
    "CONFIGURATION:\n",
    "  Settings are read from loader.toml in the platform config directory, or\n",
    "  from --config FILE. Command-line flags take precedence.\n\n",
    "EXAMPLES:\n",
    "  Run the default entry point of a module:\n",
    "    $ vorto-loader -m demo\n\n",
    "  Download through a mirror and call `run`:\n",
    "    $ vorto-loader -m demo -e run --proxy https://mirror.example/\n\n",
    "  Show what would be fetched, as JSON:\n",
    "    $ vorto-loader -m demo --dry-run --json",
))]
pub struct Cli {
    /// Configuration file [default: loader.toml in the config directory].
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Extension module to load.
    #[arg(short, long, value_name = "NAME")]
    pub module: Option<String>,

    /// Entry point to invoke [default: main].
    #[arg(short, long, value_name = "NAME")]
    pub entry: Option<String>,

    /// Enable the mirror with the given URL prefix.
    #[arg(long, value_name = "PREFIX", conflicts_with = "no_proxy")]
    pub proxy: Option<String>,

    /// Disable the mirror even if configured.
    #[arg(long)]
    pub no_proxy: bool,

    /// Skip TLS certificate verification.
    #[arg(long)]
    pub insecure: bool,

    /// Root of the local artefact cache [default: platform-specific].
    #[arg(long, value_name = "DIR")]
    pub install_dir: Option<Utf8PathBuf>,

    /// Nest cached artefacts in a directory per module.
    #[arg(long)]
    pub per_module_cache: bool,

    /// Runtime version tag to fetch for, e.g. 3.11 [default: detected].
    #[arg(long, value_name = "X.Y")]
    pub runtime_version: Option<String>,

    /// Show the resolved plan and exit without downloading or loading.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the dry-run plan as JSON.
    #[arg(long, requires = "dry_run")]
    pub json: bool,

    /// Suppress progress output (errors still shown).
    #[arg(short, long)]
    pub quiet: bool,
}

impl Default for Cli {
    /// Creates a `Cli` with no overrides and all flags disabled.
    fn default() -> Self {
        Self {
            config: None,
            module: None,
            entry: None,
            proxy: None,
            no_proxy: false,
            insecure: false,
            install_dir: None,
            per_module_cache: false,
            runtime_version: None,
            dry_run: false,
            json: false,
            quiet: false,
        }
    }
}

impl Cli {
    /// Apply command-line overrides to file settings.
    ///
    /// # Examples
    ///
    /// ```
    /// use vorto_loader::cli::Cli;
    /// use vorto_loader::config::ConfigFile;
    ///
    /// let cli = Cli {
    ///     module: Some("demo".to_owned()),
    ///     proxy: Some("https://mirror.example/".to_owned()),
    ///     ..Cli::default()
    /// };
    /// let mut file = ConfigFile::default();
    /// cli.apply_to(&mut file);
    ///
    /// assert_eq!(file.module_name.as_deref(), Some("demo"));
    /// assert!(file.proxy_enabled);
    /// ```
    pub fn apply_to(&self, file: &mut ConfigFile) {
        if let Some(module) = &self.module {
            file.module_name = Some(module.clone());
        }
        if let Some(entry) = &self.entry {
            file.entry_function.clone_from(entry);
        }
        if let Some(prefix) = &self.proxy {
            file.proxy_enabled = true;
            file.proxy_url_prefix = Some(prefix.clone());
        }
        if self.no_proxy {
            file.proxy_enabled = false;
        }
        if self.insecure {
            file.tls_verify = false;
        }
        if let Some(dir) = &self.install_dir {
            file.install_dir = Some(dir.clone());
        }
        if self.per_module_cache {
            file.per_module_cache = true;
        }
        if let Some(version) = &self.runtime_version {
            file.runtime_version = Some(version.clone());
        }
    }

    /// Merge overrides into `file` and validate the result.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the merged settings are invalid.
    pub fn resolve_config(&self, mut file: ConfigFile) -> Result<LoaderConfig, ConfigError> {
        self.apply_to(&mut file);
        LoaderConfig::try_from(file)
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
