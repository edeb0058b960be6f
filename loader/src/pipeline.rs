//! End-to-end acquisition and invocation.
//!
//! The stages run strictly in order: profile the host, locate the artefact,
//! check the cache, fetch on a miss, load, resolve the entry point, and
//! invoke it. A cache hit never touches the network.

use crate::artefact::download::{ArtefactDownloader, SystemDownloader};
use crate::artefact::locator::{ArtefactDescriptor, locate};
use crate::cache::CacheStore;
use crate::config::LoaderConfig;
use crate::deps::SystemCommandExecutor;
use crate::dirs::{BaseDirs, SystemBaseDirs};
use crate::error::{LoaderError, Result};
use crate::fetcher::Fetcher;
use crate::module::invoker::invoke;
use crate::module::loader::{ModuleLoader, NativeModuleLoader};
use crate::module::resolver::{EntryCandidate, Resolution, ResolvedEntry, StrategyTag, resolve};
use crate::output::write_stderr_line;
use crate::platform::{HostProbe, PlatformKey, SystemProbe, profile};
use camino::Utf8PathBuf;
use log::debug;
use std::io::Write;

/// Where the loaded artefact came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtefactSource {
    /// Found in the local cache.
    Cache,
    /// Downloaded during this run.
    Download,
}

/// Everything decided before any network or loader activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// Host platform key.
    pub platform: PlatformKey,
    /// Artefact name, candidate URLs, and cache path.
    pub descriptor: ArtefactDescriptor,
    /// Existing cached artefact, if any.
    pub cached: Option<Utf8PathBuf>,
}

/// The result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Artefact that was loaded.
    pub artefact: Utf8PathBuf,
    /// Where it came from.
    pub source: ArtefactSource,
    /// Entry point that was invoked.
    pub entry: EntryCandidate,
    /// String returned by the entry point, if any.
    pub result: Option<String>,
}

/// Injectable collaborators for [`run_pipeline_with`].
pub struct Collaborators<'a> {
    /// Host facts.
    pub probe: &'a dyn HostProbe,
    /// Platform directories.
    pub dirs: &'a dyn BaseDirs,
    /// Network and tool transport.
    pub downloader: &'a dyn ArtefactDownloader,
    /// In-process loader.
    pub loader: &'a dyn ModuleLoader,
}

/// Resolve the install directory from configuration or the platform data
/// directory.
///
/// # Errors
///
/// Returns [`LoaderError::DataDirUnavailable`] when neither is available or
/// the data directory is not valid UTF-8.
pub fn install_dir(config: &LoaderConfig, dirs: &dyn BaseDirs) -> Result<Utf8PathBuf> {
    if let Some(dir) = &config.install_dir {
        return Ok(dir.clone());
    }
    let data_dir = dirs.data_dir().ok_or(LoaderError::DataDirUnavailable)?;
    Utf8PathBuf::from_path_buf(data_dir).map_err(|path| {
        debug!("data directory is not valid UTF-8: {}", path.display());
        LoaderError::DataDirUnavailable
    })
}

/// Work out what a run would do without side effects.
///
/// # Errors
///
/// Returns an error when no install directory is available, the platform
/// has no artefact mapping, or the cache cannot be scanned.
pub fn plan(config: &LoaderConfig, probe: &dyn HostProbe, dirs: &dyn BaseDirs) -> Result<Plan> {
    let platform = profile(probe, config.runtime_version);
    debug!("platform key: {platform}");

    let cache = CacheStore::new(&install_dir(config, dirs)?, config.per_module_cache);
    let descriptor = locate(
        &config.module,
        &platform,
        &config.layout,
        config.transport.proxy_prefix.as_deref(),
        &cache.module_dir(&config.module),
    )?;
    let cached = cache.lookup(&config.module, platform.extension())?;

    Ok(Plan {
        platform,
        descriptor,
        cached,
    })
}

/// Plan a run against the live host.
///
/// # Errors
///
/// See [`plan`].
pub fn plan_for_host(config: &LoaderConfig) -> Result<Plan> {
    let executor = SystemCommandExecutor;
    let probe = SystemProbe::new(&executor, &config.interpreter);
    plan(config, &probe, &SystemBaseDirs)
}

/// Run the pipeline with production collaborators.
///
/// # Errors
///
/// See [`run_pipeline_with`].
pub fn run_pipeline(
    config: &LoaderConfig,
    quiet: bool,
    stderr: &mut dyn Write,
) -> Result<RunOutcome> {
    let executor = SystemCommandExecutor;
    let probe = SystemProbe::new(&executor, &config.interpreter);
    let downloader = SystemDownloader::new(&executor, config.transport.tls_verify);
    let collaborators = Collaborators {
        probe: &probe,
        dirs: &SystemBaseDirs,
        downloader: &downloader,
        loader: &NativeModuleLoader,
    };
    run_pipeline_with(config, &collaborators, quiet, stderr)
}

/// Testable pipeline with injected collaborators.
///
/// The production entry point [`run_pipeline`] delegates here with real
/// implementations; tests inject mocks.
///
/// # Errors
///
/// Returns the first fatal stage failure, or
/// [`LoaderError::EntryNotFound`] when the artefact loads but exposes no
/// usable entry point.
pub fn run_pipeline_with(
    config: &LoaderConfig,
    collaborators: &Collaborators<'_>,
    quiet: bool,
    stderr: &mut dyn Write,
) -> Result<RunOutcome> {
    let plan = plan(config, collaborators.probe, collaborators.dirs)?;
    if !quiet {
        write_stderr_line(
            stderr,
            format!(
                "Resolving {} for {}...",
                plan.descriptor.filename(),
                plan.platform
            ),
        );
    }

    let (artefact, source) = match plan.cached {
        Some(path) => {
            debug!("cache hit: {path}");
            if !quiet {
                write_stderr_line(stderr, format!("Using cached artefact {path}"));
            }
            (path, ArtefactSource::Cache)
        }
        None => {
            let cache = CacheStore::new(
                &install_dir(config, collaborators.dirs)?,
                config.per_module_cache,
            );
            cache.prepare(&config.module)?;
            let fetcher = Fetcher::new(&config.transport, collaborators.downloader, quiet);
            let path = fetcher.fetch(&plan.descriptor, stderr)?;
            (path, ArtefactSource::Download)
        }
    };

    let unit = collaborators.loader.load(&artefact)?;
    let resolution = resolve(unit.as_ref(), &config.resolver);
    let (candidate, entry) = match resolution {
        Resolution::Found { candidate, entry } => (candidate, entry),
        Resolution::NotFound(report) => return Err(LoaderError::EntryNotFound(report)),
    };
    if !quiet {
        if candidate.strategy == StrategyTag::FallbackFirstCallable {
            write_stderr_line(
                stderr,
                format!(
                    "No entry point \"{}\" found; public callables: {}",
                    config.resolver.entry_name,
                    unit.public_callables().join(", ")
                ),
            );
        }
        write_stderr_line(
            stderr,
            format!("Invoking {} ({})", candidate.symbol_name, candidate.strategy),
        );
    }

    let result = invoke(ResolvedEntry {
        candidate: &candidate,
        entry,
    })?;

    Ok(RunOutcome {
        artefact,
        source,
        entry: candidate,
        result,
    })
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
