//! Unit tests for pipeline orchestration.

use super::*;
use crate::artefact::download::{DownloadError, MockArtefactDownloader, RetrievalStrategy};
use crate::artefact::error::ArtefactError;
use crate::config::ConfigFile;
use crate::dirs::MockBaseDirs;
use crate::fetcher::FetchError;
use crate::module::loader::{LoadError, LoadedUnit, MockModuleLoader};
use crate::module::resolver::StrategyTag;
use crate::platform::MockHostProbe;
use crate::module::invoker::InvocationError;
use crate::test_utils::{FakeUnit, failing_entry, greeting_entry, panicking_entry, silent_entry};
use camino::Utf8Path;
use std::path::PathBuf;
use tempfile::TempDir;

const ARTEFACT: &str = "demo.cpython-311-x86_64-linux-gnu.so";
const PAYLOAD: &[u8] = b"\x7fELF fake extension";

fn install_dir() -> (TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().expect("temp dir");
    let path = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("UTF-8 path");
    (temp, path)
}

fn config(install_dir: Option<&Utf8Path>) -> LoaderConfig {
    let file = ConfigFile {
        module_name: Some("demo".to_owned()),
        install_dir: install_dir.map(Utf8Path::to_owned),
        runtime_version: Some("3.11".to_owned()),
        retry_chain: Some(vec![RetrievalStrategy::DirectHttp]),
        backoff_ms: 0,
        ..ConfigFile::default()
    };
    LoaderConfig::try_from(file).expect("valid configuration")
}

fn probe(os: &'static str, arch: &'static str) -> MockHostProbe {
    let mut probe = MockHostProbe::new();
    probe.expect_os().return_const(os.to_owned());
    probe.expect_arch().return_const(arch.to_owned());
    probe.expect_runtime_version().never();
    probe
}

fn unused_dirs() -> MockBaseDirs {
    let mut dirs = MockBaseDirs::new();
    dirs.expect_data_dir().never();
    dirs
}

fn loader_returning(unit: fn() -> FakeUnit) -> MockModuleLoader {
    let mut loader = MockModuleLoader::new();
    loader
        .expect_load()
        .returning(move |_| Ok(Box::new(unit()) as Box<dyn LoadedUnit>));
    loader
}

fn greeting_unit() -> FakeUnit {
    FakeUnit::new("demo").with_entry("main", greeting_entry)
}

fn seed_cache(install_dir: &Utf8Path) -> Utf8PathBuf {
    let dir = install_dir.join("modules");
    std::fs::create_dir_all(&dir).expect("create cache dir");
    let path = dir.join(ARTEFACT);
    std::fs::write(&path, PAYLOAD).expect("seed artefact");
    path
}

fn run(
    config: &LoaderConfig,
    downloader: &dyn ArtefactDownloader,
    loader: &dyn ModuleLoader,
) -> Result<RunOutcome> {
    let probe = probe("linux", "x86_64");
    let dirs = unused_dirs();
    let collaborators = Collaborators {
        probe: &probe,
        dirs: &dirs,
        downloader,
        loader,
    };
    let mut stderr = Vec::new();
    run_pipeline_with(config, &collaborators, true, &mut stderr)
}

#[test]
fn cache_hit_skips_the_network() {
    let (_temp, root) = install_dir();
    let cached = seed_cache(&root);
    let config = config(Some(&root));

    let mut downloader = MockArtefactDownloader::new();
    downloader.expect_download().never();
    let mut loader = MockModuleLoader::new();
    let expected = cached.clone();
    loader
        .expect_load()
        .withf(move |path| path == expected.as_path())
        .times(1)
        .returning(|_| Ok(Box::new(greeting_unit()) as Box<dyn LoadedUnit>));

    let outcome = run(&config, &downloader, &loader).expect("run succeeds");

    assert_eq!(outcome.source, ArtefactSource::Cache);
    assert_eq!(outcome.artefact, cached);
    assert_eq!(outcome.result.as_deref(), Some("hello from demo"));
    assert_eq!(outcome.entry.strategy, StrategyTag::ExactMatch);
}

#[test]
fn cold_then_warm_run_downloads_once() {
    let (_temp, root) = install_dir();
    let config = config(Some(&root));

    let mut downloader = MockArtefactDownloader::new();
    downloader
        .expect_download()
        .times(1)
        .returning(|_, _, dest| std::fs::write(dest, PAYLOAD).map_err(DownloadError::Io));
    let loader = loader_returning(greeting_unit);

    let cold = run(&config, &downloader, &loader).expect("cold run");
    let warm = run(&config, &downloader, &loader).expect("warm run");

    assert_eq!(cold.source, ArtefactSource::Download);
    assert_eq!(warm.source, ArtefactSource::Cache);
    assert_eq!(cold.artefact, root.join("modules").join(ARTEFACT));
    assert_eq!(cold.artefact, warm.artefact);
    assert_eq!(cold.result, warm.result);
}

#[test]
fn per_module_cache_nests_downloads() {
    let (_temp, root) = install_dir();
    let mut config = config(Some(&root));
    config.per_module_cache = true;

    let mut downloader = MockArtefactDownloader::new();
    downloader
        .expect_download()
        .times(1)
        .returning(|_, _, dest| std::fs::write(dest, PAYLOAD).map_err(DownloadError::Io));
    let loader = loader_returning(greeting_unit);

    let outcome = run(&config, &downloader, &loader).expect("run succeeds");
    assert_eq!(outcome.artefact, root.join("modules/demo").join(ARTEFACT));
}

#[test]
fn exhausted_chain_is_fatal_and_never_loads() {
    let (_temp, root) = install_dir();
    let config = config(Some(&root));

    let mut downloader = MockArtefactDownloader::new();
    downloader.expect_download().times(1).returning(|_, url, _| {
        Err(DownloadError::NotFound {
            url: url.to_owned(),
        })
    });
    let mut loader = MockModuleLoader::new();
    loader.expect_load().never();

    let err = run(&config, &downloader, &loader).expect_err("run fails");
    assert!(
        matches!(err, LoaderError::Fetch(FetchError::Exhausted { ref cache_path, .. })
            if cache_path.as_str().ends_with(ARTEFACT)),
        "unexpected error: {err}"
    );
}

#[test]
fn missing_entry_point_is_reported_softly() {
    let (_temp, root) = install_dir();
    seed_cache(&root);
    let config = config(Some(&root));

    let mut downloader = MockArtefactDownloader::new();
    downloader.expect_download().never();
    let loader = loader_returning(|| {
        FakeUnit::new("demo")
            .with_entry("helper", silent_entry)
            .with_entry("_private", silent_entry)
    });

    let err = run(&config, &downloader, &loader).expect_err("no entry point");
    assert!(err.is_soft_failure());
    match err {
        LoaderError::EntryNotFound(report) => {
            assert_eq!(report.public_callables, vec!["helper"]);
        }
        other => panic!("expected EntryNotFound, got {other}"),
    }
}

#[test]
fn load_failure_is_fatal() {
    let (_temp, root) = install_dir();
    seed_cache(&root);
    let config = config(Some(&root));

    let mut downloader = MockArtefactDownloader::new();
    downloader.expect_download().never();
    let mut loader = MockModuleLoader::new();
    loader.expect_load().returning(|path| {
        Err(LoadError::Rejected {
            path: path.to_owned(),
            reason: "wrong ELF class".to_owned(),
        })
    });

    let err = run(&config, &downloader, &loader).expect_err("load fails");
    assert!(
        matches!(err, LoaderError::Load(LoadError::Rejected { .. })),
        "unexpected error: {err}"
    );
    assert!(err.to_string().contains("wrong ELF class"));
}

#[test]
fn panicking_entry_is_an_invocation_error() {
    let (_temp, root) = install_dir();
    seed_cache(&root);
    let config = config(Some(&root));

    let mut downloader = MockArtefactDownloader::new();
    downloader.expect_download().never();
    let loader = loader_returning(|| FakeUnit::new("demo").with_entry("main", panicking_entry));

    let err = run(&config, &downloader, &loader).expect_err("entry panics");
    assert!(matches!(err, LoaderError::Invocation(_)), "unexpected error: {err}");
}

#[test]
fn failing_status_is_an_invocation_error_with_context() {
    let (_temp, root) = install_dir();
    seed_cache(&root);
    let config = config(Some(&root));

    let mut downloader = MockArtefactDownloader::new();
    downloader.expect_download().never();
    let loader = loader_returning(|| FakeUnit::new("demo").with_entry("main", failing_entry));

    let err = run(&config, &downloader, &loader).expect_err("entry fails");
    assert!(!err.is_soft_failure());
    assert!(
        matches!(
            err,
            LoaderError::Invocation(InvocationError::Failed { status: 2, .. })
        ),
        "unexpected error: {err}"
    );
    assert!(err.to_string().contains("disk quota exceeded"));
}

#[test]
fn unsupported_platform_stops_before_the_network() {
    let (_temp, root) = install_dir();
    let config = config(Some(&root));
    let probe = probe("windows", "mips");
    let dirs = unused_dirs();
    let mut downloader = MockArtefactDownloader::new();
    downloader.expect_download().never();
    let mut loader = MockModuleLoader::new();
    loader.expect_load().never();

    let collaborators = Collaborators {
        probe: &probe,
        dirs: &dirs,
        downloader: &downloader,
        loader: &loader,
    };
    let mut stderr = Vec::new();
    let err = run_pipeline_with(&config, &collaborators, true, &mut stderr)
        .expect_err("unsupported platform");
    assert!(
        matches!(err, LoaderError::Artefact(ArtefactError::UnsupportedPlatform { .. })),
        "unexpected error: {err}"
    );
}

#[test]
fn install_dir_defaults_to_platform_data_dir() {
    let config = config(None);
    let mut dirs = MockBaseDirs::new();
    dirs.expect_data_dir()
        .returning(|| Some(PathBuf::from("/home/test/.local/share/vorto-loader")));

    let dir = super::install_dir(&config, &dirs).expect("install dir");
    assert_eq!(dir, Utf8PathBuf::from("/home/test/.local/share/vorto-loader"));
}

#[test]
fn missing_data_dir_is_reported() {
    let config = config(None);
    let mut dirs = MockBaseDirs::new();
    dirs.expect_data_dir().returning(|| None);

    let err = super::install_dir(&config, &dirs).expect_err("no data dir");
    assert!(matches!(err, LoaderError::DataDirUnavailable));
}

#[test]
fn plan_reports_cache_status_without_side_effects() {
    let (_temp, root) = install_dir();
    let config = config(Some(&root));
    let probe = probe("linux", "x86_64");
    let dirs = unused_dirs();

    let cold = plan(&config, &probe, &dirs).expect("plan");
    assert_eq!(cold.cached, None);
    assert!(!root.join("modules").exists(), "planning must not create directories");

    let cached = seed_cache(&root);
    let warm = plan(&config, &probe, &dirs).expect("plan");
    assert_eq!(warm.cached, Some(cached));
    assert_eq!(warm.descriptor.filename().to_string(), ARTEFACT);
}

#[test]
fn progress_is_written_unless_quiet() {
    let (_temp, root) = install_dir();
    seed_cache(&root);
    let config = config(Some(&root));
    let probe = probe("linux", "x86_64");
    let dirs = unused_dirs();
    let mut downloader = MockArtefactDownloader::new();
    downloader.expect_download().never();
    let loader = loader_returning(greeting_unit);
    let collaborators = Collaborators {
        probe: &probe,
        dirs: &dirs,
        downloader: &downloader,
        loader: &loader,
    };

    let mut stderr = Vec::new();
    run_pipeline_with(&config, &collaborators, false, &mut stderr).expect("run succeeds");
    let progress = String::from_utf8(stderr).expect("UTF-8 progress");
    assert!(progress.contains("Using cached artefact"), "progress: {progress}");
    assert!(progress.contains("Invoking main (exact match)"), "progress: {progress}");
}

#[test]
fn fallback_reports_public_callables() {
    let (_temp, root) = install_dir();
    seed_cache(&root);
    let mut config = config(Some(&root));
    config.resolver.first_callable_fallback = true;
    let probe = probe("linux", "x86_64");
    let dirs = unused_dirs();
    let mut downloader = MockArtefactDownloader::new();
    downloader.expect_download().never();
    let loader = loader_returning(|| {
        FakeUnit::new("demo")
            .with_entry("_private", silent_entry)
            .with_entry("alpha", greeting_entry)
            .with_entry("beta", silent_entry)
    });
    let collaborators = Collaborators {
        probe: &probe,
        dirs: &dirs,
        downloader: &downloader,
        loader: &loader,
    };

    let mut stderr = Vec::new();
    let outcome =
        run_pipeline_with(&config, &collaborators, false, &mut stderr).expect("run succeeds");
    assert_eq!(outcome.entry.strategy, StrategyTag::FallbackFirstCallable);

    let progress = String::from_utf8(stderr).expect("UTF-8 progress");
    assert!(
        progress.contains("No entry point \"main\" found; public callables: alpha, beta"),
        "progress: {progress}"
    );
    assert!(progress.contains("Invoking alpha (fallback)"), "progress: {progress}");
}
