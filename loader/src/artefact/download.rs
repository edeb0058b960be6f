//! Artefact download strategies.
//!
//! Provides a trait-based abstraction for downloading one artefact file
//! through a named [`RetrievalStrategy`], enabling dependency injection for
//! testing. HTTP strategies use a shared `ureq` agent; the external process
//! strategies shell out to `curl` or `wget` through [`CommandExecutor`].

use crate::deps::CommandExecutor;
use log::debug;
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

/// Network timeout for artefact downloads.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// External download tools usable as a last resort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DownloadTool {
    /// `curl -fsSL`.
    Curl,
    /// `wget -q`.
    Wget,
}

impl DownloadTool {
    /// Return the program name.
    #[must_use]
    pub fn program(self) -> &'static str {
        match self {
            Self::Curl => "curl",
            Self::Wget => "wget",
        }
    }

    /// Build the argument list that writes `url` to `dest`.
    ///
    /// # Examples
    ///
    /// ```
    /// use vorto_loader::artefact::download::DownloadTool;
    ///
    /// let args = DownloadTool::Curl.arguments("https://h/a.so", "/tmp/a.so", true);
    /// assert_eq!(args, ["-fsSL", "-o", "/tmp/a.so", "https://h/a.so"]);
    /// ```
    #[must_use]
    pub fn arguments<'a>(self, url: &'a str, dest: &'a str, tls_verify: bool) -> Vec<&'a str> {
        let mut args = Vec::with_capacity(5);
        match self {
            Self::Curl => {
                args.push("-fsSL");
                if !tls_verify {
                    args.push("-k");
                }
                args.extend(["-o", dest, url]);
            }
            Self::Wget => {
                args.push("-q");
                if !tls_verify {
                    args.push("--no-check-certificate");
                }
                args.extend(["-O", dest, url]);
            }
        }
        args
    }
}

/// One way of retrieving the artefact bytes.
///
/// Strategies are configured by their kebab-case names: `proxied-http`,
/// `direct-http`, `curl`, and `wget`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(try_from = "String", into = "String")]
pub enum RetrievalStrategy {
    /// HTTP GET through the mirror prefix.
    ProxiedHttp,
    /// HTTP GET straight to the repository host.
    DirectHttp,
    /// An external download tool against the direct URL.
    ExternalProcess(DownloadTool),
}

impl RetrievalStrategy {
    /// Return the default chain for this host.
    #[must_use]
    pub fn default_chain() -> Vec<Self> {
        if cfg!(windows) {
            vec![
                Self::ProxiedHttp,
                Self::DirectHttp,
                Self::ExternalProcess(DownloadTool::Curl),
            ]
        } else {
            vec![
                Self::ProxiedHttp,
                Self::DirectHttp,
                Self::ExternalProcess(DownloadTool::Wget),
                Self::ExternalProcess(DownloadTool::Curl),
            ]
        }
    }

    /// Return the configuration name of the strategy.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ProxiedHttp => "proxied-http",
            Self::DirectHttp => "direct-http",
            Self::ExternalProcess(tool) => tool.program(),
        }
    }
}

impl fmt::Display for RetrievalStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetrievalStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "proxied-http" => Ok(Self::ProxiedHttp),
            "direct-http" => Ok(Self::DirectHttp),
            "curl" => Ok(Self::ExternalProcess(DownloadTool::Curl)),
            "wget" => Ok(Self::ExternalProcess(DownloadTool::Wget)),
            other => Err(format!(
                "unknown retrieval strategy \"{other}\"; expected one of: \
                 proxied-http, direct-http, curl, wget"
            )),
        }
    }
}

impl TryFrom<String> for RetrievalStrategy {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RetrievalStrategy> for String {
    fn from(value: RetrievalStrategy) -> Self {
        value.as_str().to_owned()
    }
}

/// Trait for downloading an artefact file.
///
/// Abstractions allow tests to mock network behaviour without network
/// access.
#[cfg_attr(test, mockall::automock)]
pub trait ArtefactDownloader {
    /// Download `url` into `dest` using `strategy`.
    ///
    /// `dest` already exists as an empty private file; implementations
    /// overwrite it.
    ///
    /// # Errors
    ///
    /// Returns an error if the transfer fails or the file cannot be written.
    fn download(
        &self,
        strategy: RetrievalStrategy,
        url: &str,
        dest: &Path,
    ) -> Result<(), DownloadError>;
}

/// Errors arising from artefact download operations.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// HTTP request failed.
    #[error("download failed for {url}: {reason}")]
    HttpError {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The requested artefact was not found (HTTP 404).
    #[error("artefact not found: {url}")]
    NotFound {
        /// The URL that returned 404.
        url: String,
    },

    /// I/O error writing the downloaded file.
    #[error("I/O error writing download: {0}")]
    Io(#[from] std::io::Error),

    /// The external tool is not installed.
    #[error("{tool} is not available on this host")]
    ToolUnavailable {
        /// Program name.
        tool: &'static str,
    },

    /// The external tool ran but reported failure.
    #[error("{tool} failed: {reason}")]
    ToolFailed {
        /// Program name.
        tool: &'static str,
        /// Exit status and captured stderr.
        reason: String,
    },
}

/// HTTP-based downloader using `ureq`.
#[derive(Debug, Clone, Copy)]
pub struct HttpDownloader {
    tls_verify: bool,
}

impl HttpDownloader {
    /// Create a downloader, optionally skipping certificate validation.
    #[must_use]
    pub fn new(tls_verify: bool) -> Self {
        Self { tls_verify }
    }

    /// Download `url` and write the body to `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::NotFound`] for HTTP 404,
    /// [`DownloadError::HttpError`] for other transport failures, and
    /// [`DownloadError::Io`] when the body cannot be written.
    pub fn fetch(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        let response = http_agent(self.tls_verify)
            .get(url)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        let mut file = std::fs::File::create(dest)?;
        std::io::copy(&mut response.into_body().as_reader(), &mut file)
            .map_err(DownloadError::Io)?;
        file.flush()?;
        file.sync_all()?;
        Ok(())
    }
}

/// Downloader that shells out to `curl` or `wget`.
pub struct ToolDownloader<'a> {
    executor: &'a dyn CommandExecutor,
    tls_verify: bool,
}

impl<'a> ToolDownloader<'a> {
    /// Create a tool downloader running commands through `executor`.
    #[must_use]
    pub fn new(executor: &'a dyn CommandExecutor, tls_verify: bool) -> Self {
        Self {
            executor,
            tls_verify,
        }
    }

    /// Run `tool` to write `url` into `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ToolUnavailable`] when the program cannot be
    /// spawned because it is not installed, and
    /// [`DownloadError::ToolFailed`] when it exits unsuccessfully.
    pub fn fetch(&self, tool: DownloadTool, url: &str, dest: &Path) -> Result<(), DownloadError> {
        let program = tool.program();
        let dest = dest.to_string_lossy();
        let args = tool.arguments(url, &dest, self.tls_verify);
        debug!("running {program} {}", args.join(" "));

        let output = match self.executor.run(program, &args) {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DownloadError::ToolUnavailable { tool: program });
            }
            Err(e) => {
                return Err(DownloadError::ToolFailed {
                    tool: program,
                    reason: e.to_string(),
                });
            }
        };

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(DownloadError::ToolFailed {
            tool: program,
            reason: format!("{}: {}", output.status, stderr.trim()),
        })
    }
}

/// Production downloader dispatching each strategy to its transport.
pub struct SystemDownloader<'a> {
    http: HttpDownloader,
    tools: ToolDownloader<'a>,
}

impl<'a> SystemDownloader<'a> {
    /// Create a downloader honouring the TLS verification toggle.
    #[must_use]
    pub fn new(executor: &'a dyn CommandExecutor, tls_verify: bool) -> Self {
        Self {
            http: HttpDownloader::new(tls_verify),
            tools: ToolDownloader::new(executor, tls_verify),
        }
    }
}

impl ArtefactDownloader for SystemDownloader<'_> {
    fn download(
        &self,
        strategy: RetrievalStrategy,
        url: &str,
        dest: &Path,
    ) -> Result<(), DownloadError> {
        match strategy {
            RetrievalStrategy::ProxiedHttp | RetrievalStrategy::DirectHttp => {
                self.http.fetch(url, dest)
            }
            RetrievalStrategy::ExternalProcess(tool) => self.tools.fetch(tool, url, dest),
        }
    }
}

/// Shared `ureq` agents with request timeout configuration.
fn http_agent(tls_verify: bool) -> &'static ureq::Agent {
    static VERIFYING: OnceLock<ureq::Agent> = OnceLock::new();
    static INSECURE: OnceLock<ureq::Agent> = OnceLock::new();

    let cell = if tls_verify { &VERIFYING } else { &INSECURE };
    cell.get_or_init(|| {
        let tls = ureq::tls::TlsConfig::builder()
            .disable_verification(!tls_verify)
            .build();
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(DOWNLOAD_TIMEOUT))
            .tls_config(tls)
            .build();
        ureq::Agent::new_with_config(config)
    })
}

/// Map a ureq error to a [`DownloadError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> DownloadError {
    match err {
        ureq::Error::StatusCode(404) => DownloadError::NotFound {
            url: url.to_owned(),
        },
        other => DownloadError::HttpError {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ExpectedCall, StubExecutor, failure_output, success_output};
    use rstest::rstest;

    #[test]
    fn map_ureq_error_maps_404_to_not_found() {
        let err = ureq::Error::StatusCode(404);
        let mapped = map_ureq_error("https://example.test/demo.so", &err);
        assert!(matches!(mapped, DownloadError::NotFound { .. }));
    }

    #[test]
    fn map_ureq_error_maps_other_status_to_http_error() {
        let err = ureq::Error::StatusCode(500);
        let mapped = map_ureq_error("https://example.test/demo.so", &err);
        assert!(matches!(mapped, DownloadError::HttpError { .. }));
    }

    #[rstest]
    #[case::proxied("proxied-http", RetrievalStrategy::ProxiedHttp)]
    #[case::direct("direct-http", RetrievalStrategy::DirectHttp)]
    #[case::curl("curl", RetrievalStrategy::ExternalProcess(DownloadTool::Curl))]
    #[case::wget("wget", RetrievalStrategy::ExternalProcess(DownloadTool::Wget))]
    fn strategy_names_parse(#[case] name: &str, #[case] expected: RetrievalStrategy) {
        let parsed: RetrievalStrategy = name.parse().expect("known strategy");
        assert_eq!(parsed, expected);
        assert_eq!(parsed.to_string(), name);
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let err = "ftp".parse::<RetrievalStrategy>().expect_err("unknown");
        assert!(err.contains("proxied-http"));
    }

    #[test]
    fn default_chain_starts_with_http_strategies() {
        let chain = RetrievalStrategy::default_chain();
        assert_eq!(
            chain.get(..2),
            Some(&[RetrievalStrategy::ProxiedHttp, RetrievalStrategy::DirectHttp][..])
        );
        assert!(chain.contains(&RetrievalStrategy::ExternalProcess(DownloadTool::Curl)));
    }

    #[rstest]
    #[case::curl_verified(DownloadTool::Curl, true, vec!["-fsSL", "-o", "/d", "https://u"])]
    #[case::curl_insecure(DownloadTool::Curl, false, vec!["-fsSL", "-k", "-o", "/d", "https://u"])]
    #[case::wget_verified(DownloadTool::Wget, true, vec!["-q", "-O", "/d", "https://u"])]
    #[case::wget_insecure(
        DownloadTool::Wget,
        false,
        vec!["-q", "--no-check-certificate", "-O", "/d", "https://u"]
    )]
    fn tool_arguments_follow_tls_policy(
        #[case] tool: DownloadTool,
        #[case] tls_verify: bool,
        #[case] expected: Vec<&str>,
    ) {
        assert_eq!(tool.arguments("https://u", "/d", tls_verify), expected);
    }

    #[test]
    fn tool_download_succeeds_on_zero_exit() {
        let executor = StubExecutor::new(vec![ExpectedCall {
            cmd: "curl",
            args: vec!["-fsSL", "-o", "/tmp/demo.so", "https://h/demo.so"],
            result: Ok(success_output()),
        }]);
        let tools = ToolDownloader::new(&executor, true);

        tools
            .fetch(DownloadTool::Curl, "https://h/demo.so", Path::new("/tmp/demo.so"))
            .expect("tool download");
        executor.assert_finished();
    }

    #[test]
    fn missing_tool_is_reported_as_unavailable() {
        let executor = StubExecutor::new(vec![ExpectedCall {
            cmd: "wget",
            args: vec!["-q", "-O", "/tmp/demo.so", "https://h/demo.so"],
            result: Err(std::io::Error::from(std::io::ErrorKind::NotFound)),
        }]);
        let tools = ToolDownloader::new(&executor, true);

        let err = tools
            .fetch(DownloadTool::Wget, "https://h/demo.so", Path::new("/tmp/demo.so"))
            .expect_err("tool missing");
        assert!(matches!(err, DownloadError::ToolUnavailable { tool: "wget" }));
    }

    #[test]
    fn failing_tool_reports_stderr() {
        let executor = StubExecutor::new(vec![ExpectedCall {
            cmd: "curl",
            args: vec!["-fsSL", "-o", "/tmp/demo.so", "https://h/demo.so"],
            result: Ok(failure_output("curl: (22) 404")),
        }]);
        let tools = ToolDownloader::new(&executor, true);

        let err = tools
            .fetch(DownloadTool::Curl, "https://h/demo.so", Path::new("/tmp/demo.so"))
            .expect_err("tool failure");
        assert!(
            matches!(err, DownloadError::ToolFailed { ref reason, .. } if reason.contains("404")),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn system_downloader_routes_tools_through_executor() {
        let executor = StubExecutor::new(vec![ExpectedCall {
            cmd: "wget",
            args: vec!["-q", "--no-check-certificate", "-O", "/tmp/x.so", "https://h/x.so"],
            result: Ok(success_output()),
        }]);
        let downloader = SystemDownloader::new(&executor, false);

        downloader
            .download(
                RetrievalStrategy::ExternalProcess(DownloadTool::Wget),
                "https://h/x.so",
                Path::new("/tmp/x.so"),
            )
            .expect("tool download");
        executor.assert_finished();
    }
}
