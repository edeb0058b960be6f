//! Artefact retrieval with strategy fallback.
//!
//! The fetcher walks the configured retrieval chain in order. Each attempt
//! downloads into a private temporary file beside the cache path; a
//! non-empty result is renamed into place without clobbering an existing
//! file. Failures are logged and recorded, and the next strategy runs after
//! a fixed backoff. The first successful attempt ends the chain.

use crate::artefact::download::{ArtefactDownloader, DownloadError, RetrievalStrategy};
use crate::artefact::locator::{ArtefactDescriptor, CandidateUrl, Route};
use crate::output::write_stderr_line;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use std::fmt;
use std::io::Write;
use std::time::Duration;

/// Default pause between retrieval attempts.
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(1000);

/// How artefacts are retrieved from the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportPolicy {
    /// Mirror prefix; `Some` exactly when the proxy is enabled.
    pub proxy_prefix: Option<String>,
    /// Whether TLS certificates are verified.
    pub tls_verify: bool,
    /// Strategies in the order they are attempted.
    pub retry_chain: Vec<RetrievalStrategy>,
    /// Pause before every attempt after the first.
    pub backoff: Duration,
}

impl Default for TransportPolicy {
    fn default() -> Self {
        Self {
            proxy_prefix: None,
            tls_verify: true,
            retry_chain: RetrievalStrategy::default_chain(),
            backoff: DEFAULT_BACKOFF,
        }
    }
}

/// One failed retrieval attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedAttempt {
    /// Strategy that was attempted.
    pub strategy: RetrievalStrategy,
    /// URL that was requested.
    pub url: String,
    /// Why the attempt failed.
    pub reason: String,
}

impl fmt::Display for FailedAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.strategy, self.url, self.reason)
    }
}

/// Why a single attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    /// The transport reported a failure.
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// The transport succeeded but produced no bytes.
    #[error("transfer produced an empty file")]
    EmptyTransfer,

    /// The temporary file could not be created, inspected, or persisted.
    #[error("I/O error staging download: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned by [`Fetcher::fetch`].
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Every strategy in the chain failed or was skipped.
    #[error(
        "all retrieval strategies failed; place the artefact at {cache_path} manually. attempts: {}",
        format_attempts(.attempts)
    )]
    Exhausted {
        /// Every attempt in chain order.
        attempts: Vec<FailedAttempt>,
        /// Where the artefact was meant to be cached.
        cache_path: Utf8PathBuf,
    },
}

impl FetchError {
    /// Return the URLs that were attempted, in order.
    #[must_use]
    pub fn attempted_urls(&self) -> Vec<&str> {
        match self {
            Self::Exhausted { attempts, .. } => attempts.iter().map(|a| a.url.as_str()).collect(),
        }
    }
}

fn format_attempts(attempts: &[FailedAttempt]) -> String {
    if attempts.is_empty() {
        return "none".to_owned();
    }
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Retrieves artefacts through a [`TransportPolicy`].
pub struct Fetcher<'a> {
    policy: &'a TransportPolicy,
    downloader: &'a dyn ArtefactDownloader,
    quiet: bool,
}

impl<'a> Fetcher<'a> {
    /// Create a fetcher using `downloader` for every transport.
    #[must_use]
    pub fn new(
        policy: &'a TransportPolicy,
        downloader: &'a dyn ArtefactDownloader,
        quiet: bool,
    ) -> Self {
        Self {
            policy,
            downloader,
            quiet,
        }
    }

    /// Retrieve the artefact into its cache path.
    ///
    /// The cache directory must already exist. On success the returned path
    /// holds a complete, non-empty artefact.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Exhausted`] listing every attempt when no
    /// strategy succeeds.
    pub fn fetch(
        &self,
        descriptor: &ArtefactDescriptor,
        stderr: &mut dyn Write,
    ) -> Result<Utf8PathBuf, FetchError> {
        let dest = descriptor.local_cache_path();
        let mut attempts = Vec::new();

        for &strategy in &self.policy.retry_chain {
            let Some(candidate) = candidate_for(strategy, descriptor) else {
                debug!("skipping {strategy}: proxy disabled");
                continue;
            };

            if !attempts.is_empty() && !self.policy.backoff.is_zero() {
                std::thread::sleep(self.policy.backoff);
            }

            self.progress(stderr, format!("Downloading via {strategy}: {}", candidate.url));
            match self.attempt(strategy, &candidate.url, dest) {
                Ok(()) => {
                    self.progress(stderr, format!("Saved {dest}"));
                    return Ok(dest.to_owned());
                }
                Err(e) => {
                    warn!("{strategy} retrieval of {} failed: {e}", candidate.url);
                    self.progress(stderr, format!("  {strategy} failed: {e}"));
                    attempts.push(FailedAttempt {
                        strategy,
                        url: candidate.url.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Err(FetchError::Exhausted {
            attempts,
            cache_path: dest.to_owned(),
        })
    }

    fn attempt(
        &self,
        strategy: RetrievalStrategy,
        url: &str,
        dest: &Utf8Path,
    ) -> Result<(), AttemptError> {
        let dir = dest.parent().unwrap_or(Utf8Path::new("."));
        let prefix = format!(".{}.", dest.file_name().unwrap_or("artefact"));
        // Dropping the handle on any early return removes the file.
        let staged = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".part")
            .tempfile_in(dir)?;

        self.downloader.download(strategy, url, staged.path())?;

        let len = std::fs::metadata(staged.path())?.len();
        if len == 0 {
            return Err(AttemptError::EmptyTransfer);
        }
        debug!("{strategy} transferred {len} bytes from {url}");

        match staged.persist_noclobber(dest) {
            Ok(_) => Ok(()),
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                debug!("{dest} appeared during download; keeping the existing file");
                Ok(())
            }
            Err(e) => Err(AttemptError::Io(e.error)),
        }
    }

    fn progress(&self, stderr: &mut dyn Write, message: impl fmt::Display) {
        if !self.quiet {
            write_stderr_line(stderr, message);
        }
    }
}

fn candidate_for(
    strategy: RetrievalStrategy,
    descriptor: &ArtefactDescriptor,
) -> Option<&CandidateUrl> {
    match strategy {
        RetrievalStrategy::ProxiedHttp => descriptor.candidate(Route::Proxied),
        RetrievalStrategy::DirectHttp | RetrievalStrategy::ExternalProcess(_) => {
            descriptor.candidate(Route::Direct)
        }
    }
}

#[cfg(test)]
#[path = "fetcher_tests.rs"]
mod tests;
