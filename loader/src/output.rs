//! Output formatting for the loader CLI.
//!
//! Progress lines go to stderr through [`write_stderr_line`]; dry-run plans
//! render either as text or as JSON.

use crate::artefact::download::RetrievalStrategy;
use crate::artefact::locator::Route;
use crate::pipeline::{ArtefactSource, Plan, RunOutcome};
use camino::Utf8PathBuf;
use serde::Serialize;
use std::io::Write;

/// Write one line to `stderr`, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

/// Serializable description of what a run would do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanReport {
    /// Module to load.
    pub module: String,
    /// Entry name to resolve.
    pub entry: String,
    /// Operating system family.
    pub os: String,
    /// CPU architecture.
    pub arch: String,
    /// Runtime version tag.
    pub runtime_version: String,
    /// Artefact filename.
    pub filename: String,
    /// Candidate URLs in precedence order.
    pub candidates: Vec<CandidateReport>,
    /// Retrieval strategies in order.
    pub retry_chain: Vec<RetrievalStrategy>,
    /// Where a downloaded artefact is stored.
    pub cache_path: Utf8PathBuf,
    /// Existing cached artefact, if any.
    pub cached: Option<Utf8PathBuf>,
}

/// One candidate URL in a [`PlanReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateReport {
    /// `proxied` or `direct`.
    pub route: &'static str,
    /// The URL.
    pub url: String,
}

impl PlanReport {
    /// Summarise `plan` for display.
    #[must_use]
    pub fn new(plan: &Plan, retry_chain: &[RetrievalStrategy], entry: &str) -> Self {
        let key = &plan.platform;
        Self {
            module: plan.descriptor.module_name().to_string(),
            entry: entry.to_owned(),
            os: key.os_family().to_string(),
            arch: key.cpu_arch().to_owned(),
            runtime_version: key.runtime_version().to_string(),
            filename: plan.descriptor.filename().to_string(),
            candidates: plan
                .descriptor
                .candidates()
                .iter()
                .map(|c| CandidateReport {
                    route: match c.route {
                        Route::Proxied => "proxied",
                        Route::Direct => "direct",
                    },
                    url: c.url.clone(),
                })
                .collect(),
            retry_chain: retry_chain.to_vec(),
            cache_path: plan.descriptor.local_cache_path().to_owned(),
            cached: plan.cached.clone(),
        }
    }

    /// Format the plan for display.
    #[must_use]
    pub fn display_text(&self) -> String {
        let mut lines = vec![
            "Dry run - nothing will be downloaded, loaded, or invoked".to_owned(),
            String::new(),
            format!("Module: {}", self.module),
            format!("Entry: {}", self.entry),
            format!(
                "Platform: {}, {}, runtime {}",
                self.os, self.arch, self.runtime_version
            ),
            format!("Artefact: {}", self.filename),
            format!("Cache path: {}", self.cache_path),
        ];
        match &self.cached {
            Some(path) => lines.push(format!("Cache status: hit ({path})")),
            None => lines.push("Cache status: miss".to_owned()),
        }

        lines.push(String::new());
        lines.push("Candidate URLs:".to_owned());
        for candidate in &self.candidates {
            lines.push(format!("  - [{}] {}", candidate.route, candidate.url));
        }

        let chain: Vec<&str> = self.retry_chain.iter().map(|s| s.as_str()).collect();
        lines.push(format!("Retry chain: {}", chain.join(", ")));
        lines.join("\n")
    }

    /// Render the plan as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Format the closing progress line of a successful run.
#[must_use]
pub fn success_message(outcome: &RunOutcome) -> String {
    let source = match outcome.source {
        ArtefactSource::Cache => "cached",
        ArtefactSource::Download => "downloaded",
    };
    format!(
        "Ran {} ({}) from {source} artefact {}",
        outcome.entry.symbol_name, outcome.entry.strategy, outcome.artefact
    )
}
