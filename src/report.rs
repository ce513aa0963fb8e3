//! Results artifact and terminal reporting.
//!
//! The artifact is a stable JSON file for downstream tooling; the terminal
//! summary is for the developer whose commit just got blocked. Exit-code
//! mapping lives here so the whole decision contract is in one place.

use crate::config::RunConfig;
use crate::error::{GateError, Result};
use crate::redact;
use crate::verdict::{MatchResult, Verdict, VerdictStatus};
use chrono::Utc;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::process::ExitCode;
use tracing::{debug, info};

/// Exit code for a clean run.
pub const EXIT_CLEAN: u8 = 0;
/// Exit code when undeclared code was found; the hook framework blocks.
pub const EXIT_FLAGGED: u8 = 1;
/// Exit code for configuration/transport/tooling failures.
pub const EXIT_ERROR: u8 = 2;

/// The results artifact written after every completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Tool version that produced the artifact.
    pub version: String,
    /// RFC 3339 timestamp of the run.
    pub generated_at: String,
    /// Stage the run was invoked under.
    pub stage: String,
    pub verdict: Verdict,
    /// Full per-file engine results, including declared components.
    pub results: Vec<MatchResult>,
}

impl Report {
    pub fn new(config: &RunConfig, verdict: Verdict, results: Vec<MatchResult>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: Utc::now().to_rfc3339(),
            stage: config.stage.to_string(),
            verdict,
            results,
        }
    }

    /// Write the artifact, overwriting any previous run's file.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| GateError::ReportWrite {
                    path: path.display().to_string(),
                    source,
                })?;
            }
        }

        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| GateError::ReportWrite {
            path: path.display().to_string(),
            source,
        })?;

        debug!(path = %path.display(), "results artifact written");
        Ok(())
    }
}

/// Map the verdict to the process exit code the hook framework acts on.
pub fn exit_code_for(verdict: &Verdict) -> ExitCode {
    match verdict.status {
        VerdictStatus::Clean => ExitCode::from(EXIT_CLEAN),
        VerdictStatus::Flagged => ExitCode::from(EXIT_FLAGGED),
    }
}

/// Render the human-facing summary for the end of a run.
pub fn render_summary(verdict: &Verdict, output: &Path) -> String {
    let mut out = String::new();

    if !verdict.is_flagged() {
        out.push_str(&format!(
            "{} No undeclared open source code found. Safe to proceed.\n",
            "OK".green().bold()
        ));
        return out;
    }

    out.push_str(&format!(
        "{} {} file(s) contain potential undeclared open source code:\n\n",
        "BLOCKED".red().bold(),
        verdict.offending.len()
    ));

    for offending in &verdict.offending {
        out.push_str(&format!("  {}\n", offending.file.yellow()));
        for component in &offending.undeclared {
            let license = component.license.as_deref().unwrap_or("unknown license");
            out.push_str(&format!("    {} ({})\n", component.purl, license));
        }
    }

    out.push_str(&format!(
        "\nDeclare these components or remove the matched code.\nFull results: {}\n",
        output.display()
    ));
    out
}

/// Log the effective transport settings with secrets redacted.
pub fn log_transport_settings(config: &RunConfig) {
    info!(
        api_url = %config.api_url,
        proxy = ?config.proxy.as_deref().map(redact::redact_url),
        pac = ?config.pac,
        api_key = ?config.api_key.as_ref().map(|_| redact::MASK),
        rest = config.rest,
        stage = %config.stage,
        "transport configuration"
    );
}
