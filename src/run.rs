//! Gate pipeline.
//!
//! One invocation is a single sequential pipeline: configuration → staged
//! file selection → dispatch → verdict → report. Each stage consumes the
//! previous stage's output; nothing reaches back upstream.

use crate::cli::Cli;
use crate::config::RunConfig;
use crate::engine::{Dispatcher, FileScanRequest, HttpEngine, ScanEngine};
use crate::error::{GateError, Result};
use crate::report::{self, Report, EXIT_ERROR};
use crate::staging::{GitContext, StagingContext};
use crate::verdict::Verdict;
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};

/// Run the gate for one hook invocation.
pub fn run_gate(cli: &Cli) -> ExitCode {
    let config = match RunConfig::from_cli(cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "Error:".red(), e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    report::log_transport_settings(&config);

    let context = match GitContext::discover(Path::new(".")) {
        Ok(context) => context,
        Err(e) => {
            eprintln!("{} {}", "Error:".red(), e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let engine = match HttpEngine::from_config(&config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("{} {}", "Error:".red(), e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{} Failed to create async runtime: {}", "Error:".red(), e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    match runtime.block_on(execute(&config, &context, &engine, &cli.files)) {
        Ok(verdict) => {
            print!("{}", report::render_summary(&verdict, &config.output));
            report::exit_code_for(&verdict)
        }
        Err(e) => {
            eprintln!("{} {}", "Error:".red(), e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// The pipeline proper, independent of process concerns.
///
/// The results artifact is written only when a verdict was reached; an
/// engine failure leaves any previous artifact untouched rather than
/// overwriting it with a false clean state.
pub async fn execute<C, E>(
    config: &RunConfig,
    context: &C,
    engine: &E,
    explicit_files: &[PathBuf],
) -> Result<Verdict>
where
    C: StagingContext,
    E: ScanEngine,
{
    let files = context.files_for_stage(config.stage, explicit_files)?;

    if files.is_empty() {
        info!(stage = %config.stage, "no files to scan, skipping engine");
    } else {
        debug!(
            stage = %config.stage,
            files = files.len(),
            "selected files for scanning"
        );
    }

    let mut requests = Vec::with_capacity(files.len());
    for file in &files {
        let content = file
            .read_content(context.root())
            .map_err(|source| GateError::FileRead {
                path: file.path.display().to_string(),
                source,
            })?;
        requests.push(FileScanRequest::new(
            file.path.display().to_string(),
            String::from_utf8_lossy(&content).into_owned(),
        ));
    }

    let dispatcher = Dispatcher::from_config(config);
    let results = dispatcher.dispatch(engine, &requests).await?;

    let verdict = Verdict::evaluate(&results);
    Report::new(config, verdict.clone(), results).write(&config.output)?;

    info!(
        stage = %config.stage,
        flagged = verdict.is_flagged(),
        offending = verdict.offending.len(),
        "run complete"
    );

    Ok(verdict)
}
