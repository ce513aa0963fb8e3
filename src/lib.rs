pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod redact;
pub mod report;
pub mod run;
pub mod staging;
pub mod verdict;

pub use cli::Cli;
pub use config::{ConfigError, RunConfig};
pub use engine::{Dispatcher, EngineError, FileScanRequest, HttpEngine, RetryPolicy, ScanEngine};
pub use error::{GateError, Result};
pub use report::{Report, EXIT_CLEAN, EXIT_ERROR, EXIT_FLAGGED};
pub use run::{execute, run_gate};
pub use staging::{GitContext, Stage, StagedFile, StagingContext, StagingError, StagingState};
pub use verdict::{Component, ComponentStatus, MatchResult, OffendingFile, Verdict, VerdictStatus};
