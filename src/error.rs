use crate::config::ConfigError;
use crate::engine::EngineError;
use crate::staging::StagingError;
use thiserror::Error;

/// Top-level error for a gate run.
///
/// Every variant is a tooling failure and maps to exit code 2, distinct from
/// a flagged verdict (exit code 1). A run that ends in `GateError` produced
/// no verdict, so it must never look like a clean pass.
#[derive(Debug, Error)]
pub enum GateError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("failed to read {path}: {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write results to {path}: {source}")]
    ReportWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GateError>;
