use std::time::Duration;
use thiserror::Error;

/// Errors from the scanning-engine transport.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Request exceeded the configured timeout.
    #[error("scan request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// Could not reach the engine at all.
    #[error("connection to scanning engine failed: {0}")]
    Connection(String),

    /// Engine rejected the request with an HTTP error status.
    #[error("scanning engine returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Engine rejected the configured credentials.
    #[error("scanning engine rejected authentication: {0}")]
    Auth(String),

    /// Engine response could not be interpreted.
    #[error("malformed engine response: {0}")]
    MalformedResponse(String),

    /// Transport client could not be constructed from the configuration.
    #[error("failed to build transport client: {0}")]
    ClientBuild(String),

    /// Reading local input for a request failed.
    #[error("failed to read {path}: {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl EngineError {
    /// Whether a retry may succeed.
    ///
    /// Timeouts, connection failures, and server-side errors (5xx, 408, 429)
    /// are transient. Authentication failures and malformed responses are
    /// terminal and never retried.
    pub fn is_transient(&self) -> bool {
        match self {
            EngineError::Timeout { .. } | EngineError::Connection(_) => true,
            EngineError::Http { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            _ => false,
        }
    }
}
