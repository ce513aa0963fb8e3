//! Scan dispatch.
//!
//! The scanning engine is an opaque oracle behind the [`ScanEngine`] trait;
//! [`Dispatcher`] owns everything around it: the empty-input fast path,
//! REST versus batched dispatch, bounded concurrency, and the retry policy.

pub mod error;
pub mod http;
pub mod retry;

pub use error::EngineError;
pub use http::HttpEngine;
pub use retry::RetryPolicy;

use crate::config::RunConfig;
use crate::verdict::MatchResult;
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info};

/// Payload for one file submitted to the engine.
///
/// Ephemeral; exists only for the duration of a dispatch call.
#[derive(Debug, Clone)]
pub struct FileScanRequest {
    /// Repository-relative path, used as the file identity in results.
    pub path: String,
    /// File content as submitted to the engine.
    pub content: String,
}

impl FileScanRequest {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// A code-matching engine reachable over some transport.
///
/// Implementations must return exactly one [`MatchResult`] per input file,
/// in input order, and must never panic; all failures are [`EngineError`]s.
#[async_trait]
pub trait ScanEngine: Send + Sync {
    /// Stable identifier for log output.
    fn name(&self) -> &str;

    /// Scan a single file.
    async fn scan_file(&self, request: &FileScanRequest) -> Result<MatchResult, EngineError>;

    /// Scan a batch of files in one request.
    async fn scan_batch(
        &self,
        requests: &[FileScanRequest],
    ) -> Result<Vec<MatchResult>, EngineError>;
}

/// Drives the engine for one run.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    retry: RetryPolicy,
    concurrency: usize,
    rest: bool,
}

impl Dispatcher {
    pub fn new(retry: RetryPolicy, concurrency: usize, rest: bool) -> Self {
        Self {
            retry,
            concurrency: concurrency.max(1),
            rest,
        }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(
            RetryPolicy::new(config.max_retries),
            config.concurrency,
            config.rest,
        )
    }

    /// Send all requests to the engine and collect one result per input, in
    /// input order.
    ///
    /// An empty request list returns an empty result list without touching
    /// the network. Whether files go out batched or one-by-one must not
    /// change the outcome; both paths validate the engine's reply against
    /// the input sequence.
    pub async fn dispatch<E: ScanEngine>(
        &self,
        engine: &E,
        requests: &[FileScanRequest],
    ) -> Result<Vec<MatchResult>, EngineError> {
        if requests.is_empty() {
            debug!("no eligible files, skipping engine entirely");
            return Ok(Vec::new());
        }

        info!(
            engine = engine.name(),
            files = requests.len(),
            mode = if self.rest { "rest" } else { "batch" },
            "dispatching scan"
        );

        let results = if self.rest {
            self.dispatch_rest(engine, requests).await?
        } else {
            self.retry.run(|| engine.scan_batch(requests)).await?
        };

        validate_results(requests, &results)?;
        Ok(results)
    }

    /// One request per file, concurrently up to the configured limit.
    /// `buffered` keeps completion order aligned with input order.
    async fn dispatch_rest<E: ScanEngine>(
        &self,
        engine: &E,
        requests: &[FileScanRequest],
    ) -> Result<Vec<MatchResult>, EngineError> {
        stream::iter(requests)
            .map(|request| self.retry.run(move || engine.scan_file(request)))
            .buffered(self.concurrency)
            .try_collect()
            .await
    }
}

/// The engine must answer every file it was asked about, in order.
fn validate_results(
    requests: &[FileScanRequest],
    results: &[MatchResult],
) -> Result<(), EngineError> {
    if results.len() != requests.len() {
        return Err(EngineError::MalformedResponse(format!(
            "expected {} results, engine returned {}",
            requests.len(),
            results.len()
        )));
    }

    for (request, result) in requests.iter().zip(results) {
        if request.path != result.file {
            return Err(EngineError::MalformedResponse(format!(
                "result for '{}' where '{}' was expected",
                result.file, request.path
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::{Component, ComponentStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Engine stub returning canned results keyed by file path.
    struct StubEngine {
        undeclared: Vec<String>,
        calls: AtomicUsize,
        fail_with: Option<fn() -> EngineError>,
    }

    impl StubEngine {
        fn new(undeclared: &[&str]) -> Self {
            Self {
                undeclared: undeclared.iter().map(|s| s.to_string()).collect(),
                calls: AtomicUsize::new(0),
                fail_with: None,
            }
        }

        fn failing(fail_with: fn() -> EngineError) -> Self {
            Self {
                undeclared: Vec::new(),
                calls: AtomicUsize::new(0),
                fail_with: Some(fail_with),
            }
        }

        fn result_for(&self, path: &str) -> MatchResult {
            if self.undeclared.iter().any(|u| u == path) {
                MatchResult {
                    file: path.to_string(),
                    components: vec![Component {
                        purl: "pkg:github/acme/libfoo".to_string(),
                        license: Some("GPL-2.0".to_string()),
                        status: ComponentStatus::Undeclared,
                    }],
                    metadata: serde_json::Value::Null,
                }
            } else {
                MatchResult::clean(path)
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ScanEngine for StubEngine {
        fn name(&self) -> &str {
            "stub"
        }

        async fn scan_file(&self, request: &FileScanRequest) -> Result<MatchResult, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(fail) = self.fail_with {
                return Err(fail());
            }
            Ok(self.result_for(&request.path))
        }

        async fn scan_batch(
            &self,
            requests: &[FileScanRequest],
        ) -> Result<Vec<MatchResult>, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(fail) = self.fail_with {
                return Err(fail());
            }
            Ok(requests.iter().map(|r| self.result_for(&r.path)).collect())
        }
    }

    fn requests(paths: &[&str]) -> Vec<FileScanRequest> {
        paths
            .iter()
            .map(|p| FileScanRequest::new(*p, "content"))
            .collect()
    }

    fn dispatcher(rest: bool) -> Dispatcher {
        Dispatcher::new(
            RetryPolicy {
                max_retries: 2,
                initial_delay: std::time::Duration::from_millis(1),
                max_delay: std::time::Duration::from_millis(2),
            },
            4,
            rest,
        )
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_engine_call() {
        let engine = StubEngine::new(&[]);
        let results = dispatcher(false).dispatch(&engine, &[]).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(engine.call_count(), 0);

        let results = dispatcher(true).dispatch(&engine, &[]).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(engine.call_count(), 0);
    }

    #[tokio::test]
    async fn test_batch_and_rest_produce_identical_results() {
        let engine = StubEngine::new(&["b.py"]);
        let reqs = requests(&["a.py", "b.py", "c.py"]);

        let batched = dispatcher(false).dispatch(&engine, &reqs).await.unwrap();
        let per_file = dispatcher(true).dispatch(&engine, &reqs).await.unwrap();

        assert_eq!(batched, per_file);
        assert_eq!(batched.len(), 3);
        assert!(batched[1].has_undeclared());
    }

    #[tokio::test]
    async fn test_rest_preserves_input_order() {
        let engine = StubEngine::new(&[]);
        let paths = ["z.py", "a.py", "m.py", "q.py", "b.py"];
        let results = dispatcher(true)
            .dispatch(&engine, &requests(&paths))
            .await
            .unwrap();
        let got: Vec<&str> = results.iter().map(|r| r.file.as_str()).collect();
        assert_eq!(got, paths);
    }

    #[tokio::test]
    async fn test_batch_is_single_engine_call() {
        let engine = StubEngine::new(&[]);
        dispatcher(false)
            .dispatch(&engine, &requests(&["a.py", "b.py", "c.py"]))
            .await
            .unwrap();
        assert_eq!(engine.call_count(), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_exhausts_retries() {
        let engine = StubEngine::failing(|| EngineError::Timeout {
            timeout: std::time::Duration::from_secs(1),
        });
        let result = dispatcher(false)
            .dispatch(&engine, &requests(&["a.py"]))
            .await;
        assert!(matches!(result, Err(EngineError::Timeout { .. })));
        // Initial attempt plus two retries.
        assert_eq!(engine.call_count(), 3);
    }

    #[tokio::test]
    async fn test_auth_failure_fails_fast() {
        let engine = StubEngine::failing(|| EngineError::Auth("invalid key".to_string()));
        let result = dispatcher(true)
            .dispatch(&engine, &requests(&["a.py"]))
            .await;
        assert!(matches!(result, Err(EngineError::Auth(_))));
        assert_eq!(engine.call_count(), 1);
    }

    #[tokio::test]
    async fn test_short_batch_reply_is_malformed() {
        struct ShortEngine;

        #[async_trait]
        impl ScanEngine for ShortEngine {
            fn name(&self) -> &str {
                "short"
            }

            async fn scan_file(
                &self,
                request: &FileScanRequest,
            ) -> Result<MatchResult, EngineError> {
                Ok(MatchResult::clean(&request.path))
            }

            async fn scan_batch(
                &self,
                _requests: &[FileScanRequest],
            ) -> Result<Vec<MatchResult>, EngineError> {
                Ok(vec![MatchResult::clean("a.py")])
            }
        }

        let result = dispatcher(false)
            .dispatch(&ShortEngine, &requests(&["a.py", "b.py"]))
            .await;
        assert!(matches!(result, Err(EngineError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_mismatched_file_identity_is_malformed() {
        struct WrongFileEngine;

        #[async_trait]
        impl ScanEngine for WrongFileEngine {
            fn name(&self) -> &str {
                "wrong"
            }

            async fn scan_file(
                &self,
                _request: &FileScanRequest,
            ) -> Result<MatchResult, EngineError> {
                Ok(MatchResult::clean("other.py"))
            }

            async fn scan_batch(
                &self,
                requests: &[FileScanRequest],
            ) -> Result<Vec<MatchResult>, EngineError> {
                Ok(requests.iter().map(|_| MatchResult::clean("other.py")).collect())
            }
        }

        let result = dispatcher(false)
            .dispatch(&WrongFileEngine, &requests(&["a.py"]))
            .await;
        assert!(matches!(result, Err(EngineError::MalformedResponse(_))));
    }
}
