//! HTTP transport to the scanning engine.
//!
//! The client is assembled once per run from [`RunConfig`]: explicit proxy or
//! PAC-derived proxy, extra CA roots, certificate-validation policy, and the
//! per-request timeout all live here.

use super::error::EngineError;
use super::{FileScanRequest, ScanEngine};
use crate::config::RunConfig;
use crate::redact;
use crate::verdict::MatchResult;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

const API_KEY_HEADER: &str = "x-api-key";

/// First `PROXY host:port` directive in a PAC script.
static PAC_PROXY_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r#"PROXY\s+([A-Za-z0-9_.\-]+:\d+)"#).expect("hard-coded pattern is valid")
});

/// Production [`ScanEngine`] speaking JSON over HTTP.
#[derive(Debug)]
pub struct HttpEngine {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<SecretString>,
    timeout: Duration,
}

#[derive(Serialize)]
struct FilePayload<'a> {
    file: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct BatchPayload<'a> {
    files: Vec<FilePayload<'a>>,
}

#[derive(Deserialize)]
struct BatchReply {
    results: Vec<MatchResult>,
}

impl HttpEngine {
    /// Build the transport client from the run configuration.
    pub fn from_config(config: &RunConfig) -> Result<Self, EngineError> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("oss-gate/", env!("CARGO_PKG_VERSION")));

        let proxy_url = match (&config.proxy, &config.pac) {
            (Some(url), _) => Some(url.clone()),
            (None, Some(pac_path)) => proxy_from_pac(pac_path)?,
            (None, None) => None,
        };

        if let Some(ref url) = proxy_url {
            debug!(proxy = %redact::redact_url(url), "routing engine traffic through proxy");
            let proxy = reqwest::Proxy::all(url)
                .map_err(|e| EngineError::ClientBuild(format!("invalid proxy URL: {e}")))?;
            builder = builder.proxy(proxy);
        }

        if let Some(ref ca_path) = config.ca_cert {
            let pem = std::fs::read(ca_path).map_err(|source| EngineError::FileRead {
                path: ca_path.display().to_string(),
                source,
            })?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| EngineError::ClientBuild(format!("invalid CA certificate: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }

        if config.ignore_cert_errors {
            // Escape hatch for restricted networks, never a silent default.
            warn!("certificate validation disabled (--ignore-cert-errors)");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|e| EngineError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            timeout: config.timeout,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path)
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<reqwest::Response, EngineError> {
        let mut request = self.client.post(self.endpoint(path)).json(payload);

        if let Some(ref key) = self.api_key {
            request = request.header(API_KEY_HEADER, key.expose_secret());
        }

        let response = request.send().await.map_err(|e| self.map_send_error(e))?;
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(EngineError::Auth(format!("HTTP {}", status.as_u16())));
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EngineError::Http {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }

        Ok(response)
    }

    fn map_send_error(&self, e: reqwest::Error) -> EngineError {
        if e.is_timeout() {
            EngineError::Timeout {
                timeout: self.timeout,
            }
        } else {
            EngineError::Connection(e.to_string())
        }
    }
}

#[async_trait]
impl ScanEngine for HttpEngine {
    fn name(&self) -> &str {
        "http"
    }

    async fn scan_file(&self, request: &FileScanRequest) -> Result<MatchResult, EngineError> {
        let payload = FilePayload {
            file: &request.path,
            content: &request.content,
        };
        let response = self.post("scan/file", &payload).await?;
        response
            .json::<MatchResult>()
            .await
            .map_err(|e| EngineError::MalformedResponse(e.to_string()))
    }

    async fn scan_batch(
        &self,
        requests: &[FileScanRequest],
    ) -> Result<Vec<MatchResult>, EngineError> {
        let payload = BatchPayload {
            files: requests
                .iter()
                .map(|r| FilePayload {
                    file: &r.path,
                    content: &r.content,
                })
                .collect(),
        };
        let response = self.post("scan/batch", &payload).await?;
        let reply: BatchReply = response
            .json()
            .await
            .map_err(|e| EngineError::MalformedResponse(e.to_string()))?;
        Ok(reply.results)
    }
}

/// Extract a proxy URL from a proxy auto-configuration script.
///
/// Takes the first `PROXY host:port` directive; a script that only yields
/// `DIRECT` means no proxy. This covers the static PAC files used on
/// corporate networks without evaluating JavaScript.
fn proxy_from_pac(path: &Path) -> Result<Option<String>, EngineError> {
    let script = std::fs::read_to_string(path).map_err(|source| EngineError::FileRead {
        path: path.display().to_string(),
        source,
    })?;

    Ok(PAC_PROXY_RE
        .captures(&script)
        .map(|caps| format!("http://{}", &caps[1])))
}
