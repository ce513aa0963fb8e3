//! Run configuration.
//!
//! CLI flags and environment defaults are merged into one immutable
//! [`RunConfig`] at startup. All flag validation happens here, before any
//! I/O; later stages can assume the configuration is coherent.

use crate::cli::Cli;
use crate::staging::Stage;
use secrecy::SecretString;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("options --{first} and --{second} cannot be used together")]
    ConflictingOptions {
        first: &'static str,
        second: &'static str,
    },

    #[error("invalid value for --{flag}: {reason}")]
    InvalidValue { flag: &'static str, reason: String },

    #[error("file arguments are only accepted with --stage manual, not {stage}")]
    UnexpectedFiles { stage: &'static str },
}

/// Immutable configuration for one gate run.
///
/// The API key is wrapped in [`SecretString`] so it never leaks through
/// `Debug` formatting; the raw value is only exposed at the point the
/// request header is built.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub api_url: String,
    pub api_key: Option<SecretString>,
    pub proxy: Option<String>,
    pub pac: Option<PathBuf>,
    pub ca_cert: Option<PathBuf>,
    pub ignore_cert_errors: bool,
    pub rest: bool,
    pub output: PathBuf,
    pub debug: bool,
    pub stage: Stage,
    pub timeout: Duration,
    pub max_retries: u32,
    pub concurrency: usize,
}

impl RunConfig {
    /// Validate CLI flags and produce the run configuration.
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        if !cli.files.is_empty() && cli.stage != Stage::Manual {
            // The staged stages derive their file set from git; accepting
            // extra positionals would silently drop them from the scan.
            return Err(ConfigError::UnexpectedFiles {
                stage: cli.stage.as_str(),
            });
        }

        if cli.proxy.is_some() && cli.pac.is_some() {
            return Err(ConfigError::ConflictingOptions {
                first: "proxy",
                second: "pac",
            });
        }

        if !cli.api_url.starts_with("http://") && !cli.api_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                flag: "api-url",
                reason: format!("expected an http(s) URL, got '{}'", cli.api_url),
            });
        }

        if cli.timeout == 0 {
            return Err(ConfigError::InvalidValue {
                flag: "timeout",
                reason: "timeout must be greater than zero".to_string(),
            });
        }

        if cli.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                flag: "concurrency",
                reason: "concurrency must be at least 1".to_string(),
            });
        }

        // An empty key means anonymous scanning; normalize it to None so the
        // dispatcher does not send an empty header.
        let api_key = cli
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .map(|k| SecretString::new(k.to_string()));

        Ok(Self {
            api_url: cli.api_url.trim_end_matches('/').to_string(),
            api_key,
            proxy: cli.proxy.clone(),
            pac: cli.pac.clone(),
            ca_cert: cli.ca_cert.clone(),
            ignore_cert_errors: cli.ignore_cert_errors,
            rest: cli.rest,
            output: cli.output.clone(),
            debug: cli.debug,
            stage: cli.stage,
            timeout: Duration::from_secs(cli.timeout),
            max_retries: cli.max_retries,
            concurrency: cli.concurrency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> Cli {
        let mut full = vec!["oss-gate"];
        full.extend(args);
        Cli::try_parse_from(full).unwrap()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = RunConfig::from_cli(&parse(&[])).unwrap();
        assert_eq!(config.api_url, crate::cli::DEFAULT_API_URL);
        assert!(config.api_key.is_none());
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.concurrency, 8);
        assert!(!config.rest);
    }

    #[test]
    fn test_files_rejected_outside_manual_stage() {
        let cli = parse(&["src/a.py"]);
        let err = RunConfig::from_cli(&cli).unwrap_err();
        assert_eq!(err, ConfigError::UnexpectedFiles { stage: "pre-commit" });

        let cli = parse(&["--stage", "pre-push", "src/a.py"]);
        let err = RunConfig::from_cli(&cli).unwrap_err();
        assert_eq!(err, ConfigError::UnexpectedFiles { stage: "pre-push" });
    }

    #[test]
    fn test_files_accepted_for_manual_stage() {
        let cli = parse(&["--stage", "manual", "src/a.py", "src/b.py"]);
        let config = RunConfig::from_cli(&cli).unwrap();
        assert_eq!(config.stage, Stage::Manual);
    }

    #[test]
    fn test_proxy_and_pac_conflict() {
        let cli = parse(&["--proxy", "http://p:8080", "--pac", "proxy.pac"]);
        let err = RunConfig::from_cli(&cli).unwrap_err();
        assert_eq!(
            err,
            ConfigError::ConflictingOptions {
                first: "proxy",
                second: "pac",
            }
        );
    }

    #[test]
    fn test_invalid_api_url_rejected() {
        let cli = parse(&["--api-url", "ftp://engine"]);
        let err = RunConfig::from_cli(&cli).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { flag: "api-url", .. }
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let cli = parse(&["--timeout", "0"]);
        let err = RunConfig::from_cli(&cli).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { flag: "timeout", .. }
        ));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let cli = parse(&["--concurrency", "0"]);
        let err = RunConfig::from_cli(&cli).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                flag: "concurrency",
                ..
            }
        ));
    }

    #[test]
    fn test_empty_api_key_means_anonymous() {
        let cli = parse(&["--api-key", "   "]);
        let config = RunConfig::from_cli(&cli).unwrap();
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_api_url_trailing_slash_normalized() {
        let cli = parse(&["--api-url", "https://engine.example.com/"]);
        let config = RunConfig::from_cli(&cli).unwrap();
        assert_eq!(config.api_url, "https://engine.example.com");
    }

    #[test]
    fn test_debug_output_never_contains_api_key() {
        let cli = parse(&["--api-key", "super-secret-key-123"]);
        let config = RunConfig::from_cli(&cli).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret-key-123"));
    }
}
