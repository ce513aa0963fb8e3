use crate::staging::Stage;
use clap::Parser;
use std::path::PathBuf;

pub const DEFAULT_API_URL: &str = "https://api.osskb.org";
pub const DEFAULT_OUTPUT: &str = ".oss-gate/results.json";

#[derive(Parser, Debug)]
#[command(
    name = "oss-gate",
    version,
    about = "Commit-time gate that blocks undeclared open source code",
    long_about = "oss-gate scans the files about to be committed or pushed against a \
code-matching engine and blocks the operation when undeclared open source code is found."
)]
pub struct Cli {
    /// Files to check (manual stage only, rejected otherwise; defaults to all
    /// tracked files)
    pub files: Vec<PathBuf>,

    /// Hook stage this invocation runs under
    #[arg(short = 's', long, value_enum, default_value_t = Stage::PreCommit)]
    pub stage: Stage,

    /// Scanning engine API URL
    #[arg(long, env = "OSS_GATE_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Scanning engine API key (empty key scans anonymously)
    #[arg(long, env = "OSS_GATE_API_KEY")]
    pub api_key: Option<String>,

    /// Proxy URL for engine connections
    #[arg(long, env = "HTTPS_PROXY")]
    pub proxy: Option<String>,

    /// Proxy auto-configuration script to derive the proxy from
    #[arg(long)]
    pub pac: Option<PathBuf>,

    /// Additional CA certificate PEM file to trust
    #[arg(long, env = "OSS_GATE_CA_CERT")]
    pub ca_cert: Option<PathBuf>,

    /// Skip certificate validation (logged as a warning)
    #[arg(long)]
    pub ignore_cert_errors: bool,

    /// Use one REST request per file instead of a single batched request
    #[arg(long)]
    pub rest: bool,

    /// Output file for the results artifact
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 60)]
    pub timeout: u64,

    /// Maximum retry attempts for transient engine failures
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,

    /// Maximum concurrent requests in REST mode
    #[arg(long, default_value_t = 8)]
    pub concurrency: usize,

    /// Enable debug logging
    #[arg(short, long, env = "OSS_GATE_DEBUG")]
    pub debug: bool,
}
