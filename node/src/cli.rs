//! # CLI Interface
//!
//! Defines the command-line argument structure for `certichain-node` using
//! `clap` derive. Every setting can also come from a `CERTICHAIN_*`
//! environment variable.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

use crate::logging::LogFormat;
use certichain_protocol::config::{
    DEFAULT_API_PORT, DEFAULT_FUNDING_AMOUNT, DEFAULT_LEDGER_URL, DEFAULT_METRICS_PORT,
};

/// CertiChain issuance node.
///
/// Serves the certificate issuance and verification API, drives ledger
/// transactions with the admin key, and exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "certichain-node",
    about = "CertiChain certificate issuance node",
    version,
    propagate_version = true
)]
pub struct CertiChainCli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the node.
    Run(RunArgs),
    /// Create the data directory with a fresh admin key and fingerprint salt.
    Init(InitArgs),
    /// Run one reconciliation sweep against the ledger and exit.
    Reconcile(ReconcileArgs),
    /// Print version information and exit.
    Version,
}

/// Settings shared by every subcommand that talks to the ledger.
#[derive(Args, Debug, Clone)]
pub struct NodeArgs {
    /// Data directory holding the record store, admin key and salt.
    #[arg(long, short = 'd', env = "CERTICHAIN_DATA_DIR", default_value = "./certichain-data")]
    pub data_dir: PathBuf,

    /// Ledger fullnode REST endpoint, or `local` for the in-process ledger.
    #[arg(long, env = "CERTICHAIN_LEDGER_URL", default_value = DEFAULT_LEDGER_URL)]
    pub ledger_url: String,

    /// Hex-encoded Ed25519 admin seed. Read from `<data-dir>/admin.key`
    /// when omitted.
    #[arg(long, env = "CERTICHAIN_ADMIN_KEY", hide_env_values = true)]
    pub admin_key: Option<String>,

    /// Address publishing the `CertManagement` module. Defaults to the
    /// admin account.
    #[arg(long, env = "CERTICHAIN_MODULE_ADDRESS")]
    pub module_address: Option<String>,

    /// Fingerprint salt. Read from `<data-dir>/fingerprint.salt` when omitted.
    #[arg(long, env = "CERTICHAIN_SALT", hide_env_values = true)]
    pub salt: Option<String>,

    /// Amount transferred by the admission gate per request.
    #[arg(long, env = "CERTICHAIN_FUNDING_AMOUNT", default_value_t = DEFAULT_FUNDING_AMOUNT)]
    pub funding_amount: u64,

    /// Upper bound on every finality wait, in seconds.
    #[arg(long, env = "CERTICHAIN_FINALITY_TIMEOUT_SECS", default_value_t = 30)]
    pub finality_timeout_secs: u64,

    /// Pending issuances younger than this are left alone by reconciliation.
    #[arg(long, env = "CERTICHAIN_ORPHAN_GRACE_SECS", default_value_t = 600)]
    pub orphan_grace_secs: u64,

    /// Log output format.
    #[arg(long, env = "CERTICHAIN_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Level for CertiChain crates. `RUST_LOG` overrides it.
    #[arg(long, env = "CERTICHAIN_LOG_LEVEL", default_value_t = Level::INFO)]
    pub log_level: Level,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub node: NodeArgs,

    /// Port for the HTTP API.
    #[arg(long, env = "CERTICHAIN_API_PORT", default_value_t = DEFAULT_API_PORT)]
    pub api_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "CERTICHAIN_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Seconds between background reconciliation sweeps.
    #[arg(long, env = "CERTICHAIN_RECONCILE_INTERVAL_SECS", default_value_t = 60)]
    pub reconcile_interval_secs: u64,
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path to the data directory to initialize.
    #[arg(long, short = 'd', env = "CERTICHAIN_DATA_DIR", default_value = "./certichain-data")]
    pub data_dir: PathBuf,

    /// Overwrite an existing admin key and salt.
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct ReconcileArgs {
    #[command(flatten)]
    pub node: NodeArgs,
}
