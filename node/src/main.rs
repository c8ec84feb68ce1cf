// Copyright (c) 2026 CertiChain Contributors. MIT License.
// See LICENSE for details.

//! # CertiChain Issuance Node
//!
//! Entry point for the `certichain-node` binary. Parses CLI arguments,
//! initializes logging and metrics, connects to the ledger, and serves the
//! HTTP API.
//!
//! Subcommands:
//!
//! - `run`       start the node
//! - `init`      create the data directory, admin key and fingerprint salt
//! - `reconcile` run one reconciliation sweep and exit
//! - `version`   print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use rand::RngCore;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

use certichain_contracts::LocalLedger;
use certichain_protocol::config::{LedgerEndpoint, ProtocolConfig};
use certichain_protocol::crypto::LedgerKeypair;
use certichain_protocol::issuance::IssuanceService;
use certichain_protocol::ledger::{LedgerClient, LedgerSigner, RestLedgerClient};
use certichain_protocol::store::RecordStore;

use cli::{CertiChainCli, Commands};
use logging::LogFormat;
use metrics::NodeMetrics;

const ADMIN_KEY_FILE: &str = "admin.key";
const SALT_FILE: &str = "fingerprint.salt";
/// Random bytes behind a freshly generated salt, hex-encoded on disk.
const GENERATED_SALT_BYTES: usize = 32;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CertiChainCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Init(args) => init_node(args),
        Commands::Reconcile(args) => reconcile_once(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Reads a secret from the CLI value or, failing that, from a file in the
/// data directory.
fn read_secret(explicit: Option<&str>, data_dir: &Path, file: &str) -> Result<String> {
    if let Some(value) = explicit {
        return Ok(value.trim().to_string());
    }
    let path = data_dir.join(file);
    let raw = std::fs::read_to_string(&path).with_context(|| {
        format!(
            "failed to read {} (run `certichain-node init` or pass it explicitly)",
            path.display()
        )
    })?;
    Ok(raw.trim().to_string())
}

/// Validates node settings and assembles the issuance service on top of the
/// configured ledger.
fn build_service(args: &cli::NodeArgs) -> Result<IssuanceService> {
    let admin_key = read_secret(args.admin_key.as_deref(), &args.data_dir, ADMIN_KEY_FILE)?;
    let salt = read_secret(args.salt.as_deref(), &args.data_dir, SALT_FILE)?;

    let config = ProtocolConfig::new(
        &admin_key,
        args.module_address.as_deref(),
        &args.ledger_url,
        salt.as_bytes(),
        args.funding_amount,
        Duration::from_secs(args.finality_timeout_secs),
    )
    .context("invalid node configuration")?;
    tracing::info!(?config, "configuration loaded");

    let signer = Arc::new(LedgerSigner::new(
        config.admin_keypair().context("invalid admin key")?,
    ));
    let ledger: Arc<dyn LedgerClient> = match &config.ledger_endpoint {
        LedgerEndpoint::Local => {
            tracing::warn!("using the in-process ledger; state is lost on exit");
            Arc::new(LocalLedger::devnet(config.module_address))
        }
        LedgerEndpoint::Rest(url) => Arc::new(
            RestLedgerClient::new(url.clone()).context("failed to build ledger client")?,
        ),
    };

    let db_path = args.data_dir.join("db");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory: {}", db_path.display()))?;
    let store = RecordStore::open(&db_path)
        .with_context(|| format!("failed to open record store at {}", db_path.display()))?;
    tracing::info!(
        path = %db_path.display(),
        issuers = store.issuer_count(),
        pending = store.pending_count(),
        "record store opened"
    );

    Ok(IssuanceService::new(&config, ledger, signer, store))
}

/// Starts the node: API server, metrics endpoint, and background
/// reconciliation.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(args.node.log_format, args.node.log_level)?;

    tracing::info!(
        api_port = args.api_port,
        metrics_port = args.metrics_port,
        ledger = %args.node.ledger_url,
        data_dir = %args.node.data_dir.display(),
        "starting certichain-node"
    );

    let service = Arc::new(build_service(&args.node)?);
    let node_metrics = Arc::new(NodeMetrics::new().context("failed to register metrics")?);

    let app_state = api::AppState {
        version: env!("CARGO_PKG_VERSION").to_string(),
        service: Arc::clone(&service),
        metrics: Arc::clone(&node_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.api_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Reconciliation ---
    let reconciler = service.reconciler(Duration::from_secs(args.node.orphan_grace_secs));
    let metrics_ref = Arc::clone(&node_metrics);
    let sweep_every = Duration::from_secs(args.reconcile_interval_secs.max(1));
    let reconcile_loop = tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_every);
        loop {
            interval.tick().await;
            match reconciler.sweep().await {
                Ok(report) => {
                    metrics_ref.reconciled_total.inc_by(report.confirmed as u64);
                    metrics_ref.orphaned_issuances.set(report.orphaned as i64);
                    tracing::debug!(?report, "reconciliation sweep finished");
                }
                Err(e) => tracing::warn!(error = %e, "reconciliation sweep failed"),
            }
        }
    });

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    reconcile_loop.abort();
    if let Err(e) = service.pending().flush() {
        tracing::error!(error = %e, "failed to flush record store");
    }
    tracing::info!("certichain-node stopped");
    Ok(())
}

/// Writes a secret file readable only by the owner.
fn write_secret(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents)
        .with_context(|| format!("failed to write {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

/// Initializes a data directory with a fresh admin key and fingerprint salt.
fn init_node(args: cli::InitArgs) -> Result<()> {
    logging::init_logging(LogFormat::Pretty, tracing::Level::INFO)?;

    let data_dir = &args.data_dir;
    tracing::info!(data_dir = %data_dir.display(), "initializing node");

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let key_path = data_dir.join(ADMIN_KEY_FILE);
    let salt_path = data_dir.join(SALT_FILE);
    if !args.force {
        for path in [&key_path, &salt_path] {
            if path.exists() {
                anyhow::bail!(
                    "{} already exists; pass --force to overwrite",
                    path.display()
                );
            }
        }
    }

    let keypair = LedgerKeypair::generate();
    write_secret(&key_path, &hex::encode(keypair.secret_key_bytes()))?;

    let mut salt = [0u8; GENERATED_SALT_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    write_secret(&salt_path, &hex::encode(salt))?;

    let address = keypair.address();
    tracing::info!(%address, key_path = %key_path.display(), "admin keypair generated");

    println!("Node initialized successfully.");
    println!("  Data directory : {}", data_dir.display());
    println!("  Admin key      : {}", key_path.display());
    println!("  Salt           : {}", salt_path.display());
    println!("  Admin address  : {}", address);
    println!("  Public key     : {}", keypair.public_key().to_hex());

    Ok(())
}

/// Runs a single reconciliation sweep and prints the report as JSON.
async fn reconcile_once(args: cli::ReconcileArgs) -> Result<()> {
    logging::init_logging(args.node.log_format, args.node.log_level)?;

    let service = build_service(&args.node)?;
    let report = service
        .reconciler(Duration::from_secs(args.node.orphan_grace_secs))
        .sweep()
        .await
        .context("reconciliation sweep failed")?;
    service
        .pending()
        .flush()
        .context("failed to flush record store")?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("certichain-node {}", env!("CARGO_PKG_VERSION"));
    println!("rustc           {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported. If a handler cannot be
/// installed the corresponding branch never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
