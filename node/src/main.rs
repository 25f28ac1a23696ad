// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Custody Vault Node
//!
//! Entry point for the `custody-node` binary. Parses CLI arguments,
//! initializes logging and metrics, restores the vault from disk, and serves
//! the HTTP/WS API.
//!
//! The binary supports two subcommands:
//!
//! - `run`     — start the vault node
//! - `version` — print build version information

mod api;
mod cli;
mod devnet;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;

use custody_contracts::{SharedVault, Vault};
use custody_ledger::config::{DB_DIR_NAME, EVENT_CHANNEL_CAPACITY, VERSION};
use custody_ledger::storage::LedgerDb;
use custody_ledger::{Address, AssetKind};

use cli::{Commands, CustodyNodeCli, VaultVariant};
use devnet::DevnetAsset;
use metrics::VaultMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CustodyNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the vault node: storage, devnet asset ledger, API server and
/// metrics endpoint.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        "custody_node=info,custody_contracts=info,custody_ledger=info,tower_http=debug",
        args.log_format.into(),
    );

    let owner: Address = args
        .owner
        .parse()
        .with_context(|| format!("invalid owner address {:?}", args.owner))?;
    let custodian: Address = args
        .custodian
        .parse()
        .with_context(|| format!("invalid custodian address {:?}", args.custodian))?;
    let asset_kind = match args.variant {
        VaultVariant::Native => AssetKind::Native,
        VaultVariant::Token => AssetKind::Token(
            args.token_address
                .parse()
                .with_context(|| format!("invalid token address {:?}", args.token_address))?,
        ),
    };

    tracing::info!(
        owner = %owner,
        asset = %asset_kind,
        api_port = args.api_port,
        metrics_port = args.metrics_port,
        data_dir = %args.data_dir.display(),
        "starting custody-node"
    );

    // --- Persistent storage ---
    let db_path = args.data_dir.join(DB_DIR_NAME);
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory: {}", db_path.display()))?;
    let store = LedgerDb::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;
    tracing::info!(path = %db_path.display(), "database opened");

    let vault = Vault::open(store, owner.clone(), asset_kind.clone())
        .context("failed to restore vault")?;

    // --- Devnet asset ledger ---
    // Restored claims must be backed by the custodian before anyone can
    // withdraw against them.
    let seed = vault
        .get_contract_balance()
        .checked_add(args.seed_balance)
        .context("seed balance overflows the custodied total")?;
    let asset = match &asset_kind {
        AssetKind::Native => DevnetAsset::native(custodian, seed),
        AssetKind::Token(token_address) => {
            DevnetAsset::token(token_address.clone(), &owner, custodian, seed)
        }
    }
    .context("failed to initialize devnet asset ledger")?;

    // --- Metrics ---
    let vault_metrics = Arc::new(VaultMetrics::new());
    vault_metrics.observe_vault(vault.get_contract_balance(), vault.depositor_count());

    // --- Event broadcast ---
    let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

    // --- Application state ---
    let shared = Arc::new(
        SharedVault::new(vault, asset)
            .with_commit_hook(api::publish_commits(event_tx.clone(), Arc::clone(&vault_metrics))),
    );
    let reconciliation = shared.reconcile().context("initial reconciliation failed")?;
    tracing::info!(
        recorded = %reconciliation.recorded,
        held = %reconciliation.held,
        surplus = %reconciliation.surplus,
        "vault reconciled"
    );

    let app_state = api::AppState {
        version: VERSION.to_string(),
        vault: Arc::clone(&shared),
        event_tx,
        metrics: Arc::clone(&vault_metrics),
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
        .with_state(Arc::clone(&vault_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

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

    let total = shared.read(|v| v.get_contract_balance());
    tracing::info!(total = %total, "custody-node stopped");
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("custody-node {}", env!("CARGO_PKG_VERSION"));
    println!("ledger       {}", VERSION);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
