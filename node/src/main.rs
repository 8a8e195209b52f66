// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Zenwallet Node
//!
//! Entry point for the `zenwallet-node` binary. Parses CLI arguments,
//! initializes logging and metrics, connects to the ledger store and serves
//! the HTTP API.
//!
//! Subcommands:
//!
//! - `run`     — start the service
//! - `keygen`  — generate a signing keypair
//! - `sign`    — compute the signature header for a request body
//! - `version` — print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;

use zenwallet_protocol::auth::{Authenticator, KeySource};
use zenwallet_protocol::config::{AuthMode, Timeouts};
use zenwallet_protocol::crypto::{sign_payload, Ed25519Engine, WalletKeypair};
use zenwallet_protocol::identity::{HttpDidResolver, ZenflowsDirectory};
use zenwallet_protocol::service::LedgerService;
use zenwallet_protocol::storage::{ConnectPolicy, LedgerStore, SledConnector};

use cli::{Commands, WalletCli};
use metrics::WalletMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = WalletCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Keygen => {
            keygen();
            Ok(())
        }
        Commands::Sign(args) => sign(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the service: ledger connection, API server, metrics endpoint.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        "zenwallet_node=info,zenwallet_protocol=info,tower_http=debug",
        args.log_format,
    );

    let mode = args.auth_mode()?;
    let timeouts = args.timeouts();

    tracing::info!(
        api = %args.api_addr(),
        metrics = %args.metrics_addr(),
        db_path = %args.db_path.display(),
        auth_mode = mode.name(),
        "starting zenwallet-node"
    );

    // --- Ledger store ---
    let connector = SledConnector::new(&args.db_path);
    let policy = ConnectPolicy {
        attempt_timeout: timeouts.store,
        ..ConnectPolicy::default()
    };
    let store = LedgerStore::connect(&connector, &policy)
        .await
        .context("ledger store unavailable")?
        .with_timeout(timeouts.store);

    // --- Authentication ---
    let auth = Authenticator::new(key_source(&mode, &timeouts)?, Arc::new(Ed25519Engine))
        .with_engine_timeout(timeouts.engine);

    // --- Application state ---
    let wallet_metrics = Arc::new(WalletMetrics::new());
    let app_state = api::AppState {
        service: LedgerService::new(Arc::new(store), auth),
        metrics: Arc::clone(&wallet_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = args.api_addr();
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&wallet_metrics));
    let metrics_addr = args.metrics_addr();
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

    tracing::info!("zenwallet-node stopped");
    Ok(())
}

fn key_source(mode: &AuthMode, timeouts: &Timeouts) -> Result<KeySource> {
    let source = match mode {
        AuthMode::Directory { url } => KeySource::Directory(Arc::new(
            ZenflowsDirectory::new(url.clone(), timeouts.http)
                .context("failed to build directory client")?,
        )),
        AuthMode::Did { base_url, context } => KeySource::Did(Arc::new(
            HttpDidResolver::new(base_url.clone(), context.clone(), timeouts.http)
                .context("failed to build DID resolver client")?,
        )),
    };
    Ok(source)
}

/// Prints a fresh keypair. The secret goes to stdout; keep it out of logs.
fn keygen() {
    let keypair = WalletKeypair::generate();
    println!("secret key : {}", keypair.secret_key_base58());
    println!("public key : {}", keypair.public_key());
}

/// Prints the signature header value for `args.body`.
fn sign(args: cli::SignArgs) -> Result<()> {
    let keypair = WalletKeypair::from_base58(&args.key).context("invalid --key")?;
    let signature = sign_payload(&keypair, args.body.as_bytes());
    println!("{}", signature.to_base64());
    Ok(())
}

fn print_version() {
    println!("zenwallet-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol       {}", zenwallet_protocol::config::PROTOCOL_VERSION);
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
