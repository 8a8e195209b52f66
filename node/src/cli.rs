//! # CLI Interface
//!
//! Command-line arguments for `zenwallet-node` using `clap` derive. Every
//! `run` option can also be set from the environment, which is how the
//! service is normally configured in a container.

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use zenwallet_protocol::config::{
    AuthMode, Timeouts, DEFAULT_API_PORT, DEFAULT_METRICS_PORT, ENGINE_TIMEOUT,
};

use crate::logging::LogFormat;

/// Zenwallet token ledger node.
///
/// Serves the signed credit, balance and history endpoints on top of a
/// local sled ledger, and exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "zenwallet-node",
    about = "Signed token ledger service",
    version,
    propagate_version = true
)]
pub struct WalletCli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP service.
    Run(RunArgs),
    /// Generate a fresh signing keypair and print it.
    Keygen,
    /// Print the `zenflows-sign` header value for a request body.
    Sign(SignArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Address to bind the API listener on.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port for the ledger API.
    #[arg(long, env = "PORT", default_value_t = DEFAULT_API_PORT)]
    pub port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Directory holding the sled ledger database. Created if missing.
    #[arg(long, env = "WALLET_DB_PATH", default_value = "./wallet-db")]
    pub db_path: PathBuf,

    /// Base URL of the identity directory. Selects directory authentication.
    #[arg(long, env = "ZENFLOWS_URL")]
    pub zenflows_url: Option<String>,

    /// Base URL of the DID resolver. Selects DID authentication.
    #[arg(long, env = "DID_URL")]
    pub did_url: Option<String>,

    /// DID method context prepended to the public key, e.g.
    /// `did:dyne:sandbox.signroom`.
    #[arg(long, env = "DID_CONTEXT")]
    pub did_context: Option<String>,

    /// Bound on every ledger store call, in milliseconds.
    #[arg(long, env = "STORE_TIMEOUT_MS", default_value_t = 5_000)]
    pub store_timeout_ms: u64,

    /// Bound on every identity service call, in milliseconds.
    #[arg(long, env = "HTTP_TIMEOUT_MS", default_value_t = 10_000)]
    pub http_timeout_ms: u64,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

impl RunArgs {
    /// The authentication mode implied by the configured URLs. Exactly one
    /// of `ZENFLOWS_URL` and `DID_URL` must be set.
    pub fn auth_mode(&self) -> Result<AuthMode> {
        let zenflows = non_empty(&self.zenflows_url);
        let did = non_empty(&self.did_url);

        match (zenflows, did) {
            (Some(url), None) => Ok(AuthMode::directory(url)),
            (None, Some(base_url)) => {
                let Some(context) = non_empty(&self.did_context) else {
                    bail!("DID_URL is set but DID_CONTEXT is missing");
                };
                Ok(AuthMode::Did {
                    base_url: base_url.to_string(),
                    context: context.to_string(),
                })
            }
            (Some(_), Some(_)) => {
                bail!("both ZENFLOWS_URL and DID_URL are set; configure exactly one auth mode")
            }
            (None, None) => {
                bail!("no auth mode configured; set ZENFLOWS_URL or DID_URL")
            }
        }
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            store: Duration::from_millis(self.store_timeout_ms),
            http: Duration::from_millis(self.http_timeout_ms),
            engine: ENGINE_TIMEOUT,
        }
    }

    pub fn api_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn metrics_addr(&self) -> String {
        format!("{}:{}", self.host, self.metrics_port)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Arguments for the `sign` subcommand.
#[derive(Args, Debug)]
pub struct SignArgs {
    /// Base58 Ed25519 secret key.
    #[arg(long)]
    pub key: String,

    /// Request body to sign, exactly as it will be sent.
    #[arg(long)]
    pub body: String,
}
