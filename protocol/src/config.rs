//! # Service Configuration & Constants
//!
//! Every tunable number in the wallet lives here. The node binary maps
//! CLI flags and environment variables onto [`AuthMode`] and [`Timeouts`];
//! library code reads the constants directly when no override is involved.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Version
// ---------------------------------------------------------------------------

/// Wire/API version reported by `zenwallet-node version`.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Store Connection
// ---------------------------------------------------------------------------

/// Number of attempts made to open the ledger store at startup before the
/// node gives up and exits.
pub const MAX_CONNECT_ATTEMPTS: usize = 10;

/// Fixed pause between two connection attempts.
pub const CONNECT_BACKOFF: Duration = Duration::from_secs(3);

/// Upper bound on a single store round trip (insert, page fetch, open).
pub const STORE_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Number of records fetched per page when walking an `(owner, token)`
/// slice for balance or history queries.
pub const PAGE_SIZE: usize = 100;

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

/// Upper bound on outbound HTTP calls (directory lookup, DID resolution).
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on a single run of the verification engine.
pub const ENGINE_TIMEOUT: Duration = Duration::from_secs(5);

/// The value the verification procedure prints in its first output slot
/// when the signature checks out.
pub const AUTHENTIC_SENTINEL: &str = "1";

/// GraphQL query sent to the identity directory to fetch a person's EdDSA
/// public key.
pub const GQL_PERSON_PUBKEY: &str = "query($id: ID!) {personPubkey(id: $id)}";

/// Path appended to the directory base URL.
pub const DIRECTORY_API_PATH: &str = "/api";

// ---------------------------------------------------------------------------
// HTTP Headers
// ---------------------------------------------------------------------------

/// Header carrying the base64 detached signature of the request body.
pub const HEADER_SIGNATURE: &str = "zenflows-sign";

/// Header carrying the directory identity of the signer (directory mode).
pub const HEADER_IDENTITY: &str = "zenflows-id";

/// Header carrying the signer's base58 public key (DID mode).
pub const HEADER_PUBLIC_KEY: &str = "did-pk";

// ---------------------------------------------------------------------------
// Network Defaults
// ---------------------------------------------------------------------------

/// Default HTTP API port.
pub const DEFAULT_API_PORT: u16 = 8000;

/// Default Prometheus metrics port.
pub const DEFAULT_METRICS_PORT: u16 = 9742;

// ---------------------------------------------------------------------------
// Runtime Configuration
// ---------------------------------------------------------------------------

/// How the signer's public key is obtained for a mutation request.
///
/// Exactly one mode is active per deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// Resolve the key from the identity directory using the
    /// `zenflows-id` header.
    Directory {
        /// Full GraphQL endpoint, e.g. `https://zenflows.example/api`.
        url: String,
    },
    /// Take the key from the `did-pk` header and require the DID resolver
    /// to know it at `<base_url><context>:<public_key>`.
    Did { base_url: String, context: String },
}

impl AuthMode {
    /// Builds the directory mode from the directory base URL, appending
    /// the GraphQL API path.
    pub fn directory(base_url: &str) -> Self {
        AuthMode::Directory {
            url: format!(
                "{}{}",
                base_url.trim_end_matches('/'),
                DIRECTORY_API_PATH
            ),
        }
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            AuthMode::Directory { .. } => "directory",
            AuthMode::Did { .. } => "did",
        }
    }
}

/// Timeouts applied to every external call made while serving requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub store: Duration,
    pub http: Duration,
    pub engine: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            store: STORE_TIMEOUT,
            http: HTTP_TIMEOUT,
            engine: ENGINE_TIMEOUT,
        }
    }
}
