//! # Storage Module
//!
//! The append-only ledger and everything needed to reach it.
//!
//! ## Architecture
//!
//! ```text
//! mod.rs    — backend seam: LedgerBackend, Connector, StoreError
//! db.rs     — sled persistence (records + owner/token index)
//! ledger.rs — LedgerStore: startup retry, append, balance, history
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! append ──► LedgerStore ──► LedgerBackend::insert ──► sled (txs, owner_token)
//! balance/history ──► LedgerStore page loop ──► LedgerBackend::select
//! ```
//!
//! The store is the only synchronization point of the service. Records are
//! never updated or deleted, so concurrent requests need no in-process
//! locking; the backend handle is shared through an `Arc`.

pub mod db;
pub mod ledger;

pub use db::{LedgerDb, SledConnector};
pub use ledger::{ConnectPolicy, ConnectionError, LedgerError, LedgerStore};

use async_trait::async_trait;
use std::time::Duration;

use crate::transaction::{Transaction, TransactionId};

/// Errors reported by a ledger backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupt ledger: {0}")]
    Corrupt(String),

    #[error("store task failed: {0}")]
    Task(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("balance does not fit in a signed 64-bit integer")]
    Overflow,
}

/// A record space with an equality index on `(owner, token)`.
///
/// `select` returns the slice of records matching `(owner, token)` starting
/// at `offset`, at most `limit` of them. The order of records inside the
/// slice is backend-defined and stable across calls; callers that need
/// timestamp order must sort.
#[async_trait]
pub trait LedgerBackend: Send + Sync + 'static {
    /// Write one record and return only once it is durable.
    async fn insert(
        &self,
        owner: &str,
        token: &str,
        timestamp: u64,
        amount: i64,
    ) -> Result<TransactionId, StoreError>;

    async fn select(
        &self,
        owner: &str,
        token: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Transaction>, StoreError>;

    /// Timestamp of the most recently appended record, `0` when empty.
    /// Seeds the append clock on connect so timestamps keep increasing
    /// across restarts.
    async fn latest_timestamp(&self) -> Result<u64, StoreError> {
        Ok(0)
    }
}

/// Opens a backend. Called repeatedly by [`LedgerStore::connect`] until it
/// succeeds or the retry budget runs out.
#[async_trait]
pub trait Connector: Send + Sync {
    type Backend: LedgerBackend;

    async fn connect(&self) -> Result<Self::Backend, StoreError>;

    /// Human-readable location of the store, for logs.
    fn endpoint(&self) -> String;
}
