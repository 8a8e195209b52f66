//! # LedgerDb — sled Persistence
//!
//! The ledger's on-disk record space, built on sled's embedded key-value
//! store.
//!
//! ## Tree Layout
//!
//! | Tree          | Key                                            | Value                  |
//! |---------------|------------------------------------------------|------------------------|
//! | `txs`         | `id` (8B BE)                                   | `bincode(Transaction)` |
//! | `owner_token` | `len(owner) ‖ owner ‖ len(token) ‖ token ‖ id` | empty                  |
//!
//! Lengths are 4-byte big-endian so that no `(owner, token)` prefix can be
//! a prefix of another pair's keys. The trailing big-endian id keeps index
//! entries in insertion order, which is the backend's natural order.
//!
//! ## Atomicity
//!
//! A record and its index entry are written in one sled transaction, and
//! the database is flushed before `insert` returns.

use async_trait::async_trait;
use sled::transaction::{TransactionError, TransactionResult};
use sled::{Db, Transactional, Tree};
use std::path::{Path, PathBuf};

use super::{Connector, LedgerBackend, StoreError};
use crate::transaction::{Transaction, TransactionId};

const ID_LEN: usize = 8;

/// sled-backed ledger record space.
///
/// Cheap to clone: sled handles are reference counted and safe for
/// concurrent use without external locking.
#[derive(Debug, Clone)]
pub struct LedgerDb {
    db: Db,
    /// Records keyed by id.
    txs: Tree,
    /// Equality index on `(owner, token)`.
    owner_token: Tree,
}

impl LedgerDb {
    /// Open or create a database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// In-memory database removed on drop. For tests.
    pub fn open_temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<Self, StoreError> {
        let txs = db.open_tree("txs")?;
        let owner_token = db.open_tree("owner_token")?;
        Ok(Self {
            db,
            txs,
            owner_token,
        })
    }

    /// Number of records across all owners and tokens.
    pub fn record_count(&self) -> usize {
        self.txs.len()
    }

    /// Blocking insert. Use [`LedgerBackend::insert`] from async code.
    pub fn insert_record(
        &self,
        owner: &str,
        token: &str,
        timestamp: u64,
        amount: i64,
    ) -> Result<TransactionId, StoreError> {
        let id = self.db.generate_id()?;
        let record = Transaction {
            id: TransactionId(id),
            owner: owner.to_string(),
            token: token.to_string(),
            timestamp,
            amount,
        };
        let record_bytes =
            bincode::serialize(&record).map_err(|e| StoreError::Serialization(e.to_string()))?;

        let id_key = id.to_be_bytes();
        let mut index_key = index_prefix(owner, token);
        index_key.extend_from_slice(&id_key);

        let result: TransactionResult<()> =
            (&self.txs, &self.owner_token).transaction(|(txs, index)| {
                txs.insert(&id_key[..], record_bytes.as_slice())?;
                index.insert(index_key.as_slice(), Vec::<u8>::new())?;
                Ok(())
            });
        result.map_err(|e| match e {
            TransactionError::Storage(e) => StoreError::Sled(e),
            TransactionError::Abort(()) => StoreError::Task("insert aborted".into()),
        })?;

        self.db.flush()?;
        Ok(TransactionId(id))
    }

    /// Blocking read of the newest record's timestamp. Ids grow with
    /// insertion order, so the last `txs` entry is the newest record.
    pub fn latest_record_timestamp(&self) -> Result<u64, StoreError> {
        match self.txs.last()? {
            None => Ok(0),
            Some((_, bytes)) => {
                let record: Transaction = bincode::deserialize(&bytes)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(record.timestamp)
            }
        }
    }

    /// Blocking page fetch. Use [`LedgerBackend::select`] from async code.
    pub fn select_records(
        &self,
        owner: &str,
        token: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Transaction>, StoreError> {
        let prefix = index_prefix(owner, token);
        let mut page = Vec::new();

        for key in self
            .owner_token
            .scan_prefix(&prefix)
            .keys()
            .skip(offset)
            .take(limit)
        {
            let key = key?;
            if key.len() < prefix.len() + ID_LEN {
                return Err(StoreError::Corrupt("short index key".into()));
            }
            let id_bytes = &key[key.len() - ID_LEN..];
            let bytes = self.txs.get(id_bytes)?.ok_or_else(|| {
                StoreError::Corrupt(format!(
                    "index entry without record (id {})",
                    u64::from_be_bytes(id_bytes.try_into().unwrap_or_default())
                ))
            })?;
            let record: Transaction = bincode::deserialize(&bytes)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            page.push(record);
        }

        Ok(page)
    }
}

/// Index key prefix shared by every record of `(owner, token)`.
fn index_prefix(owner: &str, token: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + owner.len() + token.len() + ID_LEN);
    key.extend_from_slice(&(owner.len() as u32).to_be_bytes());
    key.extend_from_slice(owner.as_bytes());
    key.extend_from_slice(&(token.len() as u32).to_be_bytes());
    key.extend_from_slice(token.as_bytes());
    key
}

#[async_trait]
impl LedgerBackend for LedgerDb {
    async fn insert(
        &self,
        owner: &str,
        token: &str,
        timestamp: u64,
        amount: i64,
    ) -> Result<TransactionId, StoreError> {
        let db = self.clone();
        let (owner, token) = (owner.to_string(), token.to_string());
        tokio::task::spawn_blocking(move || db.insert_record(&owner, &token, timestamp, amount))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    async fn select(
        &self,
        owner: &str,
        token: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Transaction>, StoreError> {
        let db = self.clone();
        let (owner, token) = (owner.to_string(), token.to_string());
        tokio::task::spawn_blocking(move || db.select_records(&owner, &token, offset, limit))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    async fn latest_timestamp(&self) -> Result<u64, StoreError> {
        let db = self.clone();
        tokio::task::spawn_blocking(move || db.latest_record_timestamp())
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

// ---------------------------------------------------------------------------
// Connector
// ---------------------------------------------------------------------------

/// Opens a [`LedgerDb`] at a filesystem path.
///
/// Opening fails while another process holds the database lock, which is
/// the usual reason the startup loop has to retry.
#[derive(Debug, Clone)]
pub struct SledConnector {
    path: PathBuf,
}

impl SledConnector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Connector for SledConnector {
    type Backend = LedgerDb;

    async fn connect(&self) -> Result<LedgerDb, StoreError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || LedgerDb::open(path))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    fn endpoint(&self) -> String {
        self.path.display().to_string()
    }
}
