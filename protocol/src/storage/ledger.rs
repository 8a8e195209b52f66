//! # LedgerStore — Append, Aggregate, Connect
//!
//! The ledger logic on top of any [`LedgerBackend`]:
//!
//! - [`LedgerStore::connect`] opens the backend with a fixed retry budget.
//!   It is the only place in the service that retries anything.
//! - [`LedgerStore::append`] stamps and writes one record.
//! - [`LedgerStore::sum_balance`] and [`LedgerStore::list_recent`] walk the
//!   `(owner, token)` slice page by page until the backend returns an empty
//!   page. The walk advances by the number of records actually received,
//!   so it gives the same answer whether the backend honours the page size,
//!   returns short pages, or returns the whole slice at once.
//!
//! Every backend call runs under a timeout. Per-request failures are
//! reported as [`LedgerError::Write`] or [`LedgerError::Read`] and never
//! retried.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{Connector, LedgerBackend, StoreError};
use crate::config::{CONNECT_BACKOFF, MAX_CONNECT_ATTEMPTS, PAGE_SIZE, STORE_TIMEOUT};
use crate::transaction::{Transaction, TransactionId};

/// Source of append timestamps (milliseconds since the Unix epoch).
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

/// The store could not be reached within the retry budget. Fatal.
#[derive(Debug, thiserror::Error)]
#[error("could not connect to ledger store at {endpoint} after {attempts} attempts: {last}")]
pub struct ConnectionError {
    pub endpoint: String,
    pub attempts: usize,
    #[source]
    pub last: StoreError,
}

/// Per-request store failure.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger write failed: {0}")]
    Write(#[source] StoreError),

    #[error("ledger read failed: {0}")]
    Read(#[source] StoreError),
}

/// Retry budget for [`LedgerStore::connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectPolicy {
    pub max_attempts: usize,
    pub backoff: Duration,
    /// Bound on a single attempt.
    pub attempt_timeout: Duration,
}

impl Default for ConnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_CONNECT_ATTEMPTS,
            backoff: CONNECT_BACKOFF,
            attempt_timeout: STORE_TIMEOUT,
        }
    }
}

/// Append-only ledger over a backend `B`.
pub struct LedgerStore<B> {
    backend: B,
    page_size: usize,
    timeout: Duration,
    clock: Clock,
    /// Highest timestamp handed out so far; keeps appends non-decreasing
    /// when the wall clock steps backwards.
    last_timestamp: AtomicU64,
}

impl<B: LedgerBackend> LedgerStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            page_size: PAGE_SIZE,
            timeout: STORE_TIMEOUT,
            clock: Arc::new(|| chrono::Utc::now().timestamp_millis().max(0) as u64),
            last_timestamp: AtomicU64::new(0),
        }
    }

    /// Open the backend, retrying up to `policy.max_attempts` times with a
    /// fixed pause in between.
    pub async fn connect<C>(connector: &C, policy: &ConnectPolicy) -> Result<Self, ConnectionError>
    where
        C: Connector<Backend = B>,
    {
        let endpoint = connector.endpoint();
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = match tokio::time::timeout(policy.attempt_timeout, Self::open(connector))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(StoreError::Timeout(policy.attempt_timeout)),
            };

            match result {
                Ok(store) => {
                    tracing::info!(
                        %endpoint,
                        attempt,
                        latest_timestamp = store.last_timestamp.load(Ordering::SeqCst),
                        "connected to ledger store"
                    );
                    return Ok(store);
                }
                Err(e) if attempt >= max_attempts => {
                    tracing::error!(%endpoint, attempt, error = %e, "giving up on ledger store");
                    return Err(ConnectionError {
                        endpoint,
                        attempts: attempt,
                        last: e,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        %endpoint,
                        attempt,
                        max_attempts,
                        error = %e,
                        "could not connect to ledger store, retrying"
                    );
                    tokio::time::sleep(policy.backoff).await;
                }
            }
        }
    }

    /// One connection attempt: open the backend and seed the append clock
    /// from the newest stored record.
    async fn open<C>(connector: &C) -> Result<Self, StoreError>
    where
        C: Connector<Backend = B>,
    {
        let backend = connector.connect().await?;
        let latest = backend.latest_timestamp().await?;
        let store = Self::new(backend);
        store.last_timestamp.store(latest, Ordering::SeqCst);
        Ok(store)
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Append one record stamped with the current time. Returns after the
    /// backend acknowledged a durable write. Duplicate submissions produce
    /// duplicate records.
    pub async fn append(
        &self,
        owner: &str,
        token: &str,
        amount: i64,
    ) -> Result<TransactionId, LedgerError> {
        let timestamp = self.next_timestamp();
        let id = self
            .bounded(self.backend.insert(owner, token, timestamp, amount))
            .await
            .map_err(LedgerError::Write)?;

        tracing::debug!(%id, owner, token, amount, timestamp, "appended transaction");
        Ok(id)
    }

    /// Sum of all amounts for `(owner, token)` with `timestamp <= cutoff`.
    /// A cutoff of `0` means no upper bound.
    pub async fn sum_balance(
        &self,
        owner: &str,
        token: &str,
        cutoff: u64,
    ) -> Result<i64, LedgerError> {
        let mut balance: i64 = 0;
        self.for_each_page(owner, token, |page| {
            for tx in page {
                if cutoff == 0 || tx.timestamp <= cutoff {
                    balance = balance.checked_add(tx.amount).ok_or(StoreError::Overflow)?;
                }
            }
            Ok(())
        })
        .await
        .map_err(LedgerError::Read)?;
        Ok(balance)
    }

    /// The `n` most recent records of `(owner, token)`, oldest first.
    pub async fn list_recent(
        &self,
        owner: &str,
        token: &str,
        n: usize,
    ) -> Result<Vec<Transaction>, LedgerError> {
        if n == 0 {
            return Ok(Vec::new());
        }

        let mut txs = Vec::new();
        self.for_each_page(owner, token, |page| {
            txs.extend(page);
            Ok(())
        })
        .await
        .map_err(LedgerError::Read)?;

        txs.sort_by_key(Transaction::history_key);
        let skip = txs.len().saturating_sub(n);
        Ok(txs.split_off(skip))
    }

    async fn for_each_page<F>(&self, owner: &str, token: &str, mut visit: F) -> Result<(), StoreError>
    where
        F: FnMut(Vec<Transaction>) -> Result<(), StoreError>,
    {
        let mut offset = 0usize;
        loop {
            let page = self
                .bounded(self.backend.select(owner, token, offset, self.page_size))
                .await?;
            if page.is_empty() {
                return Ok(());
            }
            offset += page.len();
            visit(page)?;
        }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }

    fn next_timestamp(&self) -> u64 {
        let now = (self.clock)();
        let prev = self.last_timestamp.fetch_max(now, Ordering::SeqCst);
        prev.max(now)
    }
}
