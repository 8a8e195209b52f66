//! # Transaction Module
//!
//! The ledger's only record type. A [`Transaction`] is a signed delta on an
//! `(owner, token)` balance, written once by the store and never touched
//! again. Balances are never stored; they are re-derived from these records
//! on every read.
//!
//! ## Amount encoding
//!
//! Amounts are `i64` everywhere: in the request body (a JSON integer), on
//! disk (bincode), and in balance responses. Decimal strings are rejected.
//! No floating point anywhere near an amount.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-assigned identifier. Unique and increasing in insertion order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TransactionId(pub u64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An immutable ledger record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub owner: String,
    pub token: String,
    /// Milliseconds since the Unix epoch, assigned at append time.
    pub timestamp: u64,
    /// Signed delta applied to the `(owner, token)` balance.
    pub amount: i64,
}

impl Transaction {
    /// Ordering key for history queries: timestamp, then insertion order.
    pub fn history_key(&self) -> (u64, TransactionId) {
        (self.timestamp, self.id)
    }
}

/// Body of a credit request (`POST /token`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditRequest {
    pub owner: String,
    pub token: String,
    pub amount: i64,
}
