//! # Ledger Service
//!
//! The three operations exposed over HTTP, without any HTTP in them.
//!
//! | Operation               | Auth | Store call                 |
//! |-------------------------|------|----------------------------|
//! | [`add_tokens`]          | yes  | [`LedgerStore::append`]    |
//! | [`balance`]             | no   | [`LedgerStore::sum_balance`] |
//! | [`recent_transactions`] | no   | [`LedgerStore::list_recent`] |
//!
//! Reads are unauthenticated. A credit is appended only after the
//! authenticator has accepted the signature over the exact body bytes the
//! client sent.
//!
//! [`add_tokens`]: LedgerService::add_tokens
//! [`balance`]: LedgerService::balance
//! [`recent_transactions`]: LedgerService::recent_transactions

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use thiserror::Error;

use crate::auth::{AuthError, Authenticator, SignedRequest};
use crate::storage::{LedgerBackend, LedgerError, LedgerStore};
use crate::transaction::{CreditRequest, Transaction, TransactionId};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Signature material that travels next to the body (request headers).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestCredentials {
    /// `zenflows-sign`
    pub signature: Option<String>,
    /// `zenflows-id`
    pub identity: Option<String>,
    /// `did-pk`
    pub public_key: Option<String>,
}

pub struct LedgerService<B> {
    store: Arc<LedgerStore<B>>,
    auth: Authenticator,
}

impl<B> Clone for LedgerService<B> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            auth: self.auth.clone(),
        }
    }
}

impl<B: LedgerBackend> LedgerService<B> {
    pub fn new(store: Arc<LedgerStore<B>>, auth: Authenticator) -> Self {
        Self { store, auth }
    }

    pub fn store(&self) -> &LedgerStore<B> {
        &self.store
    }

    /// Authenticate `body` and append the credit it describes.
    pub async fn add_tokens(
        &self,
        body: &[u8],
        credentials: RequestCredentials,
    ) -> Result<TransactionId, ServiceError> {
        let request: CreditRequest = serde_json::from_slice(body)
            .map_err(|e| ServiceError::Validation(format!("malformed body: {e}")))?;
        require_non_empty(&request.owner, "owner")?;
        require_non_empty(&request.token, "token")?;

        let signature = credentials
            .signature
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ServiceError::Validation("missing signature header".into()))?;

        let signed = SignedRequest {
            payload: BASE64.encode(body),
            signature,
            public_key_hint: credentials.public_key,
            identity: credentials.identity,
        };
        let authenticated = self.auth.authenticate(&signed).await.map_err(|e| {
            tracing::warn!(owner = %request.owner, token = %request.token, error = %e, "credit rejected");
            e
        })?;

        let id = self
            .store
            .append(&request.owner, &request.token, request.amount)
            .await?;
        tracing::info!(
            %id,
            owner = %request.owner,
            token = %request.token,
            amount = request.amount,
            signer = %authenticated.public_key,
            "credit appended"
        );
        Ok(id)
    }

    /// Balance of `(owner, token)`, optionally bounded by `until`
    /// (milliseconds since the epoch, inclusive; `0` or absent means now).
    pub async fn balance(
        &self,
        owner: &str,
        token: &str,
        until: Option<&str>,
    ) -> Result<i64, ServiceError> {
        require_non_empty(owner, "owner")?;
        require_non_empty(token, "token")?;
        let cutoff = match until.map(str::trim).filter(|s| !s.is_empty()) {
            None => 0,
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|_| ServiceError::Validation(format!("invalid until: {raw:?}")))?,
        };

        Ok(self.store.sum_balance(owner, token, cutoff).await?)
    }

    /// The last `n` transactions of `(owner, token)`, oldest first.
    pub async fn recent_transactions(
        &self,
        owner: &str,
        token: &str,
        n: &str,
    ) -> Result<Vec<Transaction>, ServiceError> {
        require_non_empty(owner, "owner")?;
        require_non_empty(token, "token")?;
        let n = n
            .trim()
            .parse::<usize>()
            .map_err(|_| ServiceError::Validation(format!("invalid count: {n:?}")))?;

        Ok(self.store.list_recent(owner, token, n).await?)
    }
}

fn require_non_empty(value: &str, field: &str) -> Result<(), ServiceError> {
    if value.is_empty() {
        return Err(ServiceError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}
