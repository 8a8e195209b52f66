//! # Request Authentication
//!
//! Every mutation passes through [`Authenticator::authenticate`] before the
//! ledger sees it. One attempt is a linear walk with no retries:
//!
//! ```text
//! ResolvePublicKey ──► VerifySignature ──► Authenticated
//!        │                    │
//!        ▼                    ├──► VerificationEngineError
//! IdentityResolutionError     └──► AuthenticationError
//! ```
//!
//! In directory mode the key is always fetched from the directory, even if
//! the request also carries a key. In DID mode the carried key is used and
//! only checked against the resolver.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::ENGINE_TIMEOUT;
use crate::crypto::{EngineOutput, VerificationEngine, VerificationInput, VERIFY_PROCEDURE};
use crate::identity::{DidResolver, IdentityError, KeyDirectory};

/// Why a request failed authentication.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("identity resolution failed: {0}")]
    IdentityResolution(#[from] IdentityError),

    #[error("verification engine error: {0}")]
    VerificationEngine(String),

    #[error("signature is not authentic")]
    Authentication,
}

/// A detached-signature claim over one request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    /// Base64 of the raw request body.
    pub payload: String,
    /// Base64 detached signature.
    pub signature: String,
    /// Base58 public key sent along with the request, if any.
    pub public_key_hint: Option<String>,
    /// Directory identity of the signer, if any.
    pub identity: Option<String>,
}

/// Successful outcome: the key the signature was checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authenticated {
    pub public_key: String,
}

/// Where signer keys come from for this deployment.
#[derive(Clone)]
pub enum KeySource {
    Directory(Arc<dyn KeyDirectory>),
    Did(Arc<dyn DidResolver>),
}

/// Resolves signer keys and asks the verification engine for a verdict.
#[derive(Clone)]
pub struct Authenticator {
    source: KeySource,
    engine: Arc<dyn VerificationEngine>,
    engine_timeout: Duration,
}

impl Authenticator {
    pub fn new(source: KeySource, engine: Arc<dyn VerificationEngine>) -> Self {
        Self {
            source,
            engine,
            engine_timeout: ENGINE_TIMEOUT,
        }
    }

    pub fn with_engine_timeout(mut self, timeout: Duration) -> Self {
        self.engine_timeout = timeout;
        self
    }

    /// Run the full check for one request.
    pub async fn authenticate(&self, request: &SignedRequest) -> Result<Authenticated, AuthError> {
        let public_key = self.resolve_public_key(request).await?;
        self.verify_signature(request, &public_key).await?;
        Ok(Authenticated { public_key })
    }

    async fn resolve_public_key(&self, request: &SignedRequest) -> Result<String, AuthError> {
        match &self.source {
            KeySource::Directory(directory) => {
                let identity = request
                    .identity
                    .as_deref()
                    .filter(|id| !id.is_empty())
                    .ok_or(IdentityError::MissingReference("signer identity"))?;
                let key = directory.public_key_of(identity).await.map_err(|e| {
                    tracing::warn!(identity, error = %e, "directory lookup failed");
                    e
                })?;
                Ok(key)
            }
            KeySource::Did(resolver) => {
                let key = request
                    .public_key_hint
                    .as_deref()
                    .filter(|k| !k.is_empty())
                    .ok_or(IdentityError::MissingReference("signer public key"))?;
                resolver.check(key).await.map_err(|e| {
                    tracing::warn!(public_key = key, error = %e, "DID resolution failed");
                    e
                })?;
                Ok(key.to_string())
            }
        }
    }

    async fn verify_signature(
        &self,
        request: &SignedRequest,
        public_key: &str,
    ) -> Result<(), AuthError> {
        let input = VerificationInput {
            gql: request.payload.clone(),
            eddsa_signature: request.signature.clone(),
            eddsa_public_key: public_key.to_string(),
        };

        let engine = Arc::clone(&self.engine);
        let task = tokio::task::spawn_blocking(move || engine.execute(VERIFY_PROCEDURE, &input));

        let run = match tokio::time::timeout(self.engine_timeout, task).await {
            Err(_) => {
                return Err(AuthError::VerificationEngine(format!(
                    "timed out after {:?}",
                    self.engine_timeout
                )))
            }
            Ok(Err(join)) => return Err(AuthError::VerificationEngine(join.to_string())),
            Ok(Ok(Err(e))) => return Err(AuthError::VerificationEngine(e.to_string())),
            Ok(Ok(Ok(run))) => run,
        };
        tracing::trace!(logs = %run.logs, "verification engine finished");

        let parsed: EngineOutput = serde_json::from_str(&run.output).map_err(|e| {
            AuthError::VerificationEngine(format!("unparsable engine output: {e}"))
        })?;
        if parsed.output.is_empty() {
            return Err(AuthError::VerificationEngine(
                "engine produced no verdict".into(),
            ));
        }
        if !parsed.is_authentic() {
            return Err(AuthError::Authentication);
        }
        Ok(())
    }
}
