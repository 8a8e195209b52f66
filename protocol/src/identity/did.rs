//! # DID Resolution
//!
//! In DID mode the signer ships its public key in the request and the
//! wallet only asks a decentralized-identity resolver whether that key is
//! a known DID. The resolver URL is templated as
//!
//! ```text
//! <base_url><context>:<public_key>
//! ```
//!
//! e.g. `https://did.example/dids/did:dyne:sandbox.signroom:<key>`.
//! Any 200 answer is acceptance; the document body is not inspected.

use async_trait::async_trait;
use std::time::Duration;

use super::IdentityError;

/// Checks that a claimed public key belongs to a registered DID.
#[async_trait]
pub trait DidResolver: Send + Sync {
    async fn check(&self, public_key: &str) -> Result<(), IdentityError>;
}

/// HTTP resolver client.
#[derive(Debug, Clone)]
pub struct HttpDidResolver {
    base_url: String,
    context: String,
    client: reqwest::Client,
}

impl HttpDidResolver {
    pub fn new(
        base_url: impl Into<String>,
        context: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IdentityError::Transport(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            context: context.into(),
            client,
        })
    }

    /// The URL queried for `public_key`.
    pub fn did_url(&self, public_key: &str) -> String {
        format!("{}{}:{}", self.base_url, self.context, public_key)
    }
}

#[async_trait]
impl DidResolver for HttpDidResolver {
    async fn check(&self, public_key: &str) -> Result<(), IdentityError> {
        let url = self.did_url(public_key);
        tracing::debug!(%url, "resolving DID");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| IdentityError::Transport(e.to_string()))?;

        if resp.status() != reqwest::StatusCode::OK {
            return Err(IdentityError::Status(resp.status().as_u16()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::test_support::serve;
    use axum::{extract::Path, http::StatusCode, routing::get, Router};

    const KNOWN: &str = "H7sbugVBZbmRX6M75WpzCi5vVVtaxvfLhovDijRAnZj";

    fn resolver_router() -> Router {
        Router::new().route(
            "/dids/:did",
            get(|Path(did): Path<String>| async move {
                if did == format!("did:dyne:sandbox:{KNOWN}") {
                    (StatusCode::OK, "{\"didDocument\":{}}")
                } else {
                    (StatusCode::NOT_FOUND, "{}")
                }
            }),
        )
    }

    #[test]
    fn url_is_base_context_and_key() {
        let r = HttpDidResolver::new(
            "https://did.example/dids/",
            "did:dyne:sandbox",
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(
            r.did_url("abc"),
            "https://did.example/dids/did:dyne:sandbox:abc"
        );
    }

    #[tokio::test]
    async fn known_key_is_accepted() {
        let base = serve(resolver_router()).await;
        let r = HttpDidResolver::new(
            format!("{base}/dids/"),
            "did:dyne:sandbox",
            Duration::from_secs(2),
        )
        .unwrap();
        assert_eq!(r.check(KNOWN).await, Ok(()));
    }

    #[tokio::test]
    async fn unknown_key_reports_status() {
        let base = serve(resolver_router()).await;
        let r = HttpDidResolver::new(
            format!("{base}/dids/"),
            "did:dyne:sandbox",
            Duration::from_secs(2),
        )
        .unwrap();
        assert_eq!(r.check("someone-else").await, Err(IdentityError::Status(404)));
    }

    #[tokio::test]
    async fn silent_resolver_times_out_as_transport_error() {
        let silent = Router::new().route(
            "/dids/:did",
            get(|| std::future::pending::<StatusCode>()),
        );
        let base = serve(silent).await;
        let r = HttpDidResolver::new(
            format!("{base}/dids/"),
            "did:dyne:sandbox",
            Duration::from_millis(100),
        )
        .unwrap();

        let started = std::time::Instant::now();
        assert!(matches!(
            r.check(KNOWN).await,
            Err(IdentityError::Transport(_))
        ));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
