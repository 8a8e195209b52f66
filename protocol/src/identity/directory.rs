//! # Identity Directory Lookup
//!
//! Resolves a signer's EdDSA public key from the identity directory
//! (a Zenflows GraphQL endpoint) with a single `personPubkey` query.
//!
//! The directory owns the identity → key mapping. Every call is a fresh
//! round trip; nothing is cached here.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::IdentityError;
use crate::config::GQL_PERSON_PUBKEY;

/// Anything that can map an identity reference to a base58 public key.
#[async_trait]
pub trait KeyDirectory: Send + Sync {
    async fn public_key_of(&self, identity: &str) -> Result<String, IdentityError>;
}

#[derive(Debug, Deserialize)]
struct GqlResponse {
    data: Option<PersonPubkey>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersonPubkey {
    person_pubkey: Option<String>,
}

/// GraphQL directory client.
#[derive(Debug, Clone)]
pub struct ZenflowsDirectory {
    url: String,
    client: reqwest::Client,
}

impl ZenflowsDirectory {
    /// `url` is the full GraphQL endpoint (already including `/api`).
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IdentityError::Transport(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl KeyDirectory for ZenflowsDirectory {
    async fn public_key_of(&self, identity: &str) -> Result<String, IdentityError> {
        let query = serde_json::json!({
            "query": GQL_PERSON_PUBKEY,
            "variables": { "id": identity },
        });

        tracing::debug!(url = %self.url, identity, "requesting public key from directory");

        let resp = self
            .client
            .post(&self.url)
            .json(&query)
            .send()
            .await
            .map_err(|e| IdentityError::Transport(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| IdentityError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(IdentityError::Status(status.as_u16()));
        }

        let parsed: GqlResponse =
            serde_json::from_str(&body).map_err(|e| IdentityError::Malformed(e.to_string()))?;

        match parsed.data.and_then(|d| d.person_pubkey) {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(IdentityError::UnknownIdentity(body)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::test_support::serve;
    use axum::{routing::post, Json, Router};

    const PUBKEY: &str = "EtJtSqAG9mVHfKrKduS6aeyAE6okGXrfMW8fEQ6eqenh";

    fn directory_router() -> Router {
        Router::new().route(
            "/api",
            post(|Json(req): Json<serde_json::Value>| async move {
                let id = req["variables"]["id"].as_str().unwrap_or_default().to_string();
                assert_eq!(req["query"], GQL_PERSON_PUBKEY);
                if id == "062TE0H7591KJCVT3DDEMDBF0R" {
                    Json(serde_json::json!({ "data": { "personPubkey": PUBKEY } }))
                } else {
                    Json(serde_json::json!({
                        "data": { "personPubkey": null },
                        "errors": [{ "message": "not found" }]
                    }))
                }
            }),
        )
    }

    #[tokio::test]
    async fn resolves_known_identity() {
        let base = serve(directory_router()).await;
        let dir = ZenflowsDirectory::new(format!("{base}/api"), Duration::from_secs(2)).unwrap();
        let key = dir.public_key_of("062TE0H7591KJCVT3DDEMDBF0R").await.unwrap();
        assert_eq!(key, PUBKEY);
    }

    #[tokio::test]
    async fn unknown_identity_carries_directory_body() {
        let base = serve(directory_router()).await;
        let dir = ZenflowsDirectory::new(format!("{base}/api"), Duration::from_secs(2)).unwrap();
        match dir.public_key_of("nobody").await {
            Err(IdentityError::UnknownIdentity(body)) => assert!(body.contains("not found")),
            other => panic!("expected UnknownIdentity, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_success_status_is_rejected() {
        let base = serve(Router::new()).await;
        let dir = ZenflowsDirectory::new(format!("{base}/api"), Duration::from_secs(2)).unwrap();
        assert_eq!(
            dir.public_key_of("anyone").await,
            Err(IdentityError::Status(404))
        );
    }

    #[tokio::test]
    async fn silent_directory_times_out_as_transport_error() {
        let silent = Router::new().route(
            "/api",
            post(|| std::future::pending::<Json<serde_json::Value>>()),
        );
        let base = serve(silent).await;
        let dir =
            ZenflowsDirectory::new(format!("{base}/api"), Duration::from_millis(100)).unwrap();

        let started = std::time::Instant::now();
        assert!(matches!(
            dir.public_key_of("062TE0H7591KJCVT3DDEMDBF0R").await,
            Err(IdentityError::Transport(_))
        ));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn unreachable_directory_is_a_transport_error() {
        let dir =
            ZenflowsDirectory::new("http://127.0.0.1:1/api", Duration::from_millis(500)).unwrap();
        assert!(matches!(
            dir.public_key_of("anyone").await,
            Err(IdentityError::Transport(_))
        ));
    }
}
