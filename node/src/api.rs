//! # REST API
//!
//! Builds the axum router that exposes the ledger service over HTTP. All
//! endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                          | Description                    |
//! |--------|-------------------------------|--------------------------------|
//! | GET    | `/health`                     | Liveness probe                 |
//! | POST   | `/token`                      | Signed credit or debit         |
//! | GET    | `/token/:token/:owner`        | Balance, optional `?until=`    |
//! | GET    | `/token/:token/:owner/last/:n`| Last `n` transactions          |
//!
//! Ledger endpoints always answer 200 and report the outcome in the
//! `success` field of the JSON body.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use zenwallet_protocol::config::{HEADER_IDENTITY, HEADER_PUBLIC_KEY, HEADER_SIGNATURE};
use zenwallet_protocol::service::{LedgerService, RequestCredentials, ServiceError};
use zenwallet_protocol::storage::LedgerDb;
use zenwallet_protocol::transaction::{Transaction, TransactionId};

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub service: LedgerService<LedgerDb>,
    pub metrics: SharedMetrics,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the API [`Router`] with CORS and request tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
            Method::PUT,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::CONTENT_LENGTH,
            header::ACCEPT_ENCODING,
            HeaderName::from_static("x-csrf-token"),
            header::AUTHORIZATION,
            header::ACCEPT,
            header::ORIGIN,
            header::CACHE_CONTROL,
            HeaderName::from_static("x-requested-with"),
            HeaderName::from_static(HEADER_SIGNATURE),
            HeaderName::from_static(HEADER_IDENTITY),
            HeaderName::from_static(HEADER_PUBLIC_KEY),
        ]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/token", post(add_tokens_handler))
        .route("/token/:token/:owner", get(balance_handler))
        .route("/token/:token/:owner/last/:n", get(history_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Response of `POST /token`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AddTokensResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response of `GET /token/:token/:owner`.
#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response of `GET /token/:token/:owner/last/:n`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txs: Option<Vec<TransactionView>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One history entry. Owner and token are implied by the path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionView {
    pub id: TransactionId,
    pub timestamp: u64,
    pub amount: i64,
}

impl From<Transaction> for TransactionView {
    fn from(tx: Transaction) -> Self {
        Self {
            id: tx.id,
            timestamp: tx.timestamp,
            amount: tx.amount,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BalanceQuery {
    pub until: Option<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `POST /token`: authenticate the body and append it to the ledger.
///
/// The body is taken as raw bytes: the signature covers exactly what the
/// client sent.
async fn add_tokens_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<AddTokensResponse> {
    let _timer = state
        .metrics
        .request_latency_seconds
        .with_label_values(&["add_tokens"])
        .start_timer();

    let credentials = RequestCredentials {
        signature: header_value(&headers, HEADER_SIGNATURE),
        identity: header_value(&headers, HEADER_IDENTITY),
        public_key: header_value(&headers, HEADER_PUBLIC_KEY),
    };

    match state.service.add_tokens(&body, credentials).await {
        Ok(_) => {
            state.metrics.appends_total.inc();
            Json(AddTokensResponse {
                success: true,
                error: None,
            })
        }
        Err(e) => {
            state.metrics.append_failures_total.inc();
            if matches!(e, ServiceError::Auth(_)) {
                state.metrics.auth_failures_total.inc();
            }
            log_failure("add_tokens", &e);
            Json(AddTokensResponse {
                success: false,
                error: Some(e.to_string()),
            })
        }
    }
}

/// `GET /token/:token/:owner?until=<ms>`
async fn balance_handler(
    State(state): State<Arc<AppState>>,
    Path((token, owner)): Path<(String, String)>,
    Query(query): Query<BalanceQuery>,
) -> Json<BalanceResponse> {
    let _timer = state
        .metrics
        .request_latency_seconds
        .with_label_values(&["balance"])
        .start_timer();
    state.metrics.balance_queries_total.inc();

    match state
        .service
        .balance(&owner, &token, query.until.as_deref())
        .await
    {
        Ok(amount) => Json(BalanceResponse {
            success: true,
            amount: Some(amount),
            error: None,
        }),
        Err(e) => {
            log_failure("balance", &e);
            Json(BalanceResponse {
                success: false,
                amount: None,
                error: Some(e.to_string()),
            })
        }
    }
}

/// `GET /token/:token/:owner/last/:n`
async fn history_handler(
    State(state): State<Arc<AppState>>,
    Path((token, owner, n)): Path<(String, String, String)>,
) -> Json<HistoryResponse> {
    let _timer = state
        .metrics
        .request_latency_seconds
        .with_label_values(&["history"])
        .start_timer();
    state.metrics.history_queries_total.inc();

    match state.service.recent_transactions(&owner, &token, &n).await {
        Ok(txs) => Json(HistoryResponse {
            success: true,
            txs: Some(txs.into_iter().map(TransactionView::from).collect()),
            error: None,
        }),
        Err(e) => {
            log_failure("history", &e);
            Json(HistoryResponse {
                success: false,
                txs: None,
                error: Some(e.to_string()),
            })
        }
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn log_failure(route: &str, error: &ServiceError) {
    match error {
        ServiceError::Ledger(_) => tracing::error!(route, error = %error, "request failed"),
        _ => tracing::info!(route, error = %error, "request rejected"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use zenwallet_protocol::auth::{Authenticator, KeySource};
    use zenwallet_protocol::crypto::{sign_payload, Ed25519Engine, WalletKeypair};
    use zenwallet_protocol::identity::{IdentityError, KeyDirectory};
    use zenwallet_protocol::storage::LedgerStore;

    use crate::metrics::WalletMetrics;

    const IDENTITY: &str = "062TE0H7591KJCVT3DDEMDBF0R";

    struct SingleIdentity(String);

    #[async_trait]
    impl KeyDirectory for SingleIdentity {
        async fn public_key_of(&self, identity: &str) -> Result<String, IdentityError> {
            if identity == IDENTITY {
                Ok(self.0.clone())
            } else {
                Err(IdentityError::UnknownIdentity(identity.to_string()))
            }
        }
    }

    /// Router over a temporary ledger that trusts `kp` for [`IDENTITY`].
    fn test_router(kp: &WalletKeypair) -> (Router, SharedMetrics) {
        let store = LedgerStore::new(LedgerDb::open_temporary().expect("temp db"));
        let auth = Authenticator::new(
            KeySource::Directory(Arc::new(SingleIdentity(kp.public_key().to_base58()))),
            Arc::new(Ed25519Engine),
        );
        let metrics = Arc::new(WalletMetrics::new());
        let state = AppState {
            service: LedgerService::new(Arc::new(store), auth),
            metrics: Arc::clone(&metrics),
        };
        (create_router(state), metrics)
    }

    async fn send(router: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn get(router: &Router, path: &str) -> (StatusCode, serde_json::Value) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        send(router, req).await
    }

    async fn post_signed(
        router: &Router,
        kp: &WalletKeypair,
        body: &str,
    ) -> (StatusCode, serde_json::Value) {
        let req = Request::builder()
            .method("POST")
            .uri("/token")
            .header("content-type", "application/json")
            .header(HEADER_SIGNATURE, sign_payload(kp, body.as_bytes()).to_base64())
            .header(HEADER_IDENTITY, IDENTITY)
            .body(Body::from(body.to_string()))
            .unwrap();
        send(router, req).await
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let (router, _) = test_router(&WalletKeypair::generate());
        let (status, json) = get(&router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn credit_debit_balance_and_history() {
        let kp = WalletKeypair::generate();
        let (router, metrics) = test_router(&kp);

        let (status, json) =
            post_signed(&router, &kp, r#"{"owner":"alice","token":"T","amount":100}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, serde_json::json!({ "success": true }));
        post_signed(&router, &kp, r#"{"owner":"alice","token":"T","amount":-30}"#).await;

        let (_, json) = get(&router, "/token/T/alice").await;
        assert_eq!(json["success"], true);
        assert_eq!(json["amount"], 70);

        let (_, json) = get(&router, "/token/T/alice/last/1").await;
        assert_eq!(json["success"], true);
        let txs = json["txs"].as_array().unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0]["amount"], -30);
        assert!(txs[0]["id"].is_u64());
        assert!(txs[0]["timestamp"].is_u64());

        assert_eq!(metrics.appends_total.get(), 2);
        assert_eq!(metrics.balance_queries_total.get(), 1);
        assert_eq!(metrics.history_queries_total.get(), 1);
    }

    #[tokio::test]
    async fn forged_signature_is_rejected_with_200() {
        let kp = WalletKeypair::generate();
        let (router, metrics) = test_router(&kp);
        let stranger = WalletKeypair::generate();

        let (status, json) =
            post_signed(&router, &stranger, r#"{"owner":"alice","token":"T","amount":5}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().contains("not authentic"));

        let (_, json) = get(&router, "/token/T/alice").await;
        assert_eq!(json["amount"], 0);
        assert_eq!(metrics.auth_failures_total.get(), 1);
        assert_eq!(metrics.append_failures_total.get(), 1);
        assert_eq!(metrics.appends_total.get(), 0);
    }

    #[tokio::test]
    async fn missing_signature_header_is_rejected() {
        let kp = WalletKeypair::generate();
        let (router, metrics) = test_router(&kp);
        let req = Request::builder()
            .method("POST")
            .uri("/token")
            .header(HEADER_IDENTITY, IDENTITY)
            .body(Body::from(r#"{"owner":"alice","token":"T","amount":5}"#))
            .unwrap();

        let (status, json) = send(&router, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], false);
        assert_eq!(metrics.auth_failures_total.get(), 0);
        assert_eq!(metrics.append_failures_total.get(), 1);
    }

    #[tokio::test]
    async fn malformed_query_values_report_failure() {
        let (router, _) = test_router(&WalletKeypair::generate());

        let (status, json) = get(&router, "/token/T/alice?until=soon").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], false);
        assert!(json.get("amount").is_none());

        let (status, json) = get(&router, "/token/T/alice/last/many").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], false);
        assert!(json.get("txs").is_none());
    }

    #[tokio::test]
    async fn empty_history_is_success() {
        let (router, _) = test_router(&WalletKeypair::generate());
        let (_, json) = get(&router, "/token/T/nobody/last/10").await;
        assert_eq!(json, serde_json::json!({ "success": true, "txs": [] }));

        let (_, json) = get(&router, "/token/T/nobody?until=0").await;
        assert_eq!(json, serde_json::json!({ "success": true, "amount": 0 }));
    }

    #[tokio::test]
    async fn cors_preflight_allows_signature_headers() {
        let (router, _) = test_router(&WalletKeypair::generate());
        let req = Request::builder()
            .method("OPTIONS")
            .uri("/token")
            .header("origin", "https://wallet.example")
            .header("access-control-request-method", "POST")
            .header(
                "access-control-request-headers",
                format!("{HEADER_SIGNATURE}, authorization, x-requested-with"),
            )
            .body(Body::empty())
            .unwrap();

        let resp = router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let headers = resp.headers();
        assert_eq!(headers["access-control-allow-origin"], "*");
        let allowed = headers["access-control-allow-headers"].to_str().unwrap();
        for name in [
            HEADER_SIGNATURE,
            HEADER_IDENTITY,
            "authorization",
            "x-requested-with",
            "x-csrf-token",
            "cache-control",
        ] {
            assert!(allowed.contains(name), "{name} missing from {allowed}");
        }
    }
}
