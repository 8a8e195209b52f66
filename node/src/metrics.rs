//! # Prometheus Metrics
//!
//! Request counters and latency for the ledger API, scraped at `/metrics`
//! on the metrics port. Everything lives in a dedicated
//! [`prometheus::Registry`] prefixed with `zenwallet_`.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::core::Collector;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounter, Registry, TextEncoder};
use std::sync::Arc;

#[derive(Clone)]
pub struct WalletMetrics {
    registry: Registry,
    /// Credits appended to the ledger.
    pub appends_total: IntCounter,
    /// Credit requests rejected for any reason.
    pub append_failures_total: IntCounter,
    /// Credit requests rejected by authentication.
    pub auth_failures_total: IntCounter,
    pub balance_queries_total: IntCounter,
    pub history_queries_total: IntCounter,
    /// Handler latency, labelled by route.
    pub request_latency_seconds: HistogramVec,
}

impl WalletMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("zenwallet".into()), None)
            .expect("failed to create prometheus registry");

        let appends_total = register(
            &registry,
            IntCounter::new("appends_total", "Credits appended to the ledger")
                .expect("metric creation"),
        );
        let append_failures_total = register(
            &registry,
            IntCounter::new("append_failures_total", "Credit requests that were rejected")
                .expect("metric creation"),
        );
        let auth_failures_total = register(
            &registry,
            IntCounter::new(
                "auth_failures_total",
                "Credit requests rejected by signature authentication",
            )
            .expect("metric creation"),
        );
        let balance_queries_total = register(
            &registry,
            IntCounter::new("balance_queries_total", "Balance queries served")
                .expect("metric creation"),
        );
        let history_queries_total = register(
            &registry,
            IntCounter::new("history_queries_total", "History queries served")
                .expect("metric creation"),
        );
        let request_latency_seconds = register(
            &registry,
            HistogramVec::new(
                HistogramOpts::new("request_latency_seconds", "Handler latency in seconds")
                    .buckets(vec![
                        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
                    ]),
                &["route"],
            )
            .expect("metric creation"),
        );

        Self {
            registry,
            appends_total,
            append_failures_total,
            auth_failures_total,
            balance_queries_total,
            history_queries_total,
            request_latency_seconds,
        }
    }

    /// Encodes all registered metrics in the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for WalletMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn register<C: Collector + Clone + 'static>(registry: &Registry, collector: C) -> C {
    registry
        .register(Box::new(collector.clone()))
        .expect("metric registration");
    collector
}

pub type SharedMetrics = Arc<WalletMetrics>;

/// `GET /metrics`
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
