//! # Prometheus Metrics
//!
//! Operational metrics for the issuance node, scraped by Prometheus at
//! `/metrics` on the metrics port.
//!
//! All metrics live in a dedicated [`prometheus::Registry`] prefixed
//! `certichain_`, so they never collide with the default global registry.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::core::Collector;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

/// Metric handles for the node. Prometheus handles are `Arc`s inside, so
/// cloning is cheap.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Fingerprint requests received.
    pub fingerprint_requests_total: IntCounter,
    /// Requests turned away by the admission gate.
    pub admission_denied_total: IntCounter,
    /// Certificate submissions, labelled `outcome="ok" | "failed"`.
    pub submissions_total: IntCounterVec,
    /// Verification requests, labelled `path="ledger" | "signature"`.
    pub verifications_total: IntCounterVec,
    /// Successful revocations.
    pub revocations_total: IntCounter,
    /// Pending issuances still absent from the ledger after the last sweep.
    pub orphaned_issuances: IntGauge,
    /// Pending issuances confirmed by the reconciler.
    pub reconciled_total: IntCounter,
    /// Wall time of certificate submissions, funding through finality.
    pub finality_latency_seconds: Histogram,
}

fn register<C: Collector + Clone + 'static>(
    registry: &Registry,
    collector: C,
) -> Result<C, prometheus::Error> {
    registry.register(Box::new(collector.clone()))?;
    Ok(collector)
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("certichain".into()), None)?;

        let fingerprint_requests_total = register(
            &registry,
            IntCounter::new(
                "fingerprint_requests_total",
                "Fingerprint requests received",
            )?,
        )?;
        let admission_denied_total = register(
            &registry,
            IntCounter::new(
                "admission_denied_total",
                "Requests denied by the admission gate",
            )?,
        )?;
        let submissions_total = register(
            &registry,
            IntCounterVec::new(
                Opts::new("submissions_total", "Certificate submissions by outcome"),
                &["outcome"],
            )?,
        )?;
        let verifications_total = register(
            &registry,
            IntCounterVec::new(
                Opts::new("verifications_total", "Verification requests by path"),
                &["path"],
            )?,
        )?;
        let revocations_total = register(
            &registry,
            IntCounter::new("revocations_total", "Certificates revoked")?,
        )?;
        let orphaned_issuances = register(
            &registry,
            IntGauge::new(
                "orphaned_issuances",
                "Pending issuances not found on the ledger in the last sweep",
            )?,
        )?;
        let reconciled_total = register(
            &registry,
            IntCounter::new(
                "reconciled_total",
                "Pending issuances confirmed by the reconciler",
            )?,
        )?;
        let finality_latency_seconds = register(
            &registry,
            Histogram::with_opts(
                HistogramOpts::new(
                    "finality_latency_seconds",
                    "Certificate submission latency, funding through finality",
                )
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0]),
            )?,
        )?;

        Ok(Self {
            registry,
            fingerprint_requests_total,
            admission_denied_total,
            submissions_total,
            verifications_total,
            revocations_total,
            orphaned_issuances,
            reconciled_total,
            finality_latency_seconds,
        })
    }

    /// Encodes all registered metrics into the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

pub type SharedMetrics = Arc<NodeMetrics>;

/// `GET /metrics` in Prometheus text format. 500 if encoding fails.
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
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
