//! # Prometheus Metrics
//!
//! Exposes operational metrics for the vault node. Scraped by Prometheus
//! at the `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] with
//! the `custody` prefix so they do not collide with any default global
//! registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

use custody_ledger::Amount;

/// Holds all Prometheus metric handles for the node.
#[derive(Clone)]
pub struct VaultMetrics {
    registry: Registry,
    /// Committed deposits.
    pub deposits_total: IntCounter,
    /// Committed withdrawals.
    pub withdrawals_total: IntCounter,
    /// Rejected operations, labelled by error code.
    pub rejected_operations_total: IntCounterVec,
    /// Aggregate held in custody. A float gauge: claims are `u128`.
    pub custodied_amount: Gauge,
    /// Depositors with a non-zero claim.
    pub depositors: IntGauge,
    /// Deposit and withdraw latency, lock wait included.
    pub operation_latency_seconds: Histogram,
}

impl VaultMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("custody".into()), None)
            .expect("failed to create prometheus registry");

        let deposits_total = IntCounter::new("deposits_total", "Total committed deposits")
            .expect("metric creation");
        registry
            .register(Box::new(deposits_total.clone()))
            .expect("metric registration");

        let withdrawals_total = IntCounter::new("withdrawals_total", "Total committed withdrawals")
            .expect("metric creation");
        registry
            .register(Box::new(withdrawals_total.clone()))
            .expect("metric registration");

        let rejected_operations_total = IntCounterVec::new(
            Opts::new(
                "rejected_operations_total",
                "Deposits and withdrawals rejected, by reason",
            ),
            &["reason"],
        )
        .expect("metric creation");
        registry
            .register(Box::new(rejected_operations_total.clone()))
            .expect("metric registration");

        let custodied_amount = Gauge::new(
            "custodied_amount",
            "Aggregate amount held on behalf of depositors, in smallest units",
        )
        .expect("metric creation");
        registry
            .register(Box::new(custodied_amount.clone()))
            .expect("metric registration");

        let depositors = IntGauge::new("depositors", "Depositors with a non-zero claim")
            .expect("metric creation");
        registry
            .register(Box::new(depositors.clone()))
            .expect("metric registration");

        let operation_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "operation_latency_seconds",
                "Deposit and withdraw latency in seconds",
            )
            .buckets(vec![
                0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
            ]),
        )
        .expect("metric creation");
        registry
            .register(Box::new(operation_latency_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            deposits_total,
            withdrawals_total,
            rejected_operations_total,
            custodied_amount,
            depositors,
            operation_latency_seconds,
        }
    }

    /// Refreshes the gauges from a vault reading.
    pub fn observe_vault(&self, total: Amount, depositors: usize) {
        self.custodied_amount.set(total as f64);
        self.depositors.set(depositors as i64);
    }

    /// Counts a rejected operation under its error code.
    pub fn reject(&self, reason: &str) {
        self.rejected_operations_total
            .with_label_values(&[reason])
            .inc();
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<VaultMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_metrics_carry_the_prefix() {
        let metrics = VaultMetrics::new();
        metrics.deposits_total.inc();
        metrics.reject("zero_value_not_allowed");
        metrics.observe_vault(30, 2);

        let text = metrics.encode().unwrap();
        assert!(text.contains("custody_deposits_total 1"));
        assert!(text.contains("custody_rejected_operations_total{reason=\"zero_value_not_allowed\"} 1"));
        assert!(text.contains("custody_custodied_amount 30"));
        assert!(text.contains("custody_depositors 2"));
    }
}
