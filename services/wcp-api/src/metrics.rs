//! Prometheus metrics exposition
//!
//! - `wcp_gate_decisions_total` (counter): label `outcome`
//! - `wcp_credentials_issued_total` (counter): label `kind`
//! - `wcp_identity_exchange_errors_total` (counter): label `error_type`
//! - `wcp_identity_exchange_duration_seconds` (histogram)

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

const EXCHANGE_DURATION: &str = "wcp_identity_exchange_duration_seconds";

/// Buckets from 5ms to 10s, covering the configurable exchange timeout.
const EXCHANGE_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

fn builder() -> PrometheusBuilder {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(EXCHANGE_DURATION.to_string()), EXCHANGE_BUCKETS)
        .expect("failed to set histogram buckets")
}

/// Install the global Prometheus recorder and return a handle for `/metrics`.
pub fn install_recorder() -> PrometheusHandle {
    builder()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Record one gate outcome: `allowed`, `missing_credential`,
/// `invalid_credential` or `inactive_account`.
pub fn record_gate_decision(outcome: &'static str) {
    metrics::counter!("wcp_gate_decisions_total", "outcome" => outcome).increment(1);
}

/// Record a minted credential, `kind` is `refresh` or `access`.
pub fn record_issued(kind: &'static str) {
    metrics::counter!("wcp_credentials_issued_total", "kind" => kind).increment(1);
}

/// Record one identity exchange call and, on failure, its class:
/// `rejected`, `transport` or `upstream`.
pub fn record_exchange(duration_secs: f64, error_type: Option<&'static str>) {
    metrics::histogram!(EXCHANGE_DURATION).record(duration_secs);
    if let Some(error_type) = error_type {
        metrics::counter!("wcp_identity_exchange_errors_total", "error_type" => error_type)
            .increment(1);
    }
}
