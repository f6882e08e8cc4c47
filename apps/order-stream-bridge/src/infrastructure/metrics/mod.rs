//! Prometheus Metrics Module
//!
//! Exposes bridge metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Ingestion**: records received, decode failures, read errors
//! - **Dispatch**: orders submitted, dropped orders by reason, latency
//! - **Relay**: execution events published, failed and dropped
//! - **Consumption**: current mode and direct reader count
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port. Recording
//! before `init_metrics` is a no-op.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::domain::consumption::ConsumptionMode;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder. Repeated calls return the
/// handle installed by the first one.
///
/// # Errors
///
/// Returns `BuildError` if the global recorder cannot be installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "order_bridge_records_received_total",
        "Order records read from the orders topic"
    );
    describe_counter!(
        "order_bridge_decode_failures_total",
        "Order records dropped because they did not decode"
    );
    describe_counter!(
        "order_bridge_read_errors_total",
        "Failed read attempts by reader and error kind"
    );

    describe_counter!(
        "order_bridge_orders_dispatched_total",
        "Orders submitted to the trading session"
    );
    describe_counter!(
        "order_bridge_dispatch_failures_total",
        "Orders dropped by the dispatcher by reason"
    );
    describe_histogram!(
        "order_bridge_dispatch_seconds",
        "Time from identity resolution to session acceptance"
    );

    describe_counter!(
        "order_bridge_executions_published_total",
        "Execution events acknowledged by the broker"
    );
    describe_counter!(
        "order_bridge_executions_failed_total",
        "Execution events that failed to serialize or publish"
    );
    describe_counter!(
        "order_bridge_executions_dropped_total",
        "Execution events dropped before publishing"
    );

    describe_gauge!(
        "order_bridge_consumption_mode",
        "1 for the active consumption mode, 0 otherwise"
    );
    describe_gauge!(
        "order_bridge_direct_readers",
        "Running direct partition readers"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record an order record read by `reader` (`group` or `direct`).
pub fn record_record_received(reader: &'static str) {
    counter!("order_bridge_records_received_total", "reader" => reader).increment(1);
}

/// Record a record dropped by the decoder.
pub fn record_decode_failure() {
    counter!("order_bridge_decode_failures_total").increment(1);
}

/// Record a failed read attempt.
pub fn record_read_error(reader: &'static str, kind: &'static str) {
    counter!(
        "order_bridge_read_errors_total",
        "reader" => reader,
        "kind" => kind
    )
    .increment(1);
}

/// Record an order accepted by the trading session.
pub fn record_order_dispatched() {
    counter!("order_bridge_orders_dispatched_total").increment(1);
}

/// Record an order dropped by the dispatcher.
pub fn record_dispatch_failure(reason: &'static str) {
    counter!("order_bridge_dispatch_failures_total", "reason" => reason).increment(1);
}

/// Record dispatch latency.
pub fn record_dispatch_duration(duration: Duration) {
    histogram!("order_bridge_dispatch_seconds").record(duration.as_secs_f64());
}

/// Record an execution event acknowledged by the broker.
pub fn record_execution_published() {
    counter!("order_bridge_executions_published_total").increment(1);
}

/// Record an execution event that failed to serialize or publish.
pub fn record_execution_publish_failed() {
    counter!("order_bridge_executions_failed_total").increment(1);
}

/// Record an execution event dropped before publishing.
pub fn record_execution_dropped() {
    counter!("order_bridge_executions_dropped_total").increment(1);
}

/// Mark `mode` as the active consumption mode.
pub fn set_consumption_mode(mode: ConsumptionMode) {
    for candidate in [ConsumptionMode::Group, ConsumptionMode::Direct] {
        let value = if candidate == mode { 1.0 } else { 0.0 };
        gauge!("order_bridge_consumption_mode", "mode" => candidate.as_str()).set(value);
    }
}

/// Update the running direct reader count.
#[allow(clippy::cast_precision_loss)]
pub fn set_direct_readers(count: usize) {
    gauge!("order_bridge_direct_readers").set(count as f64);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_noop() {
        record_record_received("group");
        record_read_error("direct", "timeout");
        record_dispatch_failure("unknown_identity");
        record_dispatch_duration(Duration::from_millis(3));
        set_consumption_mode(ConsumptionMode::Direct);
        set_direct_readers(3);
    }
}
