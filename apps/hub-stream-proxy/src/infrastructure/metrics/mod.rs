//! Prometheus Metrics Module
//!
//! Exposes application metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Sessions**: stream sessions started, finished and their duration
//! - **Publications**: publications sent to and received from the hub
//! - **Consumer**: pushes dispatched by kind, decode faults, reconnects
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::domain::envelope::PushKind;
use crate::infrastructure::grpc::session::SessionMode;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let builder = PrometheusBuilder::new();
            let handle = builder
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
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
    // Stream sessions (server side)
    describe_counter!(
        "hub_stream_sessions_started_total",
        "Stream sessions accepted from the hub"
    );
    describe_counter!(
        "hub_stream_sessions_finished_total",
        "Stream sessions finished, by outcome"
    );
    describe_gauge!(
        "hub_stream_active_sessions",
        "Stream sessions currently running"
    );
    describe_histogram!(
        "hub_stream_session_duration_seconds",
        "Wall time from session start to end"
    );
    describe_counter!(
        "hub_stream_publications_sent_total",
        "Publications sent to the hub"
    );
    describe_counter!(
        "hub_stream_publications_received_total",
        "Publications received from the hub on bidirectional sessions"
    );
    describe_counter!(
        "hub_stream_malformed_payloads_total",
        "Client payloads that could not be parsed"
    );

    // Push consumer (client side)
    describe_counter!(
        "hub_stream_pushes_dispatched_total",
        "Push envelopes dispatched, by kind"
    );
    describe_counter!(
        "hub_stream_push_decode_errors_total",
        "Push envelopes dropped because their payload failed to decode"
    );
    describe_counter!(
        "hub_stream_handler_errors_total",
        "Push handler callbacks that returned an error"
    );
    describe_counter!(
        "hub_stream_reconnect_attempts_total",
        "Push stream connection attempts"
    );
    describe_gauge!(
        "hub_stream_consumer_consecutive_failures",
        "Consecutive connection failures of the push consumer"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record a session accepted from the hub.
pub fn record_session_started(mode: SessionMode) {
    counter!("hub_stream_sessions_started_total", "mode" => mode.as_str()).increment(1);
    gauge!("hub_stream_active_sessions").increment(1.0);
}

/// Record a finished session and its duration.
pub fn record_session_finished(mode: SessionMode, outcome: &'static str, elapsed: Duration) {
    counter!(
        "hub_stream_sessions_finished_total",
        "mode" => mode.as_str(),
        "outcome" => outcome
    )
    .increment(1);
    gauge!("hub_stream_active_sessions").decrement(1.0);
    histogram!("hub_stream_session_duration_seconds", "mode" => mode.as_str())
        .record(elapsed.as_secs_f64());
}

/// Record a publication sent to the hub.
pub fn record_publication_sent(mode: SessionMode) {
    counter!("hub_stream_publications_sent_total", "mode" => mode.as_str()).increment(1);
}

/// Record a publication received from the hub.
pub fn record_publication_received(mode: SessionMode) {
    counter!("hub_stream_publications_received_total", "mode" => mode.as_str()).increment(1);
}

/// Record an unparseable client payload.
pub fn record_malformed_payload(mode: SessionMode) {
    counter!("hub_stream_malformed_payloads_total", "mode" => mode.as_str()).increment(1);
}

/// Record a dispatched push envelope.
pub fn record_push_dispatched(kind: PushKind) {
    counter!("hub_stream_pushes_dispatched_total", "kind" => kind.as_str()).increment(1);
}

/// Record a push dropped on a payload decode fault.
pub fn record_push_decode_error(kind: PushKind) {
    counter!("hub_stream_push_decode_errors_total", "kind" => kind.as_str()).increment(1);
}

/// Record a failed handler callback.
pub fn record_handler_error(kind: PushKind) {
    counter!("hub_stream_handler_errors_total", "kind" => kind.as_str()).increment(1);
}

/// Record a push stream connection attempt.
pub fn record_reconnect_attempt() {
    counter!("hub_stream_reconnect_attempts_total").increment(1);
}

/// Update the consumer's consecutive failure count.
pub fn set_consecutive_failures(failures: u32) {
    gauge!("hub_stream_consumer_consecutive_failures").set(f64::from(failures));
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_noop() {
        record_push_dispatched(PushKind::Unknown);
        record_session_started(SessionMode::Unidirectional);
        record_session_finished(SessionMode::Unidirectional, "ok", Duration::from_millis(5));
        set_consecutive_failures(3);
    }
}
