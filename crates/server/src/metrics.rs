//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the stillfade server:
//! - HTTP request metrics (latency, counts, in flight)
//! - WebSocket connection metrics
//! - Upload and transcode outcomes
//! - Session state (collected dynamically)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge,
    Opts, Registry, TextEncoder,
};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "stillfade_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("stillfade_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "stillfade_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// WebSocket Metrics
// =============================================================================

/// Active WebSocket connections.
pub static WS_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "stillfade_ws_connections_active",
        "Number of active WebSocket connections",
    )
    .unwrap()
});

/// Total WebSocket connections (cumulative).
pub static WS_CONNECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "stillfade_ws_connections_total",
        "Total WebSocket connections since startup",
    )
    .unwrap()
});

/// WebSocket messages sent by type.
pub static WS_MESSAGES_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("stillfade_ws_messages_sent_total", "WebSocket messages sent"),
        &["type"],
    )
    .unwrap()
});

/// WebSocket lag events (when client falls behind).
pub static WS_LAG_EVENTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "stillfade_ws_lag_events_total",
        "WebSocket lag events (client fell behind)",
    )
    .unwrap()
});

// =============================================================================
// Session Metrics
// =============================================================================

/// Upload attempts by outcome.
pub static UPLOADS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("stillfade_uploads_total", "Upload attempts by outcome"),
        &["outcome"],
    )
    .unwrap()
});

/// Transcode attempts by outcome.
pub static TRANSCODES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("stillfade_transcodes_total", "Transcode attempts by outcome"),
        &["outcome"],
    )
    .unwrap()
});

/// Duration of transcodes that ran, in seconds.
pub static TRANSCODE_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "stillfade_transcode_duration_seconds",
            "Wall time of successful transcodes",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 40.0, 80.0]),
    )
    .unwrap()
});

/// Whether the engine is ready (collected dynamically).
pub static ENGINE_READY: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "stillfade_engine_ready",
        "Whether the engine is loaded (1) or not (0)",
    )
    .unwrap()
});

/// Whether a transcode is running (collected dynamically).
pub static TRANSCODE_IN_PROGRESS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "stillfade_transcode_in_progress",
        "Whether a transcode is running (1) or not (0)",
    )
    .unwrap()
});

/// Live object references (collected dynamically).
pub static LIVE_OBJECTS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("stillfade_live_objects", "Number of live object references").unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // WebSocket
    registry
        .register(Box::new(WS_CONNECTIONS_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_CONNECTIONS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_MESSAGES_SENT.clone()))
        .unwrap();
    registry.register(Box::new(WS_LAG_EVENTS.clone())).unwrap();

    // Session
    registry.register(Box::new(UPLOADS_TOTAL.clone())).unwrap();
    registry
        .register(Box::new(TRANSCODES_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(TRANSCODE_DURATION.clone()))
        .unwrap();
    registry.register(Box::new(ENGINE_READY.clone())).unwrap();
    registry
        .register(Box::new(TRANSCODE_IN_PROGRESS.clone()))
        .unwrap();
    registry.register(Box::new(LIVE_OBJECTS.clone())).unwrap();
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so the session gauges reflect current values.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let session = state.session();
    ENGINE_READY.set(if session.status().await.is_ready() { 1 } else { 0 });
    TRANSCODE_IN_PROGRESS.set(if session.is_generating() { 1 } else { 0 });
    LIVE_OBJECTS.set(session.objects().live_count() as i64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("stillfade_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_session_metrics() {
        // Vec metrics only appear once a label set has been touched.
        UPLOADS_TOTAL.with_label_values(&["accepted"]).inc();
        TRANSCODES_TOTAL.with_label_values(&["success"]).inc();
        TRANSCODE_DURATION.observe(1.5);
        ENGINE_READY.set(1);
        LIVE_OBJECTS.set(0);

        let output = encode_metrics();
        assert!(output.contains("stillfade_uploads_total"));
        assert!(output.contains("stillfade_transcodes_total"));
        assert!(output.contains("stillfade_transcode_duration_seconds"));
        assert!(output.contains("stillfade_engine_ready"));
        assert!(output.contains("stillfade_live_objects"));
        assert!(output.contains("stillfade_ws_connections_active"));
    }
}
