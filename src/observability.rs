use std::net::SocketAddr;
use std::time::Instant;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: booking operations executed. Labels: op, status.
pub const BOOKING_OPS_TOTAL: &str = "roost_booking_ops_total";

/// Histogram: operation latency in seconds, excluding the simulated round
/// trip. Labels: op.
pub const OP_DURATION_SECONDS: &str = "roost_op_duration_seconds";

/// Counter: submissions rejected for a date-range conflict.
pub const CONFLICTS_TOTAL: &str = "roost_conflicts_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: number of sessions with a loaded engine.
pub const SESSIONS_ACTIVE: &str = "roost_sessions_active";

/// Histogram: journal group-commit flush duration in seconds.
pub const JOURNAL_FLUSH_DURATION_SECONDS: &str = "roost_journal_flush_duration_seconds";

/// Histogram: journal group-commit batch size (events per flush).
pub const JOURNAL_FLUSH_BATCH_SIZE: &str = "roost_journal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Record one API operation outcome.
pub fn record_op(op: &'static str, status: &'static str, started: Instant) {
    metrics::counter!(BOOKING_OPS_TOTAL, "op" => op, "status" => status).increment(1);
    metrics::histogram!(OP_DURATION_SECONDS, "op" => op).record(started.elapsed().as_secs_f64());
}
