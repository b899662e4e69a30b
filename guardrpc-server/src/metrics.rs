//! Server-side metrics collection using OpenTelemetry
//!
//! Instruments are created against the global meter provider, so they export
//! wherever [`guardrpc_core::init_observability`] pointed it, and are no-ops
//! when observability was never initialized.
//!
//! # Instruments
//!
//! - `guardrpc.server.connections.active` (gauge)
//! - `guardrpc.server.connections.total` (counter)
//! - `guardrpc.server.requests.total` (counter, `method` and `outcome`)
//! - `guardrpc.server.request.duration` (histogram, seconds)
//! - `guardrpc.server.batch.size` (histogram, `mode`)
//! - `guardrpc.server.defects.total` (counter, `method`)
//! - `guardrpc.server.errors.total` (counter, `error_type`)

use crate::guard::CallStatus;
use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Histogram, Meter},
    KeyValue,
};

/// Server metrics collector
pub struct ServerMetrics {
    pub connections_active: Gauge<i64>,
    pub connections_total: Counter<u64>,
    pub requests_total: Counter<u64>,
    pub request_duration: Histogram<f64>,
    pub batch_size: Histogram<u64>,
    pub defects_total: Counter<u64>,
    pub errors_total: Counter<u64>,
}

impl ServerMetrics {
    /// Create metrics on the global meter named after the service
    pub fn new(service_name: impl Into<String>) -> Self {
        // global::meter wants a &'static str; this runs once per server.
        let name: &'static str = Box::leak(service_name.into().into_boxed_str());
        let meter = global::meter(name);
        Self::new_with_meter(&meter)
    }

    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            connections_active: meter
                .i64_gauge("guardrpc.server.connections.active")
                .with_description("Number of active WebSocket connections")
                .build(),
            connections_total: meter
                .u64_counter("guardrpc.server.connections.total")
                .with_description("Total number of connections established")
                .build(),
            requests_total: meter
                .u64_counter("guardrpc.server.requests.total")
                .with_description("Total number of dispatched calls by outcome")
                .build(),
            request_duration: meter
                .f64_histogram("guardrpc.server.request.duration")
                .with_description("Handler execution time in seconds")
                .with_unit("s")
                .build(),
            batch_size: meter
                .u64_histogram("guardrpc.server.batch.size")
                .with_description("Number of members in batch requests")
                .build(),
            defects_total: meter
                .u64_counter("guardrpc.server.defects.total")
                .with_description("Handler calls replaced with an internal error")
                .build(),
            errors_total: meter
                .u64_counter("guardrpc.server.errors.total")
                .with_description("Protocol and transport errors by type")
                .build(),
        }
    }

    pub fn record_connection(&self, active: i64) {
        self.connections_active.record(active, &[]);
        self.connections_total.add(1, &[]);
    }

    pub fn record_disconnection(&self, active: i64) {
        self.connections_active.record(active, &[]);
    }

    /// Record one guarded handler call
    pub fn record_outcome(&self, method: &str, status: CallStatus, duration_secs: f64) {
        let attributes = &[
            KeyValue::new("method", method.to_string()),
            KeyValue::new("outcome", status.as_str()),
        ];
        self.requests_total.add(1, attributes);
        self.request_duration.record(duration_secs, attributes);

        if status == CallStatus::Defect {
            self.defects_total
                .add(1, &[KeyValue::new("method", method.to_string())]);
        }
    }

    pub fn record_batch(&self, size: u64, mode: &str) {
        self.batch_size
            .record(size, &[KeyValue::new("mode", mode.to_string())]);
    }

    /// Record a protocol or transport error
    ///
    /// `error_type` is a fixed label such as `"parse_error"` or
    /// `"method_not_found"`, never a client-supplied string.
    pub fn record_error(&self, error_type: &'static str) {
        self.errors_total
            .add(1, &[KeyValue::new("error_type", error_type)]);
    }
}

impl std::fmt::Debug for ServerMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerMetrics").finish_non_exhaustive()
    }
}
