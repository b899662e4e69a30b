//! Client metrics definitions
//!
//! OpenTelemetry instruments for calls made by [`crate::RpcClient`]. They are
//! created on the global meter, so they export wherever
//! `guardrpc_core::init_observability` pointed it and cost nothing otherwise.
//!
//! # Metrics Collected
//!
//! - **requests_total**: calls made, by method and status (counter)
//! - **request_duration**: round-trip latency in seconds (histogram)
//! - **errors_total**: failed calls by error type (counter)
//! - **batch_size**: members per batch (histogram)
//!
//! # Examples
//!
//! ```rust,no_run
//! use guardrpc_client::{ClientBuilder, ClientMetrics};
//! use std::sync::Arc;
//!
//! # async fn example() -> guardrpc_core::Result<()> {
//! let client = ClientBuilder::new("ws://localhost:8080")
//!     .with_metrics(Arc::new(ClientMetrics::new("my-client")))
//!     .connect()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter},
    KeyValue,
};

/// Client metrics for monitoring
pub struct ClientMetrics {
    /// Total number of calls sent
    pub requests_total: Counter<u64>,
    /// Call duration in seconds
    pub request_duration: Histogram<f64>,
    /// Total number of failed calls
    pub errors_total: Counter<u64>,
    /// Batch size distribution
    pub batch_size: Histogram<u64>,
}

impl ClientMetrics {
    /// Create a new ClientMetrics instance
    pub fn new(service_name: impl Into<String>) -> Self {
        let name: &'static str = Box::leak(service_name.into().into_boxed_str());
        let meter = global::meter(name);
        Self::new_with_meter(&meter)
    }

    /// Create a new ClientMetrics instance with a custom meter
    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            requests_total: meter
                .u64_counter("guardrpc.client.requests.total")
                .with_description("Total number of calls sent")
                .build(),
            request_duration: meter
                .f64_histogram("guardrpc.client.request.duration")
                .with_description("Call round-trip time in seconds")
                .with_unit("s")
                .build(),
            errors_total: meter
                .u64_counter("guardrpc.client.errors.total")
                .with_description("Total number of failed calls")
                .build(),
            batch_size: meter
                .u64_histogram("guardrpc.client.batch.size")
                .with_description("Number of requests in batch calls")
                .build(),
        }
    }

    /// Record a finished call
    pub fn record_request(&self, method: &str, status: &str, duration_secs: f64) {
        let attributes = &[
            KeyValue::new("method", method.to_string()),
            KeyValue::new("status", status.to_string()),
        ];
        self.requests_total.add(1, attributes);
        self.request_duration.record(duration_secs, attributes);
    }

    /// Record an error
    pub fn record_error(&self, error_type: &str) {
        let attributes = &[KeyValue::new("error_type", error_type.to_string())];
        self.errors_total.add(1, attributes);
    }

    /// Record a batch operation
    pub fn record_batch(&self, size: u64) {
        self.batch_size.record(size, &[]);
    }
}

impl std::fmt::Debug for ClientMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientMetrics").finish_non_exhaustive()
    }
}
