//! Client builder for configuring options before connecting
//!
//! The `ClientBuilder` provides a fluent API for configuring client behavior
//! before connecting. It allows you to:
//! - Log every request and reply as `-->`/`<--` lines
//! - Record OpenTelemetry metrics, with or without initializing observability
//!
//! # Examples
//!
//! ```rust,no_run
//! use guardrpc_client::ClientBuilder;
//!
//! # async fn example() -> guardrpc_core::Result<()> {
//! // Debug logging
//! let client = ClientBuilder::new("ws://localhost:8080")
//!     .with_debug(true)
//!     .connect()
//!     .await?;
//!
//! // With observability
//! let client2 = ClientBuilder::new("ws://localhost:8080")
//!     .with_default_observability()
//!     .service_name("my-client")
//!     .connect()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::client::{self, RpcClient};
use crate::ClientMetrics;
use guardrpc_core::{Error, ObservabilityConfig, Result};
use std::sync::Arc;

/// Builder for configuring and creating an [`RpcClient`]
pub struct ClientBuilder {
    url: String,
    debug: bool,
    metrics: Option<Arc<ClientMetrics>>,
    observability_config: Option<ObservabilityConfig>,
    service_name: Option<String>,
}

impl ClientBuilder {
    /// Create a new client builder
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            debug: false,
            metrics: None,
            observability_config: None,
            service_name: None,
        }
    }

    /// Log requests and replies at debug level
    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    /// Record call metrics into `metrics`
    pub fn with_metrics(mut self, metrics: Arc<ClientMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Enable OpenTelemetry observability with custom configuration
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability_config = Some(config);
        self
    }

    /// Enable OpenTelemetry observability with default configuration
    pub fn with_default_observability(mut self) -> Self {
        self.observability_config = Some(ObservabilityConfig::default());
        self
    }

    /// Set service name for observability (used if observability is enabled)
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Build and connect the client
    pub async fn connect(self) -> Result<RpcClient> {
        let mut metrics = self.metrics;

        if let Some(mut config) = self.observability_config {
            if let Some(name) = self.service_name {
                config.service_name = name;
            }

            guardrpc_core::init_observability(config.clone()).map_err(|e| {
                Error::Config(format!("Failed to initialize observability: {}", e))
            })?;

            if metrics.is_none() {
                metrics = Some(Arc::new(ClientMetrics::new(config.service_name)));
            }
        }

        let stream = client::open(&self.url).await?;
        Ok(RpcClient::from_parts(stream, self.debug, metrics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let builder = ClientBuilder::new("ws://localhost:1");
        assert_eq!(builder.url, "ws://localhost:1");
        assert!(!builder.debug);
        assert!(builder.metrics.is_none());
        assert!(builder.observability_config.is_none());
    }

    #[test]
    fn test_builder_options() {
        let builder = ClientBuilder::new("ws://localhost:1")
            .with_debug(true)
            .with_metrics(Arc::new(ClientMetrics::new("builder-test")))
            .service_name("svc");
        assert!(builder.debug);
        assert!(builder.metrics.is_some());
        assert_eq!(builder.service_name.as_deref(), Some("svc"));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Port 1 is privileged and never has a WebSocket server in tests.
        let result = ClientBuilder::new("ws://127.0.0.1:1").connect().await;
        assert!(matches!(result, Err(Error::WebSocket(_))));
    }
}
