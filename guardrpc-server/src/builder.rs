//! Server builder for configuring and creating RPC servers
//!
//! This module provides a fluent builder API for configuring servers. Every
//! option has a sensible default; only the bind address is required.
//!
//! # Configuration Options
//!
//! - **Bind address**: `bind` / `bind_str`, or `GUARDRPC_BIND` via `from_env`
//! - **Handlers**: `handler` registers one method, `registry` swaps in a
//!   prepared [`RegistryBuilder`]
//! - **Batch processing**: `batch_mode` and `max_batch_size`
//! - **Diagnostics**: `debug_handlers` logs params and return values of
//!   handlers that misbehave
//! - **Observability**: `with_observability`, `with_default_observability`,
//!   `service_name`
//!
//! Registration errors (empty, duplicate or reserved names) are remembered
//! and returned by [`ServerBuilder::build`], so a misconfigured server never
//! starts.
//!
//! # Environment
//!
//! [`ServerBuilder::from_env`] reads:
//!
//! - `GUARDRPC_BIND`: socket address, e.g. `0.0.0.0:8080`
//! - `GUARDRPC_MAX_BATCH_SIZE`: positive integer
//! - `GUARDRPC_BATCH_MODE`: `parallel` or `sequential`
//! - `GUARDRPC_DEBUG_HANDLERS`: `1`/`true`/`yes` or `0`/`false`/`no`
//!
//! # Examples
//!
//! ```rust,no_run
//! use guardrpc_server::{from_typed_fn, BatchMode, RpcServer};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let server = RpcServer::builder()
//!     .bind_str("127.0.0.1:8080")?
//!     .handler("sum", from_typed_fn(|n: Vec<i64>| async move { Ok(n.iter().sum::<i64>()) }))
//!     .batch_mode(BatchMode::Sequential)
//!     .max_batch_size(100)
//!     .build()
//!     .await?;
//!
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

use crate::dispatch::{BatchMode, Dispatcher};
use crate::handler::Handler;
use crate::metrics::ServerMetrics;
use crate::registry::RegistryBuilder;
use crate::RpcServer;
use guardrpc_core::{Error, ObservabilityConfig, Result};
use std::net::SocketAddr;
use std::sync::atomic::AtomicI64;
use std::sync::Arc;
use tokio::net::TcpListener;

pub const ENV_BIND: &str = "GUARDRPC_BIND";
pub const ENV_MAX_BATCH_SIZE: &str = "GUARDRPC_MAX_BATCH_SIZE";
pub const ENV_BATCH_MODE: &str = "GUARDRPC_BATCH_MODE";
pub const ENV_DEBUG_HANDLERS: &str = "GUARDRPC_DEBUG_HANDLERS";

/// Builder for configuring an [`RpcServer`]
pub struct ServerBuilder {
    addr: Option<SocketAddr>,
    registry: RegistryBuilder,
    registration_error: Option<Error>,
    batch_mode: BatchMode,
    max_batch_size: Option<usize>,
    debug_handlers: bool,
    observability_config: Option<ObservabilityConfig>,
    service_name: Option<String>,
}

impl ServerBuilder {
    /// Create a new server builder with default settings
    pub fn new() -> Self {
        Self {
            addr: None,
            registry: RegistryBuilder::new(),
            registration_error: None,
            batch_mode: BatchMode::default(),
            max_batch_size: None,
            debug_handlers: false,
            observability_config: None,
            service_name: None,
        }
    }

    /// Create a builder preconfigured from `GUARDRPC_*` environment variables
    ///
    /// Unset variables leave the defaults in place.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when a variable is set but malformed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::new();

        if let Some(addr) = lookup(ENV_BIND) {
            builder = builder.bind_str(&addr)?;
        }

        if let Some(raw) = lookup(ENV_MAX_BATCH_SIZE) {
            let limit: usize = raw.trim().parse().map_err(|e| {
                Error::Config(format!("{} must be a positive integer: {}", ENV_MAX_BATCH_SIZE, e))
            })?;
            check_batch_limit(limit)?;
            builder = builder.max_batch_size(limit);
        }

        if let Some(raw) = lookup(ENV_BATCH_MODE) {
            builder = builder.batch_mode(raw.parse()?);
        }

        if let Some(raw) = lookup(ENV_DEBUG_HANDLERS) {
            builder = builder.debug_handlers(parse_flag(ENV_DEBUG_HANDLERS, &raw)?);
        }

        Ok(builder)
    }

    /// Set the bind address for the server
    pub fn bind(mut self, addr: impl Into<SocketAddr>) -> Self {
        self.addr = Some(addr.into());
        self
    }

    /// Set the bind address from a string (e.g., "127.0.0.1:8080")
    pub fn bind_str(mut self, addr: &str) -> Result<Self> {
        let addr: SocketAddr = addr
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address {:?}: {}", addr, e)))?;
        self.addr = Some(addr);
        Ok(self)
    }

    /// Register a handler for a method
    ///
    /// The first registration error is kept and reported by `build`.
    pub fn handler(mut self, method: impl Into<String>, handler: Box<dyn Handler>) -> Self {
        if let Err(e) = self.registry.register(method, handler) {
            tracing::warn!(error = %e, "Rejected handler registration");
            self.registration_error.get_or_insert(e);
        }
        self
    }

    /// Use a prepared registry (replaces any previously registered handlers)
    pub fn registry(mut self, registry: RegistryBuilder) -> Self {
        self.registry = registry;
        self
    }

    /// Set the batch processing mode
    pub fn batch_mode(mut self, mode: BatchMode) -> Self {
        self.batch_mode = mode;
        self
    }

    /// Set the maximum number of members per batch
    ///
    /// Must be at least 1; a zero limit is reported by `build`.
    pub fn max_batch_size(mut self, max_size: usize) -> Self {
        self.max_batch_size = Some(max_size);
        self
    }

    /// Log params and raw return values when a handler misbehaves
    pub fn debug_handlers(mut self, enabled: bool) -> Self {
        self.debug_handlers = enabled;
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

    /// Build the server and bind its listener
    ///
    /// # Errors
    ///
    /// - the first handler registration error, if any
    /// - `Error::Config` when no bind address was given, the batch limit is
    ///   zero, or observability fails to initialize
    /// - `Error::Io` when the address cannot be bound
    pub async fn build(self) -> Result<RpcServer> {
        if let Some(e) = self.registration_error {
            return Err(e);
        }

        let addr = self
            .addr
            .ok_or_else(|| Error::Config("No bind address specified".to_string()))?;
        if let Some(limit) = self.max_batch_size {
            check_batch_limit(limit)?;
        }

        let metrics = match self.observability_config {
            Some(mut config) => {
                if let Some(name) = self.service_name {
                    config.service_name = name;
                }
                guardrpc_core::init_observability(config.clone()).map_err(|e| {
                    Error::Config(format!("Failed to initialize observability: {}", e))
                })?;
                Some(Arc::new(ServerMetrics::new(config.service_name)))
            }
            None => None,
        };

        let registry = self.registry.build();
        let mut dispatcher = Dispatcher::new(registry)
            .with_batch_mode(self.batch_mode)
            .with_max_batch_size(self.max_batch_size)
            .with_diagnostics(self.debug_handlers);
        if let Some(ref m) = metrics {
            dispatcher = dispatcher.with_metrics(Arc::clone(m));
        }

        let listener = TcpListener::bind(addr).await?;

        tracing::info!(
            addr = %addr,
            methods = dispatcher.registry().len(),
            batch_mode = self.batch_mode.as_str(),
            max_batch_size = ?self.max_batch_size,
            "Server listening"
        );

        Ok(RpcServer {
            listener,
            dispatcher: Arc::new(dispatcher),
            active: Arc::new(AtomicI64::new(0)),
            metrics,
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn check_batch_limit(limit: usize) -> Result<()> {
    if limit == 0 {
        return Err(Error::Config(
            "maximum batch size must be a positive integer".to_string(),
        ));
    }
    Ok(())
}

fn parse_flag(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" | "" => Ok(false),
        other => Err(Error::Config(format!("{} must be a boolean, got {:?}", name, other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{from_fn, HandlerOutcome};
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn noop() -> Box<dyn Handler> {
        from_fn(|_ctx, _params| async { HandlerOutcome::Success(serde_json::Value::Bool(true)) })
    }

    #[test]
    fn test_from_lookup_defaults() {
        let builder = ServerBuilder::from_lookup(env(&[])).unwrap();
        assert!(builder.addr.is_none());
        assert_eq!(builder.batch_mode, BatchMode::Parallel);
        assert_eq!(builder.max_batch_size, None);
        assert!(!builder.debug_handlers);
    }

    #[test]
    fn test_from_lookup_reads_all_variables() {
        let builder = ServerBuilder::from_lookup(env(&[
            (ENV_BIND, "127.0.0.1:9000"),
            (ENV_MAX_BATCH_SIZE, "25"),
            (ENV_BATCH_MODE, "sequential"),
            (ENV_DEBUG_HANDLERS, "yes"),
        ]))
        .unwrap();

        assert_eq!(builder.addr, Some("127.0.0.1:9000".parse().unwrap()));
        assert_eq!(builder.max_batch_size, Some(25));
        assert_eq!(builder.batch_mode, BatchMode::Sequential);
        assert!(builder.debug_handlers);
    }

    #[test]
    fn test_from_lookup_rejects_malformed_values() {
        let cases = [
            (ENV_BIND, "not-an-address"),
            (ENV_MAX_BATCH_SIZE, "many"),
            (ENV_MAX_BATCH_SIZE, "0"),
            (ENV_BATCH_MODE, "random"),
            (ENV_DEBUG_HANDLERS, "maybe"),
        ];
        for (key, value) in cases {
            let result = ServerBuilder::from_lookup(env(&[(key, value)]));
            assert!(
                matches!(result, Err(Error::Config(_))),
                "{}={} should be rejected",
                key,
                value
            );
        }
    }

    #[tokio::test]
    async fn test_build_requires_address() {
        let result = ServerBuilder::new().build().await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_build_rejects_zero_batch_limit() {
        let result = ServerBuilder::new()
            .bind_str("127.0.0.1:0")
            .unwrap()
            .max_batch_size(0)
            .build()
            .await;
        assert!(matches!(result, Err(Error::Config(_))));

        let server = ServerBuilder::new()
            .bind_str("127.0.0.1:0")
            .unwrap()
            .max_batch_size(1)
            .build()
            .await;
        assert!(server.is_ok());
    }

    #[tokio::test]
    async fn test_build_reports_first_registration_error() {
        let result = ServerBuilder::new()
            .bind_str("127.0.0.1:0")
            .unwrap()
            .handler("rpc.internal", noop())
            .handler("", noop())
            .build()
            .await;
        assert!(matches!(result, Err(Error::ReservedMethodName(_))));
    }

    #[tokio::test]
    async fn test_build_rejects_duplicate_methods() {
        let result = ServerBuilder::new()
            .bind_str("127.0.0.1:0")
            .unwrap()
            .handler("sum", noop())
            .handler("sum", noop())
            .build()
            .await;
        assert!(matches!(result, Err(Error::DuplicateMethod(_))));
    }
}
