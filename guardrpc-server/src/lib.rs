//! JSON-RPC 2.0 server with guarded handler dispatch
//!
//! This crate turns raw inbound messages into JSON-RPC 2.0 replies. It owns
//! the protocol rules (classification, validation, batching, notification
//! suppression) and runs every handler behind a guard, so a handler that
//! panics, returns garbage or leaks a reserved error code can never produce
//! an invalid response.
//!
//! # Core Features
//!
//! - **Dispatcher**: bytes in, optional reply out; transport independent
//! - **Method Registry**: frozen name-to-handler map with reserved `rpc.` names
//! - **Guard**: contains panics and normalizes handler results
//! - **Batch Processing**: parallel or sequential, with an optional size limit
//! - **WebSocket Transport**: one message per frame, replies as text frames
//! - **Cancellation**: handlers can observe the connection going away
//! - **Observability**: OpenTelemetry integration for traces and metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use guardrpc_server::{from_typed_fn, RpcServer};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct AddParams { a: i32, b: i32 }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = RpcServer::builder()
//!         .bind_str("127.0.0.1:8080")?
//!         .handler("add", from_typed_fn(|p: AddParams| async move {
//!             Ok(p.a + p.b)
//!         }))
//!         .build()
//!         .await?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **Main task**: accepts TCP connections
//! - **Connection tasks**: WebSocket upgrade, then one task per inbound message
//! - **Dispatcher**: shared by all connections behind an `Arc`
//!
//! Without a network, drive a [`Dispatcher`] directly with
//! [`Dispatcher::handle_bytes`].

mod builder;
mod connection;
mod context;
mod dispatch;
mod guard;
mod handler;
mod metrics;
mod registry;

pub use builder::{
    ServerBuilder, ENV_BATCH_MODE, ENV_BIND, ENV_DEBUG_HANDLERS, ENV_MAX_BATCH_SIZE,
};
pub use context::{CallContext, CancelHandle, TransportContext};
pub use dispatch::{BatchMode, Dispatcher};
pub use guard::{call_guarded, CallStatus};
pub use handler::{
    from_fn, from_typed_ctx_fn, from_typed_fn, AsyncHandler, Handler, HandlerFuture,
    HandlerOutcome, MethodError,
};
pub use metrics::ServerMetrics;
pub use registry::{MethodLookup, MethodRegistry, RegistryBuilder, RESERVED_PREFIX};

use guardrpc_core::Result;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;

/// JSON-RPC 2.0 server over WebSocket
///
/// # Lifecycle
///
/// 1. **Build**: create the server with `RpcServer::builder()`
/// 2. **Run**: call `server.run().await` to accept connections
/// 3. **Shutdown**: drop the future returned by `run` (or abort its task);
///    open connections keep running until their peers disconnect
pub struct RpcServer {
    pub(crate) listener: TcpListener,
    pub(crate) dispatcher: Arc<Dispatcher>,
    /// Number of open WebSocket connections
    pub(crate) active: Arc<AtomicI64>,
    pub(crate) metrics: Option<Arc<ServerMetrics>>,
}

impl RpcServer {
    /// Create a new server builder
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// The address the listener is bound to
    ///
    /// Useful after binding port 0.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// The dispatcher shared by every connection
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Number of currently open connections
    pub fn active_connections(&self) -> i64 {
        self.active.load(Ordering::SeqCst)
    }

    /// Run the server and accept connections
    ///
    /// Each accepted connection is served on its own task. Runs until
    /// accepting fails.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the listener fails to accept a connection.
    #[tracing::instrument(skip(self), name = "server.run")]
    pub async fn run(&self) -> Result<()> {
        tracing::info!(
            methods = ?self.dispatcher.registry().methods(),
            "Starting guardrpc server"
        );
        let conn_counter = AtomicU64::new(0);

        loop {
            let (stream, addr) = self.listener.accept().await?;
            let conn_id = conn_counter.fetch_add(1, Ordering::SeqCst);
            let dispatcher = Arc::clone(&self.dispatcher);
            let active = Arc::clone(&self.active);
            let metrics = self.metrics.clone();

            tracing::info!(conn_id = conn_id, addr = %addr, "New connection accepted");

            tokio::spawn(async move {
                if let Err(e) =
                    connection::handle_connection(stream, conn_id, dispatcher, active, metrics)
                        .await
                {
                    tracing::error!(conn_id = conn_id, error = %e, "Connection error");
                }
            });
        }
    }
}

impl std::fmt::Debug for RpcServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcServer")
            .field("local_addr", &self.listener.local_addr().ok())
            .field("dispatcher", &self.dispatcher)
            .field("active", &self.active_connections())
            .finish_non_exhaustive()
    }
}
