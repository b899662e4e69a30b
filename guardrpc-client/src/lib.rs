//! JSON-RPC 2.0 client implementation over WebSocket
//!
//! This crate provides a small JSON-RPC 2.0 client for guardrpc servers. One
//! WebSocket frame carries one request (or batch) and one frame carries the
//! reply.
//!
//! # Core Features
//!
//! - **Request-Response**: typed results, random request ids, id checking
//! - **Notifications**: fire-and-forget calls
//! - **Batch Requests**: several calls in one message
//! - **Debug Logging**: `-->`/`<--` lines through `tracing`
//! - **Observability**: OpenTelemetry metrics for calls and errors
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use guardrpc_client::RpcClient;
//! use guardrpc_core::{Id, Request};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RpcClient::connect("ws://localhost:8080").await?;
//!
//!     // Make a request
//!     let sum: i64 = client.request("sum", [3, 4]).await?;
//!     println!("Result: {}", sum);
//!
//!     // Fire and forget
//!     client.notify("log", json!({"level": "info"})).await?;
//!
//!     // Batch
//!     let responses = client
//!         .batch(vec![
//!             Request::new("sum", Some(json!([1, 2])), Id::from(1i64)),
//!             Request::new("sum", Some(json!([3, 4])), Id::from(2i64)),
//!         ])
//!         .await?;
//!     println!("{} responses", responses.len());
//!
//!     client.close().await?;
//!     Ok(())
//! }
//! ```

mod client;
mod client_builder;
mod metrics;

pub use client::{RpcClient, MAX_REQUEST_ID};
pub use client_builder::ClientBuilder;
pub use metrics::ClientMetrics;
