//! guardrpc - guarded JSON-RPC 2.0 dispatch over WebSocket
//!
//! This is the main convenience crate that re-exports all guardrpc sub-crates.
//! Use this crate if you want a single dependency that provides both client
//! and server functionality.
//!
//! # Architecture
//!
//! guardrpc is organized into modular crates:
//!
//! - **guardrpc-core**: envelope types, validation, codec, errors, observability
//! - **guardrpc-server**: registry, guarded dispatch, batching, WebSocket server
//! - **guardrpc-client**: WebSocket JSON-RPC client
//!
//! # Quick Start - Server
//!
//! ```rust,no_run
//! use guardrpc::RpcServer;
//! use guardrpc::server::from_typed_fn;
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
//! # Quick Start - Client
//!
//! ```rust,no_run
//! use guardrpc::RpcClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RpcClient::connect("ws://localhost:8080").await?;
//!
//!     let result: i32 = client.request("add", serde_json::json!({"a": 5, "b": 3})).await?;
//!     println!("Result: {}", result);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Without a Network
//!
//! ```rust
//! use guardrpc::server::{from_typed_fn, Dispatcher, RegistryBuilder, TransportContext};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let mut registry = RegistryBuilder::new();
//! registry
//!     .register("sum", from_typed_fn(|n: Vec<i64>| async move { Ok(n.iter().sum::<i64>()) }))
//!     .unwrap();
//! let dispatcher = Dispatcher::new(registry.build());
//!
//! let reply = dispatcher.handle_bytes(b"[]", &TransportContext::detached()).await;
//! assert_eq!(
//!     reply.as_deref(),
//!     Some(&br#"{"jsonrpc":"2.0","error":{"code":-32600,"message":"Invalid Request"},"id":null}"#[..])
//! );
//! # }
//! ```

pub use guardrpc_client as client;
pub use guardrpc_core as core;
pub use guardrpc_server as server;

pub use guardrpc_client::RpcClient;
pub use guardrpc_core::{Error, ErrorObject, Result};
pub use guardrpc_server::RpcServer;
