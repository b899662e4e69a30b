//! JSON-RPC 2.0 envelope model, validator and codec for guardrpc
//!
//! This crate holds everything about the protocol that does not depend on a
//! transport or on the set of registered methods:
//!
//! - **Types**: request, response and reply envelopes, ids and the
//!   absent/null/value tri-state used at the deserialization boundary
//! - **Errors**: the wire-format [`ErrorObject`] with its reserved codes, and
//!   the library [`Error`] type
//! - **Validation**: strict structural checks on one request envelope
//! - **Codec**: shape classification, parsing and encoding
//! - **Observability**: tracing and OpenTelemetry setup
//!
//! The `guardrpc-server` crate builds the dispatcher on top of these pieces,
//! and `guardrpc-client` uses them to talk to a server.
//!
//! # Example
//!
//! ```rust
//! use guardrpc_core::{codec, validate, Id, Response};
//! use serde_json::json;
//!
//! let raw = codec::parse(br#"{"jsonrpc":"2.0","method":"sum","params":[3,4],"id":"1"}"#)
//!     .unwrap();
//! let request = validate(&raw).unwrap();
//! assert_eq!(request.id, Some(Id::from("1")));
//!
//! let response = Response::success(json!(7), request.id);
//! assert_eq!(
//!     codec::encode(&response).unwrap(),
//!     r#"{"jsonrpc":"2.0","result":7,"id":"1"}"#
//! );
//! ```

pub mod codec;
pub mod error;
pub mod observability;
pub mod types;
pub mod validate;

pub use error::{Error, ErrorCode, ErrorObject, Result};
pub use observability::{init_observability, shutdown_observability, ObservabilityConfig};
pub use types::{
    is_valid_id, is_valid_params, BatchRequest, BatchResponse, Id, Maybe, Reply, Request,
    Response, ResponsePayload, Version, JSONRPC_VERSION,
};
pub use validate::{validate, InvalidEnvelope, ValidRequest};
