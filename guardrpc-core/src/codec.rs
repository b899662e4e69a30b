//! Encoding and decoding of JSON-RPC 2.0 messages
//!
//! The functions here are thin wrappers around `serde_json` that fold its
//! errors into the crate's error types:
//!
//! - **Outbound**: [`encode`] and [`encode_reply`] serialize envelopes
//! - **Inbound (server)**: [`classify`] inspects the first significant byte to
//!   tell a batch from a single request, and [`parse`] turns raw bytes into a
//!   JSON value or a Parse error
//! - **Inbound (client)**: [`decode_response`] and [`decode_reply`]
//!
//! Serialization always goes straight from the typed envelope to bytes, never
//! through an intermediate `Value`, so members keep their declared order
//! (`jsonrpc`, then `result` or `error`, then `id`).
//!
//! # Examples
//!
//! ```rust
//! use guardrpc_core::codec::{self, Shape};
//!
//! assert_eq!(codec::classify(b"  \n[{}]"), Shape::Batch);
//! assert_eq!(codec::classify(br#"{"jsonrpc":"2.0"}"#), Shape::Single);
//!
//! let err = codec::parse(b"{not json").unwrap_err();
//! assert_eq!(err.message, "Parse error");
//! ```

use crate::error::{Error, ErrorObject, Result};
use crate::types::{Reply, Response};
use serde::Serialize;
use serde_json::Value;

/// Shape of an inbound message, decided before parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// One request object (or anything that is not an array)
    Single,
    /// An array of requests
    Batch,
}

impl Shape {
    pub fn as_str(&self) -> &'static str {
        match self {
            Shape::Single => "single",
            Shape::Batch => "batch",
        }
    }
}

/// Decide whether `data` holds a batch
///
/// Skips JSON whitespace (space, tab, CR, LF) and looks at the first
/// remaining byte. Only `[` means batch; everything else, including empty
/// input, is treated as a single request and left to the parser to reject.
pub fn classify(data: &[u8]) -> Shape {
    let first = data
        .iter()
        .find(|b| !matches!(b, b' ' | b'\t' | b'\r' | b'\n'));
    match first {
        Some(b'[') => Shape::Batch,
        _ => Shape::Single,
    }
}

/// Parse raw bytes into a JSON value
///
/// Any failure (invalid UTF-8, syntax error, trailing garbage) maps to the
/// canonical Parse error object.
pub fn parse(data: &[u8]) -> std::result::Result<Value, ErrorObject> {
    serde_json::from_slice(data).map_err(|e| {
        tracing::debug!(error = %e, "Failed to parse inbound message");
        ErrorObject::parse_error()
    })
}

/// Serialize any message to a JSON string
pub fn encode<T: Serialize>(msg: &T) -> Result<String> {
    serde_json::to_string(msg).map_err(|e| Error::Serialization(e.to_string()))
}

/// Serialize a reply to bytes ready for the transport
pub fn encode_reply(reply: &Reply) -> Result<Vec<u8>> {
    serde_json::to_vec(reply).map_err(|e| Error::Serialization(e.to_string()))
}

/// Decode a single response
pub fn decode_response(data: &str) -> Result<Response> {
    serde_json::from_str(data).map_err(|e| Error::Serialization(e.to_string()))
}

/// Decode a single response or a batch of responses
pub fn decode_reply(data: &[u8]) -> Result<Reply> {
    serde_json::from_slice(data).map_err(|e| Error::Serialization(e.to_string()))
}
