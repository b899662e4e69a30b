//! Structural validation of a single request envelope
//!
//! [`validate`] takes one already-parsed JSON value (a whole single request or
//! one member of a batch) and decides whether it is a well-formed JSON-RPC 2.0
//! request. It is pure: no lookup, no logging, no allocation beyond the
//! accepted request itself.
//!
//! Decoding is strict. Unknown top-level members are rejected, and `id` and
//! `params` are type-checked rather than coerced.
//!
//! # Examples
//!
//! ```rust
//! use guardrpc_core::validate::{validate, InvalidEnvelope};
//! use serde_json::json;
//!
//! let ok = validate(&json!({"jsonrpc": "2.0", "method": "sum", "params": [1, 2], "id": 1}))
//!     .unwrap();
//! assert_eq!(ok.method, "sum");
//!
//! let err = validate(&json!({"jsonrpc": "2.0", "method": 1})).unwrap_err();
//! assert_eq!(err, InvalidEnvelope::MissingMethod);
//! ```

use crate::types::{is_valid_id, is_valid_params, Id, Maybe, JSONRPC_VERSION};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// A request envelope that passed every structural check
#[derive(Debug, Clone, PartialEq)]
pub struct ValidRequest {
    /// Non-empty method name
    pub method: String,
    /// Array or object params; an explicit `null` is cleared to `None`
    pub params: Option<Value>,
    /// Request id; `None` marks a notification
    pub id: Option<Id>,
}

impl ValidRequest {
    /// True when no reply may be sent for this request
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// Why an envelope was rejected
///
/// Only used for diagnostics. Every variant is reported to the peer as the
/// same plain Invalid Request error with a null id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidEnvelope {
    #[error("request is not a JSON object")]
    NotAnObject,

    #[error("malformed request object: {0}")]
    Malformed(String),

    #[error("jsonrpc member must be \"2.0\"")]
    WrongVersion,

    #[error("method member is missing or not a string")]
    MissingMethod,

    #[error("method member is empty")]
    EmptyMethod,

    #[error("id member must be a number or a string")]
    InvalidId,

    #[error("params member must be an array or an object")]
    InvalidParams,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEnvelope {
    #[serde(default)]
    jsonrpc: Maybe<Value>,
    #[serde(default)]
    method: Maybe<Value>,
    #[serde(default)]
    params: Maybe<Value>,
    #[serde(default)]
    id: Maybe<Value>,
}

/// Check one request envelope
///
/// # Arguments
///
/// * `raw` - A single JSON value; batch members are validated one at a time
///
/// # Returns
///
/// The accepted request, or the reason it was rejected.
pub fn validate(raw: &Value) -> Result<ValidRequest, InvalidEnvelope> {
    if !raw.is_object() {
        return Err(InvalidEnvelope::NotAnObject);
    }

    let envelope = RawEnvelope::deserialize(raw)
        .map_err(|e| InvalidEnvelope::Malformed(e.to_string()))?;

    match envelope.jsonrpc.as_option() {
        Some(Value::String(v)) if v == JSONRPC_VERSION => {}
        _ => return Err(InvalidEnvelope::WrongVersion),
    }

    let method = match envelope.method.into_option() {
        Some(Value::String(m)) => m,
        _ => return Err(InvalidEnvelope::MissingMethod),
    };
    if method.is_empty() {
        return Err(InvalidEnvelope::EmptyMethod);
    }

    if !is_valid_id(envelope.id.as_option()) {
        return Err(InvalidEnvelope::InvalidId);
    }
    if !is_valid_params(envelope.params.as_option()) {
        return Err(InvalidEnvelope::InvalidParams);
    }

    let id = match envelope.id.into_option() {
        Some(Value::Number(n)) => Some(Id::Number(n)),
        Some(Value::String(s)) => Some(Id::String(s)),
        _ => None,
    };

    Ok(ValidRequest {
        method,
        params: envelope.params.into_option(),
        id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_accepts_minimal_request() {
        let req = validate(&json!({"jsonrpc": "2.0", "method": "ping", "id": "a"})).unwrap();
        assert_eq!(req.method, "ping");
        assert_eq!(req.params, None);
        assert_eq!(req.id, Some(Id::from("a")));
        assert!(!req.is_notification());
    }

    #[test]
    fn test_notification_without_id() {
        let req = validate(&json!({"jsonrpc": "2.0", "method": "log", "params": {"m": 1}})).unwrap();
        assert!(req.is_notification());
        assert_eq!(req.params, Some(json!({"m": 1})));
    }

    #[test]
    fn test_null_id_is_notification() {
        let req = validate(&json!({"jsonrpc": "2.0", "method": "log", "id": null})).unwrap();
        assert!(req.is_notification());
    }

    #[test]
    fn test_null_params_cleared() {
        let req = validate(&json!({"jsonrpc": "2.0", "method": "m", "params": null, "id": 1}))
            .unwrap();
        assert_eq!(req.params, None);
    }

    #[test]
    fn test_numeric_id_kept_exactly() {
        let req = validate(&json!({"jsonrpc": "2.0", "method": "m", "id": 2.5})).unwrap();
        assert_eq!(serde_json::to_string(&req.id).unwrap(), "2.5");
    }

    #[test]
    fn test_rejects_non_object() {
        assert_eq!(validate(&json!(1)), Err(InvalidEnvelope::NotAnObject));
        assert_eq!(validate(&json!("x")), Err(InvalidEnvelope::NotAnObject));
        assert_eq!(validate(&json!([])), Err(InvalidEnvelope::NotAnObject));
        assert_eq!(validate(&json!(null)), Err(InvalidEnvelope::NotAnObject));
    }

    #[test]
    fn test_rejects_unknown_member() {
        let err = validate(&json!({"jsonrpc": "2.0", "method": "m", "id": 1, "extra": true}))
            .unwrap_err();
        assert!(matches!(err, InvalidEnvelope::Malformed(_)));
    }

    #[test]
    fn test_rejects_wrong_version() {
        for version in [json!("1.0"), json!(2.0), json!(null)] {
            let err = validate(&json!({"jsonrpc": version, "method": "m"})).unwrap_err();
            assert_eq!(err, InvalidEnvelope::WrongVersion);
        }
        let err = validate(&json!({"method": "m"})).unwrap_err();
        assert_eq!(err, InvalidEnvelope::WrongVersion);
    }

    #[test]
    fn test_rejects_bad_method() {
        assert_eq!(
            validate(&json!({"jsonrpc": "2.0", "id": 1})),
            Err(InvalidEnvelope::MissingMethod)
        );
        assert_eq!(
            validate(&json!({"jsonrpc": "2.0", "method": 1})),
            Err(InvalidEnvelope::MissingMethod)
        );
        assert_eq!(
            validate(&json!({"jsonrpc": "2.0", "method": ""})),
            Err(InvalidEnvelope::EmptyMethod)
        );
    }

    #[test]
    fn test_rejects_bad_id() {
        for id in [json!(true), json!([1]), json!({"n": 1})] {
            let err = validate(&json!({"jsonrpc": "2.0", "method": "m", "id": id})).unwrap_err();
            assert_eq!(err, InvalidEnvelope::InvalidId);
        }
    }

    #[test]
    fn test_rejects_scalar_params() {
        for params in [json!(1), json!("p"), json!(true)] {
            let err = validate(&json!({"jsonrpc": "2.0", "method": "m", "params": params}))
                .unwrap_err();
            assert_eq!(err, InvalidEnvelope::InvalidParams);
        }
    }
}
