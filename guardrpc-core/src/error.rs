//! Error types for guardrpc
//!
//! Two kinds of error live here:
//!
//! - **ErrorObject**: the wire-format error carried in the `error` member of a
//!   JSON-RPC 2.0 response, together with its numeric [`ErrorCode`]
//! - **Error**: the Rust-side error returned by fallible library operations
//!   (registration, transport, client calls)
//!
//! # Reserved Codes
//!
//! JSON-RPC 2.0 reserves the band `-32768..=-32000` for the protocol itself.
//! Five codes inside it have a fixed meaning:
//!
//! - `-32700`: Parse error (invalid JSON)
//! - `-32600`: Invalid Request (not a valid request envelope)
//! - `-32601`: Method not found
//! - `-32602`: Invalid params
//! - `-32603`: Internal error
//!
//! Every code outside the band belongs to the application.
//!
//! # Examples
//!
//! ```rust
//! use guardrpc_core::{ErrorCode, ErrorObject};
//! use serde_json::json;
//!
//! let error = ErrorObject::method_not_found();
//! assert_eq!(error.code, ErrorCode::METHOD_NOT_FOUND);
//! assert_eq!(error.message, "Method not found");
//!
//! let custom = ErrorObject::new(1001, "Insufficient funds")
//!     .with_data(json!({"balance": 50, "required": 100}));
//! assert!(!custom.code.is_reserved());
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Result type for guardrpc operations
pub type Result<T> = std::result::Result<T, Error>;

/// Library-level error type
///
/// These never travel on the wire as such. A remote error received by the
/// client is wrapped in [`Error::Rpc`]; everything else describes a local
/// failure.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// JSON-RPC error object, typically received from a remote peer
    #[error("JSON-RPC error: {0}")]
    Rpc(#[from] ErrorObject),

    /// Serialization or deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// WebSocket transport layer error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Input/output error
    #[error("IO error: {0}")]
    Io(String),

    /// A handler was registered under an empty name
    #[error("Method name must not be empty")]
    EmptyMethodName,

    /// A handler was registered twice under the same name
    #[error("Method already registered: {0}")]
    DuplicateMethod(String),

    /// A handler was registered under a name starting with `rpc.`
    ///
    /// JSON-RPC 2.0 keeps that prefix for protocol extensions.
    #[error("Method name is reserved: {0}")]
    ReservedMethodName(String),

    /// Invalid builder or environment configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The peer answered a request with a response for another id
    #[error("Response id mismatch: expected {expected}, got {actual}")]
    IdMismatch {
        /// Id sent with the request
        expected: String,
        /// Id found on the response
        actual: String,
    },

    /// The peer answered with a reply of the wrong shape
    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),

    /// Connection was closed
    #[error("Connection closed")]
    ConnectionClosed,
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

/// Numeric JSON-RPC error code
///
/// Serializes as a bare integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorCode(pub i32);

impl ErrorCode {
    /// Invalid JSON was received
    pub const PARSE_ERROR: ErrorCode = ErrorCode(-32700);
    /// The JSON sent is not a valid request envelope
    pub const INVALID_REQUEST: ErrorCode = ErrorCode(-32600);
    /// The method does not exist
    pub const METHOD_NOT_FOUND: ErrorCode = ErrorCode(-32601);
    /// Invalid method parameters
    pub const INVALID_PARAMS: ErrorCode = ErrorCode(-32602);
    /// Internal error
    pub const INTERNAL_ERROR: ErrorCode = ErrorCode(-32603);
    /// Lowest code of the reserved band
    pub const MIN_RESERVED: ErrorCode = ErrorCode(-32768);
    /// Highest code of the reserved band
    pub const MAX_RESERVED: ErrorCode = ErrorCode(-32000);

    /// Whether the code lies inside the protocol's reserved band
    pub fn is_reserved(self) -> bool {
        self >= Self::MIN_RESERVED && self <= Self::MAX_RESERVED
    }

    /// Fixed message for the five predefined codes
    ///
    /// Returns `None` for every other code, reserved or not.
    pub fn canonical_message(self) -> Option<&'static str> {
        match self {
            Self::PARSE_ERROR => Some("Parse error"),
            Self::INVALID_REQUEST => Some("Invalid Request"),
            Self::METHOD_NOT_FOUND => Some("Method not found"),
            Self::INVALID_PARAMS => Some("Invalid params"),
            Self::INTERNAL_ERROR => Some("Internal error"),
            _ => None,
        }
    }
}

impl From<i32> for ErrorCode {
    fn from(code: i32) -> Self {
        ErrorCode(code)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// JSON-RPC 2.0 error object
///
/// The exact wire format of the `error` member of a response.
///
/// - `code`: integer error code
/// - `message`: short, non-empty description
/// - `data`: optional structured detail, omitted when absent
///
/// # Examples
///
/// ```rust
/// use guardrpc_core::ErrorObject;
/// use serde_json::json;
///
/// let error = ErrorObject::invalid_params_with(json!({"missing": ["a"]}));
/// assert_eq!(error.message, "Invalid params");
/// assert_eq!(error.data, Some(json!({"missing": ["a"]})));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    /// Numeric error code
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional error information
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    /// Create an error with a code and message and no data
    ///
    /// # Arguments
    ///
    /// * `code` - Numeric error code; application codes should stay outside
    ///            the reserved band
    /// * `message` - Human-readable description
    pub fn new(code: impl Into<ErrorCode>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            data: None,
        }
    }

    fn canonical(code: ErrorCode) -> Self {
        Self::new(code, code.canonical_message().unwrap_or("Internal error"))
    }

    /// Parse error (-32700)
    pub fn parse_error() -> Self {
        Self::canonical(ErrorCode::PARSE_ERROR)
    }

    /// Invalid Request (-32600)
    pub fn invalid_request() -> Self {
        Self::canonical(ErrorCode::INVALID_REQUEST)
    }

    /// Method not found (-32601)
    pub fn method_not_found() -> Self {
        Self::canonical(ErrorCode::METHOD_NOT_FOUND)
    }

    /// Invalid params (-32602)
    pub fn invalid_params() -> Self {
        Self::canonical(ErrorCode::INVALID_PARAMS)
    }

    /// Invalid params (-32602) carrying detail in `data`
    pub fn invalid_params_with(data: Value) -> Self {
        Self::invalid_params().with_data(data)
    }

    /// Internal error (-32603)
    pub fn internal_error() -> Self {
        Self::canonical(ErrorCode::INTERNAL_ERROR)
    }

    /// Attach an already-built JSON value as `data`
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Serialize `data` and attach it
    ///
    /// Fails when `data` cannot be represented as JSON, for example a map
    /// with non-string keys.
    pub fn try_with_data<T: Serialize + ?Sized>(
        self,
        data: &T,
    ) -> std::result::Result<Self, serde_json::Error> {
        let value = serde_json::to_value(data)?;
        Ok(self.with_data(value))
    }
}

impl fmt::Display for ErrorObject {
    /// Formats as "[code] message", e.g. "[-32601] Method not found"
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ErrorObject {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_canonical_constructors() {
        let errors = vec![
            (ErrorObject::parse_error(), -32700, "Parse error"),
            (ErrorObject::invalid_request(), -32600, "Invalid Request"),
            (ErrorObject::method_not_found(), -32601, "Method not found"),
            (ErrorObject::invalid_params(), -32602, "Invalid params"),
            (ErrorObject::internal_error(), -32603, "Internal error"),
        ];

        for (error, code, message) in errors {
            assert_eq!(error.code, ErrorCode(code));
            assert_eq!(error.message, message);
            assert!(error.data.is_none());
        }
    }

    #[test]
    fn test_reserved_band() {
        assert!(ErrorCode(-32768).is_reserved());
        assert!(ErrorCode(-32000).is_reserved());
        assert!(ErrorCode(-32099).is_reserved());
        assert!(ErrorCode::INVALID_PARAMS.is_reserved());
        assert!(!ErrorCode(-32769).is_reserved());
        assert!(!ErrorCode(-31999).is_reserved());
        assert!(!ErrorCode(0).is_reserved());
        assert!(!ErrorCode(1001).is_reserved());
    }

    #[test]
    fn test_canonical_message_only_for_predefined_codes() {
        assert_eq!(ErrorCode(-32050).canonical_message(), None);
        assert_eq!(ErrorCode(42).canonical_message(), None);
        assert_eq!(
            ErrorCode::METHOD_NOT_FOUND.canonical_message(),
            Some("Method not found")
        );
    }

    #[test]
    fn test_error_object_display() {
        let error = ErrorObject::method_not_found();
        assert_eq!(error.to_string(), "[-32601] Method not found");
    }

    #[test]
    fn test_serialization_omits_missing_data() {
        let error = ErrorObject::new(-32000, "Custom error");
        let serialized = serde_json::to_string(&error).unwrap();
        assert_eq!(serialized, r#"{"code":-32000,"message":"Custom error"}"#);
    }

    #[test]
    fn test_deserialization() {
        let json = r#"{"code":-32601,"message":"Method not found","data":{"k":1}}"#;
        let error: ErrorObject = serde_json::from_str(json).unwrap();

        assert_eq!(error.code, ErrorCode::METHOD_NOT_FOUND);
        assert_eq!(error.message, "Method not found");
        assert_eq!(error.data, Some(json!({"k": 1})));
    }

    #[test]
    fn test_try_with_data() {
        let error = ErrorObject::new(7, "busy")
            .try_with_data(&vec!["a", "b"])
            .unwrap();
        assert_eq!(error.data, Some(json!(["a", "b"])));

        let mut bad_keys = HashMap::new();
        bad_keys.insert((1, 2), "tuple keys are not JSON");
        assert!(ErrorObject::new(7, "busy").try_with_data(&bad_keys).is_err());
    }

    #[test]
    fn test_error_from_error_object() {
        let error: Error = ErrorObject::invalid_params().into();
        match error {
            Error::Rpc(obj) => assert_eq!(obj.code, ErrorCode::INVALID_PARAMS),
            _ => panic!("Expected Rpc error"),
        }
    }

    #[test]
    fn test_error_from_serde() {
        let serde_error = serde_json::from_str::<Value>(r#"{"invalid": json"#).unwrap_err();
        let error: Error = serde_error.into();

        match error {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_error_display_formatting() {
        let error = Error::DuplicateMethod("sum".to_string());
        assert_eq!(error.to_string(), "Method already registered: sum");

        let error = Error::IdMismatch {
            expected: "7".into(),
            actual: "8".into(),
        };
        assert!(error.to_string().contains("expected 7"));
    }
}
