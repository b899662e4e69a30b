//! JSON-RPC 2.0 envelope types
//!
//! This module defines the value types exchanged between peers:
//!
//! - **Request**: a method call, or a notification when it carries no id
//! - **Response**: exactly one of `result` or `error`, echoing the request id
//! - **Reply**: what the server sends back for one inbound message, either a
//!   single response or a batch of them
//!
//! All types here are plain immutable values. Structural validation of
//! untrusted input lives in [`crate::validate`]; the types in this module are
//! what the rest of the system works with once an envelope has been accepted.
//!
//! # Wire Format
//!
//! ```text
//! --> {"jsonrpc":"2.0","method":"sum","params":[3,4],"id":"1"}
//! <-- {"jsonrpc":"2.0","result":7,"id":"1"}
//! ```
//!
//! # Examples
//!
//! ```rust
//! use guardrpc_core::{Id, Request, Response};
//! use serde_json::json;
//!
//! let request = Request::new("sum", Some(json!([3, 4])), Id::from("1"));
//! assert!(!request.is_notification());
//!
//! let response = Response::success(json!(7), request.id.clone());
//! assert_eq!(
//!     serde_json::to_string(&response).unwrap(),
//!     r#"{"jsonrpc":"2.0","result":7,"id":"1"}"#
//! );
//! ```

use crate::error::ErrorObject;
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The only protocol version string accepted and emitted
pub const JSONRPC_VERSION: &str = "2.0";

/// Request identifier
///
/// A request id is either a number or a string. Numbers keep their exact JSON
/// text (`serde_json` is built with `arbitrary_precision`), so `1` and `1.0`
/// stay distinct and ids beyond `u64` or `f64` precision round-trip digit for
/// digit. An absent id is modelled as `Option<Id>::None`, never as a variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Id {
    /// Numeric identifier
    Number(serde_json::Number),
    /// String identifier
    String(String),
}

// Not derived: an untagged derive buffers the number and loses its digits.
impl<'de> Deserialize<'de> for Id {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Number(n) => Ok(Id::Number(n)),
            Value::String(s) => Ok(Id::String(s)),
            other => Err(de::Error::invalid_type(
                unexpected(&other),
                &"a number or a string",
            )),
        }
    }
}

fn unexpected(value: &Value) -> de::Unexpected<'_> {
    match value {
        Value::Null => de::Unexpected::Unit,
        Value::Bool(b) => de::Unexpected::Bool(*b),
        Value::Number(_) => de::Unexpected::Other("number"),
        Value::String(s) => de::Unexpected::Str(s),
        Value::Array(_) => de::Unexpected::Seq,
        Value::Object(_) => de::Unexpected::Map,
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::Number(n) => write!(f, "{}", n),
            Id::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id::String(s)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::String(s.to_string())
    }
}

impl From<i64> for Id {
    fn from(n: i64) -> Self {
        Id::Number(n.into())
    }
}

impl From<u64> for Id {
    fn from(n: u64) -> Self {
        Id::Number(n.into())
    }
}

impl From<i32> for Id {
    fn from(n: i32) -> Self {
        Id::Number(n.into())
    }
}

/// Tri-state field value: absent, explicitly `null`, or present
///
/// JSON distinguishes a missing member from one set to `null`, and the
/// protocol cares about the difference for `id` and `params`. Use with
/// `#[serde(default)]` so a missing member becomes [`Maybe::Absent`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Maybe<T> {
    /// The member was not present
    #[default]
    Absent,
    /// The member was present with the value `null`
    Null,
    /// The member was present with a value
    Value(T),
}

impl<T> Maybe<T> {
    /// True when the member was not present at all
    pub fn is_absent(&self) -> bool {
        matches!(self, Maybe::Absent)
    }

    /// Collapse absent and `null` into `None`
    pub fn into_option(self) -> Option<T> {
        match self {
            Maybe::Value(v) => Some(v),
            Maybe::Absent | Maybe::Null => None,
        }
    }

    /// Borrow the present value, if any
    pub fn as_option(&self) -> Option<&T> {
        match self {
            Maybe::Value(v) => Some(v),
            Maybe::Absent | Maybe::Null => None,
        }
    }
}

impl<'de, T> Deserialize<'de> for Maybe<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Only reached when the member exists; `default` covers the absent case.
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(v) => Maybe::Value(v),
            None => Maybe::Null,
        })
    }
}

/// Protocol version marker
///
/// Serializes as `"2.0"` and refuses any other value when deserializing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Version;

impl Serialize for Version {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(JSONRPC_VERSION)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let tag = String::deserialize(deserializer)?;
        if tag == JSONRPC_VERSION {
            Ok(Version)
        } else {
            Err(de::Error::invalid_value(
                de::Unexpected::Str(&tag),
                &"the string \"2.0\"",
            ))
        }
    }
}

/// JSON-RPC 2.0 request
///
/// A request without an id is a notification: the receiver must not reply to
/// it. This type is what clients build and send; servers never deserialize
/// untrusted bytes straight into it (see [`crate::validate`]).
///
/// # Examples
///
/// ```rust
/// use guardrpc_core::Request;
/// use serde_json::json;
///
/// let note = Request::notification("log", Some(json!({"level": "info"})));
/// assert_eq!(
///     serde_json::to_string(&note).unwrap(),
///     r#"{"jsonrpc":"2.0","method":"log","params":{"level":"info"}}"#
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Protocol version, always "2.0"
    pub jsonrpc: Version,

    /// Name of the method to invoke
    pub method: String,

    /// Positional (array) or named (object) parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,

    /// Request identifier; `None` for notifications
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
}

impl Request {
    /// Create a request that expects a response
    pub fn new(method: impl Into<String>, params: Option<Value>, id: Id) -> Self {
        Self {
            jsonrpc: Version,
            method: method.into(),
            params,
            id: Some(id),
        }
    }

    /// Create a notification, which never receives a response
    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: Version,
            method: method.into(),
            params,
            id: None,
        }
    }

    /// True when the request carries no id
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        write!(f, "--> {}", json)
    }
}

/// Ordered list of requests sent as one batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchRequest(pub Vec<Request>);

impl fmt::Display for BatchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_batch(f, "-->", &self.0)
    }
}

/// Outcome carried by a response: `result` or `error`, never both
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponsePayload {
    /// Successful call result
    Result(Value),
    /// Failed call
    Error(ErrorObject),
}

/// JSON-RPC 2.0 response
///
/// The payload is flattened into the envelope, so a response serializes as
/// `{"jsonrpc":"2.0","result":...,"id":...}` or
/// `{"jsonrpc":"2.0","error":{...},"id":...}`. The id is `null` when the
/// request id could not be determined.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    /// Protocol version, always "2.0"
    pub jsonrpc: Version,

    /// Either the result or the error
    #[serde(flatten)]
    pub payload: ResponsePayload,

    /// Id of the request this response answers
    pub id: Option<Id>,
}

impl Response {
    /// Build a success response
    pub fn success(result: Value, id: Option<Id>) -> Self {
        Self {
            jsonrpc: Version,
            payload: ResponsePayload::Result(result),
            id,
        }
    }

    /// Build an error response
    pub fn error(error: ErrorObject, id: Option<Id>) -> Self {
        Self {
            jsonrpc: Version,
            payload: ResponsePayload::Error(error),
            id,
        }
    }

    /// Return the same response addressed to `id`
    pub fn with_id(mut self, id: Option<Id>) -> Self {
        self.id = id;
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(self.payload, ResponsePayload::Result(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self.payload, ResponsePayload::Error(_))
    }

    /// The result value, when this is a success response
    pub fn result(&self) -> Option<&Value> {
        match &self.payload {
            ResponsePayload::Result(v) => Some(v),
            ResponsePayload::Error(_) => None,
        }
    }

    /// The error object, when this is an error response
    pub fn error_object(&self) -> Option<&ErrorObject> {
        match &self.payload {
            ResponsePayload::Error(e) => Some(e),
            ResponsePayload::Result(_) => None,
        }
    }

    /// Consume the response into a plain `Result`
    pub fn into_result(self) -> Result<Value, ErrorObject> {
        match self.payload {
            ResponsePayload::Result(v) => Ok(v),
            ResponsePayload::Error(e) => Err(e),
        }
    }
}

#[derive(Deserialize)]
struct RawResponse {
    jsonrpc: Version,
    #[serde(default)]
    result: Maybe<Value>,
    #[serde(default)]
    error: Option<ErrorObject>,
    #[serde(default)]
    id: Option<Id>,
}

// Not derived: `flatten` buffers the payload, which breaks exact numbers.
impl<'de> Deserialize<'de> for Response {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawResponse::deserialize(deserializer)?;
        let payload = match (raw.result, raw.error) {
            (Maybe::Absent, Some(error)) => ResponsePayload::Error(error),
            (Maybe::Value(result), None) => ResponsePayload::Result(result),
            (Maybe::Null, None) => ResponsePayload::Result(Value::Null),
            (Maybe::Absent, None) => {
                return Err(de::Error::custom("response has neither result nor error"))
            }
            (_, Some(_)) => return Err(de::Error::custom("response has both result and error")),
        };
        Ok(Response {
            jsonrpc: raw.jsonrpc,
            payload,
            id: raw.id,
        })
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        write!(f, "<-- {}", json)
    }
}

/// Ordered list of responses received for one batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchResponse(pub Vec<Response>);

impl fmt::Display for BatchResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_batch(f, "<--", &self.0)
    }
}

// "--> [\n  {..},\n  {..}\n]"
fn write_batch<T: Serialize>(f: &mut fmt::Formatter<'_>, arrow: &str, items: &[T]) -> fmt::Result {
    writeln!(f, "{} [", arrow)?;
    for (i, item) in items.iter().enumerate() {
        let json = serde_json::to_string(item).map_err(|_| fmt::Error)?;
        let sep = if i + 1 < items.len() { "," } else { "" };
        writeln!(f, "  {}{}", json, sep)?;
    }
    write!(f, "]")
}

/// Everything the server sends back for one inbound message
///
/// Serializes untagged: a single response encodes as one object, a batch as
/// one array. "No reply" is expressed as `Option<Reply>::None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    /// Reply to a single request
    Single(Response),
    /// Replies to a batch, in input order
    Batch(Vec<Response>),
}

impl Reply {
    /// Flatten into the list of contained responses
    pub fn into_responses(self) -> Vec<Response> {
        match self {
            Reply::Single(r) => vec![r],
            Reply::Batch(rs) => rs,
        }
    }
}

impl<'de> Deserialize<'de> for Reply {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        if value.is_array() {
            Vec::<Response>::deserialize(value)
                .map(Reply::Batch)
                .map_err(de::Error::custom)
        } else {
            Response::deserialize(value)
                .map(Reply::Single)
                .map_err(de::Error::custom)
        }
    }
}

/// Whether a raw `id` member is acceptable
///
/// `None` means the member is absent. Numbers and strings pass; booleans,
/// arrays and objects fail. An explicit `null` also passes and is treated as
/// a notification by the validator.
pub fn is_valid_id(id: Option<&Value>) -> bool {
    matches!(
        id,
        None | Some(Value::Null) | Some(Value::Number(_)) | Some(Value::String(_))
    )
}

/// Whether a raw `params` member is acceptable
///
/// Absent, `null`, arrays and objects pass. Scalars fail.
pub fn is_valid_params(params: Option<&Value>) -> bool {
    matches!(
        params,
        None | Some(Value::Null) | Some(Value::Array(_)) | Some(Value::Object(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_id_deserializes_number_and_string() {
        let id: Id = serde_json::from_value(json!(42)).unwrap();
        assert_eq!(id, Id::from(42i64));

        let id: Id = serde_json::from_value(json!("42")).unwrap();
        assert_eq!(id, Id::from("42"));

        let id: Id = serde_json::from_value(json!(1.5)).unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "1.5");

        assert!(serde_json::from_value::<Id>(json!(true)).is_err());
        assert!(serde_json::from_value::<Id>(json!([1])).is_err());
    }

    #[test]
    fn test_id_display() {
        assert_eq!(Id::from(7i64).to_string(), "7");
        assert_eq!(Id::from("abc").to_string(), "\"abc\"");
    }

    #[derive(Deserialize)]
    struct Probe {
        #[serde(default)]
        field: Maybe<Value>,
    }

    #[test]
    fn test_maybe_distinguishes_absent_and_null() {
        let probe: Probe = serde_json::from_value(json!({})).unwrap();
        assert_eq!(probe.field, Maybe::Absent);

        let probe: Probe = serde_json::from_value(json!({"field": null})).unwrap();
        assert_eq!(probe.field, Maybe::Null);

        let probe: Probe = serde_json::from_value(json!({"field": [1]})).unwrap();
        assert_eq!(probe.field, Maybe::Value(json!([1])));
        assert_eq!(probe.field.into_option(), Some(json!([1])));
    }

    #[test]
    fn test_version_rejects_other_values() {
        assert!(serde_json::from_value::<Version>(json!("2.0")).is_ok());
        assert!(serde_json::from_value::<Version>(json!("1.0")).is_err());
        assert!(serde_json::from_value::<Version>(json!(2.0)).is_err());
    }

    #[test]
    fn test_request_serialization() {
        let request = Request::new("sum", Some(json!([3, 4])), Id::from("1"));
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"jsonrpc":"2.0","method":"sum","params":[3,4],"id":"1"}"#
        );

        let note = Request::notification("ping", None);
        assert!(note.is_notification());
        assert_eq!(
            serde_json::to_string(&note).unwrap(),
            r#"{"jsonrpc":"2.0","method":"ping"}"#
        );
    }

    #[test]
    fn test_response_success_has_no_error_member() {
        let response = Response::success(json!(7), Some(Id::from("1")));
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"jsonrpc":"2.0","result":7,"id":"1"}"#
        );
        assert!(response.is_success());
        assert_eq!(response.result(), Some(&json!(7)));
        assert!(response.error_object().is_none());
    }

    #[test]
    fn test_response_error_has_no_result_member() {
        let response = Response::error(ErrorObject::invalid_request(), None);
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"jsonrpc":"2.0","error":{"code":-32600,"message":"Invalid Request"},"id":null}"#
        );
        assert!(response.is_error());
        assert!(response.result().is_none());
    }

    #[test]
    fn test_response_deserialization() {
        let response: Response =
            serde_json::from_str(r#"{"jsonrpc":"2.0","result":{"a":1},"id":3}"#).unwrap();
        assert_eq!(response.id, Some(Id::from(3i64)));
        assert_eq!(response.into_result().unwrap(), json!({"a": 1}));

        let response: Response = serde_json::from_str(
            r#"{"jsonrpc":"2.0","error":{"code":-32601,"message":"Method not found"},"id":null}"#,
        )
        .unwrap();
        assert_eq!(response.id, None);
        assert_eq!(
            response.error_object().map(|e| e.code),
            Some(crate::ErrorCode::METHOD_NOT_FOUND)
        );
    }

    #[test]
    fn test_with_id() {
        let response = Response::success(json!(true), None).with_id(Some(Id::from(9i64)));
        assert_eq!(response.id, Some(Id::from(9i64)));
    }

    #[test]
    fn test_display_formats() {
        let request = Request::new("echo", None, Id::from(1i64));
        assert_eq!(
            request.to_string(),
            r#"--> {"jsonrpc":"2.0","method":"echo","id":1}"#
        );

        let response = Response::success(json!("hi"), Some(Id::from(1i64)));
        assert_eq!(
            response.to_string(),
            r#"<-- {"jsonrpc":"2.0","result":"hi","id":1}"#
        );

        let batch = BatchResponse(vec![
            Response::success(json!(1), Some(Id::from(1i64))),
            Response::success(json!(2), Some(Id::from(2i64))),
        ]);
        assert_eq!(
            batch.to_string(),
            "<-- [\n  {\"jsonrpc\":\"2.0\",\"result\":1,\"id\":1},\n  {\"jsonrpc\":\"2.0\",\"result\":2,\"id\":2}\n]"
        );

        let batch = BatchRequest(vec![Request::notification("a", None)]);
        assert_eq!(
            batch.to_string(),
            "--> [\n  {\"jsonrpc\":\"2.0\",\"method\":\"a\"}\n]"
        );
    }

    #[test]
    fn test_reply_serializes_untagged() {
        let single = Reply::Single(Response::success(json!(1), None));
        assert!(serde_json::to_value(&single).unwrap().is_object());

        let batch = Reply::Batch(vec![Response::success(json!(1), None)]);
        assert!(serde_json::to_value(&batch).unwrap().is_array());
    }

    #[test]
    fn test_numeric_ids_keep_their_digits() {
        for text in [
            "123456789012345678901234567890",
            "-98765432109876543210",
            "9007199254740993.0",
            "0.10000000000000000001",
            "1e400",
            "1.0",
        ] {
            let id: Id = serde_json::from_str(text).unwrap();
            assert_eq!(serde_json::to_string(&id).unwrap(), text);

            let wire = format!(r#"{{"jsonrpc":"2.0","result":true,"id":{}}}"#, text);
            let response: Response = serde_json::from_str(&wire).unwrap();
            assert_eq!(response.id, Some(id.clone()));
            assert_eq!(serde_json::to_string(&response).unwrap(), wire);

            let batch: Reply = serde_json::from_str(&format!("[{}]", wire)).unwrap();
            assert_eq!(batch, Reply::Batch(vec![response]));
        }
    }

    #[test]
    fn test_response_needs_exactly_one_outcome() {
        let both = r#"{"jsonrpc":"2.0","result":1,"error":{"code":1,"message":"x"},"id":1}"#;
        assert!(serde_json::from_str::<Response>(both).is_err());

        let neither = r#"{"jsonrpc":"2.0","id":1}"#;
        assert!(serde_json::from_str::<Response>(neither).is_err());

        let null_result: Response =
            serde_json::from_str(r#"{"jsonrpc":"2.0","result":null,"id":1}"#).unwrap();
        assert_eq!(null_result.result(), Some(&Value::Null));
    }

    #[test]
    fn test_is_valid_id() {
        assert!(is_valid_id(None));
        assert!(is_valid_id(Some(&json!(null))));
        assert!(is_valid_id(Some(&json!(1))));
        assert!(is_valid_id(Some(&json!(-1.25))));
        assert!(is_valid_id(Some(&json!("x"))));
        assert!(!is_valid_id(Some(&json!(true))));
        assert!(!is_valid_id(Some(&json!([1]))));
        assert!(!is_valid_id(Some(&json!({"a": 1}))));
    }

    #[test]
    fn test_is_valid_params() {
        assert!(is_valid_params(None));
        assert!(is_valid_params(Some(&json!(null))));
        assert!(is_valid_params(Some(&json!([]))));
        assert!(is_valid_params(Some(&json!({}))));
        assert!(!is_valid_params(Some(&json!(1))));
        assert!(!is_valid_params(Some(&json!("x"))));
        assert!(!is_valid_params(Some(&json!(false))));
    }
}
