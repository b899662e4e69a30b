//! Handler traits and types for JSON-RPC methods
//!
//! This module defines the contract between the dispatcher and application
//! code. A handler receives the call context and the request params and
//! reports back a [`HandlerOutcome`]:
//!
//! - **Success**: a JSON result value
//! - **Failure**: an application error object, sent to the peer subject to
//!   the reserved-code policy enforced by [`crate::guard`]
//! - **Defect**: the handler could not produce anything valid (for example
//!   its result did not serialize); always reported as Internal error
//!
//! # Creating Handlers
//!
//! 1. **from_fn**: wrap an async closure over raw JSON values
//! 2. **from_typed_fn**: wrap an async closure with automatic (de)serialization
//! 3. **from_typed_ctx_fn**: as `from_typed_fn`, also receiving the [`CallContext`]
//!
//! # Examples
//!
//! ```rust
//! use guardrpc_server::{from_fn, from_typed_fn, HandlerOutcome, MethodError};
//! use serde::Deserialize;
//!
//! // Raw JSON handler
//! let ping = from_fn(|_ctx, _params| async move {
//!     HandlerOutcome::Success(serde_json::json!("pong"))
//! });
//!
//! // Typed handler
//! #[derive(Deserialize)]
//! struct DivParams { a: i64, b: i64 }
//!
//! let div = from_typed_fn(|p: DivParams| async move {
//!     if p.b == 0 {
//!         return Err(MethodError::new(1, "division by zero"));
//!     }
//!     Ok(p.a / p.b)
//! });
//! ```

use crate::context::CallContext;
use guardrpc_core::{ErrorCode, ErrorObject};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// What a handler reports back for one call
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutcome {
    /// The call succeeded with this result
    Success(Value),
    /// The call failed with this error
    Failure(ErrorObject),
    /// Nothing valid was produced; the string says why (server-side only)
    Defect(String),
}

impl HandlerOutcome {
    /// Serialize `value` into a success outcome
    ///
    /// A value that cannot be represented as JSON becomes a defect.
    pub fn success<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(v) => HandlerOutcome::Success(v),
            Err(e) => HandlerOutcome::Defect(format!("result is not serializable: {}", e)),
        }
    }
}

impl From<Result<Value, ErrorObject>> for HandlerOutcome {
    fn from(result: Result<Value, ErrorObject>) -> Self {
        match result {
            Ok(v) => HandlerOutcome::Success(v),
            Err(e) => HandlerOutcome::Failure(e),
        }
    }
}

/// Future returned by [`Handler::call`]
///
/// Boxed so handlers with different concrete futures fit in one registry.
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerOutcome> + Send>>;

/// Trait for JSON-RPC method handlers
///
/// Handlers must be `Send + Sync`: one instance is shared by every
/// connection and may run on many tasks at once.
///
/// You typically don't implement this trait directly. Use [`from_fn`],
/// [`from_typed_fn`] or [`from_typed_ctx_fn`] instead.
pub trait Handler: Send + Sync {
    /// Handle one call
    ///
    /// # Arguments
    ///
    /// * `ctx` - Method name, request id and transport context
    /// * `params` - The request params, `None` when absent or `null`;
    ///              otherwise always an array or an object
    fn call(&self, ctx: CallContext, params: Option<Value>) -> HandlerFuture;
}

/// Wrapper that adapts an async closure into a [`Handler`]
pub struct AsyncHandler<F> {
    func: F,
}

impl<F> AsyncHandler<F> {
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F, Fut> Handler for AsyncHandler<F>
where
    F: Fn(CallContext, Option<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerOutcome> + Send + 'static,
{
    fn call(&self, ctx: CallContext, params: Option<Value>) -> HandlerFuture {
        Box::pin((self.func)(ctx, params))
    }
}

/// Create a handler from an async closure over raw JSON values
///
/// # Examples
///
/// ```rust
/// use guardrpc_server::{from_fn, HandlerOutcome};
///
/// let echo = from_fn(|_ctx, params| async move {
///     HandlerOutcome::Success(params.unwrap_or(serde_json::Value::Bool(true)))
/// });
/// ```
pub fn from_fn<F, Fut>(func: F) -> Box<dyn Handler>
where
    F: Fn(CallContext, Option<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerOutcome> + Send + 'static,
{
    Box::new(AsyncHandler::new(func))
}

/// Create a handler with automatic type conversion
///
/// - Params are deserialized into `P`. Absent params deserialize from
///   `null`, so `()` and `Option<T>` accept calls without params.
/// - A params mismatch is answered with Invalid params, with the
///   deserializer's message as `data`.
/// - The returned value is serialized; a failure there is a defect.
///
/// # Examples
///
/// ```rust
/// use guardrpc_server::from_typed_fn;
///
/// let sum = from_typed_fn(|numbers: Vec<i64>| async move {
///     Ok(numbers.iter().sum::<i64>())
/// });
/// ```
pub fn from_typed_fn<P, R, F, Fut>(func: F) -> Box<dyn Handler>
where
    P: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, MethodError>> + Send + 'static,
{
    from_typed_ctx_fn(move |_ctx: CallContext, params: P| func(params))
}

/// Like [`from_typed_fn`], but the closure also receives the [`CallContext`]
pub fn from_typed_ctx_fn<P, R, F, Fut>(func: F) -> Box<dyn Handler>
where
    P: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    F: Fn(CallContext, P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, MethodError>> + Send + 'static,
{
    let func = Arc::new(func);

    from_fn(move |ctx: CallContext, params: Option<Value>| {
        let func = Arc::clone(&func);
        async move {
            let params: P = match serde_json::from_value(params.unwrap_or(Value::Null)) {
                Ok(p) => p,
                Err(e) => {
                    return HandlerOutcome::Failure(ErrorObject::invalid_params_with(
                        Value::String(e.to_string()),
                    ))
                }
            };

            match func(ctx, params).await {
                Ok(result) => HandlerOutcome::success(&result),
                Err(err) => err.into_outcome(),
            }
        }
    })
}

/// Error returned by typed handlers
///
/// Carries a code, a message and optional data. Data is serialized as soon
/// as it is attached; if that fails, the call is reported as a defect rather
/// than sending a half-built error.
#[derive(Debug, Clone)]
pub struct MethodError {
    code: ErrorCode,
    message: String,
    data: Option<Result<Value, String>>,
}

impl MethodError {
    /// Create an error with an application code and message
    pub fn new(code: impl Into<ErrorCode>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            data: None,
        }
    }

    /// Invalid params (-32602) with serialized `data`
    pub fn invalid_params<T: Serialize + ?Sized>(data: &T) -> Self {
        let err = ErrorObject::invalid_params();
        Self::new(err.code, err.message).with_data(data)
    }

    /// Attach `data`, serializing it now
    pub fn with_data<T: Serialize + ?Sized>(mut self, data: &T) -> Self {
        self.data = Some(serde_json::to_value(data).map_err(|e| e.to_string()));
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn into_outcome(self) -> HandlerOutcome {
        let data = match self.data {
            None => None,
            Some(Ok(v)) => Some(v),
            Some(Err(e)) => {
                return HandlerOutcome::Defect(format!("error data is not serializable: {}", e))
            }
        };
        HandlerOutcome::Failure(ErrorObject {
            code: self.code,
            message: self.message,
            data,
        })
    }
}

impl From<ErrorObject> for MethodError {
    fn from(err: ErrorObject) -> Self {
        Self {
            code: err.code,
            message: err.message,
            data: err.data.map(Ok),
        }
    }
}

impl fmt::Display for MethodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for MethodError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TransportContext;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::collections::HashMap;

    #[derive(Deserialize)]
    struct AddParams {
        a: i32,
        b: i32,
    }

    #[derive(Serialize, Deserialize)]
    struct AddResult {
        sum: i32,
    }

    fn ctx(method: &str) -> CallContext {
        CallContext::new(method, None, TransportContext::detached())
    }

    #[tokio::test]
    async fn test_typed_handler() {
        let handler = from_typed_fn(|params: AddParams| async move {
            Ok(AddResult {
                sum: params.a + params.b,
            })
        });

        let outcome = handler.call(ctx("add"), Some(json!({"a": 5, "b": 3}))).await;
        assert_eq!(outcome, HandlerOutcome::Success(json!({"sum": 8})));
    }

    #[tokio::test]
    async fn test_typed_handler_rejects_bad_params() {
        let handler = from_typed_fn(|params: AddParams| async move { Ok(params.a) });

        let outcome = handler.call(ctx("add"), Some(json!({"a": "x"}))).await;
        match outcome {
            HandlerOutcome::Failure(err) => {
                assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
                assert!(matches!(err.data, Some(Value::String(_))));
            }
            other => panic!("Expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_typed_handler_without_params() {
        let handler = from_typed_fn(|_: ()| async move { Ok("ok") });
        let outcome = handler.call(ctx("noop"), None).await;
        assert_eq!(outcome, HandlerOutcome::Success(json!("ok")));

        let handler = from_typed_fn(|p: Option<Vec<i32>>| async move { Ok(p.is_none()) });
        let outcome = handler.call(ctx("maybe"), None).await;
        assert_eq!(outcome, HandlerOutcome::Success(json!(true)));
    }

    #[tokio::test]
    async fn test_unserializable_result_is_defect() {
        let handler = from_typed_fn(|_: ()| async move {
            let mut map = HashMap::new();
            map.insert((1, 2), "tuple keys");
            Ok(map)
        });
        let outcome = handler.call(ctx("bad"), None).await;
        assert!(matches!(outcome, HandlerOutcome::Defect(_)));
    }

    #[tokio::test]
    async fn test_method_error_with_data() {
        let handler = from_typed_fn(|_: ()| async move {
            Err::<(), _>(MethodError::new(42, "busy").with_data(&json!({"retry": 5})))
        });
        let outcome = handler.call(ctx("busy"), None).await;
        assert_eq!(
            outcome,
            HandlerOutcome::Failure(ErrorObject::new(42, "busy").with_data(json!({"retry": 5})))
        );
    }

    #[tokio::test]
    async fn test_method_error_bad_data_is_defect() {
        let handler = from_typed_fn(|_: ()| async move {
            let mut map = HashMap::new();
            map.insert((1, 2), "tuple keys");
            Err::<(), _>(MethodError::new(42, "busy").with_data(&map))
        });
        let outcome = handler.call(ctx("busy"), None).await;
        assert!(matches!(outcome, HandlerOutcome::Defect(_)));
    }

    #[tokio::test]
    async fn test_ctx_handler_sees_method_name() {
        let handler = from_typed_ctx_fn(|ctx: CallContext, _: ()| async move {
            Ok(ctx.method().to_string())
        });
        let outcome = handler.call(ctx("whoami"), None).await;
        assert_eq!(outcome, HandlerOutcome::Success(json!("whoami")));
    }

    #[test]
    fn test_method_error_display() {
        let err = MethodError::invalid_params(&["a"]);
        assert_eq!(err.to_string(), "[-32602] Invalid params");
        assert_eq!(err.code(), ErrorCode::INVALID_PARAMS);
    }
}
