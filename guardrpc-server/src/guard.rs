//! Guarded handler invocation
//!
//! [`call_guarded`] is the only place a handler runs. Whatever the handler
//! does, the caller gets back a well-formed [`Response`] (without an id; the
//! dispatcher attaches it):
//!
//! | Handler behavior                         | Response                       |
//! |------------------------------------------|--------------------------------|
//! | `Success(v)`, `v` not null               | result `v`                     |
//! | `Success(null)`                          | Internal error                 |
//! | `Failure` with Invalid params code       | Invalid params, data kept      |
//! | `Failure` with another reserved code     | Internal error                 |
//! | `Failure` with an application code       | the error, unchanged           |
//! | `Defect(_)`                              | Internal error                 |
//! | panic (sync or async part)               | Internal error                 |
//!
//! Every path that ends in Internal error is a defect. Defects are logged at
//! `warn`; with diagnostics enabled the params and the raw return value (or
//! panic message) are logged at `error` as well. The peer never sees any of
//! it.

use crate::context::CallContext;
use crate::handler::{Handler, HandlerOutcome};
use futures::FutureExt;
use guardrpc_core::{ErrorCode, ErrorObject, Response};
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// How a guarded call ended, for logging and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    /// The handler produced a result
    Success,
    /// The handler produced an acceptable error
    Error,
    /// The handler misbehaved and Internal error was sent instead
    Defect,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Success => "success",
            CallStatus::Error => "error",
            CallStatus::Defect => "defect",
        }
    }
}

/// Invoke `handler` and turn whatever happens into a response
///
/// # Arguments
///
/// * `handler` - The handler found in the registry
/// * `ctx` - Context passed through to the handler
/// * `params` - Request params, `None` when absent
/// * `diagnostics` - Log params and raw return values of misbehaving handlers
pub async fn call_guarded(
    handler: Arc<dyn Handler>,
    ctx: CallContext,
    params: Option<Value>,
    diagnostics: bool,
) -> Response {
    invoke(handler, ctx, params, diagnostics).await.0
}

pub(crate) async fn invoke(
    handler: Arc<dyn Handler>,
    ctx: CallContext,
    params: Option<Value>,
    diagnostics: bool,
) -> (Response, CallStatus) {
    let method = ctx.method().to_string();
    let logged_params = if diagnostics { params.clone() } else { None };

    // The async block makes the synchronous part of `call` run inside the
    // unwind boundary too.
    let call = async move { handler.call(ctx, params).await };

    let outcome = match AssertUnwindSafe(call).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            report_defect(&method, "handler panicked", diagnostics, &logged_params, &message);
            return (internal_error(), CallStatus::Defect);
        }
    };

    match settle(outcome) {
        Ok(response) => {
            let status = if response.is_error() {
                CallStatus::Error
            } else {
                CallStatus::Success
            };
            (response, status)
        }
        Err((reason, raw)) => {
            report_defect(&method, &reason, diagnostics, &logged_params, &raw);
            (internal_error(), CallStatus::Defect)
        }
    }
}

// Ok: the response to send. Err: (reason, raw return value) of a defect.
fn settle(outcome: HandlerOutcome) -> Result<Response, (String, String)> {
    match outcome {
        HandlerOutcome::Success(Value::Null) => {
            Err(("handler returned a null result".to_string(), "null".to_string()))
        }
        HandlerOutcome::Success(value) => Ok(Response::success(value, None)),
        HandlerOutcome::Failure(mut err) if err.code == ErrorCode::INVALID_PARAMS => {
            err.message = ErrorObject::invalid_params().message;
            Ok(Response::error(err, None))
        }
        HandlerOutcome::Failure(err) if err.code.is_reserved() => Err((
            format!("handler returned reserved error code {}", err.code),
            format!("{:?}", err),
        )),
        HandlerOutcome::Failure(err) => Ok(Response::error(err, None)),
        HandlerOutcome::Defect(reason) => {
            let raw = format!("Defect({:?})", reason);
            Err((reason, raw))
        }
    }
}

fn internal_error() -> Response {
    Response::error(ErrorObject::internal_error(), None)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn report_defect(
    method: &str,
    reason: &str,
    diagnostics: bool,
    params: &Option<Value>,
    raw: &str,
) {
    tracing::warn!(method = %method, reason = %reason, "Handler defect replaced with internal error");

    if diagnostics {
        let params = params
            .as_ref()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "<none>".to_string());
        tracing::error!(
            method = %method,
            reason = %reason,
            params = %params,
            returned = %raw,
            "Handler diagnostics"
        );
    }
}
