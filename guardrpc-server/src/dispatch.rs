//! Request dispatch: from raw bytes to an optional reply
//!
//! The [`Dispatcher`] is the protocol state machine. For every inbound
//! message it:
//!
//! 1. **Classifies** the input by its first significant byte (`[` = batch)
//! 2. **Parses** it; invalid JSON yields a single Parse error and nothing else
//! 3. **Validates** each member on its own; a bad envelope yields Invalid
//!    Request with a null id and is never looked up
//! 4. **Resolves** the method; a miss yields Method not found, or nothing for
//!    a notification
//! 5. **Calls** the handler through [`crate::guard`] and attaches the id
//! 6. **Assembles** the reply, dropping everything owed to notifications
//!
//! # Reply Shapes
//!
//! - Single request: `Some(Reply::Single(..))`, or `None` for a notification
//! - Batch: `Some(Reply::Batch(..))` in input order, or `None` when every
//!   member was a notification
//! - Empty batch, or a batch over the configured limit: a single Invalid
//!   Request response, never an array
//!
//! # Batch Modes
//!
//! - **Parallel** (default): members are polled concurrently on the current
//!   task with `join_all`, which keeps results in input order
//! - **Sequential**: members run one after another

use crate::context::{CallContext, TransportContext};
use crate::guard;
use crate::metrics::ServerMetrics;
use crate::registry::{MethodLookup, MethodRegistry};
use futures::future::join_all;
use guardrpc_core::codec::{self, Shape};
use guardrpc_core::{validate, Error, ErrorObject, Reply, Response};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

/// How the members of a batch are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchMode {
    /// Poll all members concurrently
    #[default]
    Parallel,
    /// Run members one at a time, in order
    Sequential,
}

impl BatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchMode::Parallel => "parallel",
            BatchMode::Sequential => "sequential",
        }
    }
}

impl FromStr for BatchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "parallel" => Ok(BatchMode::Parallel),
            "sequential" => Ok(BatchMode::Sequential),
            other => Err(Error::Config(format!("unknown batch mode: {}", other))),
        }
    }
}

/// Turns inbound messages into replies
///
/// Generic over the method lookup so tests can observe which names are
/// resolved. Servers use the frozen [`MethodRegistry`].
///
/// # Examples
///
/// ```rust
/// use guardrpc_server::{from_typed_fn, Dispatcher, RegistryBuilder, TransportContext};
///
/// # #[tokio::main]
/// # async fn main() {
/// let mut builder = RegistryBuilder::new();
/// builder
///     .register("sum", from_typed_fn(|n: Vec<i64>| async move { Ok(n.iter().sum::<i64>()) }))
///     .unwrap();
/// let dispatcher = Dispatcher::new(builder.build());
///
/// let reply = dispatcher
///     .handle_bytes(br#"{"jsonrpc":"2.0","method":"sum","params":[3,4],"id":"1"}"#,
///                   &TransportContext::detached())
///     .await
///     .unwrap();
/// assert_eq!(reply, br#"{"jsonrpc":"2.0","result":7,"id":"1"}"#);
/// # }
/// ```
#[derive(Clone)]
pub struct Dispatcher<R = MethodRegistry> {
    registry: R,
    mode: BatchMode,
    max_batch_size: Option<usize>,
    diagnostics: bool,
    metrics: Option<Arc<ServerMetrics>>,
}

impl<R: MethodLookup> Dispatcher<R> {
    /// Create a dispatcher with parallel batches, no batch limit and no
    /// diagnostics
    pub fn new(registry: R) -> Self {
        Self {
            registry,
            mode: BatchMode::default(),
            max_batch_size: None,
            diagnostics: false,
            metrics: None,
        }
    }

    pub fn with_batch_mode(mut self, mode: BatchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Reject batches with more than `limit` members
    pub fn with_max_batch_size(mut self, limit: Option<usize>) -> Self {
        self.max_batch_size = limit;
        self
    }

    /// Log params and raw return values of misbehaving handlers
    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics = enabled;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<ServerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn batch_mode(&self) -> BatchMode {
        self.mode
    }

    pub fn max_batch_size(&self) -> Option<usize> {
        self.max_batch_size
    }

    /// Process one inbound message
    ///
    /// # Arguments
    ///
    /// * `data` - The raw message bytes
    /// * `transport` - Context handed through to every handler call
    ///
    /// # Returns
    ///
    /// The reply to send, or `None` when no reply is due.
    #[tracing::instrument(
        skip(self, data, transport),
        fields(len = data.len(), conn_id = ?transport.conn_id())
    )]
    pub async fn handle(&self, data: &[u8], transport: &TransportContext) -> Option<Reply> {
        let shape = codec::classify(data);

        let value = match codec::parse(data) {
            Ok(value) => value,
            Err(err) => {
                self.record_error("parse_error");
                return Some(Reply::Single(Response::error(err, None)));
            }
        };

        match (shape, value) {
            (Shape::Batch, Value::Array(members)) => self.handle_batch(members, transport).await,
            (_, value) => self
                .process_member(value, transport)
                .await
                .map(Reply::Single),
        }
    }

    /// Process one inbound message and encode the reply
    pub async fn handle_bytes(&self, data: &[u8], transport: &TransportContext) -> Option<Vec<u8>> {
        let reply = self.handle(data, transport).await?;
        encode(&reply)
    }

    /// Process the result of a transport read
    ///
    /// A failed read is answered with a single Invalid Request response,
    /// since nothing is known about what the peer sent.
    pub async fn handle_read<E: fmt::Display>(
        &self,
        read: Result<Vec<u8>, E>,
        transport: &TransportContext,
    ) -> Option<Vec<u8>> {
        match read {
            Ok(data) => self.handle_bytes(&data, transport).await,
            Err(e) => {
                tracing::warn!(error = %e, conn_id = ?transport.conn_id(), "Failed to read request");
                self.record_error("read_error");
                encode(&Reply::Single(invalid_request()))
            }
        }
    }

    async fn handle_batch(
        &self,
        members: Vec<Value>,
        transport: &TransportContext,
    ) -> Option<Reply> {
        if members.is_empty() {
            tracing::debug!("Empty batch");
            self.record_error("invalid_request");
            return Some(Reply::Single(invalid_request()));
        }

        if let Some(limit) = self.max_batch_size {
            if members.len() > limit {
                tracing::warn!(batch_size = members.len(), limit, "Batch size exceeded");
                self.record_error("batch_too_large");
                let err = ErrorObject::invalid_request()
                    .with_data(json!({"limit": limit, "actual": members.len()}));
                return Some(Reply::Single(Response::error(err, None)));
            }
        }

        if let Some(m) = &self.metrics {
            m.record_batch(members.len() as u64, self.mode.as_str());
        }

        let size = members.len();
        let responses: Vec<Response> = match self.mode {
            BatchMode::Parallel => {
                join_all(members.into_iter().map(|m| self.process_member(m, transport)))
                    .await
                    .into_iter()
                    .flatten()
                    .collect()
            }
            BatchMode::Sequential => {
                let mut responses = Vec::with_capacity(size);
                for member in members {
                    if let Some(response) = self.process_member(member, transport).await {
                        responses.push(response);
                    }
                }
                responses
            }
        };

        tracing::debug!(
            batch_size = size,
            response_count = responses.len(),
            mode = self.mode.as_str(),
            "Batch processed"
        );

        if responses.is_empty() {
            None
        } else {
            Some(Reply::Batch(responses))
        }
    }

    async fn process_member(&self, raw: Value, transport: &TransportContext) -> Option<Response> {
        let request = match validate(&raw) {
            Ok(request) => request,
            Err(reason) => {
                tracing::debug!(reason = %reason, "Rejected request envelope");
                self.record_error("invalid_request");
                return Some(invalid_request());
            }
        };

        let Some(handler) = self.registry.lookup(&request.method) else {
            tracing::debug!(method = %request.method, "Method not found");
            self.record_error("method_not_found");
            return request
                .id
                .map(|id| Response::error(ErrorObject::method_not_found(), Some(id)));
        };

        let ctx = CallContext::new(request.method.clone(), request.id.clone(), transport.clone());
        let started = Instant::now();
        let (response, status) =
            guard::invoke(handler, ctx, request.params, self.diagnostics).await;

        tracing::debug!(
            method = %request.method,
            outcome = status.as_str(),
            notification = request.id.is_none(),
            "Call completed"
        );
        if let Some(m) = &self.metrics {
            m.record_outcome(&request.method, status, started.elapsed().as_secs_f64());
        }

        request.id.map(|id| response.with_id(Some(id)))
    }

    fn record_error(&self, error_type: &'static str) {
        if let Some(m) = &self.metrics {
            m.record_error(error_type);
        }
    }
}

impl<R> fmt::Debug for Dispatcher<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("mode", &self.mode)
            .field("max_batch_size", &self.max_batch_size)
            .field("diagnostics", &self.diagnostics)
            .finish_non_exhaustive()
    }
}

fn invalid_request() -> Response {
    Response::error(ErrorObject::invalid_request(), None)
}

fn encode(reply: &Reply) -> Option<Vec<u8>> {
    match codec::encode_reply(reply) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode reply");
            None
        }
    }
}
