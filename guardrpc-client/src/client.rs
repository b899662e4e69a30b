//! JSON-RPC client implementation over WebSocket
//!
//! This module provides [`RpcClient`], a small request/response client for
//! talking to a guardrpc server (or any JSON-RPC 2.0 server that answers one
//! WebSocket frame with one WebSocket frame).
//!
//! # Client Lifecycle
//!
//! 1. **Connect**: `RpcClient::connect(url)` or [`crate::ClientBuilder`]
//! 2. **Use**: `request`, `notify`, `batch`
//! 3. **Close**: `close()` sends a Close frame; dropping the client also
//!    closes the socket
//!
//! # Concurrency
//!
//! The socket sits behind a mutex and every call holds it from send to
//! receive, so exactly one call is in flight per client. Replies therefore
//! always belong to the call waiting for them; the id check catches servers
//! that break that assumption.

use crate::ClientMetrics;
use futures::{SinkExt, StreamExt};
use guardrpc_core::codec;
use guardrpc_core::{BatchRequest, BatchResponse, Error, Id, Request, Response, Result};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Request ids are drawn from `1..=MAX_REQUEST_ID`
pub const MAX_REQUEST_ID: i64 = 5000;

/// JSON-RPC client over WebSocket
pub struct RpcClient {
    stream: Mutex<WsStream>,
    debug: bool,
    metrics: Option<Arc<ClientMetrics>>,
}

impl RpcClient {
    /// Connect to a JSON-RPC server over WebSocket with default options
    #[tracing::instrument(skip(url), fields(url = url))]
    pub async fn connect(url: &str) -> Result<Self> {
        let stream = open(url).await?;
        Ok(Self::from_parts(stream, false, None))
    }

    pub(crate) fn from_parts(
        stream: WsStream,
        debug: bool,
        metrics: Option<Arc<ClientMetrics>>,
    ) -> Self {
        Self {
            stream: Mutex::new(stream),
            debug,
            metrics,
        }
    }

    /// Whether `-->`/`<--` debug lines are logged
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Call `method` and wait for its result
    ///
    /// `params` must serialize to an array, an object or `null` (sent as
    /// "no params"); `()` and `None::<T>` both mean no params.
    ///
    /// # Errors
    ///
    /// - `Error::Rpc` when the server answered with an error object
    /// - `Error::IdMismatch` when the reply answers another request
    /// - `Error::UnexpectedReply` when a batch came back instead
    /// - `Error::Serialization` when params or the result don't convert
    /// - `Error::WebSocket` / `Error::ConnectionClosed` on transport failure
    #[tracing::instrument(skip(self, params), fields(method = %method.as_ref()))]
    pub async fn request<P, R>(&self, method: impl Into<String> + AsRef<str>, params: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let start = Instant::now();
        let method = method.into();
        let id = Id::from(rand::thread_rng().gen_range(1..=MAX_REQUEST_ID));
        let request = Request::new(method.clone(), to_params(params)?, id.clone());

        let result = self.round_trip(&request, &id).await;
        let duration = start.elapsed().as_secs_f64();

        match result {
            Ok(value) => {
                let value: R = serde_json::from_value(value)
                    .map_err(|e| Error::Serialization(e.to_string()))?;
                if let Some(ref m) = self.metrics {
                    m.record_request(&method, "success", duration);
                }
                tracing::debug!(duration_secs = duration, "Request completed");
                Ok(value)
            }
            Err(e) => {
                if let Some(ref m) = self.metrics {
                    m.record_request(&method, "error", duration);
                    m.record_error(error_type(&e));
                }
                tracing::debug!(error = %e, "Request failed");
                Err(e)
            }
        }
    }

    async fn round_trip(&self, request: &Request, id: &Id) -> Result<Value> {
        let text = codec::encode(request)?;
        if self.debug {
            tracing::debug!("{}", request);
        }

        let mut stream = self.stream.lock().await;
        send_text(&mut stream, text).await?;
        let data = read_data(&mut stream).await?;
        drop(stream);

        let response = match codec::decode_reply(&data)? {
            guardrpc_core::Reply::Single(response) => response,
            guardrpc_core::Reply::Batch(responses) => {
                return Err(Error::UnexpectedReply(format!(
                    "expected one response, got a batch of {}",
                    responses.len()
                )))
            }
        };
        if self.debug {
            tracing::debug!("{}", response);
        }

        check_id(response, id)?.into_result().map_err(Error::Rpc)
    }

    /// Send a notification; no reply is expected or read
    #[tracing::instrument(skip(self, params), fields(method = %method.as_ref()))]
    pub async fn notify<P>(&self, method: impl Into<String> + AsRef<str>, params: P) -> Result<()>
    where
        P: Serialize,
    {
        let notification = Request::notification(method, to_params(params)?);
        let text = codec::encode(&notification)?;
        if self.debug {
            tracing::debug!("{}", notification);
        }

        let mut stream = self.stream.lock().await;
        send_text(&mut stream, text).await
    }

    /// Send several requests as one batch
    ///
    /// Returns the responses in the order the server sent them (which for a
    /// guardrpc server is request order, without notifications). When every
    /// request is a notification nothing is read and the result is empty. A
    /// server that rejects the whole batch answers with one error response,
    /// returned as a single-element vector.
    #[tracing::instrument(skip(self, requests), fields(size = requests.len()))]
    pub async fn batch(&self, requests: Vec<Request>) -> Result<Vec<Response>> {
        let start = Instant::now();
        let expects_reply = requests.is_empty() || requests.iter().any(|r| !r.is_notification());
        let batch = BatchRequest(requests);
        let text = codec::encode(&batch)?;
        if self.debug {
            tracing::debug!("{}", batch);
        }
        if let Some(ref m) = self.metrics {
            m.record_batch(batch.0.len() as u64);
        }

        let mut stream = self.stream.lock().await;
        send_text(&mut stream, text).await?;
        if !expects_reply {
            return Ok(Vec::new());
        }
        let data = read_data(&mut stream).await?;
        drop(stream);

        let responses = codec::decode_reply(&data)?.into_responses();
        if self.debug {
            tracing::debug!("{}", BatchResponse(responses.clone()));
        }
        if let Some(ref m) = self.metrics {
            m.record_request("batch", "success", start.elapsed().as_secs_f64());
        }

        Ok(responses)
    }

    /// Close the connection
    pub async fn close(&self) -> Result<()> {
        let mut stream = self.stream.lock().await;
        match stream.close(None).await {
            Ok(()) => Ok(()),
            Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed) => Ok(()),
            Err(e) => Err(Error::WebSocket(e.to_string())),
        }
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("debug", &self.debug)
            .field("metrics", &self.metrics.is_some())
            .finish_non_exhaustive()
    }
}

pub(crate) async fn open(url: &str) -> Result<WsStream> {
    tracing::info!(url = url, "Connecting to server");
    let (stream, _) = connect_async(url)
        .await
        .map_err(|e| Error::WebSocket(e.to_string()))?;
    tracing::info!("Connected successfully");
    Ok(stream)
}

fn to_params<P: Serialize>(params: P) -> Result<Option<Value>> {
    let value = serde_json::to_value(params).map_err(|e| Error::Serialization(e.to_string()))?;
    Ok(if value.is_null() { None } else { Some(value) })
}

// An error reply is reported as such even when its id is null (for example a
// Parse error), so only successful replies are held to the id check.
fn check_id(response: Response, expected: &Id) -> Result<Response> {
    if response.is_error() || response.id.as_ref() == Some(expected) {
        return Ok(response);
    }
    Err(Error::IdMismatch {
        expected: expected.to_string(),
        actual: response
            .id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "null".to_string()),
    })
}

async fn send_text(stream: &mut WsStream, text: String) -> Result<()> {
    stream
        .send(Message::Text(text))
        .await
        .map_err(|e| Error::WebSocket(e.to_string()))
}

async fn read_data(stream: &mut WsStream) -> Result<Vec<u8>> {
    while let Some(message) = stream.next().await {
        match message.map_err(|e| Error::WebSocket(e.to_string()))? {
            Message::Text(text) => return Ok(text.into_bytes()),
            Message::Binary(data) => return Ok(data),
            Message::Close(_) => return Err(Error::ConnectionClosed),
            _ => continue,
        }
    }
    Err(Error::ConnectionClosed)
}

fn error_type(error: &Error) -> &'static str {
    match error {
        Error::Rpc(_) => "rpc",
        Error::IdMismatch { .. } => "id_mismatch",
        Error::UnexpectedReply(_) => "unexpected_reply",
        Error::Serialization(_) => "serialization",
        Error::ConnectionClosed => "connection_closed",
        _ => "transport",
    }
}
