//! WebSocket transport adapter
//!
//! This module moves bytes between a WebSocket and the [`Dispatcher`]. It has
//! no protocol logic of its own.
//!
//! # Connection Lifecycle
//!
//! 1. **Accept**: TCP connection accepted by the server loop
//! 2. **Upgrade**: WebSocket handshake via `accept_async`
//! 3. **Process**: every Text or Binary frame is one inbound message, handled
//!    on its own task; replies go out as Text frames
//! 4. **Close**: the cancel handle is dropped, so in-flight handlers observe
//!    cancellation; queued replies get a short grace period to drain
//!
//! # Task Model
//!
//! - **Receive loop**: reads frames and spawns one task per message
//! - **Send task**: writes outgoing frames from an unbounded channel
//!
//! Replies to concurrent messages are sent in completion order, which is fine
//! because each reply carries the id it answers.
//!
//! # Read Errors
//!
//! A frame that cannot be read (oversized, invalid UTF-8 text, protocol
//! violation) is answered with a single Invalid Request response while the
//! socket can still send, and then the connection is closed.

use crate::context::TransportContext;
use crate::dispatch::Dispatcher;
use crate::metrics::ServerMetrics;
use crate::registry::MethodLookup;
use futures::{SinkExt, StreamExt};
use guardrpc_core::{Error, Result};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

/// How long queued replies may take to flush once the peer stops sending
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Serve one WebSocket connection until it closes
///
/// # Arguments
///
/// * `stream` - The accepted TCP stream
/// * `conn_id` - Server-assigned connection id, exposed to handlers
/// * `dispatcher` - Shared dispatcher
/// * `active` - Shared count of open connections
/// * `metrics` - Optional connection metrics
#[tracing::instrument(skip(stream, dispatcher, active, metrics), fields(conn_id = conn_id))]
pub async fn handle_connection<R>(
    stream: TcpStream,
    conn_id: u64,
    dispatcher: Arc<Dispatcher<R>>,
    active: Arc<AtomicI64>,
    metrics: Option<Arc<ServerMetrics>>,
) -> Result<()>
where
    R: MethodLookup + 'static,
{
    tracing::debug!("Upgrading connection to WebSocket");
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| Error::WebSocket(e.to_string()))?;

    let now_active = active.fetch_add(1, Ordering::SeqCst) + 1;
    if let Some(ref m) = metrics {
        m.record_connection(now_active);
    }

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let (transport, cancel) = TransportContext::new(Some(conn_id));

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = ws_sender.send(msg).await {
                tracing::debug!(error = %e, "Error sending message");
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    let recv_metrics = metrics.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(message) = ws_receiver.next().await {
            let data = match message {
                Ok(Message::Text(text)) => text.into_bytes(),
                Ok(Message::Binary(data)) => data,
                Ok(Message::Close(_)) => {
                    tracing::info!("Connection closed by client");
                    break;
                }
                Ok(_) => continue,
                Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => break,
                Err(e) => {
                    if let Some(ref m) = recv_metrics {
                        m.record_error("websocket");
                    }
                    let reply = dispatcher.handle_read(Err(e), &transport).await;
                    send_reply(&tx, reply);
                    break;
                }
            };

            let dispatcher = Arc::clone(&dispatcher);
            let transport = transport.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let reply = dispatcher.handle_bytes(&data, &transport).await;
                send_reply(&tx, reply);
            });
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
            drop(cancel);
        }
        _ = &mut recv_task => {
            // The receive loop dropped its sender; the send task ends once
            // every in-flight message task has dropped theirs too.
            drop(cancel);
            if tokio::time::timeout(DRAIN_TIMEOUT, &mut send_task).await.is_err() {
                tracing::debug!("Dropping undelivered replies");
                send_task.abort();
            }
        }
    }

    let now_active = active.fetch_sub(1, Ordering::SeqCst) - 1;
    if let Some(ref m) = metrics {
        m.record_disconnection(now_active);
    }

    tracing::info!("Connection closed");
    Ok(())
}

fn send_reply(tx: &mpsc::UnboundedSender<Message>, reply: Option<Vec<u8>>) {
    let Some(bytes) = reply else {
        return;
    };
    match String::from_utf8(bytes) {
        Ok(text) => {
            // The peer may already be gone; nothing left to do then.
            let _ = tx.send(Message::Text(text));
        }
        Err(e) => tracing::error!(error = %e, "Encoded reply is not UTF-8"),
    }
}
