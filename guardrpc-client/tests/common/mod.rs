//! Common test utilities for guardrpc-client integration tests
//!
//! A scripted WebSocket peer, so client behavior can be tested against
//! replies a real server would never send.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Mock WebSocket server for client testing
pub struct MockWsServer {
    addr: SocketAddr,
    received: mpsc::UnboundedReceiver<String>,
    task: tokio::task::JoinHandle<()>,
}

impl MockWsServer {
    /// Start a mock server that answers each text frame with `handler(text)`
    ///
    /// `None` sends nothing back.
    pub async fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handler = Arc::new(handler);
        let (tx, received) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let handler = Arc::clone(&handler);
                let tx = tx.clone();
                tokio::spawn(async move {
                    let Ok(ws) = accept_async(stream).await else {
                        return;
                    };
                    let (mut write, mut read) = ws.split();
                    while let Some(Ok(msg)) = read.next().await {
                        if let Message::Text(text) = msg {
                            let _ = tx.send(text.clone());
                            if let Some(reply) = handler(&text) {
                                if write.send(Message::Text(reply)).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                });
            }
        });

        Self {
            addr,
            received,
            task,
        }
    }

    /// A server that answers every request with `result`, echoing its id
    pub async fn answering(result: Value) -> Self {
        Self::with_handler(move |text| {
            let request: Value = serde_json::from_str(text).ok()?;
            let id = request.get("id")?.clone();
            Some(serde_json::json!({"jsonrpc": "2.0", "result": result, "id": id}).to_string())
        })
        .await
    }

    /// Get the WebSocket URL for connecting to this server
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Next text frame the server received, parsed as JSON
    pub async fn next_message(&mut self) -> Option<Value> {
        let text = tokio::time::timeout(std::time::Duration::from_secs(5), self.received.recv())
            .await
            .ok()
            .flatten()?;
        serde_json::from_str(&text).ok()
    }

    /// Shutdown the mock server
    pub fn shutdown(self) {
        self.task.abort();
    }
}
