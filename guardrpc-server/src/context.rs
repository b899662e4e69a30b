//! Per-call context handed to handlers
//!
//! A handler receives a [`CallContext`] describing the call it is serving:
//! the method name, the request id, and a [`TransportContext`] supplied by
//! whatever delivered the bytes.
//!
//! # Cancellation
//!
//! The transport context carries a cancellation signal backed by a
//! `tokio::sync::watch` channel. The WebSocket adapter creates one per
//! connection and keeps the [`CancelHandle`]; when the connection goes away
//! the handle is dropped and every in-flight handler on that connection can
//! observe it through [`CallContext::is_cancelled`] or await
//! [`CallContext::cancelled`]. The dispatcher itself never cancels or times
//! out a call.
//!
//! ```rust
//! use guardrpc_server::TransportContext;
//!
//! let (ctx, handle) = TransportContext::new(Some(7));
//! assert!(!ctx.is_cancelled());
//! drop(handle);
//! assert!(ctx.is_cancelled());
//! ```

use guardrpc_core::Id;
use tokio::sync::watch;

/// What the transport knows about the message being processed
#[derive(Debug, Clone, Default)]
pub struct TransportContext {
    conn_id: Option<u64>,
    cancel: Option<watch::Receiver<bool>>,
}

impl TransportContext {
    /// Create a cancellable context
    ///
    /// Returns the context and the handle that controls it. Cancelling or
    /// dropping the handle cancels every clone of the context.
    pub fn new(conn_id: Option<u64>) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        let ctx = Self {
            conn_id,
            cancel: Some(rx),
        };
        (ctx, CancelHandle { tx })
    }

    /// A context that is never cancelled
    ///
    /// Used when the dispatcher is driven directly, outside any connection.
    pub fn detached() -> Self {
        Self::default()
    }

    /// Id of the connection the message arrived on, if any
    pub fn conn_id(&self) -> Option<u64> {
        self.conn_id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Resolve once the context is cancelled
    ///
    /// Never resolves for a detached context.
    pub async fn cancelled(&self) {
        match &self.cancel {
            Some(rx) => {
                let mut rx = rx.clone();
                // An error means the handle is gone, which also counts.
                let _ = rx.wait_for(|cancelled| *cancelled).await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

/// Owner side of a [`TransportContext`] cancellation signal
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl Drop for CancelHandle {
    fn drop(&mut self) {
        self.tx.send_replace(true);
    }
}

/// Context for one handler invocation
#[derive(Debug, Clone)]
pub struct CallContext {
    method: String,
    id: Option<Id>,
    transport: TransportContext,
}

impl CallContext {
    pub fn new(method: impl Into<String>, id: Option<Id>, transport: TransportContext) -> Self {
        Self {
            method: method.into(),
            id,
            transport,
        }
    }

    /// Name of the method being called
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Request id; `None` when serving a notification
    pub fn id(&self) -> Option<&Id> {
        self.id.as_ref()
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    pub fn transport(&self) -> &TransportContext {
        &self.transport
    }

    pub fn conn_id(&self) -> Option<u64> {
        self.transport.conn_id()
    }

    pub fn is_cancelled(&self) -> bool {
        self.transport.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.transport.cancelled().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_detached_is_never_cancelled() {
        let ctx = TransportContext::detached();
        assert!(!ctx.is_cancelled());
        assert_eq!(ctx.conn_id(), None);
    }

    #[test]
    fn test_cancel_reaches_clones() {
        let (ctx, handle) = TransportContext::new(Some(3));
        let clone = ctx.clone();
        handle.cancel();
        assert!(ctx.is_cancelled());
        assert!(clone.is_cancelled());
        assert_eq!(clone.conn_id(), Some(3));
    }

    #[tokio::test]
    async fn test_cancelled_resolves_on_drop() {
        let (ctx, handle) = TransportContext::new(None);
        let call = CallContext::new("wait", Some(Id::from(1i64)), ctx);

        let waiter = tokio::spawn(async move {
            call.cancelled().await;
            call.is_cancelled()
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(handle);

        let observed = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(observed);
    }

    #[tokio::test]
    async fn test_detached_cancelled_pends() {
        let ctx = TransportContext::detached();
        let result = tokio::time::timeout(Duration::from_millis(20), ctx.cancelled()).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_call_context_accessors() {
        let call = CallContext::new("sum", None, TransportContext::detached());
        assert_eq!(call.method(), "sum");
        assert!(call.is_notification());
        assert!(call.id().is_none());
    }
}
