//! Method registry
//!
//! Handlers are registered on a [`RegistryBuilder`] and frozen into a
//! [`MethodRegistry`] before serving starts. The frozen registry is an
//! `Arc<HashMap>`: cloning it is cheap, lookups take no lock, and there is no
//! way to add or remove a method while requests are being dispatched.
//!
//! # Naming Rules
//!
//! - Names must be non-empty
//! - Each name may be registered once
//! - Names starting with `rpc.` are reserved by JSON-RPC 2.0
//!
//! # Examples
//!
//! ```rust
//! use guardrpc_server::{from_typed_fn, RegistryBuilder};
//!
//! let mut builder = RegistryBuilder::new();
//! builder
//!     .register("sum", from_typed_fn(|n: Vec<i64>| async move { Ok(n.iter().sum::<i64>()) }))
//!     .unwrap();
//!
//! let registry = builder.build();
//! assert!(registry.contains("sum"));
//! assert_eq!(registry.len(), 1);
//! ```

use crate::handler::Handler;
use guardrpc_core::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Prefix reserved for protocol-internal methods
pub const RESERVED_PREFIX: &str = "rpc.";

/// Read access to registered handlers
///
/// The dispatcher is generic over this trait so tests can observe lookups.
pub trait MethodLookup: Send + Sync {
    /// Find the handler registered under exactly `method`
    fn lookup(&self, method: &str) -> Option<Arc<dyn Handler>>;
}

/// Mutable registry used during startup
#[derive(Default)]
pub struct RegistryBuilder {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a method name
    ///
    /// # Arguments
    ///
    /// * `method` - The method name clients will call
    /// * `handler` - The handler serving it
    ///
    /// # Errors
    ///
    /// - `Error::EmptyMethodName` for `""`
    /// - `Error::ReservedMethodName` for names starting with `rpc.`
    /// - `Error::DuplicateMethod` if the name is already taken
    pub fn register(
        &mut self,
        method: impl Into<String>,
        handler: Box<dyn Handler>,
    ) -> Result<&mut Self> {
        let method = method.into();
        if method.is_empty() {
            return Err(Error::EmptyMethodName);
        }
        if method.starts_with(RESERVED_PREFIX) {
            return Err(Error::ReservedMethodName(method));
        }
        if self.handlers.contains_key(&method) {
            return Err(Error::DuplicateMethod(method));
        }

        tracing::debug!(method = %method, "Registered method");
        self.handlers.insert(method, Arc::from(handler));
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Freeze the registry
    pub fn build(self) -> MethodRegistry {
        MethodRegistry {
            handlers: Arc::new(self.handlers),
        }
    }
}

/// Frozen, read-only method registry
#[derive(Clone, Default)]
pub struct MethodRegistry {
    handlers: Arc<HashMap<String, Arc<dyn Handler>>>,
}

impl MethodRegistry {
    /// Registered method names, sorted
    pub fn methods(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn contains(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }
}

impl MethodLookup for MethodRegistry {
    fn lookup(&self, method: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(method).cloned()
    }
}

impl<T: MethodLookup + ?Sized> MethodLookup for Arc<T> {
    fn lookup(&self, method: &str) -> Option<Arc<dyn Handler>> {
        (**self).lookup(method)
    }
}

impl std::fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodRegistry")
            .field("methods", &self.methods())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{from_fn, HandlerOutcome};
    use serde_json::Value;

    fn noop() -> Box<dyn Handler> {
        from_fn(|_ctx, _params| async { HandlerOutcome::Success(Value::Bool(true)) })
    }

    #[test]
    fn test_register_and_lookup() {
        let mut builder = RegistryBuilder::new();
        builder.register("a", noop()).unwrap();
        builder.register("b", noop()).unwrap();
        let registry = builder.build();

        assert_eq!(registry.methods(), vec!["a".to_string(), "b".to_string()]);
        assert!(registry.lookup("a").is_some());
        assert!(registry.lookup("c").is_none());
        assert!(registry.lookup("A").is_none());
    }

    #[test]
    fn test_rejects_empty_name() {
        let mut builder = RegistryBuilder::new();
        assert!(matches!(
            builder.register("", noop()),
            Err(Error::EmptyMethodName)
        ));
    }

    #[test]
    fn test_rejects_duplicate() {
        let mut builder = RegistryBuilder::new();
        builder.register("sum", noop()).unwrap();
        match builder.register("sum", noop()) {
            Err(Error::DuplicateMethod(name)) => assert_eq!(name, "sum"),
            _ => panic!("Expected DuplicateMethod"),
        }
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn test_rejects_reserved_prefix() {
        let mut builder = RegistryBuilder::new();
        assert!(matches!(
            builder.register("rpc.discover", noop()),
            Err(Error::ReservedMethodName(_))
        ));
        // Only the exact prefix is reserved.
        assert!(builder.register("rpcx", noop()).is_ok());
    }

    #[test]
    fn test_clones_share_handlers() {
        let mut builder = RegistryBuilder::new();
        builder.register("a", noop()).unwrap();
        let registry = builder.build();
        let clone = registry.clone();
        assert!(Arc::ptr_eq(
            &registry.lookup("a").unwrap(),
            &clone.lookup("a").unwrap()
        ));
    }
}
