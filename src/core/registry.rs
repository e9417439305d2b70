//! Method registry: name → handler, shared by the poll loop and the builder.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::TaskHandler;

/// Live mapping from method name to handler.
///
/// Cloning yields another handle to the same registry. Registration merges
/// with last-writer-wins semantics; there is no removal.
#[derive(Clone, Default)]
pub struct MethodRegistry {
    handlers: Arc<RwLock<HashMap<String, Arc<dyn TaskHandler>>>>,
}

impl MethodRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `methods` into the registry, overwriting existing names.
    pub fn register_methods<I, K>(&self, methods: I)
    where
        I: IntoIterator<Item = (K, Arc<dyn TaskHandler>)>,
        K: Into<String>,
    {
        let mut handlers = self.handlers.write();
        for (name, handler) in methods {
            let name = name.into();
            if handlers.insert(name.clone(), handler).is_some() {
                tracing::debug!(method = %name, "handler replaced");
            }
        }
    }

    /// Register a single handler, overwriting any previous one.
    pub fn register(&self, name: impl Into<String>, handler: impl TaskHandler + 'static) {
        let handler: Arc<dyn TaskHandler> = Arc::new(handler);
        self.register_methods([(name.into(), handler)]);
    }

    /// Handler registered under `name`.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.read().get(name).cloned()
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.read().contains_key(name)
    }

    /// Snapshot of registered names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Number of registered methods.
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }
}
