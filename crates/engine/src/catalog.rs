//! Operation catalog and tag resolution.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::collected_data::CollectedData;
use crate::condition::Condition;
use crate::error::{OperationError, SimError, SimResult};
use crate::operation::{DoNothing, Finalizer, FnOperation, Operation, Outcome};
use crate::payload::{Params, Payload, TimePoint};

/// Tag of the built-in operation that leaves the state unchanged.
pub const DO_NOTHING: &str = "do_nothing";

/// Registry of the operations and conditions a control declaration may name.
///
/// Tags are resolved against the catalog once, when a tree is compiled.
pub struct OperationCatalog<T> {
    operations: HashMap<String, Arc<dyn Operation<T>>>,
    conditions: HashMap<String, Condition<T>>,
    finalizer: Option<Finalizer<T>>,
}

impl<T: 'static> OperationCatalog<T> {
    /// Create a new empty catalog.
    pub fn new() -> Self {
        Self {
            operations: HashMap::new(),
            conditions: HashMap::new(),
            finalizer: None,
        }
    }

    /// Create a catalog with the built-in operations registered.
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        catalog.register(DO_NOTHING, DoNothing);
        catalog
    }

    /// Register an operation under `tag`, replacing any previous one.
    pub fn register<O: Operation<T> + 'static>(&mut self, tag: impl Into<String>, operation: O) {
        self.operations.insert(tag.into(), Arc::new(operation));
    }

    /// Register a closure as an operation.
    pub fn register_fn<F>(&mut self, tag: impl Into<String>, operation: F)
    where
        F: Fn(T, &mut CollectedData, &Params) -> Result<Outcome<T>, OperationError>
            + Send
            + Sync
            + 'static,
    {
        self.register(tag, FnOperation(operation));
    }

    /// Register a named condition.
    pub fn register_condition<F>(&mut self, name: impl Into<String>, predicate: F)
    where
        F: Fn(TimePoint, &Payload<T>) -> bool + Send + Sync + 'static,
    {
        let name = name.into();
        self.conditions
            .insert(name.clone(), Condition::new(name, predicate));
    }

    /// Set the hook applied to the state after every operation of a tree.
    pub fn set_finalizer<F>(&mut self, finalizer: F)
    where
        F: Fn(&mut T) + Send + Sync + 'static,
    {
        let finalizer: Finalizer<T> = Arc::new(finalizer);
        self.finalizer = Some(finalizer);
    }

    pub fn finalizer(&self) -> Option<Finalizer<T>> {
        self.finalizer.clone()
    }

    /// Get an operation by tag.
    pub fn get(&self, tag: &str) -> Option<Arc<dyn Operation<T>>> {
        self.operations.get(tag).cloned()
    }

    /// Check if an operation is registered.
    pub fn has(&self, tag: &str) -> bool {
        self.operations.contains_key(tag)
    }

    /// List all registered operation tags.
    pub fn list(&self) -> Vec<&str> {
        self.operations.keys().map(|s| s.as_str()).collect()
    }

    /// Get a condition by name.
    pub fn condition(&self, name: &str) -> Option<Condition<T>> {
        self.conditions.get(name).cloned()
    }

    /// Get an operation by tag, failing with a configuration error if unknown.
    pub fn resolve(&self, tag: &str) -> SimResult<Arc<dyn Operation<T>>> {
        self.get(tag)
            .ok_or_else(|| SimError::configuration(format!("Unknown operation '{}'", tag)))
    }

    /// Get a condition by name, failing with a configuration error if unknown.
    pub fn resolve_condition(&self, name: &str) -> SimResult<Condition<T>> {
        self.condition(name)
            .ok_or_else(|| SimError::configuration(format!("Unknown condition '{}'", name)))
    }
}

impl<T: 'static> Default for OperationCatalog<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for OperationCatalog<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationCatalog")
            .field("operations", &self.operations.keys().collect::<Vec<_>>())
            .field("conditions", &self.conditions.keys().collect::<Vec<_>>())
            .field("finalizer", &self.finalizer.is_some())
            .finish()
    }
}
