//! Preconditions attached to events.

use std::fmt;
use std::sync::Arc;

use crate::payload::{Payload, TimePoint};

type Predicate<T> = Arc<dyn Fn(TimePoint, &Payload<T>) -> bool + Send + Sync>;

/// A named predicate over the time point and the payload about to be processed.
///
/// Conditions are checked when the event runs, not when the tree is built,
/// since most of them look at the payload.
pub struct Condition<T> {
    name: String,
    predicate: Predicate<T>,
}

impl<T> Clone for Condition<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            predicate: Arc::clone(&self.predicate),
        }
    }
}

impl<T> fmt::Debug for Condition<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition").field("name", &self.name).finish()
    }
}

impl<T> Condition<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluate the condition.
    pub fn check(&self, time_point: TimePoint, payload: &Payload<T>) -> bool {
        (self.predicate)(time_point, payload)
    }
}

impl<T: 'static> Condition<T> {
    pub fn new<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(TimePoint, &Payload<T>) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Both conditions hold.
    pub fn and(self, other: Condition<T>) -> Self {
        let name = format!("({} and {})", self.name, other.name);
        Self::new(name, move |tp, payload| {
            self.check(tp, payload) && other.check(tp, payload)
        })
    }

    /// At least one condition holds.
    pub fn or(self, other: Condition<T>) -> Self {
        let name = format!("({} or {})", self.name, other.name);
        Self::new(name, move |tp, payload| {
            self.check(tp, payload) || other.check(tp, payload)
        })
    }

    /// The condition does not hold.
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        let name = format!("not {}", self.name);
        Self::new(name, move |tp, payload| !self.check(tp, payload))
    }

    /// Holds when `operation` never ran on this path, or ran at least
    /// `interval` time units before the checked time point.
    pub fn minimum_time_interval(operation: impl Into<String>, interval: i64) -> Self {
        let operation = operation.into();
        let name = format!("minimum_time_interval({operation}, {interval})");
        Self::new(name, move |tp, payload| match payload.last_run(&operation) {
            Some(last_run) => tp - last_run >= interval,
            None => true,
        })
    }
}
