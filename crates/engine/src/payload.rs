//! The unit of data threaded through one execution path.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::collected_data::CollectedData;

/// A declared point of simulation time.
pub type TimePoint = i64;

/// Parameter set bound to an operation.
pub type Params = Map<String, Value>;

/// One applied operation in a payload's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub time_point: TimePoint,
    pub operation: String,
    #[serde(default)]
    pub params: Params,
}

/// Simulation state and progress data for one candidate path.
///
/// `state` must implement `Clone` as a deep copy: at every branching point
/// the engine clones the payload and hands each branch its own copy.
/// `operation_history` is append-only along a path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload<T> {
    pub state: T,
    pub collected_data: CollectedData,
    pub operation_history: Vec<HistoryEntry>,
}

impl<T> Payload<T> {
    /// Create a payload with empty history starting at time point 0.
    pub fn new(state: T) -> Self {
        Self::with_initial_time_point(state, 0)
    }

    /// Create a payload whose collected data starts at `initial_time_point`.
    pub fn with_initial_time_point(state: T, initial_time_point: TimePoint) -> Self {
        Self {
            state,
            collected_data: CollectedData::new(initial_time_point),
            operation_history: Vec::new(),
        }
    }

    /// Time point of the most recent run of `operation` on this path.
    pub fn last_run(&self, operation: &str) -> Option<TimePoint> {
        self.operation_history
            .iter()
            .rev()
            .find(|entry| entry.operation == operation)
            .map(|entry| entry.time_point)
    }

    /// Tags of applied operations in order.
    pub fn applied_operations(&self) -> Vec<&str> {
        self.operation_history
            .iter()
            .map(|entry| entry.operation.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(time_point: TimePoint, operation: &str) -> HistoryEntry {
        HistoryEntry {
            time_point,
            operation: operation.to_string(),
            params: Params::new(),
        }
    }

    #[test]
    fn test_last_run() {
        let mut payload = Payload::new(0_i64);
        payload.operation_history = vec![
            entry(1, "operation1"),
            entry(3, "operation2"),
            entry(6, "operation2"),
            entry(8, "operation3"),
            entry(9, "operation1"),
        ];

        assert_eq!(payload.last_run("operation1"), Some(9));
        assert_eq!(payload.last_run("operation2"), Some(6));
        assert_eq!(payload.last_run("operation3"), Some(8));
        assert_eq!(payload.last_run("operation4"), None);
    }

    #[test]
    fn test_new_payload() {
        let payload = Payload::with_initial_time_point("stand", 2020);
        assert_eq!(payload.collected_data.initial_time_point, 2020);
        assert_eq!(payload.collected_data.current_time_point, 2020);
        assert!(payload.operation_history.is_empty());
        assert!(payload.applied_operations().is_empty());
    }

    #[test]
    fn test_payload_serialization() {
        let mut payload = Payload::new(serde_json::json!({"identifier": "1"}));
        payload.operation_history.push(entry(5, "grow"));

        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"operation\":\"grow\""));
        assert!(json.contains("\"identifier\":\"1\""));
    }
}
