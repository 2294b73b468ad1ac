//! Data collected by operations along a single execution path.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::OperationError;
use crate::payload::TimePoint;

/// Results stored by operations, keyed by a result tag.
///
/// Cloning produces an independent copy. Branches rely on this: each
/// branch owns its own `CollectedData` and never observes a sibling's writes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectedData {
    /// Values stored per time point, see [`CollectedData::store`].
    #[serde(default)]
    pub operation_results: BTreeMap<String, BTreeMap<TimePoint, Value>>,

    /// Append-only result lists, see [`CollectedData::extend_list_result`].
    #[serde(default)]
    pub list_results: BTreeMap<String, Vec<Value>>,

    /// Nested result documents, see [`CollectedData::upsert_nested`].
    #[serde(default)]
    pub nested_results: BTreeMap<String, Map<String, Value>>,

    /// Time point of the operation currently being run.
    pub current_time_point: TimePoint,

    /// First time point of the simulation.
    pub initial_time_point: TimePoint,
}

impl CollectedData {
    /// Create an empty collection starting at the given time point.
    pub fn new(initial_time_point: TimePoint) -> Self {
        Self {
            current_time_point: initial_time_point,
            initial_time_point,
            ..Default::default()
        }
    }

    /// Store a value under `tag` for the current time point.
    pub fn store(&mut self, tag: impl Into<String>, value: Value) {
        self.operation_results
            .entry(tag.into())
            .or_default()
            .insert(self.current_time_point, value);
    }

    /// All values stored under `tag`, ordered by time point.
    pub fn get(&self, tag: &str) -> Option<&BTreeMap<TimePoint, Value>> {
        self.operation_results.get(tag)
    }

    /// Value stored under `tag` at exactly the given time point.
    pub fn get_at(&self, tag: &str, time_point: TimePoint) -> Option<&Value> {
        self.operation_results.get(tag)?.get(&time_point)
    }

    /// Most recent value stored under `tag` strictly before the current time point.
    pub fn prev(&self, tag: &str) -> Option<&Value> {
        self.operation_results
            .get(tag)?
            .range(..self.current_time_point)
            .next_back()
            .map(|(_, value)| value)
    }

    /// List result under `tag`; empty when nothing was collected.
    pub fn get_list_result(&self, tag: &str) -> &[Value] {
        self.list_results
            .get(tag)
            .map(|values| values.as_slice())
            .unwrap_or(&[])
    }

    /// Append values to the list result under `tag`.
    pub fn extend_list_result(&mut self, tag: impl Into<String>, values: impl IntoIterator<Item = Value>) {
        self.list_results.entry(tag.into()).or_default().extend(values);
    }

    /// Nested document under `tag`.
    pub fn get_nested(&self, tag: &str) -> Option<&Map<String, Value>> {
        self.nested_results.get(tag)
    }

    /// Upsert `value` under a key path `[tag, key, ...]`.
    ///
    /// At least two keys are required. Intermediate objects are created as
    /// needed. At the final key an object value is merged into an existing
    /// object; any other value replaces what was there.
    pub fn upsert_nested(&mut self, value: Value, keys: &[&str]) -> Result<(), OperationError> {
        let (tag, path) = match keys {
            [tag, path @ ..] if !path.is_empty() => (*tag, path),
            _ => {
                return Err(OperationError::failed(
                    "At least two keys must be provided for a nested upsert",
                ))
            }
        };
        let root = self.nested_results.entry(tag.to_string()).or_default();
        upsert_into(root, value, path);
        Ok(())
    }
}

fn upsert_into(target: &mut Map<String, Value>, value: Value, path: &[&str]) {
    let (key, rest) = match path.split_first() {
        Some(split) => split,
        None => return,
    };

    if rest.is_empty() {
        match (target.get_mut(*key), value) {
            (Some(Value::Object(existing)), Value::Object(update)) => existing.extend(update),
            (_, value) => {
                target.insert(key.to_string(), value);
            }
        }
        return;
    }

    let child = target
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !child.is_object() {
        *child = Value::Object(Map::new());
    }
    if let Value::Object(child) = child {
        upsert_into(child, value, rest);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_store_and_get() {
        let mut data = CollectedData::new(2020);
        data.store("volume", json!(100.0));
        data.current_time_point = 2025;
        data.store("volume", json!(120.0));

        let volumes = data.get("volume").unwrap();
        assert_eq!(volumes.len(), 2);
        assert_eq!(data.get_at("volume", 2020), Some(&json!(100.0)));
        assert_eq!(data.get("missing"), None);
    }

    #[test]
    fn test_prev_is_strictly_before_current() {
        let mut data = CollectedData::new(0);
        data.store("report", json!("t0"));
        data.current_time_point = 5;
        data.store("report", json!("t5"));

        assert_eq!(data.prev("report"), Some(&json!("t0")));

        data.current_time_point = 10;
        assert_eq!(data.prev("report"), Some(&json!("t5")));

        data.current_time_point = 0;
        assert_eq!(data.prev("report"), None);
        assert_eq!(data.prev("missing"), None);
    }

    #[test]
    fn test_list_results() {
        let mut data = CollectedData::default();
        assert!(data.get_list_result("felled_trees").is_empty());

        data.extend_list_result("felled_trees", vec![json!({"id": 1})]);
        data.extend_list_result("felled_trees", vec![json!({"id": 2}), json!({"id": 3})]);
        assert_eq!(data.get_list_result("felled_trees").len(), 3);
    }

    #[test]
    fn test_upsert_nested() {
        let mut data = CollectedData::default();
        data.upsert_nested(json!({"a": 1}), &["npv", "3"]).unwrap();
        data.upsert_nested(json!({"b": 2}), &["npv", "3"]).unwrap();
        data.upsert_nested(json!(7), &["npv", "5", "total"]).unwrap();

        let npv = data.get_nested("npv").unwrap();
        assert_eq!(npv.get("3"), Some(&json!({"a": 1, "b": 2})));
        assert_eq!(npv.get("5"), Some(&json!({"total": 7})));

        data.upsert_nested(json!("replaced"), &["npv", "3"]).unwrap();
        assert_eq!(data.get_nested("npv").unwrap().get("3"), Some(&json!("replaced")));
    }

    #[test]
    fn test_upsert_nested_requires_two_keys() {
        let mut data = CollectedData::default();
        assert!(data.upsert_nested(json!(1), &["npv"]).is_err());
        assert!(data.upsert_nested(json!(1), &[]).is_err());
    }

    #[test]
    fn test_clone_is_independent() {
        let mut original = CollectedData::new(0);
        original.store("x", json!(1));
        let mut copy = original.clone();
        copy.store("x", json!(2));
        copy.extend_list_result("y", vec![json!(true)]);

        assert_eq!(original.get_at("x", 0), Some(&json!(1)));
        assert!(original.get_list_result("y").is_empty());
    }
}
