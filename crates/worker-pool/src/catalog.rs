//! Built-in operations over JSON-valued units.
//!
//! The `arbor` binary evaluates units given as arbitrary JSON objects, so the
//! catalog it ships with can only do generic things to them.

use arbor_engine::{CollectedData, OperationCatalog, OperationError, Outcome, Params};
use serde_json::Value;

/// Catalog with the engine built-ins plus the JSON operations below.
///
/// - `report_state`: stores a snapshot of the unit under `report_state`
/// - `assign`: merges the parameter map into the unit object
/// - `increment`: adds `amount` (default 1) to the numeric `field`
/// - `abort_when`: aborts the branch when numeric `field` exceeds `max`
///
/// Condition `has_state` holds for units that are neither null nor empty.
pub fn default_catalog() -> OperationCatalog<Value> {
    let mut catalog = OperationCatalog::<Value>::with_builtins();
    catalog.register_fn("report_state", report_state);
    catalog.register_fn("assign", assign);
    catalog.register_fn("increment", increment);
    catalog.register_fn("abort_when", abort_when);
    catalog.register_condition("has_state", |_, payload| match &payload.state {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    });
    catalog
}

fn report_state(
    state: Value,
    collected_data: &mut CollectedData,
    _params: &Params,
) -> Result<Outcome<Value>, OperationError> {
    collected_data.store("report_state", state.clone());
    Ok(Outcome::state(state))
}

fn assign(state: Value, _: &mut CollectedData, params: &Params) -> Result<Outcome<Value>, OperationError> {
    match state {
        Value::Object(mut map) => {
            map.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
            Ok(Outcome::state(Value::Object(map)))
        }
        other => Err(OperationError::failed(format!(
            "assign expects an object unit, got {}",
            type_name(&other)
        ))),
    }
}

fn increment(mut state: Value, _: &mut CollectedData, params: &Params) -> Result<Outcome<Value>, OperationError> {
    let field = required_str(params, "field")?;
    let amount = match params.get("amount") {
        Some(value) => value
            .as_f64()
            .ok_or_else(|| OperationError::failed("increment 'amount' must be a number"))?,
        None => 1.0,
    };

    let current = match state.get(field) {
        None | Some(Value::Null) => 0.0,
        Some(value) => value.as_f64().ok_or_else(|| {
            OperationError::failed(format!("increment field '{}' is not a number", field))
        })?,
    };

    let map = state
        .as_object_mut()
        .ok_or_else(|| OperationError::failed("increment expects an object unit"))?;
    map.insert(field.to_string(), number(current + amount));
    Ok(Outcome::state(state))
}

fn abort_when(state: Value, _: &mut CollectedData, params: &Params) -> Result<Outcome<Value>, OperationError> {
    let field = required_str(params, "field")?;
    let max = params
        .get("max")
        .and_then(Value::as_f64)
        .ok_or_else(|| OperationError::failed("abort_when requires a numeric 'max' parameter"))?;

    match state.get(field).and_then(Value::as_f64) {
        Some(value) if value > max => Err(OperationError::aborted(format!(
            "{} is {} which exceeds {}",
            field, value, max
        ))),
        _ => Ok(Outcome::state(state)),
    }
}

fn required_str<'p>(params: &'p Params, name: &str) -> Result<&'p str, OperationError> {
    params
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| OperationError::failed(format!("missing string parameter '{}'", name)))
}

/// Integral results stay integers in the output.
fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Value::from(value as i64)
    } else {
        Value::from(value)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_engine::Payload;
    use serde_json::json;

    fn params(value: Value) -> Params {
        match value {
            Value::Object(map) => map,
            _ => panic!("params must be an object"),
        }
    }

    #[test]
    fn test_default_catalog_contents() {
        let catalog = default_catalog();
        for tag in ["do_nothing", "report_state", "assign", "increment", "abort_when"] {
            assert!(catalog.has(tag), "missing {}", tag);
        }
        assert!(catalog.condition("has_state").is_some());
    }

    #[test]
    fn test_report_state() {
        let mut data = CollectedData::new(2020);
        let outcome = report_state(json!({"volume": 120}), &mut data, &Params::new()).unwrap();
        assert_eq!(outcome.state, json!({"volume": 120}));
        assert_eq!(data.get_at("report_state", 2020), Some(&json!({"volume": 120})));
    }

    #[test]
    fn test_assign() {
        let mut data = CollectedData::default();
        let outcome = assign(
            json!({"id": "1", "treated": false}),
            &mut data,
            &params(json!({"treated": true, "method": "thinning"})),
        )
        .unwrap();
        assert_eq!(outcome.state, json!({"id": "1", "treated": true, "method": "thinning"}));

        assert!(assign(json!([1, 2]), &mut data, &Params::new()).is_err());
    }

    #[test]
    fn test_increment() {
        let mut data = CollectedData::default();
        let outcome = increment(json!({"age": 10}), &mut data, &params(json!({"field": "age", "amount": 5}))).unwrap();
        assert_eq!(outcome.state, json!({"age": 15}));

        let outcome = increment(json!({}), &mut data, &params(json!({"field": "age"}))).unwrap();
        assert_eq!(outcome.state, json!({"age": 1}));

        let outcome = increment(json!({"volume": 1.5}), &mut data, &params(json!({"field": "volume", "amount": 0.25}))).unwrap();
        assert_eq!(outcome.state, json!({"volume": 1.75}));

        let err = increment(json!({"age": "old"}), &mut data, &params(json!({"field": "age"}))).unwrap_err();
        assert!(matches!(err, OperationError::Failed(_)));
    }

    #[test]
    fn test_abort_when() {
        let mut data = CollectedData::default();
        let limit = params(json!({"field": "age", "max": 30}));

        assert!(abort_when(json!({"age": 30}), &mut data, &limit).is_ok());
        assert!(abort_when(json!({}), &mut data, &limit).is_ok());
        let err = abort_when(json!({"age": 31}), &mut data, &limit).unwrap_err();
        assert!(matches!(err, OperationError::Aborted(_)));

        let err = abort_when(json!({"age": 31}), &mut data, &params(json!({"field": "age"}))).unwrap_err();
        assert!(matches!(err, OperationError::Failed(_)));
    }

    #[test]
    fn test_has_state() {
        let condition = default_catalog().condition("has_state").unwrap();
        assert!(condition.check(0, &Payload::new(json!({"id": 1}))));
        assert!(!condition.check(0, &Payload::new(json!({}))));
        assert!(!condition.check(0, &Payload::new(Value::Null)));
    }
}
