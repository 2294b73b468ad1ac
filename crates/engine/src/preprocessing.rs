//! Operations applied once to every unit before the simulation starts.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::catalog::OperationCatalog;
use crate::error::{SimError, SimResult};
use crate::payload::{Params, Payload};
use crate::processor::ProcessedOperation;
use crate::runners::evaluate_sequence;

/// Bind each tag to its parameter set, in order.
///
/// Branching is not available here, so a tag with more than one parameter
/// set is a configuration error.
pub fn simple_processable_chain<T: 'static>(
    tags: &[String],
    params: &HashMap<String, Vec<Params>>,
    catalog: &OperationCatalog<T>,
) -> SimResult<Vec<ProcessedOperation<T>>> {
    tags.iter()
        .map(|tag| {
            let operation = catalog.resolve(tag)?;
            let params = match params.get(tag).map(|sets| sets.as_slice()) {
                None | Some([]) => Params::new(),
                Some([single]) => single.clone(),
                Some(sets) => {
                    return Err(SimError::configuration(format!(
                        "Preprocessing operation '{}' declares {} parameter sets. \
                         Multiple parameter sets are only supported for alternatives.",
                        tag,
                        sets.len()
                    )))
                }
            };
            Ok(ProcessedOperation::new(tag.clone(), 0, params, operation))
        })
        .collect()
}

/// Fold every unit's state through `chain`.
///
/// A unit the chain aborts on is left out of the result. The operation
/// history of preprocessing is not kept.
pub fn preprocess_units<T>(
    units: Vec<(String, T)>,
    chain: &[ProcessedOperation<T>],
) -> SimResult<Vec<(String, T)>> {
    if chain.is_empty() {
        return Ok(units);
    }

    let total = units.len();
    let mut kept = Vec::with_capacity(total);
    for (identifier, state) in units {
        match evaluate_sequence(Payload::new(state), chain) {
            Ok(payload) => kept.push((identifier, payload.state)),
            Err(e) if e.is_branch_abort() => {
                debug!(unit = %identifier, reason = %e, "Unit excluded by preprocessing");
            }
            Err(e) => return Err(e),
        }
    }

    info!(units = total, kept = kept.len(), "Preprocessing done");
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OperationError;
    use crate::operation::Outcome;
    use serde_json::json;

    fn catalog() -> OperationCatalog<i64> {
        let mut catalog = OperationCatalog::<i64>::with_builtins();
        catalog.register_fn("scale", |state, _, params| {
            let factor = params.get("factor").and_then(|v| v.as_i64()).unwrap_or(1);
            Ok(Outcome::state(state * factor))
        });
        catalog.register_fn("exclude_empty", |state, _, _| {
            if state == 0 {
                Err(OperationError::aborted("empty unit"))
            } else {
                Ok(Outcome::state(state))
            }
        });
        catalog
    }

    fn factor(value: i64) -> Params {
        let mut params = Params::new();
        params.insert("factor".to_string(), json!(value));
        params
    }

    #[test]
    fn test_preprocess_units() {
        let catalog = catalog();
        let tags = vec!["exclude_empty".to_string(), "scale".to_string()];
        let params = HashMap::from([("scale".to_string(), vec![factor(3)])]);
        let chain = simple_processable_chain(&tags, &params, &catalog).unwrap();
        assert_eq!(chain.len(), 2);

        let units = vec![("a".to_string(), 1), ("b".to_string(), 0), ("c".to_string(), 2)];
        let result = preprocess_units(units, &chain).unwrap();
        assert_eq!(result, vec![("a".to_string(), 3), ("c".to_string(), 6)]);
    }

    #[test]
    fn test_multiple_parameter_sets_rejected() {
        let catalog = catalog();
        let tags = vec!["scale".to_string()];
        let params = HashMap::from([("scale".to_string(), vec![factor(2), factor(3)])]);
        let err = simple_processable_chain(&tags, &params, &catalog).unwrap_err();
        assert!(matches!(err, SimError::Configuration(_)));
    }

    #[test]
    fn test_unknown_preprocessing_operation() {
        let catalog = catalog();
        let tags = vec!["exclude_saplings".to_string()];
        assert!(simple_processable_chain(&tags, &HashMap::new(), &catalog).is_err());
    }

    #[test]
    fn test_empty_chain_keeps_units() {
        let units = vec![("a".to_string(), 0_i64)];
        assert_eq!(preprocess_units(units.clone(), &[]).unwrap(), units);
    }
}
