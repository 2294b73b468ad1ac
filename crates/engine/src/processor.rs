//! Binding operations to parameters and applying them to payloads.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::condition::Condition;
use crate::error::{OperationError, SimError, SimResult};
use crate::operation::{Finalizer, Operation};
use crate::payload::{HistoryEntry, Params, Payload, TimePoint};

/// Limit on how soon an operation may repeat on the same path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConstraint {
    pub minimum_time_interval: i64,
}

impl RunConstraint {
    /// Fail when `operation` last ran on this path fewer than
    /// `minimum_time_interval` time units before `time_point`.
    pub fn check<T>(&self, payload: &Payload<T>, operation: &str, time_point: TimePoint) -> SimResult<()> {
        match payload.last_run(operation) {
            Some(last_run) if time_point - last_run < self.minimum_time_interval => {
                Err(SimError::ConstraintViolation {
                    operation: operation.to_string(),
                    time_point,
                    last_run,
                    minimum_time_interval: self.minimum_time_interval,
                })
            }
            _ => Ok(()),
        }
    }
}

/// Apply one operation to a payload.
///
/// Checks the run constraint, points the collected data at `time_point`,
/// runs the operation and records it in the payload's history.
pub fn process<T>(
    payload: Payload<T>,
    operation: &dyn Operation<T>,
    tag: &str,
    time_point: TimePoint,
    params: &Params,
    run_constraint: Option<&RunConstraint>,
) -> SimResult<Payload<T>> {
    if let Some(constraint) = run_constraint {
        constraint.check(&payload, tag, time_point)?;
    }

    let Payload {
        state,
        mut collected_data,
        mut operation_history,
    } = payload;
    collected_data.current_time_point = time_point;

    let outcome = operation
        .apply(state, &mut collected_data, params)
        .map_err(|e| match e {
            OperationError::Aborted(reason) => {
                SimError::aborted(format!("{tag} aborted at time point {time_point}: {reason}"))
            }
            OperationError::Failed(message) => SimError::Operation {
                operation: tag.to_string(),
                time_point,
                message,
            },
        })?;

    operation_history.push(HistoryEntry {
        time_point,
        operation: tag.to_string(),
        params: params.clone(),
    });

    Ok(Payload {
        state: outcome.state,
        collected_data: outcome.collected_data.unwrap_or(collected_data),
        operation_history,
    })
}

/// An operation bound to its tag, time point, parameters, run constraint
/// and conditions. This is what event tree nodes hold.
///
/// The bound data sits behind `Arc`s, so the clones made for every
/// operation chain share it.
pub struct ProcessedOperation<T> {
    tag: Arc<str>,
    time_point: TimePoint,
    params: Arc<Params>,
    operation: Arc<dyn Operation<T>>,
    run_constraint: Option<RunConstraint>,
    preconditions: Arc<[Condition<T>]>,
    postconditions: Arc<[Condition<T>]>,
    finalizer: Option<Finalizer<T>>,
}

impl<T> ProcessedOperation<T> {
    pub fn new(
        tag: impl Into<String>,
        time_point: TimePoint,
        params: Params,
        operation: Arc<dyn Operation<T>>,
    ) -> Self {
        Self {
            tag: Arc::from(tag.into()),
            time_point,
            params: Arc::new(params),
            operation,
            run_constraint: None,
            preconditions: Arc::from(Vec::new()),
            postconditions: Arc::from(Vec::new()),
            finalizer: None,
        }
    }

    pub fn with_run_constraint(mut self, run_constraint: Option<RunConstraint>) -> Self {
        self.run_constraint = run_constraint;
        self
    }

    /// Conditions checked against the incoming payload.
    pub fn with_conditions(mut self, conditions: Vec<Condition<T>>) -> Self {
        self.preconditions = Arc::from(conditions);
        self
    }

    /// Conditions checked against the payload the operation produced.
    pub fn with_postconditions(mut self, conditions: Vec<Condition<T>>) -> Self {
        self.postconditions = Arc::from(conditions);
        self
    }

    /// Hook run on the state once the operation and its postconditions passed.
    pub fn with_finalizer(mut self, finalizer: Option<Finalizer<T>>) -> Self {
        self.finalizer = finalizer;
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn time_point(&self) -> TimePoint {
        self.time_point
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Check the preconditions, apply the operation, then check the
    /// postconditions on its result.
    pub fn call(&self, payload: Payload<T>) -> SimResult<Payload<T>> {
        self.check_conditions(&self.preconditions, &payload, "Precondition failed")?;

        let mut payload = process(
            payload,
            self.operation.as_ref(),
            &self.tag,
            self.time_point,
            &self.params,
            self.run_constraint.as_ref(),
        )?;

        self.check_conditions(&self.postconditions, &payload, "Postcondition failed")?;

        if let Some(finalize) = &self.finalizer {
            finalize(&mut payload.state);
        }
        Ok(payload)
    }

    fn check_conditions(
        &self,
        conditions: &[Condition<T>],
        payload: &Payload<T>,
        message: &'static str,
    ) -> SimResult<()> {
        let Some(failed) = conditions
            .iter()
            .find(|condition| !condition.check(self.time_point, payload))
        else {
            return Ok(());
        };

        debug!(
            operation = %self.tag,
            time_point = self.time_point,
            condition = %failed.name(),
            "{}",
            message
        );
        Err(SimError::ConditionFailed {
            operation: self.tag.to_string(),
            time_point: self.time_point,
            condition: failed.name().to_string(),
        })
    }
}

impl<T> Clone for ProcessedOperation<T> {
    fn clone(&self) -> Self {
        Self {
            tag: Arc::clone(&self.tag),
            time_point: self.time_point,
            params: Arc::clone(&self.params),
            operation: Arc::clone(&self.operation),
            run_constraint: self.run_constraint,
            preconditions: Arc::clone(&self.preconditions),
            postconditions: Arc::clone(&self.postconditions),
            finalizer: self.finalizer.clone(),
        }
    }
}

impl<T> fmt::Debug for ProcessedOperation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessedOperation")
            .field("tag", &self.tag)
            .field("time_point", &self.time_point)
            .field("params", &self.params)
            .field("run_constraint", &self.run_constraint)
            .field("preconditions", &self.preconditions)
            .field("postconditions", &self.postconditions)
            .field("finalizer", &self.finalizer.is_some())
            .finish()
    }
}
