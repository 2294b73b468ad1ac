//! Error types for the simulation engine.
//!
//! Errors fall in two groups: recoverable branch aborts, which prune the
//! subtree they originate from, and fatal errors, which stop the whole run.

use thiserror::Error;

use crate::payload::TimePoint;

/// Errors raised while preparing or evaluating a simulation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SimError {
    /// A branch was pruned by its operation or because all of its children failed.
    #[error("Branch aborted: {reason}")]
    BranchAborted { reason: String },

    /// A run constraint rejected an operation at the attempted time point.
    #[error(
        "{operation} aborted - last run at {last_run}, time now {time_point}, \
         minimum time interval {minimum_time_interval}"
    )]
    ConstraintViolation {
        operation: String,
        time_point: TimePoint,
        last_run: TimePoint,
        minimum_time_interval: i64,
    },

    /// A precondition attached to an event did not hold.
    #[error("{operation} aborted at time point {time_point} - condition \"{condition}\" failed")]
    ConditionFailed {
        operation: String,
        time_point: TimePoint,
        condition: String,
    },

    /// Invalid control declaration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Unexpected failure inside a domain operation.
    #[error("Operation {operation} failed at time point {time_point}: {message}")]
    Operation {
        operation: String,
        time_point: TimePoint,
        message: String,
    },

    /// Parse error (YAML, JSON).
    #[error("Parse error: {0}")]
    Parse(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl SimError {
    /// Create a branch abort with the given reason.
    pub fn aborted(reason: impl Into<String>) -> Self {
        SimError::BranchAborted {
            reason: reason.into(),
        }
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        SimError::Configuration(message.into())
    }

    /// Whether this error only prunes the branch it was raised in.
    pub fn is_branch_abort(&self) -> bool {
        matches!(
            self,
            SimError::BranchAborted { .. }
                | SimError::ConstraintViolation { .. }
                | SimError::ConditionFailed { .. }
        )
    }
}

impl From<std::io::Error> for SimError {
    fn from(e: std::io::Error) -> Self {
        SimError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for SimError {
    fn from(e: serde_json::Error) -> Self {
        SimError::Parse(e.to_string())
    }
}

impl From<serde_yaml::Error> for SimError {
    fn from(e: serde_yaml::Error) -> Self {
        SimError::Parse(e.to_string())
    }
}

/// Result alias for engine operations.
pub type SimResult<T> = Result<T, SimError>;

/// Error returned by a domain operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OperationError {
    /// The operation refuses to run for this branch. Prunes the branch.
    #[error("{0}")]
    Aborted(String),

    /// The operation hit an unexpected failure. Stops the run.
    #[error("{0}")]
    Failed(String),
}

impl OperationError {
    pub fn aborted(reason: impl Into<String>) -> Self {
        OperationError::Aborted(reason.into())
    }

    pub fn failed(message: impl Into<String>) -> Self {
        OperationError::Failed(message.into())
    }
}
