//! Domain operations the engine calls into.

use std::sync::Arc;

use crate::collected_data::CollectedData;
use crate::error::OperationError;
use crate::payload::Params;

/// What a domain operation hands back.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    /// New state of the unit.
    pub state: T,

    /// Replacement collected data. `None` keeps the caller's collected data,
    /// including anything the operation wrote into it in place.
    pub collected_data: Option<CollectedData>,
}

impl<T> Outcome<T> {
    /// Outcome that only changes the state.
    pub fn state(state: T) -> Self {
        Self {
            state,
            collected_data: None,
        }
    }

    /// Outcome that replaces the collected data as well.
    pub fn with_collected_data(state: T, collected_data: CollectedData) -> Self {
        Self {
            state,
            collected_data: Some(collected_data),
        }
    }
}

/// A domain operation applied to a unit's state.
///
/// Operations are opaque to the engine. They must be pure with respect to
/// anything outside their arguments: the same operation instance is shared
/// by every branch and every worker.
pub trait Operation<T>: Send + Sync {
    /// Apply the operation with its bound parameters.
    fn apply(
        &self,
        state: T,
        collected_data: &mut CollectedData,
        params: &Params,
    ) -> Result<Outcome<T>, OperationError>;
}

/// Hook applied to a unit's state after each operation that ran on it,
/// e.g. to settle derived values the operations left stale.
pub type Finalizer<T> = Arc<dyn Fn(&mut T) + Send + Sync>;

/// Adapter turning a closure into an [`Operation`].
pub struct FnOperation<F>(pub F);

impl<T, F> Operation<T> for FnOperation<F>
where
    F: Fn(T, &mut CollectedData, &Params) -> Result<Outcome<T>, OperationError> + Send + Sync,
{
    fn apply(
        &self,
        state: T,
        collected_data: &mut CollectedData,
        params: &Params,
    ) -> Result<Outcome<T>, OperationError> {
        (self.0)(state, collected_data, params)
    }
}

/// Returns the state unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct DoNothing;

impl<T> Operation<T> for DoNothing {
    fn apply(
        &self,
        state: T,
        _collected_data: &mut CollectedData,
        _params: &Params,
    ) -> Result<Outcome<T>, OperationError> {
        Ok(Outcome::state(state))
    }
}
