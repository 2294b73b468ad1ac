//! Result extension traits for logging failures with context.
//!
//! Used where an error is about to cross a boundary (a worker task, the
//! binary's entrypoint) and should be logged with the caller's location.

use std::fmt::Display;
use tracing::error;

/// Extension trait for logging errors with context.
pub trait ResultExt<T, E> {
    /// Log the error with context if this is an `Err` variant.
    ///
    /// Returns the original `Result` unchanged.
    ///
    /// ```ignore
    /// use arbor_engine::result_ext::ResultExt;
    ///
    /// let results = simulation.run(payload, formation, evaluation).log("running unit")?;
    /// ```
    fn log<S: ToString>(self, context: S) -> Result<T, E>;
}

impl<T, E: Display> ResultExt<T, E> for Result<T, E> {
    #[track_caller]
    fn log<S: ToString>(self, context: S) -> Result<T, E> {
        if let Err(ref e) = self {
            let caller_location = std::panic::Location::caller();
            error!(
                target: "arbor_engine",
                error = %e,
                file = %format!("{}:{}", caller_location.file(), caller_location.line()),
                context = %context.to_string(),
                "Simulation failed"
            );
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimError;

    #[test]
    fn test_result_ext_ok() {
        let result: Result<i32, SimError> = Ok(42);
        assert_eq!(result.log("test context").unwrap(), 42);
    }

    #[test]
    fn test_result_ext_err() {
        let result: Result<i32, SimError> = Err(SimError::configuration("bad"));
        let logged = result.log("test context");
        assert_eq!(logged, Err(SimError::configuration("bad")));
    }
}
