//! Application-level settings from the `app_configuration` block.

use serde::{Deserialize, Serialize};

use crate::runners::{EvaluationStrategy, FormationStrategy};

/// How a simulation run is carried out.
///
/// Deserialized from the optional `app_configuration` block of a control
/// declaration. Command-line flags override individual fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Whole-run tree or one tree per time point (default: partial)
    #[serde(default)]
    pub formation_strategy: FormationStrategy,

    /// Depth-first walk or chain enumeration (default: depth)
    #[serde(default)]
    pub evaluation_strategy: EvaluationStrategy,

    /// Evaluate units on a worker pool
    #[serde(default)]
    pub multiprocessing: bool,
}
