//! Arbor Engine
//!
//! Explores, for a unit evolving over declared time points, every admissible
//! combination of treatment operations and returns the resulting terminal
//! states.
//!
//! ## Modules
//!
//! - [`payload`] and [`collected_data`]: the data threaded through one execution path
//! - [`operation`] and [`catalog`]: domain operations and their registry
//! - [`condition`]: named preconditions of events
//! - [`processor`]: binding operations to parameters, run constraints and history
//! - [`generators`]: `sequence` / `alternatives` / `event` declarations and their compiler
//! - [`event_tree`]: the branching tree, its chains and its recursive evaluation
//! - [`runners`]: full and partial tree strategies, chain and depth-first evaluators
//! - [`config`]: control declarations and the validated simulation configuration
//! - [`simulation`]: a configuration bundled with its catalog
//! - [`preprocessing`]: operations applied once per unit before the run
//!
//! ## Example
//!
//! ```ignore
//! use arbor_engine::{ControlDeclaration, OperationCatalog, Outcome, Payload, Simulation};
//!
//! let mut catalog = OperationCatalog::<i64>::with_builtins();
//! catalog.register_fn("grow", |state, _, _| Ok(Outcome::state(state + 10)));
//!
//! let declaration = ControlDeclaration::from_file("control.yaml")?;
//! let app = declaration.app_configuration.clone();
//! let simulation = Simulation::from_declaration(declaration, catalog)?;
//! let results = simulation.run_with(Payload::new(0), &app)?;
//! ```

pub mod catalog;
pub mod collected_data;
pub mod condition;
pub mod config;
pub mod error;
pub mod event_tree;
pub mod generators;
pub mod operation;
pub mod payload;
pub mod preprocessing;
pub mod processor;
pub mod result_ext;
pub mod runners;
pub mod simulation;

pub use catalog::OperationCatalog;
pub use collected_data::CollectedData;
pub use condition::Condition;
pub use config::{AppConfig, ControlDeclaration, EventDeclaration, SimConfiguration};
pub use error::{OperationError, SimError, SimResult};
pub use event_tree::{EventTree, NodeId};
pub use generators::{Compiler, EventSpec, Generator};
pub use operation::{Finalizer, FnOperation, Operation, Outcome};
pub use payload::{HistoryEntry, Params, Payload, TimePoint};
pub use processor::{ProcessedOperation, RunConstraint};
pub use runners::{EvaluationStrategy, FormationStrategy};
pub use simulation::Simulation;
