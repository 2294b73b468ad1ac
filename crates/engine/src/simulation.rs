//! A validated simulation, ready to run units.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::catalog::OperationCatalog;
use crate::config::{AppConfig, ControlDeclaration, SimConfiguration};
use crate::error::SimResult;
use crate::generators::Compiler;
use crate::payload::Payload;
use crate::runners::{self, EvaluationStrategy, FormationStrategy};

/// Simulation configuration bundled with the catalog it resolves against.
///
/// Cloning is cheap; clones share the same configuration and catalog, so
/// one `Simulation` can be handed to every worker.
pub struct Simulation<T> {
    config: Arc<SimConfiguration>,
    catalog: Arc<OperationCatalog<T>>,
}

impl<T: Clone + 'static> Simulation<T> {
    /// Bundle a configuration with a catalog.
    ///
    /// Compiles the tree of every time point once so that unknown operations,
    /// unknown conditions, misplaced parameter sets and clashing file
    /// parameters fail here rather than in the middle of a run.
    pub fn new(config: SimConfiguration, catalog: OperationCatalog<T>) -> SimResult<Self> {
        let compiler = Compiler::new(&config, &catalog);
        for &time_point in config.time_points() {
            let tree = compiler.partial_tree(time_point)?;
            debug!(time_point, nodes = tree.len(), "Validated time point");
        }
        info!(
            time_points = config.time_points().len(),
            events = config.events().len(),
            "Simulation prepared"
        );

        Ok(Self {
            config: Arc::new(config),
            catalog: Arc::new(catalog),
        })
    }

    /// Validate a control declaration and bundle it with a catalog.
    pub fn from_declaration(declaration: ControlDeclaration, catalog: OperationCatalog<T>) -> SimResult<Self> {
        Self::new(SimConfiguration::from_declaration(declaration)?, catalog)
    }

    /// Run one unit with the given strategies.
    pub fn run(
        &self,
        payload: Payload<T>,
        formation: FormationStrategy,
        evaluation: EvaluationStrategy,
    ) -> SimResult<Vec<Payload<T>>> {
        runners::run_strategy(payload, self, formation, evaluation)
    }

    /// Run one unit with the strategies of an application config.
    pub fn run_with(&self, payload: Payload<T>, app: &AppConfig) -> SimResult<Vec<Payload<T>>> {
        self.run(payload, app.formation_strategy, app.evaluation_strategy)
    }
}

impl<T> Simulation<T> {
    pub fn config(&self) -> &SimConfiguration {
        &self.config
    }

    pub fn catalog(&self) -> &OperationCatalog<T> {
        &self.catalog
    }
}

impl<T> Clone for Simulation<T> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            catalog: Arc::clone(&self.catalog),
        }
    }
}

impl<T> fmt::Debug for Simulation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("config", &self.config)
            .field("catalog", &self.catalog)
            .finish()
    }
}
