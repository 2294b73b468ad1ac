//! Dispatching independent units to the simulation.
//!
//! Each unit gets its own seed payload and its own run of the simulation.
//! Units share nothing mutable, so the only coordination is the bounded
//! result channel that carries `(identifier, results)` back to the caller.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use arbor_engine::result_ext::ResultExt;
use arbor_engine::{
    EvaluationStrategy, FormationStrategy, Payload, SimError, SimResult, Simulation,
};
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info};

use crate::config::WorkerConfig;

/// Terminal payloads per unit identifier.
pub type DispatchResults<T> = BTreeMap<String, Vec<Payload<T>>>;

/// Errors that stop a dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A unit hit a fatal simulation error.
    #[error("Unit {unit} failed: {source}")]
    Simulation {
        unit: String,
        #[source]
        source: SimError,
    },

    /// A worker task panicked or was cancelled.
    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// The worker pool semaphore was closed.
    #[error("Worker pool closed: {0}")]
    Pool(#[from] tokio::sync::AcquireError),

    /// Two units share an identifier.
    #[error("Duplicate unit identifier '{0}'")]
    DuplicateUnit(String),

    /// Fewer results arrived than units were dispatched.
    #[error("Result channel closed after {received} of {expected} units")]
    ChannelClosed { received: usize, expected: usize },
}

/// Runs a simulation once per unit, sequentially or on a worker pool.
pub struct Dispatcher<T> {
    simulation: Simulation<T>,
    formation: FormationStrategy,
    evaluation: EvaluationStrategy,
    config: WorkerConfig,
}

impl<T> Dispatcher<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(
        simulation: Simulation<T>,
        formation: FormationStrategy,
        evaluation: EvaluationStrategy,
        config: WorkerConfig,
    ) -> Self {
        Self {
            simulation,
            formation,
            evaluation,
            config,
        }
    }

    /// Evaluate every unit, on the worker pool when multiprocessing is enabled.
    pub async fn run(&self, units: Vec<(String, T)>) -> Result<DispatchResults<T>, DispatchError> {
        info!(
            worker_id = %self.config.worker_id,
            units = units.len(),
            formation_strategy = %self.formation,
            evaluation_strategy = %self.evaluation,
            multiprocessing = self.config.multiprocessing,
            "Dispatching units"
        );

        if self.config.multiprocessing {
            self.run_parallel(units).await
        } else {
            self.run_sequential(units)
        }
    }

    /// Evaluate units one after another on the calling thread.
    pub fn run_sequential(&self, units: Vec<(String, T)>) -> Result<DispatchResults<T>, DispatchError> {
        ensure_unique_identifiers(&units)?;

        let mut results = DispatchResults::new();
        for (identifier, state) in units {
            let payloads = evaluate_unit(&self.simulation, state, self.formation, self.evaluation)
                .log(format!("evaluating unit {}", identifier))
                .map_err(|source| DispatchError::Simulation {
                    unit: identifier.clone(),
                    source,
                })?;
            info!(unit = %identifier, results = payloads.len(), "Alternatives for unit");
            results.insert(identifier, payloads);
        }
        Ok(results)
    }

    /// Evaluate units on a fixed-size pool of blocking workers.
    ///
    /// A producer task hands units to workers as permits free up while this
    /// task collects results from the channel. The first fatal unit error
    /// stops the dispatch.
    pub async fn run_parallel(&self, units: Vec<(String, T)>) -> Result<DispatchResults<T>, DispatchError> {
        ensure_unique_identifiers(&units)?;

        let expected = units.len();
        let (tx, mut rx) = mpsc::channel::<(String, SimResult<Vec<Payload<T>>>)>(
            self.config.result_channel_capacity,
        );
        let semaphore = Arc::new(Semaphore::new(self.config.max_workers));

        let simulation = self.simulation.clone();
        let formation = self.formation;
        let evaluation = self.evaluation;
        let producer = tokio::spawn(async move {
            let mut handles = Vec::with_capacity(units.len());
            for (identifier, state) in units {
                // Wait for a free worker
                let permit = semaphore.clone().acquire_owned().await?;
                let tx = tx.clone();
                let simulation = simulation.clone();

                handles.push(tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    debug!(unit = %identifier, "Worker started unit");
                    let result = evaluate_unit(&simulation, state, formation, evaluation);
                    if tx.blocking_send((identifier, result)).is_err() {
                        debug!("Result channel closed, dropping unit result");
                    }
                }));
            }

            for handle in handles {
                handle.await?;
            }
            Ok::<(), DispatchError>(())
        });

        let mut results = DispatchResults::new();
        let mut received = 0;
        while let Some((identifier, result)) = rx.recv().await {
            received += 1;
            match result.log(format!("evaluating unit {}", identifier)) {
                Ok(payloads) => {
                    info!(unit = %identifier, results = payloads.len(), "Alternatives for unit");
                    results.insert(identifier, payloads);
                }
                Err(source) => {
                    producer.abort();
                    return Err(DispatchError::Simulation {
                        unit: identifier,
                        source,
                    });
                }
            }
        }

        producer.await??;

        if received != expected {
            return Err(DispatchError::ChannelClosed { received, expected });
        }
        Ok(results)
    }
}

/// Results are keyed by identifier, so a repeated one would lose a unit.
fn ensure_unique_identifiers<T>(units: &[(String, T)]) -> Result<(), DispatchError> {
    let mut seen = HashSet::with_capacity(units.len());
    for (identifier, _) in units {
        if !seen.insert(identifier.as_str()) {
            return Err(DispatchError::DuplicateUnit(identifier.clone()));
        }
    }
    Ok(())
}

/// Run one unit from a fresh seed payload.
///
/// The payload's collected data starts at the first declared time point.
pub fn evaluate_unit<T: Clone + 'static>(
    simulation: &Simulation<T>,
    state: T,
    formation: FormationStrategy,
    evaluation: EvaluationStrategy,
) -> SimResult<Vec<Payload<T>>> {
    let initial_time_point = simulation
        .config()
        .time_points()
        .first()
        .copied()
        .unwrap_or_default();
    let payload = Payload::with_initial_time_point(state, initial_time_point);
    simulation.run(payload, formation, evaluation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_engine::{ControlDeclaration, OperationCatalog, OperationError, Outcome};

    const CONTROL: &str = r#"
events:
  - time_points: [1, 2]
    generator:
      sequence:
        - event: { operation: grow }
        - alternatives:
            - event: { operation: do_nothing }
            - event: { operation: halve }
"#;

    fn catalog() -> OperationCatalog<i64> {
        let mut catalog = OperationCatalog::<i64>::with_builtins();
        catalog.register_fn("grow", |state, _, _| Ok(Outcome::state(state + 10)));
        catalog.register_fn("halve", |state, _, _| {
            if state < 0 {
                Err(OperationError::failed("negative state"))
            } else if state == 0 {
                Err(OperationError::aborted("nothing to halve"))
            } else {
                Ok(Outcome::state(state / 2))
            }
        });
        catalog
    }

    fn dispatcher(multiprocessing: bool) -> Dispatcher<i64> {
        let simulation = Simulation::from_declaration(
            ControlDeclaration::from_yaml_str(CONTROL).unwrap(),
            catalog(),
        )
        .unwrap();
        let config = WorkerConfig::default()
            .with_max_workers(2)
            .with_multiprocessing(multiprocessing);
        Dispatcher::new(
            simulation,
            FormationStrategy::Partial,
            EvaluationStrategy::Depth,
            config,
        )
    }

    fn units(count: i64) -> Vec<(String, i64)> {
        (0..count).map(|i| (format!("unit-{}", i), i * 2)).collect()
    }

    #[tokio::test]
    async fn test_run_sequential() {
        let results = dispatcher(false).run(units(3)).await.unwrap();
        assert_eq!(results.len(), 3);
        for payloads in results.values() {
            assert_eq!(payloads.len(), 4);
            for payload in payloads {
                assert_eq!(payload.collected_data.initial_time_point, 1);
            }
        }
        // unit-0: t1 10 | 5, t2 20 | 10 | 15 | 7
        let mut states: Vec<i64> = results["unit-0"].iter().map(|p| p.state).collect();
        states.sort_unstable();
        assert_eq!(states, vec![7, 10, 15, 20]);
    }

    #[tokio::test]
    async fn test_parallel_matches_sequential() {
        let sequential = dispatcher(false).run(units(8)).await.unwrap();
        let parallel = dispatcher(true).run(units(8)).await.unwrap();

        assert_eq!(parallel.len(), 8);
        for (identifier, payloads) in &sequential {
            let mut expected: Vec<i64> = payloads.iter().map(|p| p.state).collect();
            let mut actual: Vec<i64> = parallel[identifier].iter().map(|p| p.state).collect();
            expected.sort_unstable();
            actual.sort_unstable();
            assert_eq!(expected, actual, "{}", identifier);
        }
    }

    #[tokio::test]
    async fn test_fatal_unit_error_stops_dispatch() {
        let mut units = units(4);
        units.push(("broken".to_string(), -100));

        for multiprocessing in [false, true] {
            let err = dispatcher(multiprocessing).run(units.clone()).await.unwrap_err();
            assert!(
                matches!(err, DispatchError::Simulation { ref unit, .. } if unit == "broken"),
                "unexpected error: {}",
                err
            );
        }
    }

    #[tokio::test]
    async fn test_empty_dispatch() {
        let results = dispatcher(true).run(Vec::new()).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_identifiers_rejected() {
        let units = vec![("x".to_string(), 2), ("x".to_string(), 4)];

        for multiprocessing in [false, true] {
            let err = dispatcher(multiprocessing).run(units.clone()).await.unwrap_err();
            assert!(
                matches!(err, DispatchError::DuplicateUnit(ref unit) if unit == "x"),
                "unexpected error: {}",
                err
            );
        }
    }
}
