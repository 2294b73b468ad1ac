//! Tree formation strategies and evaluators.
//!
//! A formation strategy decides how event trees are built from the
//! simulation configuration, an evaluator decides how a payload is pushed
//! through one tree. Any strategy works with any evaluator.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SimError, SimResult};
use crate::event_tree::EventTree;
use crate::generators::Compiler;
use crate::payload::Payload;
use crate::processor::ProcessedOperation;
use crate::simulation::Simulation;

/// Pushes a payload through an event tree, returning the surviving payloads.
pub type Evaluator<T> = fn(Payload<T>, &EventTree<T>) -> SimResult<Vec<Payload<T>>>;

/// How event trees are formed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormationStrategy {
    /// One tree spanning every time point.
    Full,
    /// One tree per time point, evaluated in time order.
    #[default]
    Partial,
}

impl FromStr for FormationStrategy {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(FormationStrategy::Full),
            "partial" => Ok(FormationStrategy::Partial),
            other => Err(SimError::configuration(format!(
                "Unknown formation strategy '{}'. Expected full or partial",
                other
            ))),
        }
    }
}

impl fmt::Display for FormationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormationStrategy::Full => write!(f, "full"),
            FormationStrategy::Partial => write!(f, "partial"),
        }
    }
}

/// How a payload is pushed through a tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStrategy {
    /// Recursive walk sharing prefixes between siblings.
    #[default]
    Depth,
    /// Every root-to-leaf chain on its own copy of the payload.
    Chains,
}

impl EvaluationStrategy {
    pub fn evaluator<T: Clone>(self) -> Evaluator<T> {
        match self {
            EvaluationStrategy::Depth => depth_first_evaluator,
            EvaluationStrategy::Chains => chain_evaluator,
        }
    }
}

impl FromStr for EvaluationStrategy {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "depth" => Ok(EvaluationStrategy::Depth),
            "chains" => Ok(EvaluationStrategy::Chains),
            other => Err(SimError::configuration(format!(
                "Unknown evaluation strategy '{}'. Expected depth or chains",
                other
            ))),
        }
    }
}

impl fmt::Display for EvaluationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationStrategy::Depth => write!(f, "depth"),
            EvaluationStrategy::Chains => write!(f, "chains"),
        }
    }
}

/// Apply a chain of operations left to right.
pub fn evaluate_sequence<T>(payload: Payload<T>, chain: &[ProcessedOperation<T>]) -> SimResult<Payload<T>> {
    chain
        .iter()
        .try_fold(payload, |current, operation| operation.call(current))
}

/// Run every chain on its own copy of `payload`.
///
/// Aborted chains are dropped; any other error stops the run.
pub fn run_chains_iteratively<T: Clone>(
    payload: &Payload<T>,
    chains: &[Vec<ProcessedOperation<T>>],
) -> SimResult<Vec<Payload<T>>> {
    let mut results = Vec::with_capacity(chains.len());
    for (index, chain) in chains.iter().enumerate() {
        match evaluate_sequence(payload.clone(), chain) {
            Ok(result) => results.push(result),
            Err(e) if e.is_branch_abort() => {
                debug!(chain = index, reason = %e, "Chain aborted");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(results)
}

/// Flatten the tree into chains and evaluate them one by one.
pub fn chain_evaluator<T: Clone>(payload: Payload<T>, tree: &EventTree<T>) -> SimResult<Vec<Payload<T>>> {
    let chains = tree.operation_chains();
    debug!(chains = chains.len(), "Evaluating operation chains");
    run_chains_iteratively(&payload, &chains)
}

/// Walk the tree depth-first, copying the payload only where it branches.
pub fn depth_first_evaluator<T: Clone>(
    payload: Payload<T>,
    tree: &EventTree<T>,
) -> SimResult<Vec<Payload<T>>> {
    match tree.evaluate(payload) {
        Ok(results) => Ok(results),
        Err(e) if e.is_branch_abort() => {
            debug!(reason = %e, "All branches aborted");
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}

/// Build one tree spanning every time point, then evaluate it once.
pub fn run_full_tree_strategy<T: Clone + 'static>(
    payload: Payload<T>,
    simulation: &Simulation<T>,
    evaluator: Evaluator<T>,
) -> SimResult<Vec<Payload<T>>> {
    let tree = Compiler::new(simulation.config(), simulation.catalog()).full_tree()?;
    debug!(nodes = tree.len(), "Full event tree formed");
    evaluator(payload, &tree)
}

/// Build and evaluate one tree per time point.
///
/// Payloads surviving a time point seed the next one. Stops early when no
/// payload survives.
pub fn run_partial_tree_strategy<T: Clone + 'static>(
    payload: Payload<T>,
    simulation: &Simulation<T>,
    evaluator: Evaluator<T>,
) -> SimResult<Vec<Payload<T>>> {
    let compiler = Compiler::new(simulation.config(), simulation.catalog());
    let mut payloads = vec![payload];

    for &time_point in simulation.config().time_points() {
        let tree = compiler.partial_tree(time_point)?;
        let mut next = Vec::new();
        for current in payloads {
            next.extend(evaluator(current, &tree)?);
        }
        debug!(time_point, results = next.len(), "Time point evaluated");

        payloads = next;
        if payloads.is_empty() {
            break;
        }
    }
    Ok(payloads)
}

/// Run `payload` with the given strategy pair.
pub fn run_strategy<T: Clone + 'static>(
    payload: Payload<T>,
    simulation: &Simulation<T>,
    formation: FormationStrategy,
    evaluation: EvaluationStrategy,
) -> SimResult<Vec<Payload<T>>> {
    let evaluator = evaluation.evaluator();
    match formation {
        FormationStrategy::Full => run_full_tree_strategy(payload, simulation, evaluator),
        FormationStrategy::Partial => run_partial_tree_strategy(payload, simulation, evaluator),
    }
}
