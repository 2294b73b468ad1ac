//! Validated, immutable simulation configuration.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;

use serde_json::Value;

use crate::config::{ControlDeclaration, EventDeclaration};
use crate::error::{SimError, SimResult};
use crate::generators::Generator;
use crate::payload::{Params, TimePoint};
use crate::processor::RunConstraint;

/// The parts of a control declaration the tree compiler works from.
///
/// Built once per run and read-only afterwards; workers share it.
#[derive(Debug, Clone, Default)]
pub struct SimConfiguration {
    time_points: Vec<TimePoint>,
    events: Vec<EventDeclaration>,
    operation_params: HashMap<String, Vec<Params>>,
    operation_file_params: HashMap<String, BTreeMap<String, PathBuf>>,
    run_constraints: HashMap<String, RunConstraint>,
}

impl SimConfiguration {
    /// Validate a declaration and derive the sorted time points from its events.
    pub fn from_declaration(declaration: ControlDeclaration) -> SimResult<Self> {
        let mut time_points = BTreeSet::new();
        for (index, event) in declaration.events.iter().enumerate() {
            if event.time_points.is_empty() {
                return Err(SimError::configuration(format!(
                    "Event {} declares no time points",
                    index
                )));
            }
            time_points.extend(event.time_points.iter().copied());
        }

        for (tag, files) in &declaration.operation_file_params {
            for (name, path) in files {
                if !path.is_file() {
                    return Err(SimError::configuration(format!(
                        "File {} for parameter '{}' of operation '{}' was not found",
                        path.display(),
                        name,
                        tag
                    )));
                }
            }
        }

        Ok(Self {
            time_points: time_points.into_iter().collect(),
            events: declaration.events,
            operation_params: declaration.operation_params,
            operation_file_params: declaration.operation_file_params,
            run_constraints: declaration.run_constraints,
        })
    }

    /// Declared time points, sorted and unique.
    pub fn time_points(&self) -> &[TimePoint] {
        &self.time_points
    }

    pub fn events(&self) -> &[EventDeclaration] {
        &self.events
    }

    /// Generators scheduled at `time_point`, in declaration order.
    pub fn generators_for(&self, time_point: TimePoint) -> Vec<&Generator> {
        self.events
            .iter()
            .filter(|event| event.time_points.contains(&time_point))
            .map(|event| &event.generator)
            .collect()
    }

    pub fn operation_params(&self, tag: &str) -> Option<&[Params]> {
        self.operation_params.get(tag).map(|sets| sets.as_slice())
    }

    pub fn run_constraint(&self, tag: &str) -> Option<&RunConstraint> {
        self.run_constraints.get(tag)
    }

    /// Add the file parameters of `tag` to `params` as path strings.
    ///
    /// A name defined both ways is a configuration error.
    pub fn merge_file_params(&self, tag: &str, mut params: Params) -> SimResult<Params> {
        let Some(files) = self.operation_file_params.get(tag) else {
            return Ok(params);
        };

        for (name, path) in files {
            if params.contains_key(name) {
                return Err(SimError::configuration(format!(
                    "Parameter '{}' of operation '{}' is defined both as a parameter and as a file parameter",
                    name, tag
                )));
            }
            params.insert(name.clone(), Value::String(path.display().to_string()));
        }
        Ok(params)
    }
}
