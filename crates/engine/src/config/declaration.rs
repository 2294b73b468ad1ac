//! Control declaration parsing.
//!
//! A control declaration is YAML or JSON. The format is picked from the file
//! extension; anything other than `.json` is read as YAML.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AppConfig;
use crate::error::{SimError, SimResult};
use crate::generators::Generator;
use crate::payload::{Params, TimePoint};
use crate::processor::RunConstraint;

/// A generator scheduled at a list of time points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDeclaration {
    pub time_points: Vec<TimePoint>,
    /// Written as nested single-key maps (`sequence: [...]`), not YAML tags.
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    pub generator: Generator,
}

/// Everything a simulation run is declared with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlDeclaration {
    #[serde(default)]
    pub app_configuration: AppConfig,

    /// Operations applied once to every unit before the simulation.
    #[serde(default)]
    pub preprocessing_operations: Vec<String>,

    /// At most one parameter set per preprocessing operation.
    #[serde(default)]
    pub preprocessing_params: HashMap<String, Vec<Params>>,

    #[serde(default)]
    pub events: Vec<EventDeclaration>,

    /// Parameter sets per operation tag. More than one set is only valid
    /// where the operation is used as an alternative.
    #[serde(default)]
    pub operation_params: HashMap<String, Vec<Params>>,

    /// Parameters pointing at files, per operation tag.
    #[serde(default)]
    pub operation_file_params: HashMap<String, BTreeMap<String, PathBuf>>,

    #[serde(default)]
    pub run_constraints: HashMap<String, RunConstraint>,
}

impl ControlDeclaration {
    /// Parse a YAML control declaration.
    pub fn from_yaml_str(content: &str) -> SimResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Parse a JSON control declaration.
    pub fn from_json_str(content: &str) -> SimResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Read a control declaration from disk.
    pub fn from_file(path: impl AsRef<Path>) -> SimResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| SimError::Io(format!("{}: {}", path.display(), e)))?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        debug!(path = %path.display(), json = is_json, "Reading control declaration");
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }
}
