//! Run report written by the `arbor` binary.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use arbor_engine::{EvaluationStrategy, FormationStrategy};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::dispatcher::DispatchResults;

/// Terminal payloads of every unit, with the settings they were produced under.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport<T> {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub formation_strategy: FormationStrategy,
    pub evaluation_strategy: EvaluationStrategy,
    pub units: DispatchResults<T>,
}

impl<T: Serialize> RunReport<T> {
    pub fn new(
        started_at: DateTime<Utc>,
        formation_strategy: FormationStrategy,
        evaluation_strategy: EvaluationStrategy,
        units: DispatchResults<T>,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at: Utc::now(),
            formation_strategy,
            evaluation_strategy,
            units,
        }
    }

    /// Total number of terminal payloads across units.
    pub fn result_count(&self) -> usize {
        self.units.values().map(Vec::len).sum()
    }

    /// Write the report as pretty JSON to `path`, or to stdout when `None`.
    pub fn write(&self, path: Option<&Path>) -> Result<()> {
        match path {
            Some(path) => {
                let file = std::fs::File::create(path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                let mut writer = std::io::BufWriter::new(file);
                serde_json::to_writer_pretty(&mut writer, self)
                    .with_context(|| format!("Failed to write report to {}", path.display()))?;
                writer.flush()?;
            }
            None => {
                let stdout = std::io::stdout();
                let mut handle = stdout.lock();
                serde_json::to_writer_pretty(&mut handle, self).context("Failed to write report")?;
                writeln!(handle)?;
            }
        }
        Ok(())
    }
}
