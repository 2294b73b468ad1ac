//! Worker pool configuration.

use anyhow::{Context, Result};

/// Worker pool configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Identifier of this dispatcher run (UUID).
    pub worker_id: String,

    /// Maximum number of units evaluated at once.
    pub max_workers: usize,

    /// Capacity of the channel carrying unit results back to the coordinator.
    pub result_channel_capacity: usize,

    /// Evaluate units on the worker pool instead of one after another.
    pub multiprocessing: bool,
}

fn default_max_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_result_channel_capacity() -> usize {
    64
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    ///
    /// - `ARBOR_WORKER_ID`: run identifier (default: random UUID)
    /// - `ARBOR_WORKERS`: maximum concurrent units (default: available parallelism)
    /// - `ARBOR_RESULT_CHANNEL_CAPACITY`: result channel capacity (default: 64)
    /// - `ARBOR_MULTIPROCESSING`: `true`/`false` (default: false)
    pub fn from_env() -> Result<Self> {
        let worker_id = std::env::var("ARBOR_WORKER_ID")
            .unwrap_or_else(|_| uuid::Uuid::new_v4().to_string());

        let max_workers = match std::env::var("ARBOR_WORKERS") {
            Ok(value) => value
                .parse::<usize>()
                .with_context(|| format!("Invalid ARBOR_WORKERS value '{}'", value))?,
            Err(_) => default_max_workers(),
        };

        let result_channel_capacity: usize = std::env::var("ARBOR_RESULT_CHANNEL_CAPACITY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(default_result_channel_capacity);

        let multiprocessing = match std::env::var("ARBOR_MULTIPROCESSING") {
            Ok(value) => value
                .parse::<bool>()
                .with_context(|| format!("Invalid ARBOR_MULTIPROCESSING value '{}'", value))?,
            Err(_) => false,
        };

        Ok(Self {
            worker_id,
            max_workers: max_workers.max(1),
            result_channel_capacity: result_channel_capacity.max(1),
            multiprocessing,
        })
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    pub fn with_multiprocessing(mut self, multiprocessing: bool) -> Self {
        self.multiprocessing = multiprocessing;
        self
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: uuid::Uuid::new_v4().to_string(),
            max_workers: default_max_workers(),
            result_channel_capacity: default_result_channel_capacity(),
            multiprocessing: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = WorkerConfig::default();
        assert!(!config.worker_id.is_empty());
        assert!(config.max_workers >= 1);
        assert_eq!(config.result_channel_capacity, 64);
        assert!(!config.multiprocessing);
    }

    #[test]
    fn test_config_builders() {
        let config = WorkerConfig::default()
            .with_max_workers(0)
            .with_multiprocessing(true);
        assert_eq!(config.max_workers, 1);
        assert!(config.multiprocessing);
    }
}
