//! Arbor Worker Pool
//!
//! Runs a simulation once per independent unit and gathers the terminal
//! payloads of every unit.
//!
//! This crate provides:
//! - A dispatcher evaluating units sequentially or on a bounded worker pool
//! - Worker configuration from the environment
//! - A catalog of generic operations over JSON-valued units
//! - Unit loading and run report output for the `arbor` binary

pub mod catalog;
pub mod config;
pub mod dispatcher;
pub mod input;
pub mod output;

pub use catalog::default_catalog;
pub use config::WorkerConfig;
pub use dispatcher::{DispatchError, DispatchResults, Dispatcher};
pub use output::RunReport;
