//! Configuration for simulation runs.
//!
//! A run is declared in a YAML or JSON control declaration, which is parsed
//! into a [`ControlDeclaration`] and validated into a [`SimConfiguration`].

mod app;
mod declaration;
mod sim_configuration;

pub use app::AppConfig;
pub use declaration::{ControlDeclaration, EventDeclaration};
pub use sim_configuration::SimConfiguration;
