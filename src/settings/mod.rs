//! Settings for the txgate binary
//!
//! - `config`: configuration structures
//! - `loader`: layered loading from files and environment

pub mod config;
mod loader;

pub use config::{AppConfig, SimulationConfig};
pub use loader::{default_config, load_config, DEFAULT_CONFIG};
