//! BackstopJS scenario and configuration handling.

pub mod config;
pub mod reset;
pub mod scenario;

pub use config::{build_config, load_config, write_config, ConfigError, LoadedConfig, Viewport};
pub use reset::{reset, ResetReport};
pub use scenario::{assemble, generate_label, scenario_label, ScenarioRecord};
