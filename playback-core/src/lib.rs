pub mod config;
pub mod serde_helpers;
pub mod stats;
pub mod streaming;
#[cfg(test)]
mod testing;

pub use config::{ConfigError, ConfigManager, ControllerConfig, EnvConfigOverride};
pub use stats::SurfaceStats;
pub use streaming::*;
