//! Configuration for the Globus terrain core.
//!
//! Settings persist to disk as RON files and can be overridden from the
//! command line via clap.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    CONFIG_FILE_NAME, Config, DebugConfig, DemoConfig, EllipsoidConfig, LightingConfig, LodConfig,
    TerrainConfig,
};
pub use error::ConfigError;

/// Default configuration directory: `<platform config dir>/globus`, or
/// `./globus` when the platform has none.
pub fn default_config_dir() -> std::path::PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("globus")
}
