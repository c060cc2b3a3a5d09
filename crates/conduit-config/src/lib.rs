//! Configuration for the Conduit workflow runner.
//!
//! TOML files are discovered in two layers (user config dir, then the
//! project-local `conduit.toml`) and merged section by section, later layers
//! winning. Command-line flags are applied on top by the binary.

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, load_config_with_options, xdg_config_dir, xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use types::{ConduitConfig, EngineConfig, LoggingConfig};
