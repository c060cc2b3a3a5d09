//! CLI command handlers.

pub mod run;
pub mod validate;

use conduit_config::ConduitConfig;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Merged configuration from all discovered layers.
    pub config: ConduitConfig,
    /// Verbose output enabled.
    pub verbose: bool,
}
