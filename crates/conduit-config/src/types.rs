//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [engine]
//! actions_dir = "/opt/conduit/actions"
//! program_name = "conduit"
//!
//! [logging]
//! level = "info"
//! file_dir = "/var/log/conduit"
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g. a project-local
/// override) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConduitConfig {
    /// Workflow engine settings.
    pub engine: Option<EngineConfig>,

    /// Logging settings.
    pub logging: Option<LoggingConfig>,
}

impl ConduitConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections merge field by field, so a project file that only sets
    /// `engine.actions_dir` keeps the user's `engine.program_name`.
    pub fn merge(&mut self, other: ConduitConfig) {
        if let Some(engine) = other.engine {
            match &mut self.engine {
                Some(mine) => mine.merge(engine),
                None => self.engine = Some(engine),
            }
        }
        if let Some(logging) = other.logging {
            match &mut self.logging {
                Some(mine) => mine.merge(logging),
                None => self.logging = Some(logging),
            }
        }
    }

    /// The engine section, or defaults when absent.
    pub fn engine(&self) -> EngineConfig {
        self.engine.clone().unwrap_or_default()
    }

    /// The logging section, or defaults when absent.
    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }
}

/// `[engine]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding action executables. Unset means the directory of
    /// the running binary.
    pub actions_dir: Option<PathBuf>,

    /// Substring of the binary's file name replaced by the node type.
    pub program_name: Option<String>,
}

impl EngineConfig {
    fn merge(&mut self, other: EngineConfig) {
        if other.actions_dir.is_some() {
            self.actions_dir = other.actions_dir;
        }
        if other.program_name.is_some() {
            self.program_name = other.program_name;
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset (e.g. `"debug"`).
    pub level: Option<String>,

    /// Directory for daily-rotated JSON log files. Unset disables file logging.
    pub file_dir: Option<PathBuf>,
}

impl LoggingConfig {
    fn merge(&mut self, other: LoggingConfig) {
        if other.level.is_some() {
            self.level = other.level;
        }
        if other.file_dir.is_some() {
            self.file_dir = other.file_dir;
        }
    }
}
