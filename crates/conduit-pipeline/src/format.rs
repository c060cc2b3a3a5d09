//! Interchange format shared by the workflow file, node inputs and outputs,
//! and the caller's initial data.
//!
//! A build speaks exactly one format: JSON by default, YAML when the `yaml`
//! feature is enabled. Values are held in memory as [`serde_json::Value`]
//! regardless of the format they were read from.

use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A text serialization the engine can read and write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    /// The format this build was compiled for.
    pub const fn build_default() -> Self {
        if cfg!(feature = "yaml") {
            Format::Yaml
        } else {
            Format::Json
        }
    }

    /// Human-readable name used in error messages.
    pub const fn name(self) -> &'static str {
        match self {
            Format::Json => "JSON",
            Format::Yaml => "YAML",
        }
    }

    /// Parse text into a generic value.
    pub fn parse(self, text: &str) -> Result<Value, String> {
        self.parse_as(text)
    }

    /// Parse text into a typed value.
    pub fn parse_as<T: DeserializeOwned>(self, text: &str) -> Result<T, String> {
        match self {
            Format::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
            Format::Yaml => serde_yaml::from_str(text).map_err(|e| e.to_string()),
        }
    }

    /// Serialize a value to text.
    ///
    /// JSON is written compactly with map keys in sorted order, so the same
    /// value always produces the same bytes.
    pub fn to_text<T: Serialize + ?Sized>(self, value: &T) -> Result<String, String> {
        match self {
            Format::Json => serde_json::to_string(value).map_err(|e| e.to_string()),
            Format::Yaml => serde_yaml::to_string(value).map_err(|e| e.to_string()),
        }
    }

    /// Serialize a value for human consumption (CLI output).
    pub fn to_pretty_text<T: Serialize + ?Sized>(self, value: &T) -> Result<String, String> {
        match self {
            Format::Json => serde_json::to_string_pretty(value).map_err(|e| e.to_string()),
            Format::Yaml => serde_yaml::to_string(value).map_err(|e| e.to_string()),
        }
    }
}

impl Default for Format {
    fn default() -> Self {
        Self::build_default()
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
