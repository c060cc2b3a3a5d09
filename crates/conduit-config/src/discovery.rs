//! Config file discovery and layered merging.
//!
//! Resolution order (later overrides earlier):
//! 1. `$CONDUIT_CONFIG_DIR/config.toml`, or `<platform config dir>/conduit/config.toml`
//! 2. `./conduit.toml` (project-local)
//! 3. CLI arguments (handled by the binary)

use std::path::{Path, PathBuf};

use crate::{ConduitConfig, ConfigError, Result};

/// Project-local config filename.
const PROJECT_CONFIG_FILE: &str = "conduit.toml";

/// Config filename within the user config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for platform directory resolution.
const APP_NAME: &str = "conduit";

/// Environment variable overriding the user config directory.
const CONFIG_DIR_ENV: &str = "CONDUIT_CONFIG_DIR";

/// Where a config layer was looked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSource {
    pub path: PathBuf,
    /// Whether the file existed and was merged.
    pub loaded: bool,
}

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged configuration.
    pub config: ConduitConfig,
    /// Layers that were checked, lowest precedence first.
    pub sources: Vec<ConfigSource>,
}

impl LoadedConfig {
    /// Paths of the layers that were actually loaded.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Discover and merge config layers.
///
/// `config_dir` overrides both `CONDUIT_CONFIG_DIR` and the platform default.
/// Missing files are skipped; a file that exists but does not parse is an
/// error naming the file.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    let mut config = ConduitConfig::new();
    let mut sources = Vec::new();

    let user_config_path = match config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => xdg_config_path(),
    };
    if let Some(path) = user_config_path {
        sources.push(load_layer(&mut config, &path)?);
    }

    let project_path = project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    sources.push(load_layer(&mut config, &project_path)?);

    Ok(LoadedConfig { config, sources })
}

/// Load config from a specific file (no discovery).
fn load_config_file(path: &Path) -> Result<ConduitConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    ConduitConfig::from_toml(&contents).map_err(|e| ConfigError::InvalidFile {
        path: path.to_path_buf(),
        source: Box::new(e),
    })
}

/// User config file path.
pub fn xdg_config_path() -> Option<PathBuf> {
    xdg_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// User config directory: `CONDUIT_CONFIG_DIR` if set and non-empty, else
/// the platform config dir joined with `conduit`.
pub fn xdg_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

fn load_layer(config: &mut ConduitConfig, path: &Path) -> Result<ConfigSource> {
    if !path.is_file() {
        return Ok(ConfigSource {
            path: path.to_path_buf(),
            loaded: false,
        });
    }

    config.merge(load_config_file(path)?);
    Ok(ConfigSource {
        path: path.to_path_buf(),
        loaded: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[engine]\nprogram_name = \"flow\"\n").unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.engine().program_name.as_deref(), Some("flow"));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let err = load_config_file(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_no_files_gives_defaults() {
        let user = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();

        let loaded = load_config_with_options(Some(project.path()), Some(user.path())).unwrap();
        assert_eq!(loaded.config, ConduitConfig::new());
        assert_eq!(loaded.sources.len(), 2);
        assert!(loaded.loaded_from().is_empty());
    }

    #[test]
    fn test_project_overrides_user() {
        let user = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        fs::write(
            user.path().join("config.toml"),
            "[engine]\nactions_dir = \"/usr/lib/conduit\"\nprogram_name = \"conduit\"\n\n[logging]\nlevel = \"info\"\n",
        )
        .unwrap();
        fs::write(
            project.path().join("conduit.toml"),
            "[engine]\nactions_dir = \"./bin\"\n",
        )
        .unwrap();

        let loaded = load_config_with_options(Some(project.path()), Some(user.path())).unwrap();

        let engine = loaded.config.engine();
        assert_eq!(engine.actions_dir, Some(PathBuf::from("./bin")));
        assert_eq!(engine.program_name.as_deref(), Some("conduit"));
        assert_eq!(loaded.config.logging().level.as_deref(), Some("info"));
        let user_file = user.path().join("config.toml");
        let project_file = project.path().join("conduit.toml");
        assert_eq!(
            loaded.loaded_from(),
            vec![user_file.as_path(), project_file.as_path()]
        );
    }

    #[test]
    fn test_malformed_layer_is_error() {
        let user = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        fs::write(project.path().join("conduit.toml"), "[engine\n").unwrap();

        let err = load_config_with_options(Some(project.path()), Some(user.path())).unwrap_err();
        match err {
            ConfigError::InvalidFile { path, source } => {
                assert!(path.ends_with("conduit.toml"));
                assert!(matches!(*source, ConfigError::Parse(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
