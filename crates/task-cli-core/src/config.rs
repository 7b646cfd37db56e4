use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::DEFAULT_STORE_FILE;

pub const CONFIG_FILENAME: &str = ".task-cli.toml";
pub const STORE_FILE_ENV: &str = "TASK_CLI_FILE";
pub const LOG_ENV: &str = "TASK_CLI_LOG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCliConfig {
    /// Path of the task store. Relative paths are resolved against the directory that
    /// holds the config file.
    pub store_file: Option<String>,
    /// Default log filter, e.g. "info" or "task_cli_core=debug".
    pub log_level: Option<String>,
}

/// A config file together with the directory it was found in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedConfig {
    pub root: PathBuf,
    pub config: TaskCliConfig,
}

impl LoadedConfig {
    pub fn store_path(&self) -> Option<PathBuf> {
        let raw = self.config.store_file.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        Some(self.root.join(raw))
    }
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILENAME)
}

/// Walks up from `start` and returns the first directory holding a config file.
pub fn find_config_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|candidate| config_path(candidate).is_file())
        .map(Path::to_path_buf)
}

pub fn load_config(root: &Path) -> Result<TaskCliConfig, ConfigError> {
    let path = config_path(root);
    let text = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse { path, source })
}

pub fn discover_config(start: &Path) -> Result<Option<LoadedConfig>, ConfigError> {
    let Some(root) = find_config_root(start) else {
        return Ok(None);
    };
    let config = load_config(&root)?;
    Ok(Some(LoadedConfig { root, config }))
}

/// Store path precedence: explicit flag, then the environment value, then the config
/// file, then `tasks.json` in `cwd`.
pub fn resolve_store_path(
    cwd: &Path,
    explicit: Option<&Path>,
    env_value: Option<&str>,
    config: Option<&LoadedConfig>,
) -> PathBuf {
    if let Some(path) = explicit {
        return cwd.join(path);
    }
    if let Some(value) = env_value.map(str::trim).filter(|value| !value.is_empty()) {
        return cwd.join(value);
    }
    if let Some(path) = config.and_then(LoadedConfig::store_path) {
        return path;
    }
    cwd.join(DEFAULT_STORE_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write_config(root: &Path, body: &str) {
        fs::write(config_path(root), body).expect("write config");
    }

    #[test]
    fn discover_walks_up_to_nearest_config() {
        let temp = TempDir::new().expect("tempdir");
        let nested = temp.path().join("a").join("b");
        fs::create_dir_all(&nested).expect("dirs");
        write_config(temp.path(), "store_file = \"data/tasks.json\"\nlog_level = \"debug\"\n");

        let loaded = discover_config(&nested).expect("discover").expect("config");

        assert_eq!(loaded.root, temp.path());
        assert_eq!(loaded.config.log_level.as_deref(), Some("debug"));
        assert_eq!(
            loaded.store_path(),
            Some(temp.path().join("data").join("tasks.json"))
        );
    }

    #[test]
    fn discover_without_config_is_none() {
        let temp = TempDir::new().expect("tempdir");
        let nested = temp.path().join("x");
        fs::create_dir_all(&nested).expect("dirs");

        // Only directories inside the temp dir are under test control.
        let found = find_config_root(&nested).filter(|root| root.starts_with(temp.path()));
        assert_eq!(found, None);
    }

    #[test]
    fn invalid_config_is_an_error() {
        let temp = TempDir::new().expect("tempdir");
        write_config(temp.path(), "store_file = [");

        let err = load_config(temp.path()).unwrap_err();

        assert!(matches!(err, ConfigError::Parse { .. }), "{err}");
    }

    #[test]
    fn store_path_precedence() {
        let cwd = Path::new("/work");
        let loaded = LoadedConfig {
            root: PathBuf::from("/repo"),
            config: TaskCliConfig {
                store_file: Some("tracked.json".to_string()),
                log_level: None,
            },
        };

        assert_eq!(
            resolve_store_path(cwd, Some(Path::new("flag.json")), Some("env.json"), Some(&loaded)),
            PathBuf::from("/work/flag.json")
        );
        assert_eq!(
            resolve_store_path(cwd, None, Some("/abs/env.json"), Some(&loaded)),
            PathBuf::from("/abs/env.json")
        );
        assert_eq!(
            resolve_store_path(cwd, None, Some("  "), Some(&loaded)),
            PathBuf::from("/repo/tracked.json")
        );
        assert_eq!(
            resolve_store_path(cwd, None, None, None),
            PathBuf::from("/work/tasks.json")
        );
    }
}
