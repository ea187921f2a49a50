//! Database location and the small JSON config file that remembers it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const APP_DIR_NAME: &str = "ProjectTracing";
pub const CONFIG_FILE_NAME: &str = "project_tracing_config.json";
pub const DB_FILE_NAME: &str = "project_tracing.db";

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,
    /// Keys written by other tools are kept as-is.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Config {
    /// Load the config from `path`. A missing or unreadable file is an empty
    /// config.
    pub fn load_from(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read config");
                return Self::default();
            }
        };
        serde_json::from_str(&contents).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "ignoring malformed config");
            Self::default()
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}

/// Per-user application data directory.
/// Checks `PT_DATA_DIR`, falls back to `<data dir>/ProjectTracing`.
pub fn app_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("PT_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(".").join(APP_DIR_NAME))
}

pub fn config_path() -> PathBuf {
    app_data_dir().join(CONFIG_FILE_NAME)
}

pub fn default_db_path() -> PathBuf {
    app_data_dir().join(DB_FILE_NAME)
}

/// Resolve the database path: explicit override, then the config file, then
/// the default location (which is written back to the config file).
///
/// The result is absolute and its parent directory exists.
pub fn resolve_db_path(explicit: Option<&str>) -> Result<PathBuf> {
    resolve_db_path_with(explicit, &config_path(), &default_db_path())
}

fn resolve_db_path_with(
    explicit: Option<&str>,
    config_file: &Path,
    default_path: &Path,
) -> Result<PathBuf> {
    let path = match explicit.map(str::trim).filter(|p| !p.is_empty()) {
        Some(p) => PathBuf::from(p),
        None => {
            let mut config = Config::load_from(config_file);
            match config.db_path.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
                Some(p) => PathBuf::from(p),
                None => {
                    config.db_path = Some(default_path.to_string_lossy().into_owned());
                    if let Err(e) = config.save_to(config_file) {
                        tracing::warn!(error = %e, "failed to remember default database path");
                    }
                    default_path.to_path_buf()
                }
            }
        }
    };
    let path = std::path::absolute(&path)
        .with_context(|| format!("failed to resolve {}", path.display()))?;
    ensure_parent_dir(&path)?;
    Ok(path)
}

pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_returns_default() {
        let config = Config::load_from(Path::new("/nonexistent/project_tracing_config.json"));
        assert!(config.db_path.is_none());
        assert!(config.extra.is_empty());
    }

    #[test]
    fn malformed_file_returns_default() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "{not json").unwrap();
        assert!(Config::load_from(&path).db_path.is_none());
    }

    #[test]
    fn unknown_keys_survive_rewrite() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, r#"{"theme": "dark", "db_path": "/x/y.db"}"#).unwrap();

        let mut config = Config::load_from(&path);
        assert_eq!(config.db_path.as_deref(), Some("/x/y.db"));
        config.db_path = Some("/z.db".into());
        config.save_to(&path).unwrap();

        let reloaded = Config::load_from(&path);
        assert_eq!(reloaded.db_path.as_deref(), Some("/z.db"));
        assert_eq!(reloaded.extra["theme"], "dark");
    }

    #[test]
    fn explicit_path_wins() {
        let dir = tempfile::TempDir::new().unwrap();
        let config_file = dir.path().join(CONFIG_FILE_NAME);
        let explicit = dir.path().join("nested").join("mine.db");
        let resolved = resolve_db_path_with(
            explicit.to_str(),
            &config_file,
            &dir.path().join("default.db"),
        )
        .unwrap();
        assert_eq!(resolved, explicit);
        assert!(explicit.parent().unwrap().is_dir());
        assert!(!config_file.exists());
    }

    #[test]
    fn configured_path_used() {
        let dir = tempfile::TempDir::new().unwrap();
        let config_file = dir.path().join(CONFIG_FILE_NAME);
        let configured = dir.path().join("shared").join("tracker.db");
        Config {
            db_path: Some(configured.to_string_lossy().into_owned()),
            ..Default::default()
        }
        .save_to(&config_file)
        .unwrap();

        let resolved =
            resolve_db_path_with(None, &config_file, &dir.path().join("default.db")).unwrap();
        assert_eq!(resolved, configured);
    }

    #[test]
    fn default_path_is_remembered() {
        let dir = tempfile::TempDir::new().unwrap();
        let config_file = dir.path().join("cfg").join(CONFIG_FILE_NAME);
        let default_path = dir.path().join("data").join(DB_FILE_NAME);

        let resolved = resolve_db_path_with(None, &config_file, &default_path).unwrap();
        assert_eq!(resolved, default_path);
        assert_eq!(
            Config::load_from(&config_file).db_path.as_deref(),
            default_path.to_str()
        );
    }

    #[test]
    fn relative_path_made_absolute() {
        let dir = tempfile::TempDir::new().unwrap();
        let resolved = resolve_db_path_with(
            Some("relative-tracker.db"),
            &dir.path().join(CONFIG_FILE_NAME),
            &dir.path().join("default.db"),
        )
        .unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("relative-tracker.db"));
    }
}
