//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/classbook/config.toml)
//! 3. Environment variables (CLASSBOOK_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::document::PathConflictPolicy;

/// Environment variable prefix
const ENV_PREFIX: &str = "CLASSBOOK";

/// Default name of the document file inside `data_dir`
const DEFAULT_DATA_FILE: &str = "classbook.json";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for data storage
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Name of the JSON document inside `data_dir`
    #[serde(default = "default_data_file")]
    pub data_file: String,

    /// Log file path (logs go to stderr when unset)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// What a write does when an intermediate path segment is not an object
    #[serde(default)]
    pub path_conflict: PathConflictPolicy,

    /// Run the startup migrations whenever the store is opened
    #[serde(default = "default_true")]
    pub run_migrations_on_open: bool,

    /// Keep a copy of an unreadable document before starting fresh
    #[serde(default = "default_true")]
    pub backup_corrupt: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            data_file: default_data_file(),
            log_file: None,
            path_conflict: PathConflictPolicy::default(),
            run_migrations_on_open: true,
            backup_corrupt: true,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (CLASSBOOK_DATA_DIR, CLASSBOOK_DATA_FILE, ...)
    /// 2. Config file (~/.config/classbook/config.toml or CLASSBOOK_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring an explicit path (e.g. from `--config`)
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides()?;
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        // CLASSBOOK_DATA_DIR
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        // CLASSBOOK_DATA_FILE
        if let Ok(val) = std::env::var(format!("{}_DATA_FILE", ENV_PREFIX)) {
            if !val.is_empty() {
                self.data_file = val;
            }
        }

        // CLASSBOOK_LOG_FILE
        if let Ok(val) = std::env::var(format!("{}_LOG_FILE", ENV_PREFIX)) {
            self.log_file = if val.is_empty() {
                None
            } else {
                Some(PathBuf::from(val))
            };
        }

        // CLASSBOOK_PATH_CONFLICT
        if let Ok(val) = std::env::var(format!("{}_PATH_CONFLICT", ENV_PREFIX)) {
            self.path_conflict = val
                .parse()
                .map_err(anyhow::Error::msg)
                .context("Invalid CLASSBOOK_PATH_CONFLICT")?;
        }

        // CLASSBOOK_RUN_MIGRATIONS
        if let Ok(val) = std::env::var(format!("{}_RUN_MIGRATIONS", ENV_PREFIX)) {
            self.run_migrations_on_open = parse_flag(&val);
        }

        // CLASSBOOK_BACKUP_CORRUPT
        if let Ok(val) = std::env::var(format!("{}_BACKUP_CORRUPT", ENV_PREFIX)) {
            self.backup_corrupt = parse_flag(&val);
        }

        Ok(())
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, config_path: &PathBuf) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with CLASSBOOK_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("classbook")
            .join("config.toml")
    }

    /// Get the path to the JSON document
    pub fn data_path(&self) -> PathBuf {
        self.data_dir.join(&self.data_file)
    }
}

fn parse_flag(val: &str) -> bool {
    val.eq_ignore_ascii_case("true") || val == "1"
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("classbook")
}

fn default_data_file() -> String {
    DEFAULT_DATA_FILE.to_string()
}

fn default_true() -> bool {
    true
}
