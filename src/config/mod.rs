//! Configuration management module.
//!
//! Handles loading and saving application configuration from JSON file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::utils::encoding::ErrorPolicy;

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "CHARENC_CONFIG";

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory (next to each converted file) holding metadata records.
    #[serde(default = "default_meta_dir_name")]
    pub meta_dir_name: String,
    /// Write a backup on convert unless `--no-backup` is given.
    #[serde(default = "default_true")]
    pub backup: bool,
    #[serde(default)]
    pub default_errors: ErrorPolicy,
    /// Used when RUST_LOG is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_true() -> bool {
    true
}

fn default_meta_dir_name() -> String {
    ".charenc_meta".to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta_dir_name: default_meta_dir_name(),
            backup: true,
            default_errors: ErrorPolicy::Strict,
            log_level: default_log_level(),
        }
    }
}

/// Configuration manager for loading/saving config.
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Self {
        let config_path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| Self::get_exe_directory().join("charenc_config.json"));
        Self::with_path(config_path)
    }

    pub fn with_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    /// Get the directory containing the executable.
    fn get_exe_directory() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Get the config file path.
    pub fn get_config_file_path(&self) -> &Path {
        &self.config_path
    }

    /// Load configuration from file, falling back to defaults.
    pub fn load(&self) -> Config {
        let mut config = self.try_load().unwrap_or_default();

        // Set defaults if empty
        if config.meta_dir_name.trim().is_empty() {
            config.meta_dir_name = default_meta_dir_name();
        }
        if config.log_level.trim().is_empty() {
            config.log_level = default_log_level();
        }

        config
    }

    fn try_load(&self) -> Option<Config> {
        if !self.config_path.exists() {
            return None;
        }

        let content = fs::read_to_string(&self.config_path).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Save configuration to file.
    pub fn save(&self, config: &Config) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(config)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        fs::write(&self.config_path, json)
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
