//! Configuration loading and management
//!
//! Handles parsing of `focus.toml`. Domain rules (the sacred cap, roles,
//! single-goal linkage) are fixed and deliberately absent here.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::lock::DEFAULT_LOCK_TIMEOUT_MS;

pub const CONFIG_FILE: &str = "focus.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Acting user configuration
    #[serde(default)]
    pub user: UserConfig,

    /// Data directory and locking
    #[serde(default)]
    pub storage: StorageConfig,

    /// Invitation notices
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Completion statistics
    #[serde(default)]
    pub stats: StatsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    /// Acting user when none is given on the command line or environment
    #[serde(default = "default_user")]
    pub default: String,
}

fn default_user() -> String {
    "unknown".to_string()
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            default: default_user(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory, relative to the root
    #[serde(default = "default_storage_dir")]
    pub dir: String,

    /// How long a transaction waits for the store lock
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_storage_dir() -> String {
    ".focus".to_string()
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_storage_dir(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Write invitation notices to the outbox
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Outbox file name inside the data directory
    #[serde(default = "default_outbox")]
    pub outbox: String,
}

fn default_true() -> bool {
    true
}

fn default_outbox() -> String {
    "outbox.jsonl".to_string()
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            outbox: default_outbox(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Default number of trailing days covered by `focus stats show`
    #[serde(default = "default_window_days")]
    pub window_days: u32,
}

fn default_window_days() -> u32 {
    30
}

/// Largest `stats.window_days` accepted from `focus.toml`.
pub const MAX_WINDOW_DAYS: u32 = 36_600;

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
        }
    }
}

impl Config {
    /// Load configuration from a `focus.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a root directory, or return defaults when absent
    pub fn load_from_root(root: &Path) -> Result<Self> {
        let config_path = root.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.user.default.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "user.default cannot be empty".to_string(),
            ));
        }

        let dir = self.storage.dir.trim();
        if dir.is_empty() {
            return Err(Error::InvalidConfig(
                "storage.dir cannot be empty".to_string(),
            ));
        }
        if Path::new(dir).is_absolute() || dir.split(['/', '\\']).any(|part| part == "..") {
            return Err(Error::InvalidConfig(format!(
                "storage.dir must stay inside the root: '{dir}'"
            )));
        }
        if self.storage.lock_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "storage.lock_timeout_ms must be > 0".to_string(),
            ));
        }

        let outbox = self.notify.outbox.trim();
        if outbox.is_empty() || outbox.contains(['/', '\\']) {
            return Err(Error::InvalidConfig(format!(
                "notify.outbox must be a plain file name: '{outbox}'"
            )));
        }

        if self.stats.window_days == 0 || self.stats.window_days > MAX_WINDOW_DAYS {
            return Err(Error::InvalidConfig(format!(
                "stats.window_days must be between 1 and {MAX_WINDOW_DAYS}"
            )));
        }

        Ok(())
    }
}
