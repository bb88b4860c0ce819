//! Application configuration.
//!
//! Reads `config/default.toml` (or the file given with `--config`).
//! A missing file or section falls back to defaults; a malformed file is
//! an error. `QUICKWIT_DATABASE` overrides the database path.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use quickwit_core::CoordinatorConfig;
use serde::Deserialize;

/// Environment variable overriding `storage.database_path`.
pub const DATABASE_ENV: &str = "QUICKWIT_DATABASE";

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub events: CoordinatorConfig,
    pub logging: LoggingConfig,
}

/// Settings from the `[storage]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/events.db"),
        }
    }
}

/// Settings from the `[logging]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from `path`, then apply the environment override.
    pub fn load(path: &Path) -> Result<Self> {
        let config = Self::from_file(path)?;
        Ok(config.with_database_override(std::env::var(DATABASE_ENV).ok()))
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()));
            }
        };
        toml::from_str(&content).with_context(|| format!("invalid config in {}", path.display()))
    }

    fn with_database_override(mut self, database: Option<String>) -> Self {
        if let Some(path) = database.filter(|p| !p.trim().is_empty()) {
            self.storage.database_path = PathBuf::from(path);
        }
        self
    }
}
