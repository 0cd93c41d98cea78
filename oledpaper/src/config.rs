use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::error::{Error, Result};
use crate::threshold::Threshold;

pub const DEFAULT_CONFIG_PATH: &str = "oledpaper.toml";

/// Stopping the worker waits up to one poll interval, so it must stay short.
pub const MAX_POLL_INTERVAL_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How long the worker waits for a threshold before re-checking for stop.
    pub poll_interval_ms: u64,
    /// Entries per cache tier before the tier is cleared.
    pub cache_capacity: usize,
    pub initial_threshold: Threshold,
    pub log_level: String,
    pub log_dir: PathBuf,
    pub log_file_prefix: String,
    /// Rolled log files kept in `log_dir`.
    pub log_max_files: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            initial_threshold: Threshold::default(),
            log_level: "info".to_string(),
            log_dir: PathBuf::from("logs"),
            log_file_prefix: "oledpaper".to_string(),
            log_max_files: 5,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let serialized = std::fs::read_to_string(path)?;
        Self::from_toml(&serialized)
    }

    /// Loads `path`, falling back to defaults if it is missing or invalid.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }

        Self::load(path).unwrap_or_else(|err| {
            warn!(path = %path.display(), %err, "ignoring unreadable config");
            Self::default()
        })
    }

    pub fn from_toml(serialized: &str) -> Result<Self> {
        let config: Config = toml::from_str(serialized)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let serialized = toml::to_string_pretty(self)?;
        std::fs::write(path, serialized)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::configuration("poll_interval_ms must be positive"));
        }
        if self.poll_interval_ms > MAX_POLL_INTERVAL_MS {
            return Err(Error::configuration(format!(
                "poll_interval_ms must be at most {MAX_POLL_INTERVAL_MS}, got {}",
                self.poll_interval_ms
            )));
        }
        if self.cache_capacity == 0 {
            return Err(Error::configuration("cache_capacity must be positive"));
        }
        if self.log_file_prefix.is_empty() {
            return Err(Error::configuration("log_file_prefix must not be empty"));
        }
        if self.log_max_files == 0 {
            return Err(Error::configuration("log_max_files must be positive"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
