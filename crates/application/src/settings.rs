//! User settings.
//!
//! Read from `<config_dir>/clipkeep/settings.json` when it exists. Every field
//! is optional in the file; missing ones take the defaults below.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clipkeep_badge::DEFAULT_BADGE_COLOR;
use clipkeep_capture::{DEFAULT_POLL_INTERVAL, DEFAULT_SETTLE_DELAY, DEFAULT_SWEEP_INTERVAL};
use clipkeep_history::{HistoryPolicy, DEFAULT_MAX_ENTRIES, DEFAULT_TTL};
use clipkeep_writer::{WriterConfig, DEFAULT_IO_TIMEOUT};
use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

const APP_DIR: &str = "clipkeep";
const DEFAULT_STORE_WATCH_INTERVAL_MS: u64 = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Maximum number of entries kept.
    pub max_entries: usize,
    /// Maximum entry age.
    pub ttl_ms: u64,
    /// Clipboard sampling interval.
    pub poll_interval_ms: u64,
    /// Set to false to rely on copy signals only.
    pub poll_enabled: bool,
    /// Interval between expiry sweeps.
    pub sweep_interval_ms: u64,
    /// Delay between a copy signal and the clipboard read.
    pub settle_delay_ms: u64,
    /// Bound on a single store read or write.
    pub io_timeout_ms: u64,
    /// How often the daemon checks for commits made by other processes.
    pub store_watch_interval_ms: u64,
    pub badge_color: String,
    /// History database; defaults to `<data_local_dir>/clipkeep/history.db`.
    pub database_path: Option<PathBuf>,
    /// Optional JSON status file for status bars.
    pub status_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            ttl_ms: DEFAULT_TTL.as_millis() as u64,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            poll_enabled: true,
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL.as_millis() as u64,
            settle_delay_ms: DEFAULT_SETTLE_DELAY.as_millis() as u64,
            io_timeout_ms: DEFAULT_IO_TIMEOUT.as_millis() as u64,
            store_watch_interval_ms: DEFAULT_STORE_WATCH_INTERVAL_MS,
            badge_color: DEFAULT_BADGE_COLOR.to_string(),
            database_path: None,
            status_file: None,
        }
    }
}

impl Settings {
    /// Load settings.
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// used if present and defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let settings = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_settings_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => {
                    tracing::debug!("no settings file, using defaults");
                    Self::default()
                }
            },
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings =
            serde_json::from_str(&raw).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::info!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let checks = [
            (self.max_entries == 0, "max_entries"),
            (self.poll_interval_ms == 0, "poll_interval_ms"),
            (self.sweep_interval_ms == 0, "sweep_interval_ms"),
            (self.io_timeout_ms == 0, "io_timeout_ms"),
            (self.store_watch_interval_ms == 0, "store_watch_interval_ms"),
        ];
        for (invalid, field) in checks {
            if invalid {
                return Err(SettingsError::Invalid {
                    field,
                    reason: "must be greater than zero",
                });
            }
        }
        Ok(())
    }

    pub fn policy(&self) -> HistoryPolicy {
        HistoryPolicy {
            max_entries: self.max_entries,
            ttl: Duration::from_millis(self.ttl_ms),
        }
    }

    pub fn writer_config(&self) -> WriterConfig {
        WriterConfig {
            policy: self.policy(),
            io_timeout: self.io_timeout(),
        }
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    pub fn store_watch_interval(&self) -> Duration {
        Duration::from_millis(self.store_watch_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Configured database path, or the default location.
    pub fn resolved_database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(default_database_path)
    }
}

pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_DIR).join("settings.json"))
}

pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("history.db")
}
