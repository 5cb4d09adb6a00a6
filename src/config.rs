use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Polling parameters for a single [`Watchdog`](crate::Watchdog).
///
/// Immutable once handed to the watchdog. No validation is performed; a
/// zero poll interval makes the poller spin as fast as the runtime allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogConfig {
    /// How often the file is re-checked.
    pub poll_interval: Duration,
    /// How long the size must stay unchanged before the file is final.
    pub stability_window: Duration,
    /// Files smaller than this are never considered valid output.
    pub min_file_size: u64,
}

impl WatchdogConfig {
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
    pub const DEFAULT_STABILITY_WINDOW: Duration = Duration::from_secs(15);
    pub const DEFAULT_MIN_FILE_SIZE: u64 = 512;

    pub fn new(poll_interval: Duration, stability_window: Duration, min_file_size: u64) -> Self {
        Self {
            poll_interval,
            stability_window,
            min_file_size,
        }
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_POLL_INTERVAL,
            Self::DEFAULT_STABILITY_WINDOW,
            Self::DEFAULT_MIN_FILE_SIZE,
        )
    }
}

/// Top-level configuration loaded from watchdog.toml.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub watchdog: WatchdogSettings,
    pub run: RunSettings,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WatchdogSettings {
    pub poll_interval_secs: u64,
    pub stability_window_secs: u64,
    pub min_file_size: u64,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct RunSettings {
    /// Give up after this many seconds. Absent means wait until interrupted.
    pub timeout_secs: Option<u64>,
}

impl Default for WatchdogSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: WatchdogConfig::DEFAULT_POLL_INTERVAL.as_secs(),
            stability_window_secs: WatchdogConfig::DEFAULT_STABILITY_WINDOW.as_secs(),
            min_file_size: WatchdogConfig::DEFAULT_MIN_FILE_SIZE,
        }
    }
}

impl WatchdogSettings {
    pub fn to_watchdog_config(&self) -> WatchdogConfig {
        WatchdogConfig::new(
            Duration::from_secs(self.poll_interval_secs),
            Duration::from_secs(self.stability_window_secs),
            self.min_file_size,
        )
    }
}

/// Errors that can occur while loading the config file.
#[derive(Debug)]
pub enum ConfigError {
    /// The file exists but could not be read.
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The file is not valid TOML for this schema.
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse config {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

impl FileConfig {
    /// Load config from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        Self::parse(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}
