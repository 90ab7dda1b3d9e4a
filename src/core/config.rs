//! # Runtime configuration.
//!
//! Provides [`Config`], the settings the binary reads from a TOML file and the
//! [`RuntimeBuilder`](crate::RuntimeBuilder) consumes. Every key is optional:
//!
//! ```toml
//! plugins_dir = "plug-ins"
//! plugin_extension = "toml"
//! startup_signals = ["startup", "heartHook"]
//! grace_ms = 5000
//! bus_capacity = 1024
//! blocking_workers = 0
//! admission = "replace"
//!
//! [logging]
//! level = "info"
//! dir = "logs"
//! file_prefix = "heartbus"
//! ansi = true
//! ```
//!
//! ## Sentinel values
//! - `blocking_workers = 0` → blocking handlers are bounded only by the runtime's pool
//! - `grace_ms = 0` → shutdown does not wait; leftover work is cancelled at once
//! - `logging.dir` absent → console only

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::loopers::Admission;

/// Configuration of the heartbus runtime.
///
/// All fields are public; prefer the helper accessors over checking
/// sentinels (`0`) by hand.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory scanned for plugin units.
    ///
    /// Relative paths read from a file are resolved against that file's directory.
    pub plugins_dir: PathBuf,

    /// Extension of plugin unit files, without the dot.
    pub plugin_extension: String,

    /// Signals emitted once, in order, after plugins are loaded.
    pub startup_signals: Vec<String>,

    /// Shutdown grace period in milliseconds.
    pub grace_ms: u64,

    /// Capacity of the runtime event ring buffer (min 1).
    pub bus_capacity: usize,

    /// Maximum number of blocking handlers running at once (`0` = unbounded).
    pub blocking_workers: usize,

    /// What happens when a looper label is re-added.
    pub admission: Admission,

    /// Logging setup.
    pub logging: LoggingConfig,

    /// File this config was read from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// Logging section of [`Config`].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence when set.
    pub level: String,
    /// Directory for the log file; console only when absent.
    pub dir: Option<PathBuf>,
    /// Log file name prefix (`<dir>/<prefix>.log`).
    pub file_prefix: String,
    /// Colored console output.
    pub ansi: bool,
}

impl Config {
    /// Reads and parses a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let src = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut cfg: Config = toml::from_str(&src).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if cfg.plugins_dir.is_relative() {
            if let Some(base) = path.parent() {
                cfg.plugins_dir = base.join(&cfg.plugins_dir);
            }
        }
        cfg.source = Some(path.to_path_buf());
        Ok(cfg)
    }

    /// Shutdown grace period.
    #[inline]
    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }

    /// Bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Defaults:
    ///
    /// - `plugins_dir = "plug-ins"`
    /// - `startup_signals = ["startup", "heartHook"]`
    /// - `grace_ms = 5000`
    /// - `bus_capacity = 1024`
    /// - `blocking_workers = 0` (unbounded)
    /// - `admission = Replace`
    fn default() -> Self {
        Self {
            plugins_dir: PathBuf::from("plug-ins"),
            plugin_extension: "toml".to_string(),
            startup_signals: vec!["startup".to_string(), "heartHook".to_string()],
            grace_ms: 5000,
            bus_capacity: 1024,
            blocking_workers: 0,
            admission: Admission::Replace,
            logging: LoggingConfig::default(),
            source: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
            file_prefix: "heartbus".to_string(),
            ansi: true,
        }
    }
}
