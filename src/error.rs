//! Error types used by the heartbus runtime, handlers, loopers and the plugin loader.
//!
//! - [`RuntimeError`]: errors raised by the runtime itself (startup, shutdown).
//! - [`HandlerError`]: errors raised by one handler invocation; never cross `emit`.
//! - [`LooperError`]: errors returned by a looper routine.
//! - [`LoadError`] / [`PluginError`]: plugin discovery and initialization failures.
//! - [`ConfigError`]: configuration file and logging setup failures.
//!
//! Types whose values end up in logs provide `as_label` (a stable snake_case
//! label for logs/metrics).

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// # Errors produced by the heartbus runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; the listed handlers/loopers were still running.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}; forcing termination")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of handlers and looper labels that did not finish in time.
        stuck: Vec<String>,
    },

    /// Plugin loading failed during startup.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Waiting for OS termination signals could not be set up.
    #[error("failed to install shutdown signal handlers: {0}")]
    Signals(#[source] std::io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use heartbus::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::Load(e) => e.as_label(),
            RuntimeError::Signals(_) => "runtime_signals",
        }
    }
}

/// # Errors produced by a single handler invocation.
///
/// These are terminal to the handler's own task: they are logged and published
/// as runtime events, never returned to the emitter.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// Handler ran and reported a failure.
    #[error("handler failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The emission payload did not hold the type the handler expected.
    #[error("payload mismatch: expected {expected}")]
    Payload {
        /// Type name the handler asked for.
        expected: &'static str,
    },

    /// Handler panicked; the panic was caught at the task boundary.
    #[error("handler panicked: {info}")]
    Panicked {
        /// Panic message, if it was a string.
        info: String,
    },

    /// Handler was cancelled by dispatcher shutdown.
    #[error("handler cancelled")]
    Canceled,
}

impl HandlerError {
    /// Shorthand for [`HandlerError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        HandlerError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use heartbus::HandlerError;
    ///
    /// assert_eq!(HandlerError::fail("boom").as_label(), "handler_failed");
    /// assert_eq!(HandlerError::Canceled.as_label(), "handler_canceled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::Fail { .. } => "handler_failed",
            HandlerError::Payload { .. } => "handler_payload_mismatch",
            HandlerError::Panicked { .. } => "handler_panicked",
            HandlerError::Canceled => "handler_canceled",
        }
    }
}

/// # Errors returned by a looper routine.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LooperError {
    /// Looper gave up; it terminates in the `Failed` state.
    #[error("looper failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Looper observed its cancellation token and stopped; counts as `Cancelled`.
    #[error("looper cancelled")]
    Canceled,
}

impl LooperError {
    /// Shorthand for [`LooperError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        LooperError::Fail {
            error: error.into(),
        }
    }
}

/// # Errors raised by a plugin's initializer.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum PluginError {
    /// A unit setting could not be decoded into the type the plugin expects.
    #[error("invalid setting '{key}': {reason}")]
    InvalidSetting {
        /// Setting key inside the unit's `[settings]` table.
        key: String,
        /// Decoder message.
        reason: String,
    },

    /// Any other initialization failure.
    #[error("{0}")]
    Init(String),
}

/// # Errors produced while loading a plugin folder.
///
/// All of these are configuration errors: they abort the load call and are
/// expected to abort startup.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LoadError {
    /// The plugin path does not exist.
    #[error("plugin path does not exist: {}", path.display())]
    NotFound {
        /// Path as given.
        path: PathBuf,
    },

    /// The plugin path exists but is not a directory.
    #[error("plugin path is not a directory: {}", path.display())]
    NotADirectory {
        /// Path as given.
        path: PathBuf,
    },

    /// Filesystem error while walking or reading units.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// Path being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A unit file is not a valid manifest.
    #[error("invalid plugin unit {}: {source}", path.display())]
    Manifest {
        /// Unit path.
        path: PathBuf,
        /// Parser error.
        #[source]
        source: toml::de::Error,
    },

    /// A unit names a plugin that is not in the catalog.
    #[error("unit {} names unknown plugin '{plugin}'", path.display())]
    UnknownPlugin {
        /// Plugin name from the unit.
        plugin: String,
        /// Unit path.
        path: PathBuf,
    },

    /// The plugin's initializer failed.
    #[error("plugin '{plugin}' ({}) failed to register: {source}", path.display())]
    Plugin {
        /// Plugin name.
        plugin: String,
        /// Unit path.
        path: PathBuf,
        /// Initializer error.
        #[source]
        source: PluginError,
    },
}

impl LoadError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            LoadError::NotFound { .. } => "load_not_found",
            LoadError::NotADirectory { .. } => "load_not_a_directory",
            LoadError::Io { .. } => "load_io",
            LoadError::Manifest { .. } => "load_manifest",
            LoadError::UnknownPlugin { .. } => "load_unknown_plugin",
            LoadError::Plugin { .. } => "load_plugin_init",
        }
    }
}

/// # Errors produced while reading configuration or initializing logging.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        /// Config path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`Config`](crate::Config).
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        /// Config path.
        path: PathBuf,
        /// Parser error.
        #[source]
        source: toml::de::Error,
    },

    /// Logging could not be initialized.
    #[error("failed to initialize logging: {reason}")]
    Logging {
        /// What went wrong.
        reason: String,
    },
}

/// Extracts a printable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
