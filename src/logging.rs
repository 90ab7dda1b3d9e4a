//! Logging system initialization.
//!
//! Sets up `tracing` for the binary: a console layer, plus a plain-text file
//! layer written through a non-blocking appender when `logging.dir` is set.
//! `RUST_LOG` takes precedence over the configured level.

use std::fs;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::core::LoggingConfig;
use crate::error::ConfigError;

/// Installs the global `tracing` subscriber.
///
/// Call once, after the configuration has been loaded. The returned guard
/// (present when a file layer is configured) must be kept alive for the
/// duration of the program so buffered lines are flushed.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>, ConfigError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| ConfigError::Logging {
            reason: format!("invalid level '{}': {e}", config.level),
        })?,
    };

    let console = fmt::layer().with_ansi(config.ansi).with_target(false);

    let (file, guard) = match &config.dir {
        Some(dir) => {
            fs::create_dir_all(dir).map_err(|e| ConfigError::Logging {
                reason: format!("cannot create {}: {e}", dir.display()),
            })?;
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::NEVER)
                .filename_prefix(config.file_prefix.as_str())
                .filename_suffix("log")
                .build(dir)
                .map_err(|e| ConfigError::Logging {
                    reason: e.to_string(),
                })?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| ConfigError::Logging {
            reason: e.to_string(),
        })?;
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_level_is_rejected() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let cfg = LoggingConfig {
            level: "heartbus=loud".to_string(),
            ..LoggingConfig::default()
        };
        assert!(matches!(init_logging(&cfg), Err(ConfigError::Logging { .. })));
    }
}
