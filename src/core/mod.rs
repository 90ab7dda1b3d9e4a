//! Runtime core: configuration, construction and lifecycle.
//!
//! - [`config`]: [`Config`] / [`LoggingConfig`] read from TOML;
//! - [`builder`]: [`RuntimeBuilder`] wires bus, subscribers, dispatcher, loopers and loader;
//! - [`runtime`]: [`Runtime`] loads plugins, emits startup signals, shuts down with grace;
//! - [`shutdown`]: waits for OS termination signals or an explicit request.

mod builder;
mod config;
mod runtime;
mod shutdown;

pub use builder::RuntimeBuilder;
pub use config::{Config, LoggingConfig};
pub use runtime::Runtime;
pub use shutdown::{ShutdownCause, wait_for_shutdown};
