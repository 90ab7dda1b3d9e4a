//! Runtime events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`]: event classification and payload metadata
//! - [`Bus`]: thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Dispatcher` handler tasks, `LooperManager` and its looper
//!   supervisors, `PluginLoader`, `Runtime`, `SubscriberSet` workers.
//! - **Consumers**: `Runtime::subscriber_listener()` (fans out to `SubscriberSet`).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
