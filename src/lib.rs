//! # heartbus
//!
//! **heartbus** is a minimal in-process signal dispatcher with plugin-registered
//! handlers and supervised background loopers.
//!
//! Named signals trigger zero or more registered handlers; handlers may emit
//! further signals (cascading chains) and may start long-running loopers that
//! a manager tracks by label.
//!
//! ## Architecture
//! ```text
//!   plug-ins/*.toml ──► PluginLoader ──► Plugin::register(ctx)
//!                                              │
//!                                              ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Runtime                                                          │
//! │  - Dispatcher     (signal → handlers, tracked handler tasks)      │
//! │  - LooperManager  (label → supervised looper)                     │
//! │  - Bus            (broadcast runtime events)                      │
//! │  - SubscriberSet  (fans out events to subscribers)                │
//! └──────┬──────────────────────────────┬─────────────────────────────┘
//!        ▼                              ▼
//!   emit(signal, payload)         add(label, factory)
//!        │                              │
//!        ├─► async handler task         └─► supervised looper task
//!        └─► blocking handler (pool)          (Created → Running → Cancelled | Completed | Failed)
//!        │                              │
//!        └──────── publish(Event) ──────┴──► Bus ──► SubscriberSet ──► LogWriter, ...
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                          |
//! |-------------------|---------------------------------------------------------------|---------------------------------------------|
//! | **Dispatch**      | Register handlers against signals and emit payloads.          | [`Dispatcher`], [`Handler`], [`Payload`]    |
//! | **Loopers**       | Label-keyed background tasks with re-add policies.            | [`LooperManager`], [`Admission`]            |
//! | **Plugins**       | Compiled-in plugins activated by unit files.                  | [`Plugin`], [`PluginLoader`]                |
//! | **Runtime**       | Startup, OS signal handling, graceful shutdown.               | [`Runtime`], [`RuntimeBuilder`]             |
//! | **Subscriber API**| Hook into runtime events (logging, custom subscribers).       | [`Subscribe`], [`LogWriter`]                |
//! | **Errors**        | Typed errors for loading, handlers, loopers and shutdown.     | [`LoadError`], [`HandlerError`], [`RuntimeError`] |
//! | **Configuration** | TOML configuration with defaults.                             | [`Config`]                                  |
//!
//! ## Example
//! ```rust
//! use heartbus::{Dispatcher, Emission, Handler, HandlerError, Payload};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let bus = Dispatcher::default();
//!     bus.register(
//!         "raw_data",
//!         Handler::from_async("process", |em: Emission| async move {
//!             let data = *em.payload.require::<i64>()?;
//!             println!("got {data}");
//!             Ok::<(), HandlerError>(())
//!         }),
//!     );
//!
//!     assert_eq!(bus.emit("raw_data", Payload::new(4_i64)), 1);
//!     assert_eq!(bus.emit("nobody_listens", Payload::empty()), 0);
//!     bus.shutdown(std::time::Duration::from_secs(1)).await.unwrap();
//! }
//! ```

mod builtin;
mod core;
mod dispatch;
mod error;
mod events;
mod loopers;
mod logging;
mod plugins;
mod subscribers;

// ---- Public re-exports ----

pub use builtin::{HEARTBEAT_SIGNAL, Heart, Hello};
pub use core::{Config, LoggingConfig, Runtime, RuntimeBuilder, ShutdownCause, wait_for_shutdown};
pub use dispatch::{
    AsyncHandler, BlockingFn, BlockingHandler, BoxHandlerFuture, DispatchTable, Dispatcher,
    Emission, Handler, HandlerFn, Payload, Signal,
};
pub use error::{ConfigError, HandlerError, LoadError, LooperError, PluginError, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use logging::init_logging;
pub use loopers::{Admission, LooperHandle, LooperManager, LooperState};
pub use plugins::{LoadReport, LoadedUnit, Plugin, PluginCatalog, PluginContext, PluginLoader, UnitManifest};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
