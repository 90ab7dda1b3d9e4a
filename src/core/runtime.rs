//! # Runtime: plugins, dispatcher, loopers and graceful shutdown.
//!
//! The [`Runtime`] owns one [`Dispatcher`], one [`LooperManager`], the event
//! bus and a [`SubscriberSet`]. It is constructed explicitly (no global
//! singletons) by [`RuntimeBuilder`](crate::RuntimeBuilder).
//!
//! ## Lifecycle
//! ```text
//! run()
//!   ├─► load_plugins()       walk plugins_dir, each unit registers its handlers
//!   ├─► start()              emit every startup signal once
//!   ├─► wait_for_shutdown()  OS signal | shutdown_token().cancel()
//!   └─► shutdown()
//!         ├─► publish ShutdownRequested
//!         ├─► loopers.shutdown(grace)           cancel every looper
//!         ├─► dispatcher.shutdown(remaining)    drain in-flight handlers, cancel leftovers
//!         └─► AllStoppedWithin | GraceExceeded{stuck}
//!
//! Event flow:
//!   Dispatcher / LooperManager / PluginLoader ── publish ──► Bus ──► listener ──► SubscriberSet
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use heartbus::{Config, LogWriter, RuntimeBuilder};
//! use std::sync::Arc;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Config::default();
//!     let rt = RuntimeBuilder::new(cfg)
//!         .with_subscribers(vec![Arc::new(LogWriter::new())])
//!         .build();
//!     rt.run().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::core::{Config, shutdown};
use crate::dispatch::{Dispatcher, Payload};
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::loopers::LooperManager;
use crate::plugins::{LoadReport, PluginLoader};
use crate::subscribers::SubscriberSet;

/// Coordinates plugin loading, startup emission and graceful shutdown.
pub struct Runtime {
    cfg: Config,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    dispatcher: Dispatcher,
    loopers: LooperManager,
    loader: PluginLoader,
    token: CancellationToken,
}

impl Runtime {
    pub(super) fn new_internal(
        cfg: Config,
        bus: Bus,
        subs: Arc<SubscriberSet>,
        dispatcher: Dispatcher,
        loopers: LooperManager,
        loader: PluginLoader,
        token: CancellationToken,
    ) -> Self {
        Self {
            cfg,
            bus,
            subs,
            dispatcher,
            loopers,
            loader,
            token,
        }
    }

    /// Configuration the runtime was built with.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// The runtime's dispatcher.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// The runtime's looper manager.
    pub fn loopers(&self) -> &LooperManager {
        &self.loopers
    }

    /// Event bus all components publish to.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Token that ends [`Runtime::run`] when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Subscribes to the bus and forwards events to the subscriber set (fire-and-forget).
    pub(super) fn subscriber_listener(&self) {
        if self.subs.is_empty() {
            return;
        }
        let mut rx = self.bus.subscribe();
        let set = Arc::clone(&self.subs);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => set.emit(&ev),
                    Err(RecvError::Lagged(n)) => {
                        warn!(skipped = n, "event listener lagged behind the bus");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    /// Loads every unit under the configured plugin directory.
    pub fn load_plugins(&self) -> Result<LoadReport, RuntimeError> {
        let report =
            self.loader
                .load_folder(&self.cfg.plugins_dir, &self.dispatcher, &self.loopers)?;
        Ok(report)
    }

    /// Emits each configured startup signal once; returns the handlers scheduled.
    pub fn start(&self) -> usize {
        self.cfg
            .startup_signals
            .iter()
            .map(|signal| self.dispatcher.emit(signal.as_str(), Payload::empty()))
            .sum()
    }

    /// Loads plugins, emits startup signals, then blocks until shutdown.
    pub async fn run(&self) -> Result<(), RuntimeError> {
        let report = self.load_plugins()?;
        let scheduled = self.start();
        info!(
            plugins = report.loaded.len(),
            signals = self.dispatcher.signals().len(),
            scheduled,
            "runtime started"
        );

        let cause = shutdown::wait_for_shutdown(&self.token)
            .await
            .map_err(RuntimeError::Signals)?;
        info!(?cause, "shutdown requested");
        self.shutdown().await
    }

    /// Cancels every looper and drains in-flight handlers within the grace period.
    ///
    /// Publishes [`EventKind::AllStoppedWithin`] on success, or
    /// [`EventKind::GraceExceeded`] and returns [`RuntimeError::GraceExceeded`]
    /// with the looper labels and handler names that did not stop in time.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        self.token.cancel();

        let grace = self.cfg.grace();
        let deadline = Instant::now() + grace;
        let mut stuck = Vec::new();
        // Timed out even when no name could be attributed.
        let mut exceeded = false;

        if let Err(RuntimeError::GraceExceeded { stuck: s, .. }) = self.loopers.shutdown(grace).await {
            exceeded = true;
            stuck.extend(s);
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if let Err(RuntimeError::GraceExceeded { stuck: s, .. }) =
            self.dispatcher.shutdown(remaining).await
        {
            exceeded = true;
            stuck.extend(s);
        }

        if !exceeded {
            info!("all handlers and loopers stopped within grace");
            self.bus.publish(Event::new(EventKind::AllStoppedWithin));
            Ok(())
        } else {
            warn!(?stuck, ?grace, "grace period exceeded");
            self.bus
                .publish(Event::new(EventKind::GraceExceeded).with_reason(stuck.join(", ")));
            Err(RuntimeError::GraceExceeded { grace, stuck })
        }
    }
}
