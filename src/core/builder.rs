use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
    core::{Config, Runtime},
    dispatch::Dispatcher,
    events::Bus,
    loopers::LooperManager,
    plugins::{PluginCatalog, PluginLoader},
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing a [`Runtime`].
pub struct RuntimeBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    catalog: PluginCatalog,
}

impl RuntimeBuilder {
    /// Creates a builder with the given configuration and the built-in plugins.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            catalog: PluginCatalog::with_builtin(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (emissions, handler outcomes, looper
    /// lifecycle) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Replaces the plugin catalog unit files are resolved against.
    pub fn with_catalog(mut self, catalog: PluginCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Builds the runtime.
    ///
    /// Spawns the subscriber workers and the bus listener, so it must be
    /// called from within a Tokio runtime.
    pub fn build(self) -> Runtime {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));

        let dispatcher = Dispatcher::new(bus.clone(), self.cfg.blocking_workers);
        let loopers = LooperManager::new(bus.clone(), self.cfg.admission);

        let mut loader =
            PluginLoader::new(self.catalog).with_extension(self.cfg.plugin_extension.as_str());
        if let Some(source) = &self.cfg.source {
            loader = loader.exclude(source);
        }

        let rt = Runtime::new_internal(
            self.cfg,
            bus,
            subs,
            dispatcher,
            loopers,
            loader,
            CancellationToken::new(),
        );
        rt.subscriber_listener();
        rt
    }
}
