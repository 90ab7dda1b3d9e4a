//! # Plugin trait and the context handed to its initializer.
//!
//! A plugin is compiled into the binary and activated by a unit file. Its
//! [`Plugin::register`] is the explicit initializer: it reads its settings and
//! binds handlers through [`PluginContext::dispatcher`]. Handlers that need to
//! spawn loopers clone [`PluginContext::loopers`] into their closures.
//!
//! ```rust
//! use heartbus::{Emission, Handler, HandlerError, Plugin, PluginContext, PluginError};
//!
//! struct Echo;
//!
//! impl Plugin for Echo {
//!     fn name(&self) -> &str {
//!         "echo"
//!     }
//!
//!     fn register(&self, ctx: &PluginContext<'_>) -> Result<(), PluginError> {
//!         let signal: String = ctx.setting("signal")?.unwrap_or_else(|| "echo".into());
//!         ctx.dispatcher().register(
//!             signal,
//!             Handler::from_async("echo", |_em: Emission| async { Ok::<_, HandlerError>(()) }),
//!         );
//!         Ok(())
//!     }
//! }
//! ```

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::dispatch::Dispatcher;
use crate::error::PluginError;
use crate::loopers::LooperManager;

/// A named, compiled-in unit of handler registrations.
pub trait Plugin: Send + Sync + 'static {
    /// Name that unit files refer to (`plugin = "<name>"`).
    fn name(&self) -> &str;

    /// Registers the plugin's handlers.
    ///
    /// Called once per loaded unit, so a plugin activated by two units
    /// registers twice.
    fn register(&self, ctx: &PluginContext<'_>) -> Result<(), PluginError>;
}

/// Everything a plugin initializer may touch.
pub struct PluginContext<'a> {
    dispatcher: &'a Dispatcher,
    loopers: &'a LooperManager,
    unit: &'a Path,
    settings: &'a toml::Table,
}

impl<'a> PluginContext<'a> {
    pub(crate) fn new(
        dispatcher: &'a Dispatcher,
        loopers: &'a LooperManager,
        unit: &'a Path,
        settings: &'a toml::Table,
    ) -> Self {
        Self {
            dispatcher,
            loopers,
            unit,
            settings,
        }
    }

    /// Dispatcher to register handlers on.
    pub fn dispatcher(&self) -> &'a Dispatcher {
        self.dispatcher
    }

    /// Looper manager shared by the runtime.
    pub fn loopers(&self) -> &'a LooperManager {
        self.loopers
    }

    /// Path of the unit file being loaded.
    pub fn unit(&self) -> &'a Path {
        self.unit
    }

    /// Raw `[settings]` table of the unit.
    pub fn settings(&self) -> &'a toml::Table {
        self.settings
    }

    /// Decodes one setting; `Ok(None)` if the key is absent.
    pub fn setting<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, PluginError> {
        let Some(value) = self.settings.get(key) else {
            return Ok(None);
        };
        value
            .clone()
            .try_into()
            .map(Some)
            .map_err(|e: toml::de::Error| PluginError::InvalidSetting {
                key: key.to_string(),
                reason: e.message().to_string(),
            })
    }
}
