//! Plugins and the folder loader that activates them.
//!
//! - [`Plugin`]: compiled-in initializer that registers handlers
//! - [`PluginCatalog`]: name → plugin
//! - [`UnitManifest`]: parsed unit file (`plugin`, `enabled`, `[settings]`)
//! - [`PluginLoader`]: walks a directory and loads each unit once

mod catalog;
mod loader;
mod manifest;
mod plugin;

pub use catalog::PluginCatalog;
pub use loader::{LoadReport, LoadedUnit, PluginLoader};
pub use manifest::UnitManifest;
pub use plugin::{Plugin, PluginContext};
