//! # Plugin folder loader.
//!
//! ```text
//! load_folder(root)
//!   ├─► root missing?        ─► LoadError::NotFound
//!   ├─► root not a dir?      ─► LoadError::NotADirectory
//!   └─► walk (sorted by file name, recursive)
//!         for each file with the unit extension, not excluded:
//!           parse manifest ─► disabled? ─► skipped
//!                          ─► catalog.get(plugin) ─► plugin.register(ctx) ─► loaded
//! ```
//!
//! The first error aborts the call. There is no duplicate-load guard: loading
//! the same folder twice registers every handler twice.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::dispatch::Dispatcher;
use crate::error::LoadError;
use crate::events::{Event, EventKind};
use crate::loopers::LooperManager;
use crate::plugins::{PluginCatalog, PluginContext, UnitManifest};

/// One unit that was loaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadedUnit {
    /// Unit file.
    pub path: PathBuf,
    /// Plugin it activated.
    pub plugin: String,
}

/// Outcome of one [`PluginLoader::load_folder`] call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Units whose plugin registered, in load order.
    pub loaded: Vec<LoadedUnit>,
    /// Units marked `enabled = false`.
    pub skipped: Vec<PathBuf>,
}

impl LoadReport {
    /// Plugin names in load order.
    pub fn plugins(&self) -> Vec<&str> {
        self.loaded.iter().map(|u| u.plugin.as_str()).collect()
    }
}

/// Walks a directory of unit files and activates the plugins they name.
#[derive(Debug)]
pub struct PluginLoader {
    catalog: PluginCatalog,
    extension: String,
    exclude: Vec<PathBuf>,
}

impl PluginLoader {
    /// Default unit file extension.
    pub const DEFAULT_EXTENSION: &'static str = "toml";

    /// Loader over `catalog` using the default extension.
    pub fn new(catalog: PluginCatalog) -> Self {
        Self {
            catalog,
            extension: Self::DEFAULT_EXTENSION.to_string(),
            exclude: Vec::new(),
        }
    }

    /// Sets the unit file extension (without the dot).
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    /// Never treats `path` as a unit (e.g. the runtime's own config file).
    pub fn exclude(mut self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        self.exclude
            .push(fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()));
        self
    }

    pub fn catalog(&self) -> &PluginCatalog {
        &self.catalog
    }

    /// Loads every unit under `path` once, registering through `dispatcher`.
    pub fn load_folder(
        &self,
        path: impl AsRef<Path>,
        dispatcher: &Dispatcher,
        loopers: &LooperManager,
    ) -> Result<LoadReport, LoadError> {
        let given = path.as_ref();
        let meta = fs::metadata(given).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => LoadError::NotFound {
                path: given.to_path_buf(),
            },
            _ => LoadError::Io {
                path: given.to_path_buf(),
                source: e,
            },
        })?;
        if !meta.is_dir() {
            return Err(LoadError::NotADirectory {
                path: given.to_path_buf(),
            });
        }
        let root = fs::canonicalize(given).map_err(|source| LoadError::Io {
            path: given.to_path_buf(),
            source,
        })?;

        let mut report = LoadReport::default();
        for entry in WalkDir::new(&root)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| LoadError::Io {
                path: e.path().map_or_else(|| root.clone(), Path::to_path_buf),
                source: io::Error::from(e),
            })?;
            if !self.is_unit(entry.path()) {
                continue;
            }
            // Linked directories stay unfollowed; a link to a file is a unit.
            let resolved = if entry.file_type().is_file() {
                entry.path().to_path_buf()
            } else if entry.path_is_symlink() && entry.path().is_file() {
                fs::canonicalize(entry.path()).map_err(|source| LoadError::Io {
                    path: entry.path().to_path_buf(),
                    source,
                })?
            } else {
                continue;
            };
            if self.exclude.iter().any(|p| *p == resolved || p == entry.path()) {
                debug!(unit = %entry.path().display(), "excluded unit skipped");
                continue;
            }
            self.load_unit(entry.path(), dispatcher, loopers, &mut report)?;
        }

        info!(
            dir = %root.display(),
            loaded = report.loaded.len(),
            skipped = report.skipped.len(),
            "plugin folder loaded"
        );
        Ok(report)
    }

    fn is_unit(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == self.extension)
    }

    fn load_unit(
        &self,
        path: &Path,
        dispatcher: &Dispatcher,
        loopers: &LooperManager,
        report: &mut LoadReport,
    ) -> Result<(), LoadError> {
        let src = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest = UnitManifest::parse(&src).map_err(|source| LoadError::Manifest {
            path: path.to_path_buf(),
            source,
        })?;

        if !manifest.enabled {
            debug!(unit = %path.display(), plugin = %manifest.plugin, "unit disabled");
            report.skipped.push(path.to_path_buf());
            return Ok(());
        }

        let plugin = self
            .catalog
            .get(&manifest.plugin)
            .ok_or_else(|| LoadError::UnknownPlugin {
                plugin: manifest.plugin.clone(),
                path: path.to_path_buf(),
            })?;

        let ctx = PluginContext::new(dispatcher, loopers, path, &manifest.settings);
        plugin
            .register(&ctx)
            .map_err(|source| LoadError::Plugin {
                plugin: manifest.plugin.clone(),
                path: path.to_path_buf(),
                source,
            })?;

        info!(unit = %path.display(), plugin = %manifest.plugin, "plugin loaded");
        dispatcher.bus().publish(
            Event::new(EventKind::PluginLoaded)
                .with_source(manifest.plugin.as_str())
                .with_reason(path.display().to_string()),
        );
        report.loaded.push(LoadedUnit {
            path: path.to_path_buf(),
            plugin: manifest.plugin,
        });
        Ok(())
    }
}
