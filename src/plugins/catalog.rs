use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::builtin::{Heart, Hello};
use crate::plugins::Plugin;

/// Name → plugin lookup used by the loader.
#[derive(Clone, Default)]
pub struct PluginCatalog {
    plugins: HashMap<String, Arc<dyn Plugin>>,
}

impl PluginCatalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog holding the plugins shipped with the crate (`hello`, `heart`).
    pub fn with_builtin() -> Self {
        let mut catalog = Self::new();
        catalog.insert(Arc::new(Hello));
        catalog.insert(Arc::new(Heart));
        catalog
    }

    /// Adds a plugin under its own name, replacing any previous entry.
    pub fn insert(&mut self, plugin: Arc<dyn Plugin>) -> &mut Self {
        self.plugins.insert(plugin.name().to_string(), plugin);
        self
    }

    /// Looks a plugin up by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.get(name).cloned()
    }

    /// Sorted plugin names.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.plugins.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl fmt::Debug for PluginCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginCatalog")
            .field("plugins", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_lists_shipped_plugins() {
        let catalog = PluginCatalog::with_builtin();
        assert_eq!(catalog.names(), ["heart", "hello"]);
        assert!(catalog.get("hello").is_some());
        assert!(catalog.get("nope").is_none());
    }

    #[test]
    fn insert_replaces_same_name() {
        let mut catalog = PluginCatalog::new();
        catalog.insert(Arc::new(Hello)).insert(Arc::new(Hello));
        assert_eq!(catalog.len(), 1);
    }
}
