//! # Plugin unit manifest.
//!
//! ```toml
//! plugin = "heart"
//! enabled = true
//!
//! [settings]
//! interval_ms = 1000
//! ```

use serde::Deserialize;

/// Parsed contents of one unit file.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnitManifest {
    /// Catalog name of the plugin to activate.
    pub plugin: String,

    /// Disabled units are reported as skipped.
    #[serde(default = "enabled_default")]
    pub enabled: bool,

    /// Plugin-specific settings.
    #[serde(default)]
    pub settings: toml::Table,
}

fn enabled_default() -> bool {
    true
}

impl UnitManifest {
    /// Parses a manifest from TOML text.
    pub fn parse(src: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(src)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_unit_is_enabled_without_settings() {
        let m = UnitManifest::parse("plugin = \"hello\"").unwrap();
        assert_eq!(m.plugin, "hello");
        assert!(m.enabled);
        assert!(m.settings.is_empty());
    }

    #[test]
    fn full_unit() {
        let m = UnitManifest::parse(
            "plugin = \"heart\"\nenabled = false\n[settings]\ninterval_ms = 250\n",
        )
        .unwrap();
        assert!(!m.enabled);
        assert_eq!(m.settings.get("interval_ms").and_then(|v| v.as_integer()), Some(250));
    }

    #[test]
    fn missing_plugin_or_unknown_key_is_rejected() {
        assert!(UnitManifest::parse("enabled = true").is_err());
        assert!(UnitManifest::parse("plugin = \"hello\"\nfoo = 1").is_err());
    }
}
