use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Immutable signal name.
///
/// Cheap to clone and usable as a map key that can be looked up by `&str`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signal(Arc<str>);

impl Signal {
    /// Creates a signal from any string-like name.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    /// Returns the signal name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn as_arc(&self) -> Arc<str> {
        Arc::clone(&self.0)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Signal {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Signal {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Signal {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<&Signal> for Signal {
    fn from(signal: &Signal) -> Self {
        signal.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(Signal::from("greet"), 1);
        assert_eq!(map.get("greet"), Some(&1));
        assert_eq!(Signal::from(String::from("greet")).to_string(), "greet");
    }
}
