//! # Dispatch table: signal → ordered handlers.
//!
//! Lists are stored as immutable `Arc<[Handler]>` slices. Appending builds a
//! new slice and swaps it in, so a snapshot handed to an in-flight emission is
//! never mutated underneath it.

use std::collections::HashMap;
use std::sync::Arc;

use crate::dispatch::{Handler, Signal};

/// Mapping from signal to handlers in registration order (duplicates allowed).
#[derive(Default, Debug)]
pub struct DispatchTable {
    entries: HashMap<Signal, Arc<[Handler]>>,
}

impl DispatchTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `handler` to the list for `signal`, creating the list if absent.
    pub fn insert(&mut self, signal: Signal, handler: Handler) {
        let entry = self.entries.entry(signal).or_insert_with(|| Arc::from([]));
        let mut next = Vec::with_capacity(entry.len() + 1);
        next.extend(entry.iter().cloned());
        next.push(handler);
        *entry = Arc::from(next);
    }

    /// Returns the current handler list for `signal`, if any.
    pub fn snapshot(&self, signal: &str) -> Option<Arc<[Handler]>> {
        self.entries.get(signal).map(Arc::clone)
    }

    /// Number of handlers registered for `signal`.
    pub fn count(&self, signal: &str) -> usize {
        self.entries.get(signal).map_or(0, |h| h.len())
    }

    /// Signals with at least one handler, sorted.
    pub fn signals(&self) -> Vec<Signal> {
        let mut out: Vec<Signal> = self.entries.keys().cloned().collect();
        out.sort_unstable();
        out
    }

    /// Total number of registrations across all signals.
    pub fn len(&self) -> usize {
        self.entries.values().map(|h| h.len()).sum()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(name: &'static str) -> Handler {
        Handler::from_blocking(name, |_| Ok(()))
    }

    #[test]
    fn preserves_insertion_order_and_duplicates() {
        let mut table = DispatchTable::new();
        let h = noop("a");
        table.insert("s".into(), h.clone());
        table.insert("s".into(), noop("b"));
        table.insert("s".into(), h);

        let names: Vec<String> = table
            .snapshot("s")
            .unwrap()
            .iter()
            .map(|h| h.name().to_string())
            .collect();
        assert_eq!(names, ["a", "b", "a"]);
        assert_eq!(table.count("s"), 3);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn snapshot_is_unaffected_by_later_inserts() {
        let mut table = DispatchTable::new();
        table.insert("s".into(), noop("a"));
        let before = table.snapshot("s").unwrap();
        table.insert("s".into(), noop("b"));

        assert_eq!(before.len(), 1);
        assert_eq!(table.count("s"), 2);
    }

    #[test]
    fn unknown_signal_has_no_entry() {
        let mut table = DispatchTable::new();
        assert!(table.is_empty());
        assert!(table.snapshot("missing").is_none());
        assert_eq!(table.count("missing"), 0);

        table.insert("b".into(), noop("x"));
        table.insert("a".into(), noop("y"));
        assert_eq!(table.signals(), vec![Signal::from("a"), Signal::from("b")]);
    }
}
