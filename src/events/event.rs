//! # Runtime events emitted by the dispatcher, looper manager and plugin loader.
//!
//! These are observability records, not signals: handlers never receive them.
//! The [`EventKind`] enum classifies them across four categories:
//! - **Dispatch events**: emissions and per-handler outcomes
//! - **Looper events**: add/replace/remove and terminal states
//! - **Plugin events**: units loaded at startup
//! - **Runtime events**: shutdown and subscriber health
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use heartbus::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::HandlerFailed)
//!     .with_signal("raw_data")
//!     .with_source("process")
//!     .with_reason("boom");
//!
//! assert_eq!(ev.kind, EventKind::HandlerFailed);
//! assert_eq!(ev.signal.as_deref(), Some("raw_data"));
//! assert_eq!(ev.source.as_deref(), Some("process"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Dispatch events ===
    /// A signal was emitted and its handlers scheduled.
    ///
    /// Sets: `signal`, `count` (handlers scheduled).
    SignalEmitted,

    /// A handler returned `Ok`.
    ///
    /// Sets: `signal`, `source` (handler name).
    HandlerCompleted,

    /// A handler returned an error.
    ///
    /// Sets: `signal`, `source` (handler name), `reason`.
    HandlerFailed,

    /// A handler panicked; the panic was contained in its task.
    ///
    /// Sets: `signal`, `source` (handler name), `reason` (panic message).
    HandlerPanicked,

    /// A handler was cancelled by dispatcher shutdown.
    ///
    /// Sets: `signal`, `source` (handler name).
    HandlerCanceled,

    // === Looper events ===
    /// A looper was spawned under a label.
    ///
    /// Sets: `source` (label), `count` (looper id).
    LooperAdded,

    /// A looper under an existing label was cancelled to make room for a new one.
    ///
    /// Sets: `source` (label), `count` (id of the replaced looper).
    LooperReplaced,

    /// A looper was removed from the registry and asked to stop.
    ///
    /// Sets: `source` (label), `count` (looper id).
    LooperRemoved,

    /// A looper's routine returned `Ok`.
    ///
    /// Sets: `source` (label), `count` (looper id).
    LooperCompleted,

    /// A looper stopped because it was cancelled.
    ///
    /// Sets: `source` (label), `count` (looper id).
    LooperCancelled,

    /// A looper's routine returned an error or panicked.
    ///
    /// Sets: `source` (label), `count` (looper id), `reason`.
    LooperFailed,

    // === Plugin events ===
    /// A plugin unit was loaded and its plugin registered.
    ///
    /// Sets: `source` (plugin name), `reason` (unit path).
    PluginLoaded,

    // === Runtime events ===
    /// Shutdown requested (OS signal or explicit request).
    ShutdownRequested,

    /// All handlers and loopers stopped within the grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some work did not stop in time.
    ///
    /// Sets: `reason` (stuck names).
    GraceExceeded,

    /// Subscriber panicked during event processing.
    ///
    /// Sets: `source` (subscriber name), `reason` (panic message).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `source` (subscriber name), `reason`.
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Signal the event relates to, if any.
    pub signal: Option<Arc<str>>,
    /// Handler name, looper label, plugin or subscriber name.
    pub source: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Numeric detail: handler count for emissions, looper id for looper events.
    pub count: Option<u64>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            signal: None,
            source: None,
            reason: None,
            count: None,
        }
    }

    /// Attaches a signal name.
    #[inline]
    pub fn with_signal(mut self, signal: impl Into<Arc<str>>) -> Self {
        self.signal = Some(signal.into());
        self
    }

    /// Attaches the handler/looper/plugin/subscriber name.
    #[inline]
    pub fn with_source(mut self, source: impl Into<Arc<str>>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a numeric detail.
    #[inline]
    pub fn with_count(mut self, n: u64) -> Self {
        self.count = Some(n);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_source(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_source(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    /// True for events that report a failure of user code.
    #[inline]
    pub fn is_failure(&self) -> bool {
        matches!(
            self.kind,
            EventKind::HandlerFailed
                | EventKind::HandlerPanicked
                | EventKind::LooperFailed
                | EventKind::SubscriberPanicked
        )
    }
}
