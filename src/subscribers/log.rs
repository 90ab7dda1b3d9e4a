//! # LogWriter: renders runtime events through `tracing`
//!
//! Failures are logged at `warn`/`error`, lifecycle at `info`, per-emission
//! chatter at `debug`.
//!
//! ## Example output
//! ```text
//! DEBUG heartbus: [emitted] signal="raw_data" handlers=1
//! WARN  heartbus: [handler-failed] signal="raw_data" handler="process" reason="payload mismatch: expected i64"
//! INFO  heartbus: [looper-added] label="heart_L" id=3
//! INFO  heartbus: [looper-replaced] label="heart_L" id=3
//! INFO  heartbus: [shutdown-requested]
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let signal = e.signal.as_deref().unwrap_or("-");
        let source = e.source.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");
        let count = e.count.unwrap_or_default();

        match e.kind {
            EventKind::SignalEmitted => {
                debug!("[emitted] signal={signal:?} handlers={count}");
            }
            EventKind::HandlerCompleted => {
                debug!("[handler-completed] signal={signal:?} handler={source:?}");
            }
            EventKind::HandlerFailed => {
                warn!("[handler-failed] signal={signal:?} handler={source:?} reason={reason:?}");
            }
            EventKind::HandlerPanicked => {
                error!("[handler-panicked] signal={signal:?} handler={source:?} info={reason:?}");
            }
            EventKind::HandlerCanceled => {
                debug!("[handler-canceled] signal={signal:?} handler={source:?}");
            }
            EventKind::LooperAdded => {
                info!("[looper-added] label={source:?} id={count}");
            }
            EventKind::LooperReplaced => {
                info!("[looper-replaced] label={source:?} id={count}");
            }
            EventKind::LooperRemoved => {
                info!("[looper-removed] label={source:?} id={count}");
            }
            EventKind::LooperCompleted => {
                info!("[looper-completed] label={source:?} id={count}");
            }
            EventKind::LooperCancelled => {
                debug!("[looper-cancelled] label={source:?} id={count}");
            }
            EventKind::LooperFailed => {
                error!("[looper-failed] label={source:?} id={count} reason={reason:?}");
            }
            EventKind::PluginLoaded => {
                info!("[plugin-loaded] plugin={source:?} unit={reason:?}");
            }
            EventKind::ShutdownRequested => {
                info!("[shutdown-requested]");
            }
            EventKind::AllStoppedWithin => {
                info!("[all-stopped-within-grace]");
            }
            EventKind::GraceExceeded => {
                warn!("[grace-exceeded] stuck={reason:?}");
            }
            EventKind::SubscriberOverflow => {
                warn!("[subscriber-overflow] subscriber={source:?} reason={reason:?}");
            }
            EventKind::SubscriberPanicked => {
                error!("[subscriber-panicked] subscriber={source:?} info={reason:?}");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
