use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Lifecycle state of one looper.
///
/// ```text
/// Created ──► Running ──► Cancelled | Completed | Failed
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LooperState {
    /// Spawned, not yet polled.
    Created,
    /// Routine is executing.
    Running,
    /// Stopped by `remove`, replacement or shutdown.
    Cancelled,
    /// Routine returned `Ok`.
    Completed,
    /// Routine returned an error or panicked.
    Failed,
}

impl LooperState {
    /// True for `Cancelled`, `Completed` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LooperState::Cancelled | LooperState::Completed | LooperState::Failed
        )
    }
}

/// Cloneable view of one supervised looper.
///
/// Handles compare equal when they refer to the same spawn (same id), even if
/// a later looper reuses the label.
#[derive(Clone)]
pub struct LooperHandle {
    label: Arc<str>,
    id: u64,
    cancel: CancellationToken,
    state: watch::Receiver<LooperState>,
    settled: Arc<AtomicBool>,
}

impl LooperHandle {
    pub(crate) fn new(
        label: Arc<str>,
        id: u64,
        cancel: CancellationToken,
        state: watch::Receiver<LooperState>,
    ) -> Self {
        Self {
            label,
            id,
            cancel,
            state,
            settled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Label the looper was added under.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Process-unique id of this spawn.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current state.
    pub fn state(&self) -> LooperState {
        *self.state.borrow()
    }

    /// True while the looper has not reached a terminal state.
    pub fn is_alive(&self) -> bool {
        !self.state().is_terminal()
    }

    /// True once cancellation was requested (the looper may still be winding down).
    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Waits until the looper reaches a terminal state and returns it.
    pub async fn wait(&self) -> LooperState {
        let mut rx = self.state.clone();
        match rx.wait_for(|s| s.is_terminal()).await {
            Ok(state) => *state,
            // Supervising task dropped without a final state: it was aborted.
            Err(_) => LooperState::Cancelled,
        }
    }

    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Set as soon as the routine has returned, before the terminal state is published.
    pub(crate) fn mark_settled(&self) {
        self.settled.store(true, AtomicOrdering::Release);
    }

    /// True once the routine has returned (or was dropped), even if its
    /// registry entry is not removed yet.
    pub(crate) fn is_settled(&self) -> bool {
        self.settled.load(AtomicOrdering::Acquire)
    }
}

impl PartialEq for LooperHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for LooperHandle {}

impl fmt::Debug for LooperHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LooperHandle")
            .field("label", &self.label)
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}
