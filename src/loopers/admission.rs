//! # Re-add policy for looper labels
//!
//! The looper registry tracks at most one looper per label. When `add` is
//! called for a label that is already taken, the admission policy decides what
//! happens to the looper already running there.
//!
//! ## Variants
//! - `Replace`: **cancel** the running looper, then start and track the new one.
//! - `Detach`: start the new one and overwrite the mapping; the old looper keeps
//!   running, untracked, until it ends on its own or the runtime shuts down.
//! - `DropIfRunning`: keep the running looper and **ignore** the new request.

use serde::Deserialize;

/// Policy applied when a looper is added under a label that is already taken.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Admission {
    /// Cancel the current looper and start the new one.
    ///
    /// Use when the newest request invalidates the old one (restart a heartbeat
    /// with new settings).
    #[default]
    Replace,

    /// Overwrite the mapping without cancelling the current looper.
    ///
    /// The previous looper can no longer be reached through the manager.
    Detach,

    /// Keep the current looper; the new routine is dropped without running.
    ///
    /// Use when handlers may fire repeatedly but one looper per label is enough.
    DropIfRunning,
}
