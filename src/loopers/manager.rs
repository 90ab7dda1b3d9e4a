//! # Looper manager: label → supervised background task.
//!
//! ```text
//! add(label, factory)
//!   ├─► factory(child_token) ─► routine           (outside the lock)
//!   ├─► lock
//!   │     ├─► label taken? ─► Admission: Replace (cancel old) | Detach | DropIfRunning (return old)
//!   │     ├─► tracker.spawn(supervise(routine))
//!   │     └─► insert(label, handle)
//!   └─► unlock ─► LooperAdded
//!
//! supervise():
//!   Running ─► select { token.cancelled ─► Cancelled,
//!                       routine ─► Ok: Completed | Err(Canceled): Cancelled | Err/panic: Failed }
//!          ─► finish(): remove entry if it still holds this id ─► final state ─► event
//! ```
//!
//! ## Rules
//! - One `parking_lot::Mutex` guards the registry; it is never held across an
//!   `.await` and user code (the factory) never runs under it.
//! - Cancellation is delivered through the looper's token **and** by dropping
//!   the routine at its next suspension point. A routine that never yields
//!   cannot be cancelled.
//! - Finished loopers remove their own entry; a predecessor never removes the
//!   looper that replaced it under the same label.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::error::{LooperError, RuntimeError, panic_message};
use crate::events::{Bus, Event, EventKind};
use crate::loopers::{Admission, LooperHandle, LooperState};

/// Registry of supervised loopers keyed by label.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct LooperManager {
    inner: Arc<Inner>,
}

struct Inner {
    loopers: Mutex<HashMap<String, LooperHandle>>,
    detached: Mutex<Vec<LooperHandle>>,
    admission: Admission,
    token: CancellationToken,
    tracker: TaskTracker,
    next_id: AtomicU64,
    bus: Bus,
}

impl LooperManager {
    /// Creates an empty manager with the given re-add policy.
    pub fn new(bus: Bus, admission: Admission) -> Self {
        Self {
            inner: Arc::new(Inner {
                loopers: Mutex::new(HashMap::new()),
                detached: Mutex::new(Vec::new()),
                admission,
                token: CancellationToken::new(),
                tracker: TaskTracker::new(),
                next_id: AtomicU64::new(1),
                bus,
            }),
        }
    }

    /// Policy applied when a label is re-added.
    pub fn admission(&self) -> Admission {
        self.inner.admission
    }

    /// Spawns the routine produced by `factory` and tracks it under `label`.
    ///
    /// `factory` receives the looper's cancellation token. If `label` is
    /// already taken the [`Admission`] policy decides what happens; with
    /// `DropIfRunning` the existing handle is returned and the new routine is
    /// dropped without being polled. A looper whose routine has already
    /// returned no longer holds its label, even before its entry is reaped.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn add<F, Fut>(&self, label: impl Into<String>, factory: F) -> LooperHandle
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<(), LooperError>> + Send + 'static,
    {
        let label = label.into();
        if self.inner.admission == Admission::DropIfRunning {
            if let Some(existing) = self.get(&label).filter(|h| !h.is_settled()) {
                debug!(looper = %label, id = existing.id(), "label busy; new looper dropped");
                return existing;
            }
        }

        let id = self.inner.next_id.fetch_add(1, AtomicOrdering::Relaxed);
        let cancel = self.inner.token.child_token();
        let (state_tx, state_rx) = watch::channel(LooperState::Created);
        let handle = LooperHandle::new(Arc::from(label.as_str()), id, cancel.clone(), state_rx);
        let routine = factory(cancel.clone());

        let mut replaced = None;
        {
            let mut loopers = self.inner.loopers.lock();
            if let Some(existing) = loopers.get(&label) {
                match self.inner.admission {
                    Admission::DropIfRunning if !existing.is_settled() => return existing.clone(),
                    Admission::DropIfRunning => {}
                    Admission::Replace => {
                        existing.cancel();
                        replaced = Some(existing.id());
                    }
                    Admission::Detach => {
                        warn!(looper = %label, id = existing.id(), "looper detached by re-add; it keeps running untracked");
                        let mut detached = self.inner.detached.lock();
                        detached.retain(|h| h.is_alive());
                        detached.push(existing.clone());
                    }
                }
            }

            self.inner.tracker.spawn(supervise(
                Arc::downgrade(&self.inner),
                handle.clone(),
                state_tx,
                cancel,
                routine,
            ));
            loopers.insert(label.clone(), handle.clone());
        }

        if let Some(old) = replaced {
            info!(looper = %label, old_id = old, new_id = id, "looper replaced");
            self.inner
                .bus
                .publish(Event::new(EventKind::LooperReplaced).with_source(label.as_str()).with_count(old));
        }
        self.inner
            .bus
            .publish(Event::new(EventKind::LooperAdded).with_source(label.as_str()).with_count(id));
        handle
    }

    /// Removes `label` and requests cancellation of its looper.
    ///
    /// Returns `false` if the label was not present. Does not wait for the
    /// looper to stop; use [`LooperHandle::wait`] for that.
    pub fn remove(&self, label: &str) -> bool {
        let removed = {
            let mut loopers = self.inner.loopers.lock();
            loopers.remove(label).inspect(|handle| handle.cancel())
        };
        match removed {
            Some(handle) => {
                self.inner.bus.publish(
                    Event::new(EventKind::LooperRemoved)
                        .with_source(label)
                        .with_count(handle.id()),
                );
                true
            }
            None => false,
        }
    }

    /// Returns the handle tracked under `label`.
    pub fn get(&self, label: &str) -> Option<LooperHandle> {
        self.inner.loopers.lock().get(label).cloned()
    }

    /// Returns a copy of the whole registry.
    pub fn list(&self) -> HashMap<String, LooperHandle> {
        self.inner.loopers.lock().clone()
    }

    /// Sorted labels currently tracked.
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.inner.loopers.lock().keys().cloned().collect();
        labels.sort_unstable();
        labels
    }

    /// Number of tracked loopers.
    pub fn len(&self) -> usize {
        self.inner.loopers.lock().len()
    }

    /// True if no looper is tracked.
    pub fn is_empty(&self) -> bool {
        self.inner.loopers.lock().is_empty()
    }

    /// Cancels every looper, detached ones included, and clears the registry.
    ///
    /// Loopers added afterwards start already cancelled.
    pub fn cancel_all(&self) -> Vec<LooperHandle> {
        let drained: Vec<LooperHandle> = {
            let mut loopers = self.inner.loopers.lock();
            loopers.drain().map(|(_, h)| h).collect()
        };
        for handle in &drained {
            handle.cancel();
        }
        self.inner.token.cancel();
        drained
    }

    /// Cancels every looper and waits up to `grace` for all of them to stop.
    ///
    /// On timeout the error lists the labels of tracked and detached loopers
    /// that were still alive.
    pub async fn shutdown(&self, grace: Duration) -> Result<(), RuntimeError> {
        let mut drained = self.cancel_all();
        drained.extend(self.inner.detached.lock().drain(..));
        self.inner.tracker.close();

        if tokio::time::timeout(grace, self.inner.tracker.wait())
            .await
            .is_ok()
        {
            return Ok(());
        }

        let mut stuck: Vec<String> = drained
            .iter()
            .filter(|h| h.is_alive())
            .map(|h| h.label().to_string())
            .collect();
        stuck.sort_unstable();
        stuck.dedup();
        Err(RuntimeError::GraceExceeded { grace, stuck })
    }
}

impl Inner {
    /// Drops the registry entry of a finished looper and reports how it ended.
    fn finish(&self, handle: &LooperHandle, state: LooperState, reason: Option<String>) {
        let label = handle.label();
        {
            let mut loopers = self.loopers.lock();
            if loopers.get(label).is_some_and(|h| h.id() == handle.id()) {
                loopers.remove(label);
            }
        }

        let kind = match state {
            LooperState::Completed => {
                info!(looper = label, id = handle.id(), "looper completed");
                EventKind::LooperCompleted
            }
            LooperState::Failed => {
                error!(looper = label, id = handle.id(), reason = reason.as_deref().unwrap_or("-"), "looper failed");
                EventKind::LooperFailed
            }
            _ => {
                debug!(looper = label, id = handle.id(), "looper cancelled");
                EventKind::LooperCancelled
            }
        };

        let mut ev = Event::new(kind).with_source(label).with_count(handle.id());
        if let Some(reason) = reason {
            ev = ev.with_reason(reason);
        }
        self.bus.publish(ev);
    }
}

async fn supervise<Fut>(
    inner: Weak<Inner>,
    handle: LooperHandle,
    state: watch::Sender<LooperState>,
    cancel: CancellationToken,
    routine: Fut,
) where
    Fut: Future<Output = Result<(), LooperError>> + Send + 'static,
{
    state.send_replace(LooperState::Running);

    let (outcome, reason) = tokio::select! {
        biased;
        _ = cancel.cancelled() => (LooperState::Cancelled, None),
        r = AssertUnwindSafe(routine).catch_unwind() => match r {
            Ok(Ok(())) => (LooperState::Completed, None),
            Ok(Err(LooperError::Canceled)) => (LooperState::Cancelled, None),
            Ok(Err(e)) => (LooperState::Failed, Some(e.to_string())),
            Err(p) => (LooperState::Failed, Some(format!("panicked: {}", panic_message(&*p)))),
        },
    };

    handle.mark_settled();
    if let Some(inner) = inner.upgrade() {
        inner.finish(&handle, outcome, reason);
    }
    state.send_replace(outcome);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use tokio::sync::oneshot;

    fn manager(admission: Admission) -> LooperManager {
        LooperManager::new(Bus::default(), admission)
    }

    /// Routine that ticks until cancelled.
    async fn ticker(ctx: CancellationToken) -> Result<(), LooperError> {
        loop {
            if ctx.is_cancelled() {
                return Err(LooperError::Canceled);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    async fn explode(_ctx: CancellationToken) -> Result<(), LooperError> {
        panic!("looper blew up")
    }

    #[tokio::test(start_paused = true)]
    async fn add_get_remove() {
        let m = manager(Admission::Replace);
        let h = m.add("heart_L", ticker);

        let got = m.get("heart_L").unwrap();
        assert_eq!(got, h);
        assert!(got.is_alive());
        assert_eq!(m.labels(), ["heart_L"]);

        assert!(m.remove("heart_L"));
        assert!(m.get("heart_L").is_none());
        assert!(!m.remove("heart_L"));
        assert_eq!(h.wait().await, LooperState::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn list_returns_a_copy() {
        let m = manager(Admission::Replace);
        let a = m.add("a", ticker);
        m.add("b", ticker);

        let mut copy = m.list();
        copy.remove("a");
        copy.insert("c".into(), a.clone());

        assert_eq!(m.get("a"), Some(a));
        assert!(m.get("c").is_none());
        assert_eq!(m.len(), 2);
        assert_eq!(m.list().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn replace_cancels_previous_looper() {
        let m = manager(Admission::Replace);
        let first = m.add("x", ticker);
        let second = m.add("x", ticker);

        assert_eq!(m.get("x"), Some(second.clone()));
        assert_ne!(first, second);
        assert!(first.is_cancel_requested());
        assert_eq!(first.wait().await, LooperState::Cancelled);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(second.is_alive());
        assert_eq!(m.get("x"), Some(second));
    }

    #[tokio::test(start_paused = true)]
    async fn detach_leaves_previous_looper_running() {
        let m = manager(Admission::Detach);
        let first = m.add("x", ticker);
        let second = m.add("x", ticker);

        assert_eq!(m.get("x"), Some(second));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!first.is_cancel_requested());
        assert_eq!(first.state(), LooperState::Running);

        m.shutdown(Duration::from_secs(1)).await.unwrap();
        assert_eq!(first.state(), LooperState::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_if_running_keeps_existing_looper() {
        let m = manager(Admission::DropIfRunning);
        let first = m.add("x", ticker);

        let polled = Arc::new(AtomicBool::new(false));
        let flag = polled.clone();
        let again = m.add("x", move |_ctx| async move {
            flag.store(true, AtomicOrdering::SeqCst);
            Ok(())
        });

        assert_eq!(again, first);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!polled.load(AtomicOrdering::SeqCst));
        assert!(first.is_alive());
    }

    #[tokio::test]
    async fn drop_if_running_ignores_a_settled_entry() {
        let m = manager(Admission::DropIfRunning);
        let first = m.add("x", |_ctx| std::future::pending::<Result<(), LooperError>>());
        // Routine returned, entry not reaped yet.
        first.mark_settled();

        let second = m.add("x", ticker);
        assert_ne!(first, second);
        assert_eq!(m.get("x"), Some(second));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shutdown_names_detached_loopers_that_outlive_grace() {
        let m = manager(Admission::Detach);
        let (started_tx, started_rx) = oneshot::channel::<()>();
        let stubborn = m.add("x", move |_ctx| async move {
            let _ = started_tx.send(());
            // Never yields, so cancellation cannot drop it.
            std::thread::sleep(Duration::from_millis(600));
            Ok::<(), LooperError>(())
        });
        started_rx.await.unwrap();
        m.add("x", ticker);

        match m.shutdown(Duration::from_millis(100)).await {
            Err(RuntimeError::GraceExceeded { stuck, .. }) => assert_eq!(stuck, ["x"]),
            other => panic!("expected GraceExceeded, got {other:?}"),
        }
        assert_eq!(stubborn.wait().await, LooperState::Completed);
    }

    #[tokio::test]
    async fn completed_looper_removes_itself() {
        let m = manager(Admission::Replace);
        let mut events = m.inner.bus.subscribe();
        let h = m.add("once", |_ctx| async { Ok(()) });

        assert_eq!(h.wait().await, LooperState::Completed);
        assert!(m.get("once").is_none());

        let kinds: Vec<EventKind> = std::iter::from_fn(|| events.try_recv().ok())
            .map(|ev| ev.kind)
            .collect();
        assert_eq!(kinds, [EventKind::LooperAdded, EventKind::LooperCompleted]);
    }

    #[tokio::test]
    async fn failed_and_panicked_loopers_remove_themselves() {
        let m = manager(Admission::Replace);
        let mut events = m.inner.bus.subscribe();
        let failed = m.add("fails", |_ctx| async { Err(LooperError::fail("no sensor")) });
        let panicked = m.add("panics", explode);

        assert_eq!(failed.wait().await, LooperState::Failed);
        assert_eq!(panicked.wait().await, LooperState::Failed);
        assert!(m.is_empty());

        let reasons: Vec<String> = std::iter::from_fn(|| events.try_recv().ok())
            .filter(|ev| ev.kind == EventKind::LooperFailed)
            .filter_map(|ev| ev.reason.map(|r| r.to_string()))
            .collect();
        assert_eq!(
            reasons,
            ["looper failed: no sensor", "panicked: looper blew up"]
        );
    }

    #[tokio::test]
    async fn predecessor_never_removes_its_replacement() {
        let m = manager(Admission::Detach);
        let (done_tx, done_rx) = oneshot::channel::<()>();
        let first = m.add("x", move |_ctx| async move {
            let _ = done_rx.await;
            Ok(())
        });
        let second = m.add("x", ticker);

        done_tx.send(()).unwrap();
        assert_eq!(first.wait().await, LooperState::Completed);
        assert_eq!(m.get("x"), Some(second));
    }

    #[tokio::test]
    async fn factory_may_use_the_manager() {
        let m = manager(Admission::Replace);
        let inner = m.clone();
        let h = m.add("self-aware", move |_ctx| {
            let seen = inner.get("self-aware").is_some();
            async move {
                if seen {
                    Err(LooperError::fail("registered too early"))
                } else {
                    Ok(())
                }
            }
        });
        assert_eq!(h.wait().await, LooperState::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_everything() {
        let m = manager(Admission::Replace);
        let a = m.add("a", ticker);
        let b = m.add("b", |_ctx| std::future::pending());

        m.shutdown(Duration::from_secs(1)).await.unwrap();
        assert!(m.is_empty());
        assert_eq!(a.state(), LooperState::Cancelled);
        assert_eq!(b.state(), LooperState::Cancelled);

        let late = m.add("late", ticker);
        assert_eq!(late.wait().await, LooperState::Cancelled);
    }
}
