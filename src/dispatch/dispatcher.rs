//! # Dispatcher: register handlers, emit signals.
//!
//! ```text
//! emit(signal, payload)
//!     │
//!     ├─► table.read().snapshot(signal)          (Arc<[Handler]>, lock released)
//!     │
//!     ├─► Handler::Async    ──► tracker.spawn(select{ token.cancelled, catch_unwind(call) })
//!     ├─► Handler::Blocking ──► tracker.spawn(permit ─► spawn_blocking(call))
//!     │
//!     └─► returns number scheduled (does not wait)
//!
//! each task ──► report(): tracing + HandlerCompleted / HandlerFailed / HandlerPanicked / HandlerCanceled
//! ```
//!
//! ## Rules
//! - Handlers are **scheduled** in registration order; completion order is unspecified.
//! - A registration that lands after `emit` took its snapshot does not see that emission.
//! - Handler errors and panics end in `report()`; they never reach the emitter.
//! - Blocking handlers hold one permit of the blocking limit while they run.
//! - After [`Dispatcher::shutdown`] nothing new is scheduled.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::RwLock;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};

use crate::dispatch::alive::AliveTracker;
use crate::dispatch::{AsyncHandler, BlockingHandler, DispatchTable, Emission, Handler, Payload, Signal};
use crate::error::{HandlerError, RuntimeError, panic_message};
use crate::events::{Bus, Event, EventKind};

/// Signal dispatcher.
///
/// Cheap to clone; clones share the same table and task set. Pass clones to
/// whatever needs to register or emit (plugins, handlers, loopers).
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    table: RwLock<DispatchTable>,
    tracker: TaskTracker,
    token: CancellationToken,
    blocking: Option<Arc<Semaphore>>,
    alive: Arc<AliveTracker>,
    bus: Bus,
}

impl Dispatcher {
    /// Creates a dispatcher publishing runtime events to `bus`.
    ///
    /// `blocking_workers` bounds how many blocking handlers run at once
    /// (`0` = only bounded by the runtime's blocking pool).
    pub fn new(bus: Bus, blocking_workers: usize) -> Self {
        let blocking = match blocking_workers {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n))),
        };
        Self {
            inner: Arc::new(Inner {
                table: RwLock::new(DispatchTable::new()),
                tracker: TaskTracker::new(),
                token: CancellationToken::new(),
                blocking,
                alive: Arc::new(AliveTracker::new()),
                bus,
            }),
        }
    }

    /// Appends `handler` to the list for `signal`.
    ///
    /// No duplicate detection: registering the same handler twice makes it run
    /// twice per emission. Does not need a runtime.
    pub fn register(&self, signal: impl Into<Signal>, handler: Handler) {
        let signal = signal.into();
        debug!(signal = %signal, handler = handler.name(), "handler registered");
        self.inner.table.write().insert(signal, handler);
    }

    /// Schedules every handler registered for `signal` and returns how many were scheduled.
    ///
    /// Returns immediately; handlers run as independent tasks. Emitting a
    /// signal nobody listens to is a no-op returning `0`.
    ///
    /// Must be called from within a Tokio runtime (blocking handlers qualify:
    /// they run on the runtime's blocking pool).
    pub fn emit(&self, signal: impl Into<Signal>, payload: Payload) -> usize {
        let signal = signal.into();
        if self.inner.token.is_cancelled() {
            debug!(signal = %signal, "dispatcher is shut down; emission dropped");
            return 0;
        }
        let Some(handlers) = self.inner.table.read().snapshot(signal.as_str()) else {
            return 0;
        };

        for handler in handlers.iter() {
            let emission = Emission {
                signal: signal.clone(),
                payload: payload.clone(),
            };
            match handler {
                Handler::Async(h) => self.spawn_async(Arc::clone(h), emission),
                Handler::Blocking(h) => self.spawn_blocking(Arc::clone(h), emission),
            }
        }

        self.inner.bus.publish(
            Event::new(EventKind::SignalEmitted)
                .with_signal(signal.as_arc())
                .with_count(handlers.len() as u64),
        );
        handlers.len()
    }

    /// Number of handlers currently registered for `signal`.
    pub fn handler_count(&self, signal: &str) -> usize {
        self.inner.table.read().count(signal)
    }

    /// Signals with at least one handler, sorted.
    pub fn signals(&self) -> Vec<Signal> {
        self.inner.table.read().signals()
    }

    /// Number of handler tasks that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.inner.tracker.len()
    }

    /// True once [`shutdown`](Self::shutdown) or [`cancel_all`](Self::cancel_all) ran.
    pub fn is_closed(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Event bus this dispatcher reports to.
    pub fn bus(&self) -> &Bus {
        &self.inner.bus
    }

    /// Stops scheduling and cancels async handlers at their next suspension point.
    ///
    /// Blocking handlers cannot be interrupted and run to completion.
    pub fn cancel_all(&self) {
        self.inner.tracker.close();
        self.inner.token.cancel();
    }

    /// Waits up to `grace` for in-flight handlers, then cancels the rest.
    ///
    /// Emissions made by handlers during the grace period are still scheduled
    /// and waited for. Returns [`RuntimeError::GraceExceeded`] with the names of
    /// handlers that were still running when the grace period ended.
    pub async fn shutdown(&self, grace: Duration) -> Result<(), RuntimeError> {
        self.inner.tracker.close();
        let drained = tokio::time::timeout(grace, self.inner.tracker.wait())
            .await
            .is_ok();

        let stuck = if drained {
            Vec::new()
        } else {
            self.inner.alive.snapshot()
        };
        self.inner.token.cancel();

        if drained {
            Ok(())
        } else {
            Err(RuntimeError::GraceExceeded { grace, stuck })
        }
    }

    fn spawn_async(&self, handler: Arc<dyn AsyncHandler>, emission: Emission) {
        let token = self.inner.token.clone();
        let bus = self.inner.bus.clone();
        let alive = Arc::clone(&self.inner.alive);

        self.inner.tracker.spawn(async move {
            let name: Arc<str> = Arc::from(handler.name());
            let _guard = alive.enter(Arc::clone(&name));
            let signal = emission.signal.clone();

            let call = AssertUnwindSafe(async move { handler.call(emission).await }).catch_unwind();
            let res = tokio::select! {
                biased;
                _ = token.cancelled() => Err(HandlerError::Canceled),
                r = call => flatten_panic(r),
            };
            report(&bus, &signal, &name, res);
        });
    }

    fn spawn_blocking(&self, handler: Arc<dyn BlockingHandler>, emission: Emission) {
        let token = self.inner.token.clone();
        let bus = self.inner.bus.clone();
        let alive = Arc::clone(&self.inner.alive);
        let limit = self.inner.blocking.clone();

        self.inner.tracker.spawn(async move {
            let name: Arc<str> = Arc::from(handler.name());
            let _guard = alive.enter(Arc::clone(&name));
            let signal = emission.signal.clone();

            let permit = match limit {
                Some(sem) => tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        report(&bus, &signal, &name, Err(HandlerError::Canceled));
                        return;
                    }
                    p = sem.acquire_owned() => p.ok(),
                },
                None => None,
            };

            let join = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                handler.call(emission)
            });
            let res = match join.await {
                Ok(r) => r,
                Err(e) if e.is_panic() => Err(HandlerError::Panicked {
                    info: panic_message(&*e.into_panic()),
                }),
                Err(_) => Err(HandlerError::Canceled),
            };
            report(&bus, &signal, &name, res);
        });
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(Bus::default(), 0)
    }
}

fn flatten_panic(
    r: Result<Result<(), HandlerError>, Box<dyn Any + Send>>,
) -> Result<(), HandlerError> {
    r.unwrap_or_else(|p| {
        Err(HandlerError::Panicked {
            info: panic_message(&*p),
        })
    })
}

/// Logs the outcome of one invocation and publishes the matching event.
fn report(bus: &Bus, signal: &Signal, name: &Arc<str>, res: Result<(), HandlerError>) {
    let (kind, reason) = match res {
        Ok(()) => (EventKind::HandlerCompleted, None),
        Err(HandlerError::Canceled) => (EventKind::HandlerCanceled, None),
        Err(e @ HandlerError::Panicked { .. }) => {
            error!(signal = %signal, handler = %name, error = %e, "handler panicked");
            (EventKind::HandlerPanicked, Some(e.to_string()))
        }
        Err(e) => {
            warn!(signal = %signal, handler = %name, label = e.as_label(), error = %e, "handler failed");
            (EventKind::HandlerFailed, Some(e.to_string()))
        }
    };

    let mut ev = Event::new(kind)
        .with_signal(signal.as_arc())
        .with_source(Arc::clone(name));
    if let Some(reason) = reason {
        ev = ev.with_reason(reason);
    }
    bus.publish(ev);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    fn grace() -> Duration {
        Duration::from_secs(5)
    }

    async fn explode(_em: Emission) -> Result<(), HandlerError> {
        panic!("handler blew up")
    }

    fn explode_blocking(_em: Emission) -> Result<(), HandlerError> {
        panic!("blocking blew up")
    }

    #[tokio::test]
    async fn emit_without_handlers_is_a_noop() {
        let d = Dispatcher::default();
        let mut rx = d.bus().subscribe();

        assert_eq!(d.emit("nobody", Payload::new(1_u8)), 0);
        assert_eq!(d.in_flight(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn every_handler_receives_the_same_payload() {
        let d = Dispatcher::default();
        let (tx, mut rx) = mpsc::unbounded_channel::<Payload>();

        let tx_async = tx.clone();
        let recorder = Handler::from_async("recorder", move |em: Emission| {
            let tx = tx_async.clone();
            async move {
                let _ = tx.send(em.payload);
                Ok(())
            }
        });
        d.register("s", recorder.clone());
        d.register("s", recorder);
        d.register(
            "s",
            Handler::from_blocking("blocking-recorder", move |em| {
                let _ = tx.send(em.payload);
                Ok(())
            }),
        );

        let payload = Payload::new(String::from("args"));
        assert_eq!(d.emit("s", payload.clone()), 3);
        d.shutdown(grace()).await.unwrap();

        let mut seen = 0;
        while let Ok(p) = rx.try_recv() {
            assert!(p.ptr_eq(&payload));
            seen += 1;
        }
        assert_eq!(seen, 3);
    }

    #[tokio::test]
    async fn late_registration_misses_in_flight_emission() {
        let d = Dispatcher::default();
        let early = Arc::new(AtomicUsize::new(0));
        let late = Arc::new(AtomicUsize::new(0));

        let counter = |n: Arc<AtomicUsize>| {
            move |_em: Emission| {
                let n = Arc::clone(&n);
                async move {
                    n.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }
        };
        d.register("s", Handler::from_async("early", counter(early.clone())));
        assert_eq!(d.emit("s", Payload::empty()), 1);
        d.register("s", Handler::from_async("late", counter(late.clone())));

        d.shutdown(grace()).await.unwrap();
        assert_eq!(early.load(Ordering::SeqCst), 1);
        assert_eq!(late.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failing_and_panicking_handlers_do_not_stop_siblings() {
        let d = Dispatcher::default();
        let mut events = d.bus().subscribe();
        let ok = Arc::new(AtomicUsize::new(0));

        d.register(
            "s",
            Handler::from_async("fails", |_em: Emission| async {
                Err::<(), _>(HandlerError::fail("boom"))
            }),
        );
        d.register("s", Handler::from_async("panics", explode));
        d.register("s", Handler::from_blocking("blocking-panics", explode_blocking));
        let ok2 = ok.clone();
        d.register(
            "s",
            Handler::from_async("ok", move |_em: Emission| {
                let ok = ok2.clone();
                async move {
                    ok.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        );

        assert_eq!(d.emit("s", Payload::empty()), 4);
        d.shutdown(grace()).await.unwrap();
        assert_eq!(ok.load(Ordering::SeqCst), 1);

        let mut failed = Vec::new();
        let mut panicked = Vec::new();
        while let Ok(ev) = events.try_recv() {
            match ev.kind {
                EventKind::HandlerFailed => failed.push(ev.source.unwrap().to_string()),
                EventKind::HandlerPanicked => panicked.push(ev.source.unwrap().to_string()),
                _ => {}
            }
        }
        panicked.sort();
        assert_eq!(failed, ["fails"]);
        assert_eq!(panicked, ["blocking-panics", "panics"]);
    }

    #[tokio::test]
    async fn blocking_handlers_run_off_the_scheduler_thread() {
        let d = Dispatcher::default();
        let (tx, mut rx) = mpsc::unbounded_channel();
        d.register(
            "s",
            Handler::from_blocking("where", move |_em| {
                let _ = tx.send(std::thread::current().id());
                Ok(())
            }),
        );

        d.emit("s", Payload::empty());
        let worker = rx.recv().await.unwrap();
        assert_ne!(worker, std::thread::current().id());
    }

    #[tokio::test]
    async fn blocking_limit_bounds_concurrency() {
        let d = Dispatcher::new(Bus::default(), 1);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let (r, p) = (running.clone(), peak.clone());
        d.register(
            "s",
            Handler::from_blocking("slow", move |_em| {
                let now = r.fetch_add(1, Ordering::SeqCst) + 1;
                p.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(30));
                r.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        for _ in 0..3 {
            d.emit("s", Payload::empty());
        }
        d.shutdown(grace()).await.unwrap();
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn handlers_can_cascade() {
        let d = Dispatcher::default();
        let (tx, mut rx) = mpsc::unbounded_channel::<i64>();

        let bus = d.clone();
        d.register(
            "raw_data",
            Handler::from_async("double", move |em: Emission| {
                let bus = bus.clone();
                async move {
                    let value = *em.payload.require::<i64>()?;
                    bus.emit("data_ready", Payload::new(value * 2));
                    Ok::<(), HandlerError>(())
                }
            }),
        );
        d.register(
            "data_ready",
            Handler::from_async("sink", move |em: Emission| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(*em.payload.require::<i64>()?);
                    Ok::<(), HandlerError>(())
                }
            }),
        );

        d.emit("raw_data", Payload::new(4_i64));
        assert_eq!(rx.recv().await, Some(8));
    }

    #[tokio::test]
    async fn payload_mismatch_is_reported_as_failure() {
        let d = Dispatcher::default();
        let mut events = d.bus().subscribe();
        d.register(
            "s",
            Handler::from_async("typed", |em: Emission| async move {
                em.payload.require::<i64>().map(|_| ())
            }),
        );

        d.emit("s", Payload::new("not a number"));
        d.shutdown(grace()).await.unwrap();

        let failure = std::iter::from_fn(|| events.try_recv().ok())
            .find(|ev| ev.kind == EventKind::HandlerFailed)
            .unwrap();
        assert_eq!(failure.reason.as_deref(), Some("payload mismatch: expected i64"));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_reports_stuck_handlers_and_cancels_them() {
        let d = Dispatcher::default();
        let mut events = d.bus().subscribe();
        d.register(
            "s",
            Handler::from_async("hang", |_em: Emission| std::future::pending()),
        );
        d.emit("s", Payload::empty());
        tokio::task::yield_now().await;

        let err = d.shutdown(Duration::from_millis(50)).await.unwrap_err();
        match err {
            RuntimeError::GraceExceeded { stuck, .. } => assert_eq!(stuck, ["hang"]),
            other => panic!("unexpected error: {other}"),
        }
        assert!(d.is_closed());

        let canceled = loop {
            let ev = events.recv().await.unwrap();
            if ev.kind == EventKind::HandlerCanceled {
                break ev;
            }
        };
        assert_eq!(canceled.source.as_deref(), Some("hang"));
        assert_eq!(d.emit("s", Payload::empty()), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn emit_sees_a_consistent_snapshot_while_handlers_register() {
        const N: usize = 200;
        let d = Dispatcher::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let registrar = {
            let d = d.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                for i in 0..N {
                    let calls = calls.clone();
                    d.register(
                        "tick",
                        Handler::from_async(format!("h{i}"), move |_em: Emission| {
                            let calls = calls.clone();
                            async move {
                                calls.fetch_add(1, Ordering::SeqCst);
                                Ok(())
                            }
                        }),
                    );
                    tokio::task::yield_now().await;
                }
            })
        };
        let emitter = {
            let d = d.clone();
            tokio::spawn(async move {
                let mut counts = Vec::new();
                loop {
                    let n = d.emit("tick", Payload::empty());
                    counts.push(n);
                    if n == N {
                        return counts;
                    }
                    tokio::task::yield_now().await;
                }
            })
        };

        registrar.await.unwrap();
        let counts = emitter.await.unwrap();
        assert!(counts.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(counts.last(), Some(&N));

        d.shutdown(grace()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), counts.iter().sum::<usize>());
    }
}
