//! `heart` plugin: starts a heartbeat looper when its hook signal fires.
//!
//! Settings: `hook` (default `heartHook`), `label` (default `heart_L`),
//! `interval_ms` (default 1000, must be > 0).

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::dispatch::{Dispatcher, Emission, Handler, Payload};
use crate::error::{HandlerError, LooperError, PluginError};
use crate::loopers::LooperManager;
use crate::plugins::{Plugin, PluginContext};

/// Signal emitted on every beat, payload `u64` tick count.
pub const HEARTBEAT_SIGNAL: &str = "heartbeat";

const DEFAULT_HOOK: &str = "heartHook";
const DEFAULT_LABEL: &str = "heart_L";
const DEFAULT_INTERVAL_MS: u64 = 1000;

/// The `heart` plugin.
#[derive(Debug, Default, Clone, Copy)]
pub struct Heart;

impl Plugin for Heart {
    fn name(&self) -> &str {
        "heart"
    }

    fn register(&self, ctx: &PluginContext<'_>) -> Result<(), PluginError> {
        let hook: String = ctx.setting("hook")?.unwrap_or_else(|| DEFAULT_HOOK.into());
        let label: Arc<str> = ctx
            .setting::<String>("label")?
            .map_or_else(|| Arc::from(DEFAULT_LABEL), Arc::from);
        let interval_ms: u64 = ctx.setting("interval_ms")?.unwrap_or(DEFAULT_INTERVAL_MS);
        if interval_ms == 0 {
            return Err(PluginError::InvalidSetting {
                key: "interval_ms".into(),
                reason: "must be greater than zero".into(),
            });
        }
        let interval = Duration::from_millis(interval_ms);

        let dispatcher = ctx.dispatcher().clone();
        let loopers = ctx.loopers().clone();
        ctx.dispatcher().register(
            hook,
            Handler::from_async("heart.hook", move |em| {
                start(dispatcher.clone(), loopers.clone(), label.clone(), interval, em)
            }),
        );
        Ok(())
    }
}

async fn start(
    dispatcher: Dispatcher,
    loopers: LooperManager,
    label: Arc<str>,
    interval: Duration,
    _em: Emission,
) -> Result<(), HandlerError> {
    let handle = loopers.add(&*label, move |ctx| beat(dispatcher, interval, ctx));
    info!(looper = handle.label(), id = handle.id(), "heart started");
    Ok(())
}

async fn beat(dispatcher: Dispatcher, interval: Duration, ctx: CancellationToken) -> Result<(), LooperError> {
    let mut ticks: u64 = 0;
    loop {
        ticks += 1;
        info!(ticks, "heartbeat");
        dispatcher.emit(HEARTBEAT_SIGNAL, Payload::new(ticks));

        tokio::select! {
            _ = ctx.cancelled() => return Err(LooperError::Canceled),
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Bus;
    use crate::loopers::{Admission, LooperState};
    use parking_lot::Mutex;
    use std::path::Path;

    fn load(table: &str) -> Result<(Dispatcher, LooperManager), PluginError> {
        let bus = Bus::default();
        let d = Dispatcher::new(bus.clone(), 0);
        let l = LooperManager::new(bus, Admission::Replace);
        let settings: toml::Table = table.parse().unwrap();
        Heart.register(&PluginContext::new(&d, &l, Path::new("heart.toml"), &settings))?;
        Ok((d, l))
    }

    fn record_ticks(d: &Dispatcher) -> Arc<Mutex<Vec<u64>>> {
        let ticks = Arc::new(Mutex::new(Vec::new()));
        let sink = ticks.clone();
        d.register(
            HEARTBEAT_SIGNAL,
            Handler::from_async("record", move |em: Emission| {
                let sink = sink.clone();
                async move {
                    sink.lock().push(*em.payload.require::<u64>()?);
                    Ok::<(), HandlerError>(())
                }
            }),
        );
        ticks
    }

    #[tokio::test(start_paused = true)]
    async fn hook_starts_a_ticking_looper() {
        let (d, l) = load("interval_ms = 100").unwrap();
        let ticks = record_ticks(&d);

        assert_eq!(d.emit("heartHook", Payload::empty()), 1);
        tokio::time::sleep(Duration::from_millis(350)).await;

        let handle = l.get("heart_L").unwrap();
        assert_eq!(handle.state(), LooperState::Running);

        assert!(l.remove("heart_L"));
        assert_eq!(handle.wait().await, LooperState::Cancelled);
        d.shutdown(Duration::from_secs(1)).await.unwrap();

        let mut seen = ticks.lock().clone();
        seen.sort_unstable();
        assert_eq!(seen, [1, 2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn re_firing_the_hook_replaces_the_looper() {
        let (d, l) = load("hook = \"pulse\"\nlabel = \"beat\"").unwrap();

        d.emit("pulse", Payload::empty());
        tokio::time::sleep(Duration::from_millis(10)).await;
        let first = l.get("beat").unwrap();

        d.emit("pulse", Payload::empty());
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = l.get("beat").unwrap();

        assert_ne!(first, second);
        assert_eq!(first.wait().await, LooperState::Cancelled);
        assert_eq!(l.len(), 1);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = load("interval_ms = 0").err().unwrap();
        assert!(matches!(err, PluginError::InvalidSetting { ref key, .. } if key == "interval_ms"));
    }
}
