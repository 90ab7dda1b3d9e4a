//! `hello` plugin: startup greeting and a two-step data pipeline.
//!
//! - `startup`: logs a greeting.
//! - `raw_data` (`i64`): waits `delay_ms`, doubles the value, emits `data_ready`.
//! - `data_ready` (`i64`): waits 100 ms, logs the result.

use std::time::Duration;

use tracing::info;

use crate::dispatch::{Dispatcher, Emission, Handler, Payload};
use crate::error::{HandlerError, PluginError};
use crate::plugins::{Plugin, PluginContext};

const DEFAULT_DELAY_MS: u64 = 300;
const RESULT_DELAY: Duration = Duration::from_millis(100);

/// The `hello` plugin.
#[derive(Debug, Default, Clone, Copy)]
pub struct Hello;

impl Plugin for Hello {
    fn name(&self) -> &str {
        "hello"
    }

    fn register(&self, ctx: &PluginContext<'_>) -> Result<(), PluginError> {
        let delay = Duration::from_millis(ctx.setting("delay_ms")?.unwrap_or(DEFAULT_DELAY_MS));
        let dispatcher = ctx.dispatcher().clone();

        ctx.dispatcher()
            .register("startup", Handler::from_async("hello.greet", greet));
        ctx.dispatcher().register(
            "raw_data",
            Handler::from_async("hello.process", move |em| {
                process(dispatcher.clone(), delay, em)
            }),
        );
        ctx.dispatcher()
            .register("data_ready", Handler::from_async("hello.show_result", show_result));
        Ok(())
    }
}

async fn greet(_em: Emission) -> Result<(), HandlerError> {
    info!("system started");
    Ok(())
}

async fn process(dispatcher: Dispatcher, delay: Duration, em: Emission) -> Result<(), HandlerError> {
    let data = *em.payload.require::<i64>()?;
    info!(data, "raw data received");
    tokio::time::sleep(delay).await;

    let processed = data
        .checked_mul(2)
        .ok_or_else(|| HandlerError::fail(format!("{data} overflows when doubled")))?;
    dispatcher.emit("data_ready", Payload::new(processed));
    Ok(())
}

async fn show_result(em: Emission) -> Result<(), HandlerError> {
    let result = *em.payload.require::<i64>()?;
    tokio::time::sleep(RESULT_DELAY).await;
    info!(result, "data processed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Bus, EventKind};
    use crate::loopers::{Admission, LooperManager};
    use std::path::Path;

    fn load(table: &str) -> (Dispatcher, LooperManager) {
        let bus = Bus::default();
        let d = Dispatcher::new(bus.clone(), 0);
        let l = LooperManager::new(bus, Admission::default());
        let settings: toml::Table = table.parse().unwrap();
        Hello
            .register(&PluginContext::new(&d, &l, Path::new("hello.toml"), &settings))
            .unwrap();
        (d, l)
    }

    #[test]
    fn registers_three_handlers() {
        let (d, _l) = load("");
        let names: Vec<String> = d.signals().iter().map(|s| s.to_string()).collect();
        assert_eq!(names, ["data_ready", "raw_data", "startup"]);
    }

    #[tokio::test(start_paused = true)]
    async fn raw_data_is_doubled_after_the_delay() {
        let (d, _l) = load("delay_ms = 50");
        let mut events = d.bus().subscribe();

        assert_eq!(d.emit("raw_data", Payload::new(4_i64)), 1);

        let mut emitted = Vec::new();
        while emitted.len() < 2 {
            let ev = events.recv().await.unwrap();
            if ev.kind == EventKind::SignalEmitted {
                emitted.push((ev.signal.unwrap().to_string(), tokio::time::Instant::now()));
            }
        }
        assert_eq!(emitted[0].0, "raw_data");
        assert_eq!(emitted[1].0, "data_ready");
        assert!(emitted[1].1 - emitted[0].1 >= Duration::from_millis(50));

        loop {
            let ev = events.recv().await.unwrap();
            if ev.kind == EventKind::HandlerCompleted
                && ev.source.as_deref() == Some("hello.show_result")
            {
                break;
            }
        }
    }

    #[tokio::test]
    async fn wrong_payload_fails_the_handler() {
        let (d, _l) = load("");
        let mut events = d.bus().subscribe();
        d.emit("raw_data", Payload::new("four"));

        loop {
            let ev = events.recv().await.unwrap();
            if ev.kind == EventKind::HandlerFailed {
                assert_eq!(ev.source.as_deref(), Some("hello.process"));
                assert_eq!(ev.reason.as_deref(), Some("payload mismatch: expected i64"));
                break;
            }
        }
    }
}
