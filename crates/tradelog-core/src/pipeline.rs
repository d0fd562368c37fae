//! Tail → gate → trigger → store wiring and the background polling loops.

use crate::collaborators::WindowProbe;
use crate::window::WindowTracker;
use crate::{
    EventStore, GateDecision, LifecycleGate, TailReader, TriggerEngine, UpsertOutcome,
    WatchContext,
};
use chrono::{NaiveDateTime, SubsecRound};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tradelog_types::NotifyLevel;
use tracing::{debug, info, warn};

/// Local wall-clock time in the same naive, whole-second form the client log uses.
///
/// Log lines carry no sub-second part, so a floor taken mid-second must not
/// reject lines stamped in that same second.
pub fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local().trunc_subsecs(0)
}

/// One gated, matched and stored line.
#[derive(Debug, Clone, PartialEq)]
pub struct LineOutcome {
    pub decision: GateDecision,
    pub upserts: Vec<UpsertOutcome>,
}

/// Pushes raw lines through the gate and trigger engine into the store.
pub struct TradePipeline {
    ctx: WatchContext,
    gate: Arc<LifecycleGate>,
    engine: Arc<TriggerEngine>,
    store: Arc<EventStore>,
}

impl TradePipeline {
    /// Build a pipeline whose gate pre-filters on the engine's indicators.
    pub fn new(ctx: WatchContext, engine: TriggerEngine, session_anchor: NaiveDateTime) -> Self {
        let gate = LifecycleGate::new(&ctx, session_anchor, engine.indicators());
        Self {
            ctx,
            gate: Arc::new(gate),
            engine: Arc::new(engine),
            store: Arc::new(EventStore::new()),
        }
    }

    pub fn context(&self) -> &WatchContext {
        &self.ctx
    }

    pub fn gate(&self) -> &Arc<LifecycleGate> {
        &self.gate
    }

    pub fn engine(&self) -> &Arc<TriggerEngine> {
        &self.engine
    }

    pub fn store(&self) -> &Arc<EventStore> {
        &self.store
    }

    /// Gate one line and store whatever the rules extract from it.
    pub fn process_line(&self, line: &str) -> LineOutcome {
        let decision = self.gate.evaluate(line);
        let Some(line_time) = decision.line_time() else {
            return LineOutcome {
                decision,
                upserts: Vec::new(),
            };
        };

        let upserts = self
            .engine
            .match_line(line, line_time)
            .into_iter()
            .map(|event| {
                if let Some(sink) = &self.ctx.sink {
                    sink.record_upsert(&event);
                }
                let message = event.display_line();
                let outcome = self.store.upsert(event);
                if let UpsertOutcome::Inserted(_) = outcome {
                    self.ctx.notifier.notify(&message, NotifyLevel::Normal);
                }
                outcome
            })
            .collect();

        LineOutcome { decision, upserts }
    }

    pub fn process_lines(&self, lines: &[String]) -> usize {
        lines
            .iter()
            .map(|line| self.process_line(line).upserts.len())
            .sum()
    }

    /// Start the tail loop and the window loop sharing one stop signal.
    pub fn start(self: &Arc<Self>, reader: TailReader, probe: Arc<dyn WindowProbe>) -> WatchHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let settings = &self.ctx.settings;

        let window = spawn_window_loop(
            Arc::clone(&self.gate),
            probe,
            settings.window_interval,
            stop_rx.clone(),
        );
        let tail = spawn_tail_loop(Arc::clone(self), reader, settings.tail_interval, stop_rx);

        WatchHandle {
            stop_tx,
            tasks: vec![window, tail],
        }
    }
}

/// Handle to the running background loops.
pub struct WatchHandle {
    stop_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl WatchHandle {
    /// Signal every loop and wait for them to exit.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(target: "tradelog::tail", "Watch task ended abnormally: {}", e);
            }
        }
        debug!(target: "tradelog::tail", "Watch loops stopped");
    }
}

fn new_ticker(period: Duration) -> tokio::time::Interval {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Poll the log on a fixed interval and feed new lines to the pipeline.
pub fn spawn_tail_loop(
    pipeline: Arc<TradePipeline>,
    mut reader: TailReader,
    period: Duration,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            target: "tradelog::tail",
            "Tailing {} every {:?}",
            reader.path().display(),
            period
        );
        let mut ticker = new_ticker(period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let lines = reader.poll();
                    if !lines.is_empty() {
                        let matched = pipeline.process_lines(&lines);
                        debug!(
                            target: "tradelog::tail",
                            "{} new lines, {} trade matches",
                            lines.len(),
                            matched
                        );
                    }
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

/// Poll the compositor on a fixed interval and push transitions into the gate.
pub fn spawn_window_loop(
    gate: Arc<LifecycleGate>,
    probe: Arc<dyn WindowProbe>,
    period: Duration,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tracker = WindowTracker::new();
        let mut ticker = new_ticker(period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let probe = Arc::clone(&probe);
                    let found = match tokio::task::spawn_blocking(move || probe.find()).await {
                        Ok(Ok(handle)) => handle.is_some(),
                        Ok(Err(e)) => {
                            warn!(target: "tradelog::window", "Window lookup failed: {}", e);
                            continue;
                        }
                        Err(e) => {
                            warn!(target: "tradelog::window", "Window lookup task failed: {}", e);
                            continue;
                        }
                    };
                    let now = local_now();
                    let status = tracker.observe(found, now);
                    gate.apply_window_status(status, now);
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::Notifier;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collect(Mutex<Vec<String>>);

    impl Notifier for Collect {
        fn notify(&self, message: &str, _level: NotifyLevel) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 18)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    const WHISPER: &str = r#"2025/01/18 10:00:05 @From Bob: Hi, I would like to buy your Chaos Orb listed for 5 exalted in Stash1 (stash tab "Tab1"; position: left 3, top 2)"#;

    #[test]
    fn test_notifies_only_on_insert() {
        let notifier = Arc::new(Collect::default());
        let ctx = WatchContext::new(Default::default(), notifier.clone());
        let engine = TriggerEngine::with_builtin_rules([]).unwrap();
        let pipeline = TradePipeline::new(ctx, engine, at(9, 59, 0));
        pipeline.gate().window_became_active(at(10, 0, 0));

        let first = pipeline.process_line(WHISPER);
        assert_eq!(first.upserts, vec![UpsertOutcome::Inserted(0)]);
        let second = pipeline.process_line(WHISPER);
        assert_eq!(second.upserts, vec![UpsertOutcome::Replaced(0)]);

        assert_eq!(
            *notifier.0.lock().unwrap(),
            vec!["5 exalted | Chaos Orb | Bob".to_string()]
        );
    }

    #[test]
    fn test_local_now_has_whole_seconds() {
        use chrono::Timelike;
        assert_eq!(local_now().nanosecond(), 0);
    }

    #[test]
    fn test_whisper_in_the_second_the_window_appeared_passes() {
        let engine = TriggerEngine::with_builtin_rules([]).unwrap();
        let pipeline = TradePipeline::new(WatchContext::default(), engine, at(10, 0, 0));
        pipeline.gate().window_became_active(at(10, 0, 5));

        let outcome = pipeline.process_line(WHISPER);
        assert_eq!(outcome.upserts, vec![UpsertOutcome::Inserted(0)]);
    }

    #[test]
    fn test_rejected_line_stores_nothing() {
        let engine = TriggerEngine::with_builtin_rules([]).unwrap();
        let pipeline = TradePipeline::new(WatchContext::default(), engine, at(9, 59, 0));

        let outcome = pipeline.process_line(WHISPER);
        assert!(matches!(outcome.decision, GateDecision::Reject(_)));
        assert!(pipeline.store().is_empty());
    }
}
