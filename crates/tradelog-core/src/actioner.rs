//! Applies menu selections to the event store and drives follow-up actions.

use crate::collaborators::{ActionExecutor, Presenter, TradeSink};
use crate::{EventStore, Result, TradelogError, WatchContext};
use serde::Serialize;
use std::sync::Arc;
use tradelog_types::{ActionCode, TradeEvent, TradeKey};
use tracing::{info, warn};

/// What one applied action did.
#[derive(Debug, Clone, Serialize)]
pub struct ActionReport {
    pub action: ActionCode,
    /// Removed events for settle/delete, selected events otherwise.
    pub affected: Vec<TradeEvent>,
    /// Executor calls that failed; the store mutation stands regardless.
    pub failed: usize,
    pub remaining: usize,
}

/// Result of a full render, present, apply round.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PromptOutcome {
    /// Nothing to show.
    Empty,
    /// User dismissed the menu.
    Cancelled,
    Applied(ActionReport),
}

/// Store mutations plus the game-side actions they imply.
pub struct Actioner {
    store: Arc<EventStore>,
    executor: Option<Arc<dyn ActionExecutor>>,
    sink: Option<Arc<dyn TradeSink>>,
}

impl Actioner {
    pub fn new(store: Arc<EventStore>, ctx: &WatchContext) -> Self {
        Self {
            store,
            executor: None,
            sink: ctx.sink.clone(),
        }
    }

    pub fn with_executor(mut self, executor: Arc<dyn ActionExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn store(&self) -> &Arc<EventStore> {
        &self.store
    }

    /// Apply `action` to the selected rows of the current render order.
    pub fn act(&self, indices: &[usize], action: ActionCode) -> Result<ActionReport> {
        let affected = self.store.apply(indices, action)?;
        Ok(self.follow_up(action, affected))
    }

    /// Render the store, ask the presenter, and apply whatever was chosen.
    ///
    /// Picks are resolved through the keys captured at render time, so trades
    /// removed while the menu was open never shift the selection.
    pub fn prompt(&self, presenter: &dyn Presenter) -> Result<PromptOutcome> {
        let (keys, items): (Vec<TradeKey>, Vec<String>) =
            self.store.render_keyed().into_iter().unzip();
        if items.is_empty() {
            return Ok(PromptOutcome::Empty);
        }

        let hint = format!("{} pending trades", items.len());
        let selection = match presenter.present(&items, &hint)? {
            Some(selection) if !selection.indices.is_empty() => selection,
            _ => return Ok(PromptOutcome::Cancelled),
        };

        let picked = selection
            .indices
            .iter()
            .map(|&index| {
                keys.get(index)
                    .cloned()
                    .ok_or(TradelogError::InvalidSelection {
                        index,
                        len: keys.len(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let affected = self.store.apply_keys(&picked, selection.action);
        Ok(PromptOutcome::Applied(
            self.follow_up(selection.action, affected),
        ))
    }

    fn follow_up(&self, action: ActionCode, affected: Vec<TradeEvent>) -> ActionReport {
        if action.removes_from_store() {
            if let Some(sink) = &self.sink {
                for event in &affected {
                    sink.record_removal(event, action);
                }
            }
        }

        let mut failed = 0;
        if action.interacts_with_game() {
            match &self.executor {
                Some(executor) => {
                    for event in &affected {
                        if let Err(e) = executor.execute(event, action) {
                            failed += 1;
                            warn!(
                                target: "tradelog::actions",
                                "{} for {} failed: {}",
                                action,
                                event.player_name,
                                e
                            );
                        }
                    }
                }
                None => warn!(
                    target: "tradelog::actions",
                    "No executor configured, {} not sent to the game",
                    action
                ),
            }
        }

        info!(
            target: "tradelog::actions",
            "Applied {} to {} trades",
            action,
            affected.len()
        );

        ActionReport {
            action,
            affected,
            failed,
            remaining: self.store.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::sync::Mutex;
    use tradelog_types::{Direction, GridPosition, Selection};

    fn trade(player: &str) -> TradeEvent {
        TradeEvent {
            timestamp: NaiveDate::from_ymd_opt(2025, 1, 18)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            rule_name: "incoming-item".to_string(),
            player_name: player.to_string(),
            item_name: "Orb".to_string(),
            amount: Decimal::ONE,
            currency_kind: "chaos".to_string(),
            container_label: String::new(),
            league: String::new(),
            grid_position: GridPosition::default(),
            raw_line: String::new(),
            direction: Direction::BuyFromCounterparty,
        }
    }

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(String, ActionCode)>>,
        fail: bool,
    }

    impl ActionExecutor for Recorder {
        fn execute(&self, event: &TradeEvent, action: ActionCode) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push((event.player_name.clone(), action));
            if self.fail {
                return Err(TradelogError::Collaborator("window gone".to_string()));
            }
            Ok(())
        }
    }

    impl TradeSink for Recorder {
        fn record_upsert(&self, _event: &TradeEvent) {}
        fn record_removal(&self, event: &TradeEvent, action: ActionCode) {
            self.calls
                .lock()
                .unwrap()
                .push((event.player_name.clone(), action));
        }
    }

    struct Scripted(Option<Selection>);

    impl Presenter for Scripted {
        fn present(&self, items: &[String], _hint: &str) -> Result<Option<Selection>> {
            assert!(!items.is_empty());
            Ok(self.0.clone())
        }
    }

    fn seeded(players: &[&str]) -> Arc<EventStore> {
        let store = Arc::new(EventStore::new());
        for p in players {
            store.upsert(trade(p));
        }
        store
    }

    #[test]
    fn test_invite_calls_executor_without_removing() {
        let executor = Arc::new(Recorder::default());
        let actioner = Actioner::new(seeded(&["Bob", "Ann"]), &WatchContext::default())
            .with_executor(executor.clone());

        let report = actioner.act(&[1], ActionCode::Invite).unwrap();
        assert_eq!(report.remaining, 2);
        assert_eq!(
            *executor.calls.lock().unwrap(),
            vec![("Ann".to_string(), ActionCode::Invite)]
        );
    }

    #[test]
    fn test_executor_failure_is_counted_not_raised() {
        let executor = Arc::new(Recorder {
            fail: true,
            ..Recorder::default()
        });
        let actioner =
            Actioner::new(seeded(&["Bob"]), &WatchContext::default()).with_executor(executor);

        let report = actioner.act(&[0], ActionCode::TradeRequest).unwrap();
        assert_eq!(report.failed, 1);
    }

    #[test]
    fn test_settle_notifies_sink_and_skips_executor() {
        let sink = Arc::new(Recorder::default());
        let executor = Arc::new(Recorder::default());
        let ctx = WatchContext::default().with_sink(sink.clone());
        let actioner = Actioner::new(seeded(&["Bob", "Ann"]), &ctx).with_executor(executor.clone());

        let report = actioner.act(&[0], ActionCode::Settle).unwrap();
        assert_eq!(report.remaining, 1);
        assert!(executor.calls.lock().unwrap().is_empty());
        assert_eq!(
            *sink.calls.lock().unwrap(),
            vec![("Bob".to_string(), ActionCode::Settle)]
        );
    }

    #[test]
    fn test_prompt_outcomes() {
        let empty = Actioner::new(Arc::new(EventStore::new()), &WatchContext::default());
        assert!(matches!(empty.prompt(&Scripted(None)).unwrap(), PromptOutcome::Empty));

        let actioner = Actioner::new(seeded(&["Bob", "Ann"]), &WatchContext::default());
        assert!(matches!(
            actioner.prompt(&Scripted(None)).unwrap(),
            PromptOutcome::Cancelled
        ));

        let selection = Selection {
            indices: vec![0, 1],
            action: ActionCode::Delete,
        };
        match actioner.prompt(&Scripted(Some(selection))).unwrap() {
            PromptOutcome::Applied(report) => {
                assert_eq!(report.affected.len(), 2);
                assert_eq!(report.remaining, 0);
            }
            other => panic!("Expected Applied, got {:?}", other),
        }
    }

    /// Settles the first row while the menu is still open.
    struct RacingPresenter {
        store: Arc<EventStore>,
        pick: Selection,
    }

    impl Presenter for RacingPresenter {
        fn present(&self, _items: &[String], _hint: &str) -> Result<Option<Selection>> {
            self.store.apply(&[0], ActionCode::Settle)?;
            Ok(Some(self.pick.clone()))
        }
    }

    #[test]
    fn test_prompt_acts_on_rows_as_shown() {
        let store = seeded(&["Bob", "Ann", "Cid"]);
        let actioner = Actioner::new(Arc::clone(&store), &WatchContext::default());
        let presenter = RacingPresenter {
            store: Arc::clone(&store),
            pick: Selection {
                indices: vec![1],
                action: ActionCode::Delete,
            },
        };

        match actioner.prompt(&presenter).unwrap() {
            PromptOutcome::Applied(report) => {
                let deleted: Vec<_> = report.affected.iter().map(|e| &e.player_name).collect();
                assert_eq!(deleted, vec!["Ann"]);
                assert_eq!(report.remaining, 1);
            }
            other => panic!("Expected Applied, got {:?}", other),
        }
        let left: Vec<_> = store.snapshot().into_iter().map(|e| e.player_name).collect();
        assert_eq!(left, vec!["Cid"]);
    }

    #[test]
    fn test_prompt_rejects_index_outside_menu() {
        let actioner = Actioner::new(seeded(&["Bob"]), &WatchContext::default());
        let selection = Selection {
            indices: vec![0, 3],
            action: ActionCode::Delete,
        };
        let err = actioner.prompt(&Scripted(Some(selection))).unwrap_err();
        assert!(matches!(err, TradelogError::InvalidSelection { index: 3, len: 1 }));
        assert_eq!(actioner.store().len(), 1);
    }
}
