//! In-memory event store with dedup-by-key upserts and bulk removal.

use crate::{Result, TradelogError};
use std::collections::{BTreeSet, HashSet};
use std::sync::{Mutex, MutexGuard};
use tradelog_types::{ActionCode, TradeEvent, TradeKey};
use tracing::debug;

/// Where an upsert landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted(usize),
    /// Replaced an event with the same key; position unchanged.
    Replaced(usize),
}

impl UpsertOutcome {
    pub fn index(&self) -> usize {
        match self {
            UpsertOutcome::Inserted(i) | UpsertOutcome::Replaced(i) => *i,
        }
    }
}

/// Ordered trade events keyed by `(player, item, grid position)`.
///
/// Both the trigger path and the action path serialise on one lock.
#[derive(Debug, Default)]
pub struct EventStore {
    events: Mutex<Vec<TradeEvent>>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, or replace in place when the key already exists.
    pub fn upsert(&self, event: TradeEvent) -> UpsertOutcome {
        let mut events = self.lock();
        match events.iter().position(|e| e.same_key(&event)) {
            Some(idx) => {
                debug!(
                    target: "tradelog::store",
                    "Refreshed trade #{}: {} from {}",
                    idx,
                    event.item_name,
                    event.player_name
                );
                events[idx] = event;
                UpsertOutcome::Replaced(idx)
            }
            None => {
                debug!(
                    target: "tradelog::store",
                    "New trade #{}: {} from {}",
                    events.len(),
                    event.item_name,
                    event.player_name
                );
                events.push(event);
                UpsertOutcome::Inserted(events.len() - 1)
            }
        }
    }

    /// Display strings in stable insertion order; index `i` is event `i`.
    pub fn render(&self) -> Vec<String> {
        self.lock().iter().map(TradeEvent::display_line).collect()
    }

    pub fn snapshot(&self) -> Vec<TradeEvent> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Render plus the key behind each row, taken under one lock.
    ///
    /// Callers that show the rows and act later resolve picks through the
    /// keys, so rows removed in between cannot shift the selection.
    pub fn render_keyed(&self) -> Vec<(TradeKey, String)> {
        self.lock()
            .iter()
            .map(|e| (e.key(), e.display_line()))
            .collect()
    }

    /// Apply an action to the selected rows.
    ///
    /// Removing actions drop the rows and return them; every other action
    /// returns the selected rows untouched. An out-of-range index fails the
    /// whole call without mutating anything.
    pub fn apply(&self, indices: &[usize], action: ActionCode) -> Result<Vec<TradeEvent>> {
        let mut events = self.lock();

        let selected: BTreeSet<usize> = indices.iter().copied().collect();
        if let Some(&index) = selected.iter().find(|&&i| i >= events.len()) {
            return Err(TradelogError::InvalidSelection {
                index,
                len: events.len(),
            });
        }

        if !action.removes_from_store() {
            return Ok(selected.iter().map(|&i| events[i].clone()).collect());
        }

        let mut removed = Vec::with_capacity(selected.len());
        let mut kept = Vec::with_capacity(events.len() - selected.len());
        for (i, event) in events.drain(..).enumerate() {
            if selected.contains(&i) {
                removed.push(event);
            } else {
                kept.push(event);
            }
        }
        *events = kept;

        debug!(
            target: "tradelog::store",
            "{} removed {} trades, {} left",
            action,
            removed.len(),
            events.len()
        );
        Ok(removed)
    }

    /// Apply an action to the events with the given keys.
    ///
    /// Keys no longer present are skipped. Matching events come back in
    /// store order.
    pub fn apply_keys(&self, keys: &[TradeKey], action: ActionCode) -> Vec<TradeEvent> {
        let mut events = self.lock();
        let wanted: HashSet<&TradeKey> = keys.iter().collect();

        if !action.removes_from_store() {
            return events
                .iter()
                .filter(|e| wanted.contains(&e.key()))
                .cloned()
                .collect();
        }

        let (removed, kept): (Vec<_>, Vec<_>) = events
            .drain(..)
            .partition(|e| wanted.contains(&e.key()));
        *events = kept;

        if removed.len() < wanted.len() {
            debug!(
                target: "tradelog::store",
                "{} of {} selected trades were already gone",
                wanted.len() - removed.len(),
                wanted.len()
            );
        }
        debug!(
            target: "tradelog::store",
            "{} removed {} trades, {} left",
            action,
            removed.len(),
            events.len()
        );
        removed
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TradeEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use tradelog_types::{Direction, GridPosition};

    fn trade(player: &str, item: &str, col: u32, amount: i64) -> TradeEvent {
        TradeEvent {
            timestamp: NaiveDate::from_ymd_opt(2025, 1, 18)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            rule_name: "incoming-item".to_string(),
            player_name: player.to_string(),
            item_name: item.to_string(),
            amount: Decimal::from(amount),
            currency_kind: "chaos".to_string(),
            container_label: "Tab1".to_string(),
            league: "Standard".to_string(),
            grid_position: GridPosition::new(col, 1),
            raw_line: String::new(),
            direction: Direction::BuyFromCounterparty,
        }
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let store = EventStore::new();
        assert_eq!(store.upsert(trade("Bob", "Orb", 1, 5)), UpsertOutcome::Inserted(0));
        assert_eq!(store.upsert(trade("Ann", "Wand", 2, 9)), UpsertOutcome::Inserted(1));
        assert_eq!(store.upsert(trade("Bob", "Orb", 1, 7)), UpsertOutcome::Replaced(0));

        let events = store.snapshot();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].player_name, "Bob");
        assert_eq!(events[0].amount, Decimal::from(7));
        assert_eq!(events[1].player_name, "Ann");
    }

    #[test]
    fn test_different_position_is_different_key() {
        let store = EventStore::new();
        store.upsert(trade("Bob", "Orb", 1, 5));
        store.upsert(trade("Bob", "Orb", 2, 5));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_render_follows_insertion_order() {
        let store = EventStore::new();
        store.upsert(trade("Bob", "Orb", 1, 5));
        store.upsert(trade("Ann", "Wand", 2, 9));
        assert_eq!(
            store.render(),
            vec![
                "5 chaos | Orb | Bob".to_string(),
                "9 chaos | Wand | Ann".to_string()
            ]
        );
    }

    #[test]
    fn test_settle_removes_selection() {
        let store = EventStore::new();
        for (i, p) in ["A", "B", "C", "D"].iter().enumerate() {
            store.upsert(trade(p, "Orb", i as u32, 1));
        }

        let removed = store.apply(&[1, 3, 1], ActionCode::Settle).unwrap();
        assert_eq!(removed.len(), 2);
        let names: Vec<_> = store.snapshot().into_iter().map(|e| e.player_name).collect();
        assert_eq!(names, vec!["A", "C"]);
    }

    #[test]
    fn test_interactive_action_keeps_events() {
        let store = EventStore::new();
        store.upsert(trade("Bob", "Orb", 1, 5));
        let selected = store.apply(&[0], ActionCode::Invite).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_out_of_range_selection_does_not_mutate() {
        let store = EventStore::new();
        store.upsert(trade("Bob", "Orb", 1, 5));
        let err = store.apply(&[0, 4], ActionCode::Delete).unwrap_err();
        assert!(matches!(err, TradelogError::InvalidSelection { index: 4, len: 1 }));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_apply_keys_survives_earlier_removal() {
        let store = EventStore::new();
        store.upsert(trade("Bob", "Orb", 1, 5));
        store.upsert(trade("Ann", "Wand", 2, 9));
        store.upsert(trade("Cid", "Ring", 3, 2));

        let rows = store.render_keyed();
        store.apply(&[0], ActionCode::Settle).unwrap();

        let removed = store.apply_keys(&[rows[1].0.clone()], ActionCode::Delete);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].player_name, "Ann");
        assert_eq!(store.render(), vec!["2 chaos | Ring | Cid".to_string()]);
    }

    #[test]
    fn test_apply_keys_skips_missing() {
        let store = EventStore::new();
        store.upsert(trade("Bob", "Orb", 1, 5));
        let gone = trade("Zed", "Orb", 9, 1).key();

        assert!(store.apply_keys(&[gone.clone()], ActionCode::Settle).is_empty());
        assert!(store.apply_keys(&[gone], ActionCode::Invite).is_empty());
        assert_eq!(store.len(), 1);
    }

    proptest! {
        #[test]
        fn prop_removal_keeps_relative_order(
            count in 0usize..20,
            picks in proptest::collection::vec(0usize..20, 0..20),
            delete in any::<bool>(),
        ) {
            let store = EventStore::new();
            for i in 0..count {
                store.upsert(trade(&format!("p{i}"), "Orb", i as u32, 1));
            }
            let selection: BTreeSet<usize> = picks.into_iter().filter(|&i| i < count).collect();
            let indices: Vec<usize> = selection.iter().copied().collect();
            let action = if delete { ActionCode::Delete } else { ActionCode::Settle };

            store.apply(&indices, action).unwrap();

            let expected: Vec<String> = (0..count)
                .filter(|i| !selection.contains(i))
                .map(|i| format!("p{i}"))
                .collect();
            let remaining: Vec<String> = store.snapshot().into_iter().map(|e| e.player_name).collect();
            prop_assert_eq!(remaining.len(), count - selection.len());
            prop_assert_eq!(remaining, expected);
        }
    }
}
