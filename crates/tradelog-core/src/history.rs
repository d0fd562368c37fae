//! SQLite trade history fed by store mutations.

use crate::Result;
use crate::collaborators::TradeSink;
use chrono::NaiveDateTime;
use rusqlite::{Connection, params};
use serde::Serialize;
use std::path::Path;
use std::sync::Mutex;
use tradelog_types::{ActionCode, TradeEvent};
use tracing::warn;

/// One row of the history table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRow {
    pub id: i64,
    pub player_name: String,
    pub item_name: String,
    pub amount: String,
    pub currency_kind: String,
    pub direction: String,
    pub first_seen: String,
    pub last_seen: String,
    pub whisper_count: i64,
    /// `None` while the trade is still open.
    pub resolution: Option<String>,
}

/// Durable record of every trade the watcher saw and how it ended.
pub struct TradeHistory {
    conn: Mutex<Connection>,
}

impl TradeHistory {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let history = Self {
            conn: Mutex::new(conn),
        };
        history.init_schema()?;
        Ok(history)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.lock();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                player_name TEXT NOT NULL,
                item_name TEXT NOT NULL,
                grid_col INTEGER NOT NULL,
                grid_row INTEGER NOT NULL,
                amount TEXT NOT NULL,
                currency_kind TEXT NOT NULL,
                container_label TEXT NOT NULL,
                league TEXT NOT NULL,
                direction TEXT NOT NULL,
                rule_name TEXT NOT NULL,
                raw_line TEXT NOT NULL,
                first_seen TEXT NOT NULL,
                last_seen TEXT NOT NULL,
                whisper_count INTEGER NOT NULL DEFAULT 1,
                resolution TEXT,
                resolved_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_trades_key
                ON trades(player_name, item_name, grid_col, grid_row);
            CREATE INDEX IF NOT EXISTS idx_trades_last_seen ON trades(last_seen);
            "#,
        )?;
        Ok(())
    }

    /// Refresh the open row for this key, or start a new one.
    pub fn upsert(&self, event: &TradeEvent) -> Result<()> {
        let conn = self.lock();
        let seen = event.timestamp.to_string();
        let direction = serde_json::to_value(event.direction)?
            .as_str()
            .unwrap_or_default()
            .to_string();

        let updated = conn.execute(
            r#"
            UPDATE trades
            SET amount = ?5, currency_kind = ?6, raw_line = ?7, last_seen = ?8,
                whisper_count = whisper_count + 1
            WHERE player_name = ?1 AND item_name = ?2 AND grid_col = ?3 AND grid_row = ?4
              AND resolution IS NULL
            "#,
            params![
                event.player_name,
                event.item_name,
                event.grid_position.col,
                event.grid_position.row,
                event.amount.to_string(),
                event.currency_kind,
                event.raw_line,
                seen,
            ],
        )?;

        if updated == 0 {
            conn.execute(
                r#"
                INSERT INTO trades (
                    player_name, item_name, grid_col, grid_row, amount, currency_kind,
                    container_label, league, direction, rule_name, raw_line,
                    first_seen, last_seen
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
                "#,
                params![
                    event.player_name,
                    event.item_name,
                    event.grid_position.col,
                    event.grid_position.row,
                    event.amount.to_string(),
                    event.currency_kind,
                    event.container_label,
                    event.league,
                    direction,
                    event.rule_name,
                    event.raw_line,
                    seen,
                ],
            )?;
        }
        Ok(())
    }

    /// Close the open row for this key.
    pub fn resolve(&self, event: &TradeEvent, action: ActionCode, at: NaiveDateTime) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            r#"
            UPDATE trades SET resolution = ?5, resolved_at = ?6
            WHERE player_name = ?1 AND item_name = ?2 AND grid_col = ?3 AND grid_row = ?4
              AND resolution IS NULL
            "#,
            params![
                event.player_name,
                event.item_name,
                event.grid_position.col,
                event.grid_position.row,
                action.as_str(),
                at.to_string(),
            ],
        )?;
        Ok(())
    }

    /// Most recently seen trades first.
    pub fn recent(&self, limit: usize) -> Result<Vec<HistoryRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, player_name, item_name, amount, currency_kind, direction,
                   first_seen, last_seen, whisper_count, resolution
            FROM trades ORDER BY last_seen DESC, id DESC LIMIT ?1
            "#,
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(HistoryRow {
                    id: row.get(0)?,
                    player_name: row.get(1)?,
                    item_name: row.get(2)?,
                    amount: row.get(3)?,
                    currency_kind: row.get(4)?,
                    direction: row.get(5)?,
                    first_seen: row.get(6)?,
                    last_seen: row.get(7)?,
                    whisper_count: row.get(8)?,
                    resolution: row.get(9)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TradeSink for TradeHistory {
    fn record_upsert(&self, event: &TradeEvent) {
        if let Err(e) = self.upsert(event) {
            warn!(target: "tradelog::history", "Failed to record trade: {}", e);
        }
    }

    fn record_removal(&self, event: &TradeEvent, action: ActionCode) {
        if let Err(e) = self.resolve(event, action, crate::pipeline::local_now()) {
            warn!(target: "tradelog::history", "Failed to resolve trade: {}", e);
        }
    }
}
