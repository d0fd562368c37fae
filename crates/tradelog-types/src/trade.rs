//! Trade event types extracted from the client log.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which side of the trade the counterparty's request sits on.
///
/// Named from the counterparty's request: an incoming whisper is a buy
/// request *from* the counterparty, an outgoing whisper asks the
/// counterparty to sell *to* the watching player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    /// The counterparty wants to buy from the watching player (incoming whisper).
    BuyFromCounterparty,
    /// The watching player wants to buy from the counterparty (outgoing whisper).
    SellToCounterparty,
}

impl Direction {
    /// Whether the request was whispered to the watching player.
    pub fn is_incoming(&self) -> bool {
        matches!(self, Direction::BuyFromCounterparty)
    }
}

/// Stash grid cell of a listed item, as `(left, top)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPosition {
    pub col: u32,
    pub row: u32,
}

impl GridPosition {
    pub fn new(col: u32, row: u32) -> Self {
        Self { col, row }
    }
}

impl std::fmt::Display for GridPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.col, self.row)
    }
}

/// Identifies "the same logical trade request" across repeated whispers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TradeKey {
    pub player_name: String,
    pub item_name: String,
    pub grid_position: GridPosition,
}

/// A trade request extracted from one gated log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    /// Timestamp printed at the start of the log line (client local time).
    pub timestamp: NaiveDateTime,
    /// Name of the rule that produced this event.
    pub rule_name: String,
    pub player_name: String,
    pub item_name: String,
    pub amount: Decimal,
    pub currency_kind: String,
    /// Stash tab label, empty for bulk exchange whispers.
    pub container_label: String,
    pub league: String,
    pub grid_position: GridPosition,
    pub raw_line: String,
    pub direction: Direction,
}

impl TradeEvent {
    /// The dedup key of this event.
    pub fn key(&self) -> TradeKey {
        TradeKey {
            player_name: self.player_name.clone(),
            item_name: self.item_name.clone(),
            grid_position: self.grid_position,
        }
    }

    /// Whether `other` refers to the same logical request.
    pub fn same_key(&self, other: &TradeEvent) -> bool {
        self.player_name == other.player_name
            && self.item_name == other.item_name
            && self.grid_position == other.grid_position
    }

    /// Single-line display form used for menus: amount, currency, item, counterparty.
    pub fn display_line(&self) -> String {
        format!(
            "{} {} | {} | {}",
            self.amount.normalize(),
            self.currency_kind,
            self.item_name,
            self.player_name
        )
    }
}
