//! Menu selection and action codes.

use serde::{Deserialize, Serialize};

/// Outcome of a user's menu selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionCode {
    /// Trade completed; drop it from the list.
    Settle,
    /// Discard the request without acting on it.
    Delete,
    /// Invite the counterparty to the party.
    Invite,
    /// Open a trade window with the counterparty.
    TradeRequest,
    /// Travel to the counterparty's hideout.
    Hideout,
    /// Remove the counterparty from the party.
    Kick,
    /// Whisper a thank-you to the counterparty.
    Thank,
}

impl ActionCode {
    pub const ALL: [ActionCode; 7] = [
        ActionCode::Settle,
        ActionCode::Delete,
        ActionCode::Invite,
        ActionCode::TradeRequest,
        ActionCode::Hideout,
        ActionCode::Kick,
        ActionCode::Thank,
    ];

    /// Whether applying this action removes the selected events from the store.
    pub fn removes_from_store(&self) -> bool {
        match self {
            ActionCode::Settle | ActionCode::Delete => true,
            ActionCode::Invite
            | ActionCode::TradeRequest
            | ActionCode::Hideout
            | ActionCode::Kick
            | ActionCode::Thank => false,
        }
    }

    /// Whether the caller must drive the game window for this action.
    pub fn interacts_with_game(&self) -> bool {
        !self.removes_from_store()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionCode::Settle => "settle",
            ActionCode::Delete => "delete",
            ActionCode::Invite => "invite",
            ActionCode::TradeRequest => "trade-request",
            ActionCode::Hideout => "hideout",
            ActionCode::Kick => "kick",
            ActionCode::Thank => "thank",
        }
    }
}

impl std::fmt::Display for ActionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionCode::ALL
            .into_iter()
            .find(|code| code.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown action code: '{}'", s))
    }
}

/// What the presenter returned when the user did not cancel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// Indices into the rendered item list.
    pub indices: Vec<usize>,
    pub action: ActionCode,
}

/// Urgency of a desktop notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyLevel {
    Low,
    #[default]
    Normal,
    Critical,
}

impl NotifyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyLevel::Low => "low",
            NotifyLevel::Normal => "normal",
            NotifyLevel::Critical => "critical",
        }
    }
}
