//! Game window lifecycle types.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Opaque compositor identifier of the game window (address or container id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowHandle(pub String);

impl WindowHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of one window poll, as consumed by the lifecycle gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowStatus {
    pub active: bool,
    /// When the window was last seen going from absent to present.
    pub became_active_at: Option<NaiveDateTime>,
}

/// Lifecycle gate phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatePhase {
    Inactive,
    ActiveNoResetSeen,
    ActivePostReset,
}
