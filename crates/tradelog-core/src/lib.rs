//! Client log tailing, lifecycle gating, trade extraction and actions for tradelog.

mod actioner;
pub mod collaborators;
mod context;
mod error;
mod gate;
mod history;
mod pipeline;
mod store;
mod tail;
pub mod timestamp;
mod triggers;
pub mod window;

pub use actioner::{ActionReport, Actioner, PromptOutcome};
pub use context::{DEFAULT_MAX_LINE_BYTES, DEFAULT_RESET_MARKER, WatchContext, WatchSettings};
pub use error::TradelogError;
pub use gate::{GateDecision, LifecycleGate, LifecycleState, RejectReason};
pub use history::{HistoryRow, TradeHistory};
pub use pipeline::{
    LineOutcome, TradePipeline, WatchHandle, local_now, spawn_tail_loop, spawn_window_loop,
};
pub use store::{EventStore, UpsertOutcome};
pub use tail::TailReader;
pub use triggers::{TriggerEngine, TriggerRule, builtin_rules};
pub use window::{Compositor, WindowTracker};

/// Result type for tradelog operations.
pub type Result<T> = std::result::Result<T, TradelogError>;
