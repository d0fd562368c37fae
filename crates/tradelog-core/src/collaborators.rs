//! Seams to the desktop: window manager, menu, keystrokes, notifications, history.

use crate::Result;
use tradelog_types::{ActionCode, NotifyLevel, Selection, TradeEvent, WindowHandle};

/// Finds and focuses the game window through a compositor.
pub trait WindowProbe: Send + Sync {
    /// Look up the game window; `Ok(None)` when it is not open.
    fn find(&self) -> Result<Option<WindowHandle>>;

    /// Give keyboard focus to the window.
    fn focus(&self, handle: &WindowHandle) -> Result<()>;
}

/// Shows the rendered trade list and reports what the user picked.
pub trait Presenter: Send + Sync {
    /// Returns `Ok(None)` when the user dismissed the menu.
    fn present(&self, items: &[String], hint: &str) -> Result<Option<Selection>>;
}

/// Drives the game client for actions that are not plain store edits.
pub trait ActionExecutor: Send + Sync {
    fn execute(&self, event: &TradeEvent, action: ActionCode) -> Result<()>;
}

/// Desktop notification sink.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, level: NotifyLevel);
}

/// Side channel receiving store mutations (durable history, audit).
pub trait TradeSink: Send + Sync {
    fn record_upsert(&self, event: &TradeEvent);
    fn record_removal(&self, event: &TradeEvent, action: ActionCode);
}

/// Notifier that drops every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _message: &str, _level: NotifyLevel) {}
}
