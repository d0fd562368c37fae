//! Explicit wiring shared by the tail reader, gate and pipeline.

use crate::collaborators::{Notifier, NullNotifier, TradeSink};
use std::sync::Arc;
use std::time::Duration;

/// Lines longer than this are truncated before gating.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// Marker the client prints when it (re)starts a game session.
pub const DEFAULT_RESET_MARKER: &str = "[STARTUP] Loading Start";

/// Tunables for the watch pipeline.
#[derive(Debug, Clone)]
pub struct WatchSettings {
    pub tail_interval: Duration,
    pub window_interval: Duration,
    pub max_line_bytes: usize,
    pub reset_markers: Vec<String>,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            tail_interval: Duration::from_millis(250),
            window_interval: Duration::from_secs(1),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            reset_markers: vec![DEFAULT_RESET_MARKER.to_string()],
        }
    }
}

/// Settings plus the collaborators every stage may report through.
#[derive(Clone)]
pub struct WatchContext {
    pub settings: WatchSettings,
    pub notifier: Arc<dyn Notifier>,
    pub sink: Option<Arc<dyn TradeSink>>,
}

impl WatchContext {
    pub fn new(settings: WatchSettings, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            settings,
            notifier,
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn TradeSink>) -> Self {
        self.sink = Some(sink);
        self
    }
}

impl Default for WatchContext {
    fn default() -> Self {
        Self::new(WatchSettings::default(), Arc::new(NullNotifier))
    }
}

impl std::fmt::Debug for WatchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchContext")
            .field("settings", &self.settings)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}
