//! Lifecycle gate deciding whether a log line is live enough to act on.
//!
//! The client appends every game session of its lifetime to one file, so a
//! line is only eligible when the game window is up and the line was written
//! after the process started, after the window appeared, and after the most
//! recent in-game session reset marker.

use crate::WatchContext;
use crate::timestamp::parse_line_time;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::sync::Mutex;
use tradelog_types::{GatePhase, WindowStatus};
use tracing::{debug, info, trace};

/// Gate state; readers copy it out under the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LifecycleState {
    /// When this process started; earlier lines are never live.
    pub session_anchor: NaiveDateTime,
    pub window_active: bool,
    /// Most recent inactive-to-active transition.
    pub window_found_at: Option<NaiveDateTime>,
    /// Most recent reset marker seen since the window appeared.
    pub last_reset_at: Option<NaiveDateTime>,
}

impl LifecycleState {
    pub fn new(session_anchor: NaiveDateTime) -> Self {
        Self {
            session_anchor,
            window_active: false,
            window_found_at: None,
            last_reset_at: None,
        }
    }

    pub fn phase(&self) -> GatePhase {
        match (self.window_active, self.last_reset_at) {
            (false, _) => GatePhase::Inactive,
            (true, None) => GatePhase::ActiveNoResetSeen,
            (true, Some(_)) => GatePhase::ActivePostReset,
        }
    }

    /// Earliest line time that can still pass.
    pub fn floor(&self) -> NaiveDateTime {
        [self.window_found_at, self.last_reset_at]
            .into_iter()
            .flatten()
            .fold(self.session_anchor, NaiveDateTime::max)
    }
}

/// Why a line was held back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Unparseable,
    WindowInactive,
    BeforeSessionAnchor,
    BeforeWindowFound,
    BeforeReset,
    NoIndicator,
}

/// Verdict for one log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Forward to the trigger engine.
    Pass(NaiveDateTime),
    /// Reset marker consumed; the line itself is not forwarded.
    Reset(NaiveDateTime),
    Reject(RejectReason),
}

impl GateDecision {
    pub fn line_time(&self) -> Option<NaiveDateTime> {
        match self {
            GateDecision::Pass(t) => Some(*t),
            _ => None,
        }
    }
}

/// Filters log lines by window lifecycle and session resets.
#[derive(Debug)]
pub struct LifecycleGate {
    state: Mutex<LifecycleState>,
    reset_markers: Vec<String>,
    indicators: Vec<String>,
}

impl LifecycleGate {
    /// Create a gate anchored at `session_anchor` that pre-filters on `indicators`.
    pub fn new(ctx: &WatchContext, session_anchor: NaiveDateTime, indicators: Vec<String>) -> Self {
        Self {
            state: Mutex::new(LifecycleState::new(session_anchor)),
            reset_markers: ctx.settings.reset_markers.clone(),
            indicators,
        }
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> LifecycleState {
        *self.lock()
    }

    pub fn phase(&self) -> GatePhase {
        self.lock().phase()
    }

    /// The game window appeared at `at`.
    pub fn window_became_active(&self, at: NaiveDateTime) {
        let mut state = self.lock();
        // Never lower the floor below a reset already observed.
        let found_at = match state.last_reset_at {
            Some(reset) if reset > at => reset,
            _ => at,
        };
        state.window_active = true;
        state.window_found_at = Some(found_at);
        state.last_reset_at = None;
        info!(target: "tradelog::gate", "Game window active since {}", found_at);
    }

    /// The game window went away.
    pub fn window_lost(&self) {
        let mut state = self.lock();
        if state.window_active {
            state.window_active = false;
            info!(target: "tradelog::gate", "Game window lost");
        }
    }

    /// Apply a window poll result; only transitions change state.
    pub fn apply_window_status(&self, status: WindowStatus, now: NaiveDateTime) {
        let was_active = self.lock().window_active;
        match (was_active, status.active) {
            (false, true) => self.window_became_active(status.became_active_at.unwrap_or(now)),
            (true, false) => self.window_lost(),
            _ => {}
        }
    }

    /// Decide what to do with one raw log line.
    pub fn evaluate(&self, line: &str) -> GateDecision {
        let Some(line_time) = parse_line_time(line) else {
            trace!(target: "tradelog::gate", "Skipping untimestamped line");
            return GateDecision::Reject(RejectReason::Unparseable);
        };

        let state = {
            let mut state = self.lock();
            if self.is_reset_marker(line) {
                return Self::consume_reset(&mut state, line_time);
            }
            *state
        };

        let decision = Self::check(&state, line_time);
        if let GateDecision::Reject(reason) = decision {
            trace!(target: "tradelog::gate", "Rejected line at {}: {:?}", line_time, reason);
            return decision;
        }

        if !self.has_indicator(line) {
            return GateDecision::Reject(RejectReason::NoIndicator);
        }

        decision
    }

    fn consume_reset(state: &mut LifecycleState, line_time: NaiveDateTime) -> GateDecision {
        let after_found = state.window_found_at.is_some_and(|found| line_time >= found);
        if !state.window_active || !after_found {
            trace!(target: "tradelog::gate", "Ignoring stale reset marker at {}", line_time);
            return GateDecision::Reject(RejectReason::BeforeWindowFound);
        }

        let reset_at = state.last_reset_at.map_or(line_time, |prev| prev.max(line_time));
        state.last_reset_at = Some(reset_at);
        debug!(target: "tradelog::gate", "Session reset at {}", reset_at);
        GateDecision::Reset(reset_at)
    }

    fn check(state: &LifecycleState, line_time: NaiveDateTime) -> GateDecision {
        if !state.window_active {
            return GateDecision::Reject(RejectReason::WindowInactive);
        }
        if line_time < state.session_anchor {
            return GateDecision::Reject(RejectReason::BeforeSessionAnchor);
        }
        match state.window_found_at {
            Some(found) if line_time >= found => {}
            _ => return GateDecision::Reject(RejectReason::BeforeWindowFound),
        }
        if state.last_reset_at.is_some_and(|reset| line_time < reset) {
            return GateDecision::Reject(RejectReason::BeforeReset);
        }
        GateDecision::Pass(line_time)
    }

    fn is_reset_marker(&self, line: &str) -> bool {
        self.reset_markers.iter().any(|m| line.contains(m.as_str()))
    }

    fn has_indicator(&self, line: &str) -> bool {
        self.indicators.is_empty() || self.indicators.iter().any(|i| line.contains(i.as_str()))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LifecycleState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 18)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn line(h: u32, m: u32, s: u32, body: &str) -> String {
        format!("{} {}", at(h, m, s).format("%Y/%m/%d %H:%M:%S"), body)
    }

    fn gate() -> LifecycleGate {
        LifecycleGate::new(&WatchContext::default(), at(9, 59, 0), vec!["@From".to_string()])
    }

    #[test]
    fn test_inactive_window_rejects() {
        let gate = gate();
        assert_eq!(gate.phase(), GatePhase::Inactive);
        assert_eq!(
            gate.evaluate(&line(10, 0, 5, "@From Bob: hi")),
            GateDecision::Reject(RejectReason::WindowInactive)
        );
    }

    #[test]
    fn test_pass_after_window_found() {
        let gate = gate();
        gate.window_became_active(at(10, 0, 0));
        assert_eq!(gate.phase(), GatePhase::ActiveNoResetSeen);

        assert_eq!(
            gate.evaluate(&line(10, 0, 5, "@From Bob: hi")),
            GateDecision::Pass(at(10, 0, 5))
        );
        assert_eq!(
            gate.evaluate(&line(9, 59, 59, "@From Bob: hi")),
            GateDecision::Reject(RejectReason::BeforeWindowFound)
        );
    }

    #[test]
    fn test_session_anchor_bounds_lines() {
        let gate = LifecycleGate::new(&WatchContext::default(), at(10, 0, 10), vec![]);
        gate.window_became_active(at(10, 0, 0));
        assert_eq!(
            gate.evaluate(&line(10, 0, 5, "@From Bob: hi")),
            GateDecision::Reject(RejectReason::BeforeSessionAnchor)
        );
    }

    #[test]
    fn test_indicator_prefilter() {
        let gate = gate();
        gate.window_became_active(at(10, 0, 0));
        assert_eq!(
            gate.evaluate(&line(10, 0, 5, "[INFO Client] You have entered Hideout.")),
            GateDecision::Reject(RejectReason::NoIndicator)
        );
    }

    #[test]
    fn test_unparseable_line_rejected_silently() {
        let gate = gate();
        gate.window_became_active(at(10, 0, 0));
        assert_eq!(
            gate.evaluate("@From Bob: no timestamp"),
            GateDecision::Reject(RejectReason::Unparseable)
        );
    }

    #[test]
    fn test_reset_marker_is_consumed() {
        let gate = gate();
        gate.window_became_active(at(10, 0, 0));

        let decision = gate.evaluate(&line(10, 0, 30, "[STARTUP] Loading Start"));
        assert_eq!(decision, GateDecision::Reset(at(10, 0, 30)));
        assert_eq!(gate.phase(), GatePhase::ActivePostReset);

        assert_eq!(
            gate.evaluate(&line(10, 0, 20, "@From Bob: hi")),
            GateDecision::Reject(RejectReason::BeforeReset)
        );
        assert!(matches!(gate.evaluate(&line(10, 0, 31, "@From Bob: hi")), GateDecision::Pass(_)));
    }

    #[test]
    fn test_reset_marker_before_window_found_is_ignored() {
        let gate = gate();
        gate.window_became_active(at(10, 0, 0));
        gate.evaluate(&line(9, 59, 30, "[STARTUP] Loading Start"));
        assert_eq!(gate.phase(), GatePhase::ActiveNoResetSeen);
    }

    #[test]
    fn test_window_toggle_clears_reset_without_lowering_floor() {
        let gate = gate();
        gate.window_became_active(at(10, 0, 0));
        gate.evaluate(&line(10, 5, 0, "[STARTUP] Loading Start"));

        gate.window_lost();
        assert_eq!(gate.phase(), GatePhase::Inactive);

        // Window found again with a clock reading earlier than the reset.
        gate.window_became_active(at(10, 1, 0));
        assert_eq!(gate.phase(), GatePhase::ActiveNoResetSeen);
        assert_eq!(
            gate.evaluate(&line(10, 4, 0, "@From Bob: hi")),
            GateDecision::Reject(RejectReason::BeforeWindowFound)
        );
    }

    #[test]
    fn test_gate_monotonic_across_toggles() {
        let gate = gate();
        gate.window_became_active(at(10, 0, 0));
        gate.evaluate(&line(10, 10, 0, "[STARTUP] Loading Start"));
        let reset_at = at(10, 10, 0);

        for minute in 11..20 {
            gate.window_lost();
            gate.window_became_active(at(10, minute, 0));
            for earlier in 0..10 {
                let decision = gate.evaluate(&line(10, earlier, 59, "@From Bob: hi"));
                assert!(decision.line_time().is_none_or(|t| t >= reset_at));
            }
        }
    }

    #[test]
    fn test_apply_window_status_only_reacts_to_transitions() {
        let gate = gate();
        let status = WindowStatus {
            active: true,
            became_active_at: Some(at(10, 0, 0)),
        };
        gate.apply_window_status(status, at(10, 0, 1));
        assert_eq!(gate.snapshot().window_found_at, Some(at(10, 0, 0)));

        gate.evaluate(&line(10, 0, 30, "[STARTUP] Loading Start"));
        // Repeated active poll keeps the reset.
        gate.apply_window_status(status, at(10, 0, 40));
        assert_eq!(gate.phase(), GatePhase::ActivePostReset);

        gate.apply_window_status(
            WindowStatus {
                active: false,
                became_active_at: None,
            },
            at(10, 0, 50),
        );
        assert_eq!(gate.phase(), GatePhase::Inactive);
    }

    #[test]
    fn test_floor_is_max_of_bounds() {
        let mut state = LifecycleState::new(at(9, 0, 0));
        assert_eq!(state.floor(), at(9, 0, 0));
        state.window_found_at = Some(at(10, 0, 0));
        state.last_reset_at = Some(at(10, 5, 0));
        assert_eq!(state.floor(), at(10, 5, 0));
    }
}
