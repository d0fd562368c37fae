//! Types chat commands into the game window.

use crate::config::{KeystrokeBackend, KeystrokeConfig};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;
use tradelog_core::collaborators::{ActionExecutor, WindowProbe};
use tradelog_core::{Result, TradelogError};
use tradelog_types::{ActionCode, TradeEvent};
use tracing::info;

/// The chat line that performs `action` against the event's counterparty.
///
/// Store-only actions have no chat form.
pub fn chat_command(event: &TradeEvent, action: ActionCode, thanks: &str) -> Option<String> {
    let player = &event.player_name;
    match action {
        ActionCode::Settle | ActionCode::Delete => None,
        ActionCode::Invite => Some(format!("/invite {player}")),
        ActionCode::TradeRequest => Some(format!("/tradewith {player}")),
        ActionCode::Hideout => Some(format!("/hideout {player}")),
        ActionCode::Kick => Some(format!("/kick {player}")),
        ActionCode::Thank => Some(format!("@{player} {thanks}")),
    }
}

/// Focuses the game through the window probe, then opens chat, types and sends.
pub struct KeystrokeExecutor {
    probe: Arc<dyn WindowProbe>,
    config: KeystrokeConfig,
}

impl KeystrokeExecutor {
    pub fn new(probe: Arc<dyn WindowProbe>, config: KeystrokeConfig) -> Self {
        Self { probe, config }
    }

    fn press_enter(&self) -> Result<()> {
        match self.config.backend {
            KeystrokeBackend::Wtype => run("wtype", &["-k", "Return"]),
            KeystrokeBackend::Xdotool => run("xdotool", &["key", "Return"]),
        }
    }

    fn type_text(&self, text: &str) -> Result<()> {
        match self.config.backend {
            KeystrokeBackend::Wtype => run("wtype", &["--", text]),
            KeystrokeBackend::Xdotool => run("xdotool", &["type", "--", text]),
        }
    }
}

impl ActionExecutor for KeystrokeExecutor {
    fn execute(&self, event: &TradeEvent, action: ActionCode) -> Result<()> {
        let Some(line) = chat_command(event, action, &self.config.thanks_message) else {
            return Ok(());
        };

        let handle = self
            .probe
            .find()?
            .ok_or_else(|| TradelogError::Collaborator("game window is not open".to_string()))?;
        self.probe.focus(&handle)?;
        std::thread::sleep(Duration::from_millis(self.config.focus_delay_ms));

        self.press_enter()?;
        self.type_text(&line)?;
        self.press_enter()?;

        info!(target: "tradelog::actions", "Sent '{}'", line);
        Ok(())
    }
}

fn run(program: &str, args: &[&str]) -> Result<()> {
    let status = Command::new(program).args(args).status().map_err(|e| {
        TradelogError::Collaborator(format!("failed to spawn {}: {}", program, e))
    })?;
    if !status.success() {
        return Err(TradelogError::Collaborator(format!(
            "{} exited with {}",
            program, status
        )));
    }
    Ok(())
}
