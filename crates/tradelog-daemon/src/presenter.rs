//! dmenu-style menu (rofi, wofi, fuzzel) as the trade presenter.

use crate::config::PresenterConfig;
use std::collections::BTreeSet;
use std::io::Write;
use std::process::{Command, Stdio};
use tradelog_core::collaborators::Presenter;
use tradelog_core::{Result, TradelogError};
use tradelog_types::{ActionCode, Selection};
use tracing::debug;

/// Pipes rendered trades into a menu command and reads the picks back.
///
/// Exit code 0 is a plain accept, 1 is a dismissal, and any configured
/// custom keybinding code selects its action.
pub struct DmenuPresenter {
    config: PresenterConfig,
}

impl DmenuPresenter {
    pub fn new(config: PresenterConfig) -> Self {
        Self { config }
    }

    fn action_for_exit(&self, code: i32) -> Option<ActionCode> {
        if code == 0 {
            return Some(self.config.accept_action);
        }
        self.config
            .exit_codes
            .iter()
            .find(|e| e.code == code)
            .map(|e| e.action)
    }
}

impl Presenter for DmenuPresenter {
    fn present(&self, items: &[String], hint: &str) -> Result<Option<Selection>> {
        let mut command = Command::new(&self.config.command);
        command.args(&self.config.args);
        if let Some(flag) = &self.config.hint_flag {
            command.arg(flag).arg(hint);
        }

        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                TradelogError::Collaborator(format!(
                    "failed to spawn {}: {}",
                    self.config.command, e
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // A menu may exit without draining its input.
            match stdin.write_all(items.join("\n").as_bytes()) {
                Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => return Err(e.into()),
                _ => {}
            }
        }
        let output = child.wait_with_output()?;

        let Some(code) = output.status.code() else {
            return Err(TradelogError::Collaborator(format!(
                "{} was terminated by a signal",
                self.config.command
            )));
        };
        debug!(target: "tradelog::actions", "Menu exited with {}", code);

        if code == 1 {
            return Ok(None);
        }
        let Some(action) = self.action_for_exit(code) else {
            return Err(TradelogError::Collaborator(format!(
                "{} exited with unmapped code {}",
                self.config.command, code
            )));
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(Some(Selection {
            indices: parse_selection(&stdout, items),
            action,
        }))
    }
}

/// Menu output lines as row indices.
///
/// Each line is taken as an index when it parses as one in range, otherwise
/// it is matched against the rendered items.
pub fn parse_selection(stdout: &str, items: &[String]) -> Vec<usize> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match line.parse::<usize>() {
            Ok(index) if index < items.len() => Some(index),
            _ => items.iter().position(|item| item == line),
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
