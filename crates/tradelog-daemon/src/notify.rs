//! Desktop notifications through `notify-send`.

use std::process::Command;
use tradelog_core::collaborators::Notifier;
use tradelog_types::NotifyLevel;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct CommandNotifier {
    app_name: String,
}

impl CommandNotifier {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }

    pub fn args(&self, message: &str, level: NotifyLevel) -> Vec<String> {
        vec![
            "-a".to_string(),
            self.app_name.clone(),
            "-u".to_string(),
            level.as_str().to_string(),
            "New trade".to_string(),
            message.to_string(),
        ]
    }
}

impl Default for CommandNotifier {
    fn default() -> Self {
        Self::new("tradelog")
    }
}

impl Notifier for CommandNotifier {
    fn notify(&self, message: &str, level: NotifyLevel) {
        // Called from the tail loop; never wait on the desktop.
        let args = self.args(message, level);
        std::thread::spawn(move || {
            match Command::new("notify-send").args(&args).status() {
                Ok(status) if !status.success() => {
                    warn!(target: "tradelog::actions", "notify-send exited with {}", status)
                }
                Err(e) => warn!(target: "tradelog::actions", "notify-send failed: {}", e),
                Ok(_) => {}
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_send_args() {
        let notifier = CommandNotifier::default();
        assert_eq!(
            notifier.args("5 exalted | Chaos Orb | Bob", NotifyLevel::Critical),
            vec![
                "-a",
                "tradelog",
                "-u",
                "critical",
                "New trade",
                "5 exalted | Chaos Orb | Bob"
            ]
        );
    }
}
