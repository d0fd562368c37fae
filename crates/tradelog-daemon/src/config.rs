//! Daemon configuration.

use anyhow::{Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tradelog_core::{Compositor, DEFAULT_MAX_LINE_BYTES, DEFAULT_RESET_MARKER, WatchSettings};
use tradelog_types::{ActionCode, RuleSpec};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// The game client's chat log.
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,
    #[serde(default = "default_tail_interval_ms")]
    pub tail_interval_ms: u64,
    #[serde(default = "default_window_interval_ms")]
    pub window_interval_ms: u64,
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
    #[serde(default = "default_reset_markers")]
    pub reset_markers: Vec<String>,
    #[serde(default)]
    pub compositor: Compositor,
    #[serde(default = "default_window_class_hints")]
    pub window_class_hints: Vec<String>,
    /// SQLite trade history; disabled when unset.
    #[serde(default)]
    pub history_db: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub notifications: bool,
    #[serde(default)]
    pub presenter: PresenterConfig,
    #[serde(default)]
    pub keystrokes: KeystrokeConfig,
    /// Extra trigger rules appended after the built-in whisper rules.
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

/// External dmenu-style menu command.
#[derive(Debug, Clone, Deserialize)]
pub struct PresenterConfig {
    #[serde(default = "default_presenter_command")]
    pub command: String,
    #[serde(default = "default_presenter_args")]
    pub args: Vec<String>,
    /// Flag that passes the hint line to the menu (e.g. rofi's `-mesg`).
    #[serde(default = "default_hint_flag")]
    pub hint_flag: Option<String>,
    /// Action for a plain accept (exit code 0).
    #[serde(default = "default_accept_action")]
    pub accept_action: ActionCode,
    /// Custom keybinding exit codes.
    #[serde(default = "default_exit_codes")]
    pub exit_codes: Vec<ExitCodeAction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExitCodeAction {
    pub code: i32,
    pub action: ActionCode,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeystrokeBackend {
    #[default]
    Wtype,
    Xdotool,
}

/// How chat commands are typed into the game.
#[derive(Debug, Clone, Deserialize)]
pub struct KeystrokeConfig {
    #[serde(default)]
    pub backend: KeystrokeBackend,
    #[serde(default = "default_thanks_message")]
    pub thanks_message: String,
    /// Pause between focusing the window and typing.
    #[serde(default = "default_focus_delay_ms")]
    pub focus_delay_ms: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7373
}

fn default_log_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".local/share/Steam/steamapps/common/Path of Exile/logs/Client.txt")
}

fn default_tail_interval_ms() -> u64 {
    250
}

fn default_window_interval_ms() -> u64 {
    1000
}

fn default_max_line_bytes() -> usize {
    DEFAULT_MAX_LINE_BYTES
}

fn default_reset_markers() -> Vec<String> {
    vec![DEFAULT_RESET_MARKER.to_string()]
}

fn default_window_class_hints() -> Vec<String> {
    vec!["steam_app_238960".to_string(), "pathofexile".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_presenter_command() -> String {
    "rofi".to_string()
}

fn default_presenter_args() -> Vec<String> {
    [
        "-dmenu",
        "-i",
        "-multi-select",
        "-format",
        "i",
        "-p",
        "trades",
        "-kb-custom-1",
        "Alt+i",
        "-kb-custom-2",
        "Alt+t",
        "-kb-custom-3",
        "Alt+h",
        "-kb-custom-4",
        "Alt+k",
        "-kb-custom-5",
        "Alt+y",
        "-kb-custom-6",
        "Alt+d",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_hint_flag() -> Option<String> {
    Some("-mesg".to_string())
}

fn default_accept_action() -> ActionCode {
    ActionCode::Settle
}

fn default_exit_codes() -> Vec<ExitCodeAction> {
    [
        (10, ActionCode::Invite),
        (11, ActionCode::TradeRequest),
        (12, ActionCode::Hideout),
        (13, ActionCode::Kick),
        (14, ActionCode::Thank),
        (15, ActionCode::Delete),
    ]
    .into_iter()
    .map(|(code, action)| ExitCodeAction { code, action })
    .collect()
}

fn default_thanks_message() -> String {
    "ty, gl".to_string()
}

fn default_focus_delay_ms() -> u64 {
    100
}

impl Default for PresenterConfig {
    fn default() -> Self {
        Self {
            command: default_presenter_command(),
            args: default_presenter_args(),
            hint_flag: default_hint_flag(),
            accept_action: default_accept_action(),
            exit_codes: default_exit_codes(),
        }
    }
}

impl Default for KeystrokeConfig {
    fn default() -> Self {
        Self {
            backend: KeystrokeBackend::default(),
            thanks_message: default_thanks_message(),
            focus_delay_ms: default_focus_delay_ms(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_path: default_log_path(),
            tail_interval_ms: default_tail_interval_ms(),
            window_interval_ms: default_window_interval_ms(),
            max_line_bytes: default_max_line_bytes(),
            reset_markers: default_reset_markers(),
            compositor: Compositor::default(),
            window_class_hints: default_window_class_hints(),
            history_db: None,
            notifications: true,
            presenter: PresenterConfig::default(),
            keystrokes: KeystrokeConfig::default(),
            rules: Vec::new(),
        }
    }
}

impl Config {
    /// Load config from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from `$XDG_CONFIG_HOME/tradelog/config.toml` or fall back to defaults.
    pub fn load() -> Result<Self> {
        if let Some(config_path) = Self::default_path() {
            if config_path.exists() {
                return Self::load_from(&config_path);
            }
        }

        Ok(Config::default())
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tradelog").join("config.toml"))
    }

    fn validate(&self) -> Result<()> {
        if self.tail_interval_ms == 0 || self.window_interval_ms == 0 {
            bail!("poll intervals must be greater than zero");
        }
        if self.max_line_bytes == 0 {
            bail!("max_line_bytes must be greater than zero");
        }
        if self.window_class_hints.iter().all(|h| h.trim().is_empty()) {
            bail!("window_class_hints must name at least one window class");
        }
        if let Some(dup) = self
            .presenter
            .exit_codes
            .iter()
            .find(|e| e.code == 0 || e.code == 1)
        {
            bail!("presenter exit code {} is reserved for accept/cancel", dup.code);
        }
        Ok(())
    }

    /// Tunables handed to the watch pipeline.
    pub fn watch_settings(&self) -> WatchSettings {
        WatchSettings {
            tail_interval: Duration::from_millis(self.tail_interval_ms),
            window_interval: Duration::from_millis(self.window_interval_ms),
            max_line_bytes: self.max_line_bytes,
            reset_markers: self.reset_markers.clone(),
        }
    }
}
