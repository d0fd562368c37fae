//! Logging configuration and initialization.
//!
//! Presets pick a baseline per `tradelog::*` target; `--log target=level`
//! overrides individual targets and `RUST_LOG` replaces everything.

use std::collections::HashMap;
use tracing::Level;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const TARGET_PREFIX: &str = "tradelog::";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: '{}'. Use 'text' or 'json'.", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogPreset {
    /// Startup, new trades and failures
    #[default]
    Production,
    /// Adds per-poll and gate activity
    Verbose,
    Debug,
    Trace,
    /// Warnings and errors only
    Quiet,
}

#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    pub preset: LogPreset,
    /// Per-target level overrides, keyed by full target (`tradelog::gate`).
    pub overrides: HashMap<String, Level>,
    pub format: LogFormat,
}

impl LogConfig {
    pub fn from_cli(
        verbose: bool,
        debug: bool,
        trace: bool,
        quiet: bool,
        log_overrides: Vec<String>,
        format: LogFormat,
    ) -> Self {
        let preset = if quiet {
            LogPreset::Quiet
        } else if trace {
            LogPreset::Trace
        } else if debug {
            LogPreset::Debug
        } else if verbose {
            LogPreset::Verbose
        } else {
            LogPreset::Production
        };

        let mut overrides = HashMap::new();
        for part in log_overrides.iter().flat_map(|s| s.split(',')) {
            let Some((target, level)) = part.split_once('=') else {
                continue;
            };
            let target = target.trim();
            let full_target = if target.starts_with(TARGET_PREFIX) || target == "tower_http" {
                target.to_string()
            } else {
                format!("{TARGET_PREFIX}{target}")
            };
            if let Some(level) = parse_level(level.trim()) {
                overrides.insert(full_target, level);
            }
        }

        Self {
            preset,
            overrides,
            format,
        }
    }

    pub fn build_filter(&self) -> EnvFilter {
        if let Ok(env_filter) = EnvFilter::try_from_default_env() {
            return env_filter;
        }

        let mut directives: Vec<String> = match self.preset {
            LogPreset::Production => vec![
                "tradelog::startup=info".into(),
                "tradelog::api=info".into(),
                "tradelog::tail=info".into(),
                "tradelog::gate=info".into(),
                "tradelog::triggers=warn".into(),
                "tradelog::store=info".into(),
                "tradelog::window=info".into(),
                "tradelog::actions=info".into(),
                "tradelog::history=warn".into(),
                "tower_http=warn".into(),
            ],
            LogPreset::Verbose => vec!["tradelog=info".into(), "tower_http=info".into()],
            LogPreset::Debug => vec![
                "tradelog=debug".into(),
                "tradelog::tail=info".into(),
                "tower_http=debug".into(),
            ],
            LogPreset::Trace => vec!["tradelog=trace".into(), "tower_http=trace".into()],
            LogPreset::Quiet => vec!["tradelog=warn".into(), "tower_http=error".into()],
        };

        for (target, level) in &self.overrides {
            directives.push(format!("{}={}", target, level.as_str().to_lowercase()));
        }

        EnvFilter::try_new(directives.join(",")).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

fn parse_level(s: &str) -> Option<Level> {
    match s.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

pub fn init(config: &LogConfig) {
    let filter = config.build_filter();

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(true).with_thread_ids(false))
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_events(FmtSpan::CLOSE),
                )
                .init();
        }
    }
}
