//! Shared application state.

use crate::config::Config;
use crate::executor::KeystrokeExecutor;
use crate::notify::CommandNotifier;
use crate::presenter::DmenuPresenter;
use chrono::NaiveDateTime;
use std::sync::Arc;
use tradelog_core::collaborators::{
    ActionExecutor, Notifier, NullNotifier, Presenter, TradeSink, WindowProbe,
};
use tradelog_core::{
    Actioner, TradeHistory, TradePipeline, TriggerEngine, WatchContext, local_now,
};

/// Desktop-facing seams, replaceable in tests.
pub struct Collaborators {
    pub probe: Arc<dyn WindowProbe>,
    pub presenter: Arc<dyn Presenter>,
    pub executor: Arc<dyn ActionExecutor>,
    pub notifier: Arc<dyn Notifier>,
}

impl Collaborators {
    /// Command-backed implementations chosen by the config.
    pub fn from_config(config: &Config) -> Self {
        let probe = config.compositor.probe(config.window_class_hints.clone());
        let executor = Arc::new(KeystrokeExecutor::new(
            Arc::clone(&probe),
            config.keystrokes.clone(),
        ));
        let notifier: Arc<dyn Notifier> = if config.notifications {
            Arc::new(CommandNotifier::default())
        } else {
            Arc::new(NullNotifier)
        };

        Self {
            probe,
            presenter: Arc::new(DmenuPresenter::new(config.presenter.clone())),
            executor,
            notifier,
        }
    }
}

pub struct AppState {
    pub pipeline: Arc<TradePipeline>,
    pub actioner: Arc<Actioner>,
    pub presenter: Arc<dyn Presenter>,
    pub probe: Arc<dyn WindowProbe>,
    pub history: Option<Arc<TradeHistory>>,
    pub config: Config,
}

impl AppState {
    /// State for a session starting now.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let collaborators = Collaborators::from_config(&config);
        Self::with_collaborators(config, collaborators, local_now())
    }

    /// Only lines stamped at or after `session_anchor` can become trades.
    pub fn with_collaborators(
        config: Config,
        collaborators: Collaborators,
        session_anchor: NaiveDateTime,
    ) -> anyhow::Result<Self> {
        let history = config
            .history_db
            .as_deref()
            .map(TradeHistory::open)
            .transpose()?
            .map(Arc::new);

        let mut ctx = WatchContext::new(config.watch_settings(), collaborators.notifier);
        if let Some(history) = &history {
            ctx = ctx.with_sink(Arc::clone(history) as Arc<dyn TradeSink>);
        }

        let engine = TriggerEngine::with_builtin_rules(config.rules.clone())?;
        let pipeline = Arc::new(TradePipeline::new(ctx, engine, session_anchor));
        let actioner = Actioner::new(Arc::clone(pipeline.store()), pipeline.context())
            .with_executor(collaborators.executor);

        Ok(Self {
            pipeline,
            actioner: Arc::new(actioner),
            presenter: collaborators.presenter,
            probe: collaborators.probe,
            history,
            config,
        })
    }
}
