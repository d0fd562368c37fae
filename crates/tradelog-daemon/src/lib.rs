//! tradelog daemon: config, logging, desktop collaborators and the local HTTP API.

pub mod config;
pub mod executor;
pub mod logging;
pub mod notify;
pub mod presenter;
pub mod routes;
pub mod state;
