//! Error types for tradelog.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TradelogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Rule '{rule}' has an invalid pattern: {source}")]
    InvalidRegex {
        rule: String,
        #[source]
        source: regex::Error,
    },

    #[error("Selection index {index} out of range for {len} trades")]
    InvalidSelection { index: usize, len: usize },

    #[error("Collaborator error: {0}")]
    Collaborator(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
