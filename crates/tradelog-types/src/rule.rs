//! Declarative trigger rule definitions.

use crate::Direction;
use serde::{Deserialize, Serialize};

/// Semantic meaning of a capture group in a trigger pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    Player,
    Item,
    Amount,
    Currency,
    League,
    Container,
    Column,
    Row,
    /// Group is captured but not mapped onto the event.
    Ignore,
}

/// Uncompiled rule as written in config or the built-in rule table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub name: String,
    pub pattern: String,
    /// Capture groups in order, group 1 first.
    pub fields: Vec<FieldName>,
    pub direction: Direction,
    /// Cheap substrings a line must contain before the pattern is worth running.
    #[serde(default)]
    pub indicators: Vec<String>,
}

impl RuleSpec {
    pub fn new(
        name: impl Into<String>,
        pattern: impl Into<String>,
        fields: Vec<FieldName>,
        direction: Direction,
        indicators: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            fields,
            direction,
            indicators,
        }
    }
}
