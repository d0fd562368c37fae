//! Trigger engine turning gated log lines into trade events.

use crate::{Result, TradelogError};
use chrono::NaiveDateTime;
use regex::Regex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use tradelog_types::{Direction, FieldName, GridPosition, RuleSpec, TradeEvent};
use tracing::{debug, warn};

/// Optional `<GUILD> ` tag the client prints before a character name.
const GUILD_TAG: &str = r"(?:<[^>]*> )?";

/// Trade whisper rules for the client's chat format.
pub fn builtin_rules() -> Vec<RuleSpec> {
    use FieldName::*;

    let item_fields = vec![Player, Item, Amount, Currency, League, Container, Column, Row];
    let bulk_fields = vec![Player, Item, Amount, Currency, League];
    let item_body = r#"Hi, I would like to buy your (.+?) listed for (\S+) (.+?) in (.+?) \(stash tab "([^"]*)"; position: left (\d+), top (\d+)\)"#;
    let bulk_body = r"Hi, I'd like to buy your (.+?) for my (\S+) (.+?) in (.+?)\.";

    vec![
        RuleSpec::new(
            "incoming-item",
            format!("@From {GUILD_TAG}([^:]+): {item_body}"),
            item_fields.clone(),
            Direction::BuyFromCounterparty,
            vec!["@From".to_string()],
        ),
        RuleSpec::new(
            "outgoing-item",
            format!("@To {GUILD_TAG}([^:]+): {item_body}"),
            item_fields,
            Direction::SellToCounterparty,
            vec!["@To".to_string()],
        ),
        RuleSpec::new(
            "incoming-bulk",
            format!("@From {GUILD_TAG}([^:]+): {bulk_body}"),
            bulk_fields.clone(),
            Direction::BuyFromCounterparty,
            vec!["@From".to_string()],
        ),
        RuleSpec::new(
            "outgoing-bulk",
            format!("@To {GUILD_TAG}([^:]+): {bulk_body}"),
            bulk_fields,
            Direction::SellToCounterparty,
            vec!["@To".to_string()],
        ),
    ]
}

/// A compiled, immutable trigger rule.
#[derive(Debug, Clone)]
pub struct TriggerRule {
    pub name: String,
    pub pattern: Regex,
    pub field_map: Vec<FieldName>,
    pub direction: Direction,
    pub indicators: Vec<String>,
}

impl TriggerRule {
    /// Compile a rule, rejecting patterns that cannot fill their field map.
    pub fn compile(spec: RuleSpec) -> Result<Self> {
        if spec.name.trim().is_empty() {
            return Err(TradelogError::Config("rule name cannot be empty".to_string()));
        }

        let pattern = Regex::new(&spec.pattern).map_err(|source| TradelogError::InvalidRegex {
            rule: spec.name.clone(),
            source,
        })?;

        let groups = pattern.captures_len() - 1;
        if groups < spec.fields.len() {
            return Err(TradelogError::Config(format!(
                "rule '{}' maps {} fields but its pattern has {} capture groups",
                spec.name,
                spec.fields.len(),
                groups
            )));
        }

        for required in [FieldName::Player, FieldName::Item] {
            if !spec.fields.contains(&required) {
                return Err(TradelogError::Config(format!(
                    "rule '{}' must map a {:?} field",
                    spec.name, required
                )));
            }
        }

        Ok(Self {
            name: spec.name,
            pattern,
            field_map: spec.fields,
            direction: spec.direction,
            indicators: spec.indicators,
        })
    }

    /// Run the rule against one line; first match wins.
    pub fn extract(&self, line: &str, line_time: NaiveDateTime) -> Option<TradeEvent> {
        let caps = self.pattern.captures(line)?;

        let participating = caps.iter().skip(1).filter(Option::is_some).count();
        if participating < self.field_map.len() {
            debug!(
                target: "tradelog::triggers",
                "Rule {} matched with {} of {} groups, skipping",
                self.name,
                participating,
                self.field_map.len()
            );
            return None;
        }

        let mut event = TradeEvent {
            timestamp: line_time,
            rule_name: self.name.clone(),
            player_name: String::new(),
            item_name: String::new(),
            amount: Decimal::ZERO,
            currency_kind: String::new(),
            container_label: String::new(),
            league: String::new(),
            grid_position: GridPosition::default(),
            raw_line: line.to_string(),
            direction: self.direction,
        };

        for (idx, field) in self.field_map.iter().enumerate() {
            let value = caps.get(idx + 1).map(|m| m.as_str().trim()).unwrap_or("");
            match field {
                FieldName::Player => event.player_name = value.to_string(),
                FieldName::Item => event.item_name = value.to_string(),
                FieldName::Amount => event.amount = self.parse_amount(value),
                FieldName::Currency => event.currency_kind = value.to_string(),
                FieldName::League => event.league = value.to_string(),
                FieldName::Container => event.container_label = value.to_string(),
                FieldName::Column => event.grid_position.col = self.parse_position(value),
                FieldName::Row => event.grid_position.row = self.parse_position(value),
                FieldName::Ignore => {}
            }
        }

        Some(event)
    }

    fn parse_amount(&self, value: &str) -> Decimal {
        Decimal::from_str(value).unwrap_or_else(|e| {
            warn!(
                target: "tradelog::triggers",
                "Rule {}: amount '{}' unparseable ({}), using 0",
                self.name,
                value,
                e
            );
            Decimal::ZERO
        })
    }

    fn parse_position(&self, value: &str) -> u32 {
        value.parse().unwrap_or_else(|e| {
            warn!(
                target: "tradelog::triggers",
                "Rule {}: position '{}' unparseable ({}), using 0",
                self.name,
                value,
                e
            );
            0
        })
    }
}

/// Ordered rule set keyed by name.
#[derive(Debug, Clone)]
pub struct TriggerEngine {
    rules: Vec<TriggerRule>,
    by_name: HashMap<String, usize>,
}

impl TriggerEngine {
    /// Compile every rule; one bad rule fails the whole engine.
    pub fn new(specs: impl IntoIterator<Item = RuleSpec>) -> Result<Self> {
        let mut rules = Vec::new();
        let mut by_name = HashMap::new();

        for spec in specs {
            let rule = TriggerRule::compile(spec)?;
            if by_name.insert(rule.name.clone(), rules.len()).is_some() {
                return Err(TradelogError::Config(format!(
                    "duplicate rule name '{}'",
                    rule.name
                )));
            }
            rules.push(rule);
        }

        if rules.is_empty() {
            return Err(TradelogError::Config("rule set is empty".to_string()));
        }

        debug!(target: "tradelog::triggers", "Compiled {} trigger rules", rules.len());
        Ok(Self { rules, by_name })
    }

    /// Built-in whisper rules followed by `extra`.
    pub fn with_builtin_rules(extra: impl IntoIterator<Item = RuleSpec>) -> Result<Self> {
        Self::new(builtin_rules().into_iter().chain(extra))
    }

    pub fn rules(&self) -> &[TriggerRule] {
        &self.rules
    }

    pub fn rule(&self, name: &str) -> Option<&TriggerRule> {
        self.by_name.get(name).map(|&idx| &self.rules[idx])
    }

    /// Union of all rule indicator substrings, first occurrence order.
    ///
    /// Empty when any rule has no indicators, since that rule must see every line.
    pub fn indicators(&self) -> Vec<String> {
        if self.rules.iter().any(|r| r.indicators.is_empty()) {
            return Vec::new();
        }
        let mut out: Vec<String> = Vec::new();
        for indicator in self.rules.iter().flat_map(|r| r.indicators.iter()) {
            if !out.contains(indicator) {
                out.push(indicator.clone());
            }
        }
        out
    }

    /// Try every rule against the line; zero or one event per rule.
    pub fn match_line(&self, line: &str, line_time: NaiveDateTime) -> Vec<TradeEvent> {
        self.rules
            .iter()
            .filter_map(|rule| rule.extract(line, line_time))
            .collect()
    }
}
