//! Rule model: `Rule`, `Condition`, condition groups, `RuleSet`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rule severity, informational; it does not affect matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// What a rule does when it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Allow,
    Block,
    Warn,
    Modify,
}

/// The engine's outcome for one tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Deny,
    Modify,
}

/// Comparison operators available to a [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Matches,
    GreaterThan,
    LessThan,
    In,
    NotIn,
}

impl Operator {
    /// Deterministic secondary sort key used by the constraint engine:
    /// `equals < not_equals < contains < not_contains <
    /// starts_with < ends_with < matches < greater_than < less_than < in <
    /// not_in`.
    pub fn rank(self) -> u8 {
        match self {
            Operator::Equals => 0,
            Operator::NotEquals => 1,
            Operator::Contains => 2,
            Operator::NotContains => 3,
            Operator::StartsWith => 4,
            Operator::EndsWith => 5,
            Operator::Matches => 6,
            Operator::GreaterThan => 7,
            Operator::LessThan => 8,
            Operator::In => 9,
            Operator::NotIn => 10,
        }
    }
}

/// A single condition: either a field/operator/value triple, or a raw
/// boolean expression string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    Field {
        field: String,
        operator: Operator,
        value: serde_json::Value,
    },
    Expression {
        expression: String,
    },
}

impl Condition {
    pub fn field_path(&self) -> Option<&str> {
        match self {
            Condition::Field { field, .. } => Some(field.as_str()),
            Condition::Expression { .. } => None,
        }
    }

    /// Sort key for deterministic condition-evaluation ordering:
    /// `(path, operator rank)`. Expression conditions sort after all
    /// field conditions and are ordered among themselves by their raw text.
    pub fn sort_key(&self) -> (u8, String, u8) {
        match self {
            Condition::Field {
                field, operator, ..
            } => (0, field.clone(), operator.rank()),
            Condition::Expression { expression } => (1, expression.clone(), 0),
        }
    }
}

/// A conjunction of conditions (inner AND of `condition_groups`, or the
/// top-level `conditions` list).
pub type Conjunction = Vec<Condition>;

/// A single rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub severity: Severity,
    pub action: Action,
    /// Empty/absent means "applies to all tools".
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Outer OR of inner AND groups.
    #[serde(default)]
    pub condition_groups: Vec<Conjunction>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Field patches applied to the arguments when `action` is `modify`
    /// and this rule matches. Ignored for every other action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modify: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

fn default_true() -> bool {
    true
}

impl Rule {
    /// Whether this rule applies to the given tool name, ignoring
    /// `enabled` (callers filter on `enabled` separately; see
    /// `LoadedRules::get_rules_for_tool`).
    pub fn applies_to_tool(&self, tool_name: &str) -> bool {
        self.tools.is_empty() || self.tools.iter().any(|t| t == tool_name)
    }

    /// Whether this rule has no condition predicates at all: it matches
    /// unconditionally once tool-filtering passes.
    pub fn is_unconditional(&self) -> bool {
        self.conditions.is_empty() && self.condition_groups.is_empty()
    }
}

/// A versioned collection of rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub version: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub settings: Option<serde_json::Value>,
}

/// The only schema version this implementation accepts.
pub const SUPPORTED_RULESET_VERSION: &str = "1.0";

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RuleSetError {
    #[error("unsupported rule set version: {0:?} (expected {SUPPORTED_RULESET_VERSION:?})")]
    UnsupportedVersion(String),
}

impl RuleSet {
    pub fn validate_version(&self) -> Result<(), RuleSetError> {
        if self.version != SUPPORTED_RULESET_VERSION {
            return Err(RuleSetError::UnsupportedVersion(self.version.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_enabled_defaults_true() {
        let json = serde_json::json!({
            "id": "r1", "name": "Rule 1",
            "severity": "low", "action": "allow"
        });
        let rule: Rule = serde_json::from_value(json).unwrap();
        assert!(rule.enabled);
    }

    #[test]
    fn applies_to_tool_empty_tools_matches_all() {
        let rule = Rule {
            id: "r1".into(),
            name: "n".into(),
            description: None,
            enabled: true,
            severity: Severity::Low,
            action: Action::Allow,
            tools: vec![],
            conditions: vec![],
            condition_groups: vec![],
            tags: vec![],
            metadata: BTreeMap::new(),
            created_at: None,
            modify: None,
            updated_at: None,
        };
        assert!(rule.applies_to_tool("anything"));
    }

    #[test]
    fn operator_rank_orders_as_specified() {
        assert!(Operator::Equals.rank() < Operator::NotEquals.rank());
        assert!(Operator::NotEquals.rank() < Operator::Contains.rank());
        assert!(Operator::Matches.rank() < Operator::GreaterThan.rank());
        assert!(Operator::In.rank() < Operator::NotIn.rank());
    }

    #[test]
    fn ruleset_rejects_unknown_version() {
        let rs = RuleSet {
            version: "2.0".into(),
            name: "n".into(),
            description: None,
            rules: vec![],
            settings: None,
        };
        assert!(matches!(
            rs.validate_version(),
            Err(RuleSetError::UnsupportedVersion(v)) if v == "2.0"
        ));
    }
}
