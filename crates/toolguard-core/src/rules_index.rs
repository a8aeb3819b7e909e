//! Indexed, queryable view over a collection of loaded rule sets.

use crate::model::{Rule, RuleSet, RuleSetError};
use std::collections::HashMap;

/// A flattened, tool-indexed snapshot of every rule across every loaded
/// rule set, plus the ordered list of source identifiers it was built
/// from.
///
/// Built fresh on every reload rather than mutated in place, so a reload
/// can never accumulate duplicate entries. Two loads of the same sources
/// compare equal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedRules {
    rules: Vec<Rule>,
    /// Indices into `rules` that apply to every tool (`tools` empty).
    global: Vec<usize>,
    /// Indices into `rules` keyed by tool name.
    by_tool: HashMap<String, Vec<usize>>,
    sources: Vec<String>,
}

impl LoadedRules {
    /// Index rule sets with their originating source identifiers
    /// (typically file paths), preserving order.
    pub fn from_sources(sources: &[(String, RuleSet)]) -> Result<Self, RuleSetError> {
        for (_, rs) in sources {
            rs.validate_version()?;
        }

        let mut rules = Vec::new();
        let mut source_ids = Vec::new();
        for (id, rs) in sources {
            source_ids.push(id.clone());
            rules.extend(rs.rules.iter().cloned());
        }

        let mut global = Vec::new();
        let mut by_tool: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, rule) in rules.iter().enumerate() {
            if rule.tools.is_empty() {
                global.push(idx);
            } else {
                for tool in &rule.tools {
                    by_tool.entry(tool.clone()).or_default().push(idx);
                }
            }
        }

        Ok(Self {
            rules,
            global,
            by_tool,
            sources: source_ids,
        })
    }

    /// Index rule sets that have no meaningful source path; each set's
    /// name stands in as its source identifier.
    pub fn from_rule_sets(rule_sets: &[RuleSet]) -> Result<Self, RuleSetError> {
        let sources: Vec<(String, RuleSet)> = rule_sets
            .iter()
            .map(|rs| (rs.name.clone(), rs.clone()))
            .collect();
        Self::from_sources(&sources)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The source identifiers consumed to build this index, in load order.
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Rules applying to `tool_name`, enabled only, global rules first,
    /// each group preserving the order it was loaded in.
    pub fn get_rules_for_tool(&self, tool_name: &str) -> Vec<&Rule> {
        let mut out = Vec::new();
        for &idx in &self.global {
            if self.rules[idx].enabled {
                out.push(&self.rules[idx]);
            }
        }
        if let Some(indices) = self.by_tool.get(tool_name) {
            for &idx in indices {
                if self.rules[idx].enabled {
                    out.push(&self.rules[idx]);
                }
            }
        }
        out
    }

    pub fn all(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Action, Severity};

    fn rule(id: &str, tools: Vec<&str>) -> Rule {
        Rule {
            id: id.to_string(),
            name: id.to_string(),
            description: None,
            enabled: true,
            severity: Severity::Low,
            action: Action::Allow,
            tools: tools.into_iter().map(String::from).collect(),
            conditions: vec![],
            condition_groups: vec![],
            tags: vec![],
            metadata: Default::default(),
            created_at: None,
            modify: None,
            updated_at: None,
        }
    }

    fn rule_set(rules: Vec<Rule>) -> RuleSet {
        RuleSet {
            version: "1.0".into(),
            name: "test".into(),
            description: None,
            rules,
            settings: None,
        }
    }

    #[test]
    fn global_rules_precede_tool_specific_rules() {
        let loaded = LoadedRules::from_rule_sets(&[rule_set(vec![
            rule("tool-only", vec!["delete_file"]),
            rule("global", vec![]),
        ])])
        .unwrap();

        let applicable = loaded.get_rules_for_tool("delete_file");
        let ids: Vec<_> = applicable.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["global", "tool-only"]);
    }

    #[test]
    fn disabled_rules_are_excluded() {
        let mut disabled = rule("disabled", vec![]);
        disabled.enabled = false;
        let loaded = LoadedRules::from_rule_sets(&[rule_set(vec![disabled])]).unwrap();
        assert!(loaded.get_rules_for_tool("anything").is_empty());
    }

    #[test]
    fn rebuilding_from_the_same_sources_compares_equal() {
        let sources = vec![("rules/a.yaml".to_string(), rule_set(vec![rule("r1", vec![])]))];
        let first = LoadedRules::from_sources(&sources).unwrap();
        let second = LoadedRules::from_sources(&sources).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.sources(), &["rules/a.yaml".to_string()]);
    }

    #[test]
    fn rejects_unsupported_version() {
        let mut rs = rule_set(vec![]);
        rs.version = "9.9".into();
        assert!(LoadedRules::from_rule_sets(&[rs]).is_err());
    }
}
