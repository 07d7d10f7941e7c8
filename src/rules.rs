//! Declarative guardrail rule model
//!
//! Rules are data, not code: conditions and knobs are plain serde structures
//! so a rule set can round-trip through JSON or YAML losslessly. Patterns are
//! compiled exactly once, when the rule is registered; a rule that fails to
//! compile is rejected there instead of faulting mid-evaluation.

use crate::error::Result;
use crate::patterns::compile_case_insensitive;
use crate::types::{RuleId, Severity};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Category of a guardrail rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    /// Keyword scanning and content sanitization
    ContentFilter,
    /// Per-identity sliding-window rate limiting
    RateLimit,
    /// Reserved extension point; always passes
    PermissionCheck,
    /// Structural checks (content length)
    DataValidation,
    /// Injection-style regex detections
    SecurityCheck,
}

impl RuleType {
    /// Stable name used in stats and log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::ContentFilter => "content_filter",
            RuleType::RateLimit => "rate_limit",
            RuleType::PermissionCheck => "permission_check",
            RuleType::DataValidation => "data_validation",
            RuleType::SecurityCheck => "security_check",
        }
    }
}

/// Effect applied when a rule's conditions match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    /// Accumulate a warning and continue
    Warn,
    /// Redact sensitive substrings, continue with the redacted copy
    Sanitize,
    /// Fail the validation immediately
    Block,
    /// Flag the request for the human approval workflow
    RequireApproval,
}

/// Optional filters that must ALL match for a rule to apply
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleConditions {
    /// Regexes tested against raw content (security checks)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patterns: Vec<String>,
    /// Case-insensitive substrings tested against content
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    /// Exact membership test against the requesting agent type
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agent_types: Vec<String>,
    /// Exact membership test against the tool being invoked
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_names: Vec<String>,
    /// Exact membership test against the caller's role
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub user_roles: Vec<String>,
}

impl RuleConditions {
    /// True when no filter is set
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
            && self.keywords.is_empty()
            && self.agent_types.is_empty()
            && self.tool_names.is_empty()
            && self.user_roles.is_empty()
    }

    /// True when the rule is scoped to specific tools or agent types
    pub fn has_tool_scope(&self) -> bool {
        !self.tool_names.is_empty() || !self.agent_types.is_empty()
    }

    /// Membership test for tool-execution requests.
    ///
    /// Rules with neither a tool nor an agent-type filter are global and
    /// apply to every tool call.
    pub fn matches_tool(&self, tool_name: Option<&str>, agent_type: Option<&str>) -> bool {
        if !self.has_tool_scope() {
            return true;
        }
        let tool_ok = !self.tool_names.is_empty()
            && tool_name.is_some_and(|t| self.tool_names.iter().any(|n| n == t));
        let agent_ok = !self.agent_types.is_empty()
            && agent_type.is_some_and(|a| self.agent_types.iter().any(|n| n == a));
        tool_ok || agent_ok
    }
}

/// Free-form rule parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Replacement token for sanitize rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
    /// Content length that blocks when exceeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Content length that warns (non-blocking) when exceeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warn_length: Option<usize>,
    /// Request limit for rate-limit rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_requests: Option<usize>,
    /// Window length in milliseconds for rate-limit rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_ms: Option<u64>,
    /// Open-ended extension parameters
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// A declarative policy unit evaluated by the guardrail engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailRule {
    /// Unique identifier, generated at creation
    #[serde(default)]
    pub id: RuleId,
    /// Human-readable rule name, used in block reasons
    pub name: String,
    /// What the rule is for
    #[serde(default)]
    pub description: String,
    /// Rule category
    pub rule_type: RuleType,
    /// Informational severity
    #[serde(default = "default_severity")]
    pub severity: Severity,
    /// Disabled rules are skipped entirely
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Filters that must all match for the rule to apply
    #[serde(default)]
    pub conditions: RuleConditions,
    /// Effect when conditions match
    pub action: RuleAction,
    /// Free-form parameters
    #[serde(default)]
    pub config: RuleConfig,
}

fn default_severity() -> Severity {
    Severity::Medium
}

fn default_enabled() -> bool {
    true
}

impl GuardrailRule {
    /// Create an enabled rule with a fresh ID and empty conditions
    pub fn new(name: impl Into<String>, rule_type: RuleType, action: RuleAction) -> Self {
        Self {
            id: RuleId::new(),
            name: name.into(),
            description: String::new(),
            rule_type,
            severity: Severity::Medium,
            enabled: true,
            conditions: RuleConditions::default(),
            action,
            config: RuleConfig::default(),
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the severity
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Set the conditions
    pub fn with_conditions(mut self, conditions: RuleConditions) -> Self {
        self.conditions = conditions;
        self
    }

    /// Set the config
    pub fn with_config(mut self, config: RuleConfig) -> Self {
        self.config = config;
        self
    }

    /// Enable or disable the rule
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// A guardrail rule with its patterns compiled for evaluation
#[derive(Debug)]
pub(crate) struct CompiledRule {
    /// The declarative rule as registered
    pub rule: GuardrailRule,
    /// Condition patterns compiled case-insensitively, in declaration order
    pub patterns: Vec<(String, Regex)>,
}

impl CompiledRule {
    /// Compile a rule's patterns, rejecting the rule if any fail.
    pub fn compile(rule: GuardrailRule) -> Result<Self> {
        let patterns = rule
            .conditions
            .patterns
            .iter()
            .map(|p| compile_case_insensitive(p).map(|re| (p.clone(), re)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rule, patterns })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let rule = GuardrailRule::new("test", RuleType::ContentFilter, RuleAction::Warn);
        assert!(rule.enabled);
        assert_eq!(rule.severity, Severity::Medium);
        assert!(rule.conditions.is_empty());
    }

    #[test]
    fn compile_rejects_invalid_pattern() {
        let rule = GuardrailRule::new("bad", RuleType::SecurityCheck, RuleAction::Block)
            .with_conditions(RuleConditions {
                patterns: vec!["(unclosed".to_string()],
                ..Default::default()
            });
        assert!(CompiledRule::compile(rule).is_err());
    }

    #[test]
    fn tool_scope_matching() {
        let scoped = RuleConditions {
            tool_names: vec!["delete_file".to_string()],
            ..Default::default()
        };
        assert!(scoped.matches_tool(Some("delete_file"), None));
        assert!(!scoped.matches_tool(Some("read_file"), None));
        assert!(!scoped.matches_tool(None, None));

        let global = RuleConditions::default();
        assert!(global.matches_tool(Some("anything"), None));
        assert!(global.matches_tool(None, None));
    }

    #[test]
    fn rule_round_trips_through_json_and_yaml() {
        let rule = GuardrailRule::new("sql-injection", RuleType::SecurityCheck, RuleAction::Block)
            .with_description("Blocks SQL injection attempts")
            .with_severity(Severity::Critical)
            .with_conditions(RuleConditions {
                patterns: vec![r"drop\s+table".to_string()],
                keywords: vec!["union select".to_string()],
                ..Default::default()
            })
            .with_config(RuleConfig {
                replacement: Some("[SQL]".to_string()),
                extra: HashMap::from([(
                    "note".to_string(),
                    serde_json::Value::String("x".to_string()),
                )]),
                ..Default::default()
            });

        let json = serde_json::to_string(&rule).unwrap();
        let from_json: GuardrailRule = serde_json::from_str(&json).unwrap();
        assert_eq!(from_json.id, rule.id);
        assert_eq!(from_json.conditions, rule.conditions);
        assert_eq!(from_json.config, rule.config);

        let yaml = serde_yaml::to_string(&rule).unwrap();
        let from_yaml: GuardrailRule = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(from_yaml.id, rule.id);
        assert_eq!(from_yaml.conditions, rule.conditions);
        assert_eq!(from_yaml.config, rule.config);
    }
}
