//! Approval routing rules
//!
//! Decides, before any human is involved, whether an approval request is
//! auto-approved, auto-rejected, or escalated — and with what approver count
//! and timeout. Rules are scanned in registration order; the first rule whose
//! conditions all match wins.

use crate::approval::ApprovalRequest;
use crate::error::{Error, Result};
use crate::types::{RuleId, Sensitivity};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Effect of a matched routing rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteAction {
    /// Resolve immediately as approved, no human involved
    Approve,
    /// Resolve immediately as rejected, no human involved
    Reject,
    /// Escalate to human approvers
    RequireApproval,
}

/// Filters that must ALL match for a routing rule to apply.
///
/// A rule with no conditions matches every request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteConditions {
    /// Membership test against the requesting agent
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agent_types: Vec<String>,
    /// Membership test against the operation identifier
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operations: Vec<String>,
    /// Membership test against the request sensitivity
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sensitivity: Vec<Sensitivity>,
    /// Case-insensitive substrings matched against operation or description
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
}

impl RouteConditions {
    /// True when all set filters hold for `request`
    pub fn matches(&self, request: &ApprovalRequest) -> bool {
        if !self.agent_types.is_empty()
            && !self.agent_types.iter().any(|a| a == &request.agent_name)
        {
            return false;
        }

        if !self.operations.is_empty() && !self.operations.iter().any(|o| o == &request.operation) {
            return false;
        }

        if !self.sensitivity.is_empty() && !self.sensitivity.contains(&request.sensitivity) {
            return false;
        }

        if !self.keywords.is_empty() {
            let operation = request.operation.to_lowercase();
            let description = request.description.to_lowercase();
            let hit = self.keywords.iter().any(|k| {
                let k = k.to_lowercase();
                operation.contains(&k) || description.contains(&k)
            });
            if !hit {
                return false;
            }
        }

        true
    }
}

/// Routing policy, structurally parallel to a guardrail rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRule {
    /// Unique identifier, generated at creation
    #[serde(default)]
    pub id: RuleId,
    /// Human-readable rule name
    pub name: String,
    /// What the rule is for
    #[serde(default)]
    pub description: String,
    /// Disabled rules are skipped
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Filters that must all match
    #[serde(default)]
    pub conditions: RouteConditions,
    /// Effect when the rule matches
    pub action: RouteAction,
    /// Approver-count override for escalated requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_approvers: Option<usize>,
    /// Timeout override for escalated requests, in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

fn default_enabled() -> bool {
    true
}

impl ApprovalRule {
    /// Create an enabled routing rule with a fresh ID
    pub fn new(name: impl Into<String>, action: RouteAction) -> Self {
        Self {
            id: RuleId::new(),
            name: name.into(),
            description: String::new(),
            enabled: true,
            conditions: RouteConditions::default(),
            action,
            required_approvers: None,
            timeout_ms: None,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the conditions
    pub fn with_conditions(mut self, conditions: RouteConditions) -> Self {
        self.conditions = conditions;
        self
    }

    /// Override the approver count for escalated requests
    pub fn with_required_approvers(mut self, count: usize) -> Self {
        self.required_approvers = Some(count);
        self
    }

    /// Override the timeout for escalated requests
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Enable or disable the rule
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// How a request should proceed, per the first matching rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Resolve as approved with a system decision
    Approve {
        /// Name of the rule that matched
        rule_name: String,
    },
    /// Resolve as rejected with a system decision
    Reject {
        /// Name of the rule that matched
        rule_name: String,
    },
    /// Hand the request to human approvers
    Escalate {
        /// Distinct approvals needed
        required_approvers: usize,
        /// Time allowed before the request times out
        timeout: Duration,
    },
}

/// First-match router over the registered approval rules
#[derive(Debug, Default)]
pub struct ApprovalRouter {
    rules: RwLock<Vec<ApprovalRule>>,
}

impl ApprovalRouter {
    /// Create a router with no rules; unmatched requests escalate with
    /// their own defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a routing rule
    pub fn add_rule(&self, rule: ApprovalRule) -> Result<RuleId> {
        if rule.name.trim().is_empty() {
            return Err(Error::invalid_rule("<unnamed>", "rule name must not be empty"));
        }
        if rule.required_approvers == Some(0) {
            return Err(Error::invalid_rule(
                &rule.name,
                "required_approvers must be at least 1",
            ));
        }

        let id = rule.id;
        tracing::debug!(rule = %rule.name, action = ?rule.action, "approval rule registered");
        self.rules.write().push(rule);
        Ok(id)
    }

    /// Remove a rule by ID; returns false if the ID is unknown
    pub fn remove_rule(&self, id: RuleId) -> bool {
        let mut rules = self.rules.write();
        let before = rules.len();
        rules.retain(|r| r.id != id);
        rules.len() < before
    }

    /// Defensive copy of the registered rules, in registration order
    pub fn rules(&self) -> Vec<ApprovalRule> {
        self.rules.read().clone()
    }

    /// Route `request` through the first matching enabled rule.
    ///
    /// Rule overrides win over the request's own approver count and timeout;
    /// with no match the request escalates with its own defaults.
    pub fn route(&self, request: &ApprovalRequest) -> RouteDecision {
        let rules = self.rules.read();
        for rule in rules.iter().filter(|r| r.enabled) {
            if !rule.conditions.matches(request) {
                continue;
            }

            tracing::debug!(
                request = %request.id,
                rule = %rule.name,
                action = ?rule.action,
                "approval rule matched"
            );

            return match rule.action {
                RouteAction::Approve => RouteDecision::Approve {
                    rule_name: rule.name.clone(),
                },
                RouteAction::Reject => RouteDecision::Reject {
                    rule_name: rule.name.clone(),
                },
                RouteAction::RequireApproval => RouteDecision::Escalate {
                    required_approvers: rule
                        .required_approvers
                        .unwrap_or(request.required_approvers),
                    timeout: rule
                        .timeout_ms
                        .map(Duration::from_millis)
                        .unwrap_or(request.timeout),
                },
            };
        }

        RouteDecision::Escalate {
            required_approvers: request.required_approvers,
            timeout: request.timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::RequestType;

    fn request(operation: &str, sensitivity: Sensitivity) -> ApprovalRequest {
        ApprovalRequest::new(RequestType::ToolExecution, "assistant", operation, sensitivity)
    }

    #[test]
    fn unmatched_request_escalates_with_defaults() {
        let router = ApprovalRouter::new();
        let req = request("delete_data", Sensitivity::High);

        assert_eq!(
            router.route(&req),
            RouteDecision::Escalate {
                required_approvers: 1,
                timeout: Duration::from_secs(300),
            }
        );
    }

    #[test]
    fn low_sensitivity_reads_auto_approve() {
        let router = ApprovalRouter::new();
        router
            .add_rule(
                ApprovalRule::new("auto-approve-low", RouteAction::Approve).with_conditions(
                    RouteConditions {
                        sensitivity: vec![Sensitivity::Low],
                        keywords: vec!["read".to_string(), "list".to_string()],
                        ..Default::default()
                    },
                ),
            )
            .unwrap();

        let decision = router.route(&request("read_operation", Sensitivity::Low));
        assert_eq!(
            decision,
            RouteDecision::Approve {
                rule_name: "auto-approve-low".to_string()
            }
        );

        // Same keywords at high sensitivity fall through to defaults.
        let other = router.route(&request("read_operation", Sensitivity::High));
        assert!(matches!(other, RouteDecision::Escalate { .. }));
    }

    #[test]
    fn first_matching_rule_wins() {
        let router = ApprovalRouter::new();
        router
            .add_rule(ApprovalRule::new("reject-everything", RouteAction::Reject))
            .unwrap();
        router
            .add_rule(ApprovalRule::new("approve-everything", RouteAction::Approve))
            .unwrap();

        let decision = router.route(&request("anything", Sensitivity::Low));
        assert_eq!(
            decision,
            RouteDecision::Reject {
                rule_name: "reject-everything".to_string()
            }
        );
    }

    #[test]
    fn rule_overrides_win_over_request_defaults() {
        let router = ApprovalRouter::new();
        router
            .add_rule(
                ApprovalRule::new("destructive-ops", RouteAction::RequireApproval)
                    .with_conditions(RouteConditions {
                        keywords: vec!["delete".to_string()],
                        ..Default::default()
                    })
                    .with_required_approvers(2)
                    .with_timeout(Duration::from_secs(1800)),
            )
            .unwrap();

        let decision = router.route(&request("delete_data", Sensitivity::High));
        assert_eq!(
            decision,
            RouteDecision::Escalate {
                required_approvers: 2,
                timeout: Duration::from_secs(1800),
            }
        );
    }

    #[test]
    fn keywords_match_description_too() {
        let router = ApprovalRouter::new();
        router
            .add_rule(
                ApprovalRule::new("flag-exports", RouteAction::Reject).with_conditions(
                    RouteConditions {
                        keywords: vec!["export".to_string()],
                        ..Default::default()
                    },
                ),
            )
            .unwrap();

        let req = request("bulk_operation", Sensitivity::Medium)
            .with_description("Exports all customer rows");
        assert!(matches!(router.route(&req), RouteDecision::Reject { .. }));
    }

    #[test]
    fn disabled_rules_are_skipped() {
        let router = ApprovalRouter::new();
        router
            .add_rule(ApprovalRule::new("off", RouteAction::Reject).with_enabled(false))
            .unwrap();

        let decision = router.route(&request("anything", Sensitivity::Low));
        assert!(matches!(decision, RouteDecision::Escalate { .. }));
    }

    #[test]
    fn zero_approver_override_rejected() {
        let router = ApprovalRouter::new();
        let rule = ApprovalRule::new("bad", RouteAction::RequireApproval).with_required_approvers(0);
        assert!(matches!(rule.required_approvers, Some(0)));
        assert!(router.add_rule(rule).is_err());
    }

    #[test]
    fn remove_rule() {
        let router = ApprovalRouter::new();
        let id = router
            .add_rule(ApprovalRule::new("r", RouteAction::Approve))
            .unwrap();
        assert!(router.remove_rule(id));
        assert!(!router.remove_rule(id));
        assert!(router.rules().is_empty());
    }
}
