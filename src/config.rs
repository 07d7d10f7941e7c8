//! Configuration for the guardrail engine and approval coordinator
//!
//! Tunables come from explicit construction, `VIGIL_*` environment
//! variables, or rule-set files. Rule sets are plain serde documents so
//! every field of every rule round-trips losslessly through JSON or YAML.

use crate::error::{Error, Result};
use crate::patterns::DEFAULT_BLOCKED_KEYWORDS;
use crate::router::{ApprovalRule, RouteAction, RouteConditions};
use crate::rules::{GuardrailRule, RuleAction, RuleConditions, RuleConfig, RuleType};
use crate::types::{Sensitivity, Severity};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Guardrail engine tunables
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Default rate-limit ceiling per identity
    pub max_requests: usize,
    /// Default rate-limit window
    pub window: Duration,
    /// Retained violations per identity
    pub ledger_cap: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(60),
            ledger_cap: 1000,
        }
    }
}

impl EngineConfig {
    /// Build from `VIGIL_MAX_REQUESTS`, `VIGIL_WINDOW_MS`, and
    /// `VIGIL_LEDGER_CAP`, falling back to defaults.
    ///
    /// Loads `.env` if present so local development picks the values up.
    pub fn from_env() -> Result<Self> {
        let _ = dotenv();
        let defaults = Self::default();
        Ok(Self {
            max_requests: env_parse("VIGIL_MAX_REQUESTS")?.unwrap_or(defaults.max_requests),
            window: env_parse("VIGIL_WINDOW_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.window),
            ledger_cap: env_parse("VIGIL_LEDGER_CAP")?.unwrap_or(defaults.ledger_cap),
        })
    }
}

/// Approval coordinator tunables
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Timeout applied to requests built without one
    pub default_timeout: Duration,
    /// Approver count applied to requests built without one
    pub default_required_approvers: usize,
    /// Retained resolved requests
    pub history_cap: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(300),
            default_required_approvers: 1,
            history_cap: 1000,
        }
    }
}

impl CoordinatorConfig {
    /// Build from `VIGIL_APPROVAL_TIMEOUT_MS`, `VIGIL_REQUIRED_APPROVERS`,
    /// and `VIGIL_HISTORY_CAP`, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let _ = dotenv();
        let defaults = Self::default();
        Ok(Self {
            default_timeout: env_parse("VIGIL_APPROVAL_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.default_timeout),
            default_required_approvers: env_parse("VIGIL_REQUIRED_APPROVERS")?
                .unwrap_or(defaults.default_required_approvers),
            history_cap: env_parse("VIGIL_HISTORY_CAP")?.unwrap_or(defaults.history_cap),
        })
    }
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| Error::config(format!("{} has an invalid value: '{}'", key, raw))),
        Err(_) => Ok(None),
    }
}

/// A persistable set of guardrail and approval rules
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    /// Guardrail rules, in evaluation order
    #[serde(default)]
    pub guardrails: Vec<GuardrailRule>,
    /// Approval routing rules, in evaluation order
    #[serde(default)]
    pub approvals: Vec<ApprovalRule>,
}

impl RuleSet {
    /// The built-in policy set: sensitive-data sanitization, injection
    /// blocking, length limits, rate limiting, low-risk auto-approval, and
    /// escalation for destructive or critical operations.
    pub fn standard() -> Self {
        let guardrails = vec![
            GuardrailRule::new(
                "sensitive-data",
                RuleType::ContentFilter,
                RuleAction::Sanitize,
            )
            .with_description("Redacts SSNs, card numbers, emails, and credentials")
            .with_severity(Severity::High),
            GuardrailRule::new(
                "blocked-keywords",
                RuleType::ContentFilter,
                RuleAction::Block,
            )
            .with_description("Blocks destructive command phrases")
            .with_severity(Severity::Critical)
            .with_conditions(RuleConditions {
                keywords: DEFAULT_BLOCKED_KEYWORDS
                    .iter()
                    .map(|k| k.to_string())
                    .collect(),
                ..Default::default()
            }),
            GuardrailRule::new("sql-injection", RuleType::SecurityCheck, RuleAction::Block)
                .with_description("Blocks SQL injection attempts")
                .with_severity(Severity::Critical)
                .with_conditions(RuleConditions {
                    patterns: vec![
                        r"('|\s|^);?\s*drop\s+table".to_string(),
                        r"union\s+select".to_string(),
                        r"insert\s+into\s+\w+\s+values".to_string(),
                    ],
                    ..Default::default()
                }),
            GuardrailRule::new("shell-injection", RuleType::SecurityCheck, RuleAction::Block)
                .with_description("Blocks shell metacharacter abuse")
                .with_severity(Severity::Critical)
                .with_conditions(RuleConditions {
                    patterns: vec![
                        r"rm\s+-rf\s+/".to_string(),
                        r";\s*(?:sh|bash|zsh)\b".to_string(),
                        r"\$\((?:[^)]*)\)".to_string(),
                    ],
                    ..Default::default()
                }),
            GuardrailRule::new("content-length", RuleType::DataValidation, RuleAction::Block)
                .with_description("Caps content size")
                .with_severity(Severity::Low)
                .with_config(RuleConfig {
                    max_length: Some(50_000),
                    warn_length: Some(10_000),
                    ..Default::default()
                }),
            GuardrailRule::new("request-rate", RuleType::RateLimit, RuleAction::Block)
                .with_description("Per-identity sliding-window request ceiling")
                .with_severity(Severity::Medium)
                .with_config(RuleConfig {
                    max_requests: Some(100),
                    window_ms: Some(60_000),
                    ..Default::default()
                }),
        ];

        let approvals = vec![
            ApprovalRule::new("auto-approve-low", RouteAction::Approve)
                .with_description("Low-sensitivity read-style operations skip review")
                .with_conditions(RouteConditions {
                    sensitivity: vec![Sensitivity::Low],
                    keywords: vec![
                        "read".to_string(),
                        "list".to_string(),
                        "get".to_string(),
                        "view".to_string(),
                    ],
                    ..Default::default()
                }),
            ApprovalRule::new("destructive-operations", RouteAction::RequireApproval)
                .with_description("Destructive operations need two approvers")
                .with_conditions(RouteConditions {
                    keywords: vec![
                        "delete".to_string(),
                        "drop".to_string(),
                        "destroy".to_string(),
                        "wipe".to_string(),
                        "truncate".to_string(),
                    ],
                    ..Default::default()
                })
                .with_required_approvers(2)
                .with_timeout(Duration::from_secs(1800)),
            ApprovalRule::new("critical-sensitivity", RouteAction::RequireApproval)
                .with_description("Critical operations always escalate to two approvers")
                .with_conditions(RouteConditions {
                    sensitivity: vec![Sensitivity::Critical],
                    ..Default::default()
                })
                .with_required_approvers(2),
        ];

        Self {
            guardrails,
            approvals,
        }
    }

    /// Load a rule set from a `.json`, `.yaml`, or `.yml` file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&raw),
            Some("yaml") | Some("yml") => Self::from_yaml(&raw),
            other => Err(Error::rule_set(format!(
                "unsupported rule-set extension: {:?}",
                other
            ))),
        }
    }

    /// Parse a JSON rule set
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::rule_set(e.to_string()))
    }

    /// Parse a YAML rule set
    pub fn from_yaml(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).map_err(|e| Error::rule_set(e.to_string()))
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::rule_set(e.to_string()))
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::rule_set(e.to_string()))
    }
}
