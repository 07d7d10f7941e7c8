//! Guardrail rule engine
//!
//! Evaluates content and tool invocations against the registered rule list,
//! consulting the rate limiter first and the pattern library for
//! sanitization. Evaluation is synchronous per call and safe under
//! concurrent callers sharing one engine instance.

use crate::config::EngineConfig;
use crate::error::Result;
use crate::ledger::{Violation, ViolationLedger};
use crate::patterns::{find_keyword, PatternLibrary, DEFAULT_REDACTION};
use crate::rate_limit::{RateLimitSettings, SlidingWindowLimiter};
use crate::rules::{CompiledRule, GuardrailRule, RuleAction, RuleType};
use crate::types::{Identity, RuleId};
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Reason string returned when the rate limiter blocks a request
pub const RATE_LIMIT_REASON: &str = "Rate limit exceeded";

/// Normalized input to guardrail validation.
///
/// Callers may pass a raw string, a structured request, or loose JSON via
/// [`ValidationRequest::from_value`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationRequest {
    /// The content under validation
    pub content: String,
    /// Type of the requesting agent, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,
    /// Tool being invoked, for tool-execution validation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Role of the human principal behind the request, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_role: Option<String>,
    /// Arbitrary request metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl ValidationRequest {
    /// Wrap raw content with no metadata
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    /// Normalize loosely-shaped caller JSON.
    ///
    /// Accepts a bare string or an object with a string `content` field;
    /// anything else is a shape error reported to the caller as a failed
    /// validation, not an escaped error.
    pub fn from_value(value: &serde_json::Value) -> std::result::Result<Self, String> {
        match value {
            serde_json::Value::String(s) => Ok(Self::content(s.clone())),
            serde_json::Value::Object(map) => {
                let content = map
                    .get("content")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| {
                        "input object is missing a string 'content' field".to_string()
                    })?
                    .to_string();

                let field = |key: &str| {
                    map.get(key)
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string())
                };

                Ok(Self {
                    content,
                    agent_type: field("agent_type"),
                    tool_name: field("tool_name"),
                    user_role: field("user_role"),
                    context: HashMap::new(),
                })
            }
            _ => Err("input must be a string or an object with a 'content' field".to_string()),
        }
    }
}

impl From<&str> for ValidationRequest {
    fn from(s: &str) -> Self {
        Self::content(s)
    }
}

impl From<String> for ValidationRequest {
    fn from(s: String) -> Self {
        Self::content(s)
    }
}

/// A proposed tool invocation submitted for validation before execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecutionRequest {
    /// Name of the tool the agent wants to invoke
    pub tool_name: String,
    /// Tool call parameters
    pub parameters: serde_json::Value,
    /// Agent issuing the call
    pub agent_name: String,
    /// Arbitrary request metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

/// Outcome of one guardrail evaluation.
///
/// Constructed fresh per call, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    /// False when the request was blocked or structurally invalid
    pub valid: bool,
    /// Possibly-sanitized copy of the input
    pub sanitized: ValidationRequest,
    /// Hard failures (block reasons, shape errors)
    pub errors: Vec<String>,
    /// Non-fatal findings (sanitizations, soft limits)
    pub warnings: Vec<String>,
    /// True only when an explicit block fired
    pub blocked: bool,
    /// True when a matched rule routes the request to human approval
    pub requires_approval: bool,
    /// Human-readable cause of a block
    pub reason: Option<String>,
}

impl ValidationResult {
    fn pass(sanitized: ValidationRequest) -> Self {
        Self {
            valid: true,
            sanitized,
            errors: Vec::new(),
            warnings: Vec::new(),
            blocked: false,
            requires_approval: false,
            reason: None,
        }
    }

    fn shape_error(error: String) -> Self {
        Self {
            valid: false,
            sanitized: ValidationRequest::default(),
            errors: vec![error],
            warnings: Vec::new(),
            blocked: false,
            requires_approval: false,
            reason: None,
        }
    }

    fn blocked(sanitized: ValidationRequest, reason: String, warnings: Vec<String>) -> Self {
        Self {
            valid: false,
            sanitized,
            errors: vec![reason.clone()],
            warnings,
            blocked: true,
            requires_approval: false,
            reason: Some(reason),
        }
    }
}

/// Aggregate counters over rules and recorded violations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailStats {
    /// Registered rules, including disabled ones
    pub total_rules: usize,
    /// Currently enabled rules
    pub enabled_rules: usize,
    /// Rule counts grouped by rule type
    pub rules_by_type: HashMap<String, usize>,
    /// Total recorded violations
    pub total_violations: usize,
    /// Violation counts grouped by rule type
    pub violations_by_type: HashMap<String, usize>,
}

/// What a single rule decided for the working content
enum RuleOutcome {
    Pass,
    Warn(String),
    Sanitized { content: String, warning: String },
    RequireApproval,
    Block { reason: String },
}

/// The guardrail rule engine.
///
/// Owns the rule list, the rate limiter, and the violation ledger. Multiple
/// engines can coexist; nothing is global.
pub struct GuardrailEngine {
    rules: RwLock<Vec<CompiledRule>>,
    patterns: PatternLibrary,
    limiter: SlidingWindowLimiter,
    ledger: ViolationLedger,
}

impl GuardrailEngine {
    /// Create an engine with the given configuration and no rules
    pub fn new(config: EngineConfig) -> Self {
        Self {
            rules: RwLock::new(Vec::new()),
            patterns: PatternLibrary::new(),
            limiter: SlidingWindowLimiter::new(RateLimitSettings {
                max_requests: config.max_requests,
                window: config.window,
            }),
            ledger: ViolationLedger::new(config.ledger_cap),
        }
    }

    /// Register a rule, compiling its patterns.
    ///
    /// Invalid patterns reject the rule here; evaluation never compiles.
    /// Registering an enabled `rate_limit` rule overlays its
    /// `max_requests`/`window_ms` config onto the engine's limiter.
    pub fn add_rule(&self, rule: GuardrailRule) -> Result<RuleId> {
        let compiled = CompiledRule::compile(rule)?;
        let id = compiled.rule.id;

        if compiled.rule.rule_type == RuleType::RateLimit && compiled.rule.enabled {
            let current = self.limiter.settings();
            self.limiter.update_settings(RateLimitSettings {
                max_requests: compiled.rule.config.max_requests.unwrap_or(current.max_requests),
                window: compiled
                    .rule
                    .config
                    .window_ms
                    .map(Duration::from_millis)
                    .unwrap_or(current.window),
            });
        }

        tracing::debug!(
            rule = %compiled.rule.name,
            rule_type = compiled.rule.rule_type.as_str(),
            "guardrail rule registered"
        );
        self.rules.write().push(compiled);
        Ok(id)
    }

    /// Remove a rule by ID; returns false if the ID is unknown
    pub fn remove_rule(&self, id: RuleId) -> bool {
        let mut rules = self.rules.write();
        let before = rules.len();
        rules.retain(|c| c.rule.id != id);
        rules.len() < before
    }

    /// Defensive copy of the registered rules, in registration order
    pub fn rules(&self) -> Vec<GuardrailRule> {
        self.rules.read().iter().map(|c| c.rule.clone()).collect()
    }

    /// Validate caller content against all enabled rules.
    ///
    /// When `identity` is supplied the rate limiter is consulted first; an
    /// exhausted window blocks without evaluating any rule.
    pub fn validate_input(
        &self,
        input: impl Into<ValidationRequest>,
        identity: Option<&str>,
    ) -> ValidationResult {
        self.validate(input.into(), identity, false)
    }

    /// Validate loosely-shaped caller JSON.
    ///
    /// Shape failures surface as a failed [`ValidationResult`], never as an
    /// escaped error.
    pub fn validate_value(
        &self,
        value: &serde_json::Value,
        identity: Option<&str>,
    ) -> ValidationResult {
        match ValidationRequest::from_value(value) {
            Ok(request) => self.validate(request, identity, false),
            Err(e) => ValidationResult::shape_error(e),
        }
    }

    /// Validate a proposed tool invocation.
    ///
    /// Only rules scoped to the tool or agent type (or global rules with
    /// neither condition) participate.
    pub fn validate_tool_execution(
        &self,
        request: &ToolExecutionRequest,
        identity: Option<&str>,
    ) -> ValidationResult {
        if request.tool_name.trim().is_empty() {
            return ValidationResult::shape_error("tool_name must not be empty".to_string());
        }

        let content = serde_json::to_string(&request.parameters).unwrap_or_default();
        let normalized = ValidationRequest {
            content,
            agent_type: Some(request.agent_name.clone()),
            tool_name: Some(request.tool_name.clone()),
            user_role: None,
            context: request.context.clone(),
        };
        self.validate(normalized, identity, true)
    }

    /// Violations for one identity, or across all identities
    pub fn violation_history(&self, identity: Option<&str>) -> Vec<Violation> {
        match identity {
            Some(id) => self.ledger.history(id),
            None => self.ledger.all(),
        }
    }

    /// Rule and violation counters grouped by rule type
    pub fn stats(&self) -> GuardrailStats {
        let rules = self.rules.read();
        let mut rules_by_type: HashMap<String, usize> = HashMap::new();
        for c in rules.iter() {
            *rules_by_type
                .entry(c.rule.rule_type.as_str().to_string())
                .or_insert(0) += 1;
        }

        GuardrailStats {
            total_rules: rules.len(),
            enabled_rules: rules.iter().filter(|c| c.rule.enabled).count(),
            rules_by_type,
            total_violations: self.ledger.total(),
            violations_by_type: self
                .ledger
                .counts_by_rule_type()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }

    fn validate(
        &self,
        request: ValidationRequest,
        identity: Option<&str>,
        tool_call: bool,
    ) -> ValidationResult {
        let ledger_key = identity.unwrap_or(Identity::ANONYMOUS);

        if let Some(id) = identity {
            if !self.limiter.check(id) {
                tracing::warn!(identity = id, "request rate limited");
                self.record_rate_limit_violation(ledger_key, &request.content);
                return ValidationResult::blocked(
                    request,
                    RATE_LIMIT_REASON.to_string(),
                    Vec::new(),
                );
            }
        }

        let mut working = request;
        let mut warnings: Vec<String> = Vec::new();
        let mut requires_approval = false;

        let rules = self.rules.read();
        for compiled in rules.iter().filter(|c| c.rule.enabled) {
            if !self.rule_applies(compiled, &working, tool_call) {
                continue;
            }

            match self.evaluate_rule(compiled, &working) {
                Ok(RuleOutcome::Pass) => {}
                Ok(RuleOutcome::Warn(w)) => warnings.push(w),
                Ok(RuleOutcome::Sanitized { content, warning }) => {
                    warnings.push(warning);
                    working.content = content;
                }
                Ok(RuleOutcome::RequireApproval) => {
                    requires_approval = true;
                }
                Ok(RuleOutcome::Block { reason }) => {
                    tracing::warn!(
                        rule = %compiled.rule.name,
                        identity = ledger_key,
                        reason = %reason,
                        "guardrail blocked request"
                    );
                    self.ledger.record(Violation {
                        timestamp: Utc::now(),
                        identity: Identity::new(ledger_key),
                        rule_id: compiled.rule.id,
                        rule_name: compiled.rule.name.clone(),
                        rule_type: compiled.rule.rule_type,
                        input: working.content.clone(),
                    });
                    return ValidationResult::blocked(working, reason, warnings);
                }
                // A misconfigured rule degrades to a warning; evaluation
                // continues with the remaining rules.
                Err(e) => {
                    tracing::warn!(rule = %compiled.rule.name, error = %e, "rule failed to execute");
                    warnings.push(format!("rule {} failed to execute", compiled.rule.name));
                }
            }
        }
        drop(rules);

        let mut result = ValidationResult::pass(working);
        result.warnings = warnings;
        result.requires_approval = requires_approval;
        result
    }

    /// Pre-filter: agent-type / tool / user-role conditions must all hold.
    fn rule_applies(
        &self,
        compiled: &CompiledRule,
        request: &ValidationRequest,
        tool_call: bool,
    ) -> bool {
        let conditions = &compiled.rule.conditions;

        if tool_call
            && !conditions.matches_tool(request.tool_name.as_deref(), request.agent_type.as_deref())
        {
            return false;
        }

        if !tool_call && !conditions.agent_types.is_empty() {
            let matched = request
                .agent_type
                .as_deref()
                .is_some_and(|a| conditions.agent_types.iter().any(|t| t == a));
            if !matched {
                return false;
            }
        }

        if !conditions.user_roles.is_empty() {
            let matched = request
                .user_role
                .as_deref()
                .is_some_and(|r| conditions.user_roles.iter().any(|t| t == r));
            if !matched {
                return false;
            }
        }

        true
    }

    fn evaluate_rule(&self, compiled: &CompiledRule, working: &ValidationRequest) -> Result<RuleOutcome> {
        let rule = &compiled.rule;
        let content = &working.content;

        let outcome = match rule.rule_type {
            RuleType::ContentFilter => match rule.action {
                RuleAction::Sanitize => {
                    let replacement = rule
                        .config
                        .replacement
                        .as_deref()
                        .unwrap_or(DEFAULT_REDACTION);
                    let (redacted, matched) = self.patterns.redact(content, replacement);
                    if matched.is_empty() {
                        RuleOutcome::Pass
                    } else {
                        RuleOutcome::Sanitized {
                            content: redacted,
                            warning: format!(
                                "rule {} sanitized sensitive data: {}",
                                rule.name,
                                matched.join(", ")
                            ),
                        }
                    }
                }
                _ => match find_keyword(content, &rule.conditions.keywords) {
                    Some(keyword) => match rule.action {
                        RuleAction::Block => RuleOutcome::Block {
                            reason: format!(
                                "Blocked keyword '{}' matched rule {}",
                                keyword, rule.name
                            ),
                        },
                        RuleAction::RequireApproval => RuleOutcome::RequireApproval,
                        _ => RuleOutcome::Warn(format!(
                            "keyword '{}' matched rule {}",
                            keyword, rule.name
                        )),
                    },
                    None => RuleOutcome::Pass,
                },
            },
            RuleType::SecurityCheck => {
                match compiled
                    .patterns
                    .iter()
                    .find(|(_, re)| re.is_match(content))
                {
                    Some((source, _)) => RuleOutcome::Block {
                        reason: format!(
                            "Security rule {} matched pattern '{}'",
                            rule.name, source
                        ),
                    },
                    None => RuleOutcome::Pass,
                }
            }
            RuleType::DataValidation => {
                if let Some(max) = rule.config.max_length {
                    if content.len() > max {
                        return Ok(RuleOutcome::Block {
                            reason: format!(
                                "Content length {} exceeds maximum {} (rule {})",
                                content.len(),
                                max,
                                rule.name
                            ),
                        });
                    }
                }
                match rule.config.warn_length {
                    Some(warn) if content.len() > warn => RuleOutcome::Warn(format!(
                        "content length {} exceeds soft limit {} (rule {})",
                        content.len(),
                        warn,
                        rule.name
                    )),
                    _ => RuleOutcome::Pass,
                }
            }
            // Limiter runs before rule evaluation; nothing per-rule to do.
            RuleType::RateLimit => RuleOutcome::Pass,
            // Reserved extension point.
            RuleType::PermissionCheck => RuleOutcome::Pass,
        };

        Ok(outcome)
    }

    fn record_rate_limit_violation(&self, identity: &str, content: &str) {
        let rules = self.rules.read();
        if let Some(rule) = rules
            .iter()
            .map(|c| &c.rule)
            .find(|r| r.rule_type == RuleType::RateLimit && r.enabled)
        {
            self.ledger.record(Violation {
                timestamp: Utc::now(),
                identity: Identity::new(identity),
                rule_id: rule.id,
                rule_name: rule.name.clone(),
                rule_type: rule.rule_type,
                input: content.to_string(),
            });
        }
    }
}

impl Default for GuardrailEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
