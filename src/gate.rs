//! The admission gate
//!
//! Composition root tying one guardrail engine to one approval coordinator.
//! Guardrail validation always runs first; approval routing is consulted
//! only when validation flagged the request for approval without blocking
//! it. Gates are explicitly constructed — no global state — so any number
//! can coexist in one process.

use crate::approval::{ApprovalDecision, ApprovalRequest, RequestType};
use crate::config::{CoordinatorConfig, EngineConfig, RuleSet};
use crate::coordinator::ApprovalCoordinator;
use crate::engine::{GuardrailEngine, ToolExecutionRequest, ValidationRequest, ValidationResult};
use crate::error::Result;
use crate::notify::ApprovalSink;
use crate::types::Sensitivity;
use std::sync::Arc;

/// Outcome of admitting a request through the gate
#[derive(Debug, Clone)]
pub enum Admission {
    /// Validation passed and no approval was required
    Granted {
        /// The validation verdict, including any sanitization
        validation: ValidationResult,
    },
    /// Validation failed; the request never reached approval routing
    Denied {
        /// The failed verdict
        validation: ValidationResult,
    },
    /// The request went through the approval workflow
    Decided {
        /// The validation verdict that triggered escalation
        validation: ValidationResult,
        /// The terminal approval decision
        decision: ApprovalDecision,
    },
}

impl Admission {
    /// True when the caller may proceed with the operation
    pub fn is_allowed(&self) -> bool {
        match self {
            Admission::Granted { .. } => true,
            Admission::Denied { .. } => false,
            Admission::Decided { decision, .. } => decision.approved,
        }
    }

    /// The validation verdict behind this admission
    pub fn validation(&self) -> &ValidationResult {
        match self {
            Admission::Granted { validation }
            | Admission::Denied { validation }
            | Admission::Decided { validation, .. } => validation,
        }
    }
}

/// One guardrail engine and one approval coordinator behind a single door
pub struct Gate {
    engine: Arc<GuardrailEngine>,
    coordinator: Arc<ApprovalCoordinator>,
}

impl Gate {
    /// Start building a gate
    pub fn builder() -> GateBuilder {
        GateBuilder::new()
    }

    /// A gate loaded with the built-in standard rule set
    pub fn standard() -> Result<Self> {
        Self::builder().rule_set(RuleSet::standard()).build()
    }

    /// The underlying guardrail engine
    pub fn engine(&self) -> &Arc<GuardrailEngine> {
        &self.engine
    }

    /// The underlying approval coordinator
    pub fn coordinator(&self) -> &Arc<ApprovalCoordinator> {
        &self.coordinator
    }

    /// Admit caller content.
    ///
    /// Flagged-but-unblocked content escalates as a medium-sensitivity
    /// operation using the coordinator's default timeout and quorum.
    pub async fn admit_input(
        &self,
        input: impl Into<ValidationRequest>,
        identity: Option<&str>,
    ) -> Result<Admission> {
        let validation = self.engine.validate_input(input, identity);
        if !validation.valid {
            return Ok(Admission::Denied { validation });
        }
        if !validation.requires_approval {
            return Ok(Admission::Granted { validation });
        }

        let agent = validation
            .sanitized
            .agent_type
            .clone()
            .unwrap_or_else(|| "agent".to_string());
        let config = self.coordinator.config();
        let request = ApprovalRequest::new(
            RequestType::SensitiveOperation,
            agent,
            "user_input",
            Sensitivity::Medium,
        )
        .with_description(validation.sanitized.content.clone())
        .with_timeout(config.default_timeout)
        .with_required_approvers(config.default_required_approvers);

        let decision = self.coordinator.request_approval(request).await?;
        Ok(Admission::Decided {
            validation,
            decision,
        })
    }

    /// Admit a proposed tool invocation at the given sensitivity.
    pub async fn admit_tool(
        &self,
        request: &ToolExecutionRequest,
        identity: Option<&str>,
        sensitivity: Sensitivity,
    ) -> Result<Admission> {
        let validation = self.engine.validate_tool_execution(request, identity);
        if !validation.valid {
            return Ok(Admission::Denied { validation });
        }
        if !validation.requires_approval {
            return Ok(Admission::Granted { validation });
        }

        let config = self.coordinator.config();
        let approval = ApprovalRequest::new(
            RequestType::ToolExecution,
            request.agent_name.clone(),
            request.tool_name.clone(),
            sensitivity,
        )
        .with_description(validation.sanitized.content.clone())
        .with_timeout(config.default_timeout)
        .with_required_approvers(config.default_required_approvers);

        let decision = self.coordinator.request_approval(approval).await?;
        Ok(Admission::Decided {
            validation,
            decision,
        })
    }
}

/// Builder for [`Gate`]
pub struct GateBuilder {
    engine_config: EngineConfig,
    coordinator_config: CoordinatorConfig,
    sink: Option<Arc<dyn ApprovalSink>>,
    rule_set: Option<RuleSet>,
}

impl GateBuilder {
    /// Create a builder with default configuration and no rules
    pub fn new() -> Self {
        Self {
            engine_config: EngineConfig::default(),
            coordinator_config: CoordinatorConfig::default(),
            sink: None,
            rule_set: None,
        }
    }

    /// Set the engine configuration
    pub fn engine_config(mut self, config: EngineConfig) -> Self {
        self.engine_config = config;
        self
    }

    /// Set the coordinator configuration
    pub fn coordinator_config(mut self, config: CoordinatorConfig) -> Self {
        self.coordinator_config = config;
        self
    }

    /// Set the approval notification sink
    pub fn sink(mut self, sink: Arc<dyn ApprovalSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Install a rule set at build time
    pub fn rule_set(mut self, rule_set: RuleSet) -> Self {
        self.rule_set = Some(rule_set);
        self
    }

    /// Build the gate, registering every rule in the configured rule set
    pub fn build(self) -> Result<Gate> {
        let engine = Arc::new(GuardrailEngine::new(self.engine_config));
        let coordinator = Arc::new(match self.sink {
            Some(sink) => ApprovalCoordinator::with_sink(self.coordinator_config, sink),
            None => ApprovalCoordinator::new(self.coordinator_config),
        });

        if let Some(rule_set) = self.rule_set {
            for rule in rule_set.guardrails {
                engine.add_rule(rule)?;
            }
            for rule in rule_set.approvals {
                coordinator.add_rule(rule)?;
            }
        }

        Ok(Gate {
            engine,
            coordinator,
        })
    }
}

impl Default for GateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
