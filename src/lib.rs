//! # Vigil
//!
//! Admission control for autonomous agents: every sensitive action — user
//! content, tool invocations, data access — passes through two cooperating
//! gates before it runs.
//!
//! - **Guardrail engine**: declarative rules that warn, sanitize, block, or
//!   flag content, backed by a sensitive-data pattern library, per-identity
//!   sliding-window rate limiting, and a capped violation ledger.
//! - **Approval workflow**: routing rules that auto-approve, auto-reject, or
//!   escalate flagged operations to one or more human approvers, suspending
//!   the caller until quorum, rejection, or timeout.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vigil::Gate;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // A gate loaded with the built-in policy set
//!     let gate = Gate::standard()?;
//!
//!     let admission = gate.admit_input("My SSN is 123-45-6789", Some("user-1")).await?;
//!     assert!(admission.is_allowed());
//!     assert_eq!(admission.validation().sanitized.content, "My SSN is [REDACTED]");
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod approval;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod gate;
pub mod ledger;
pub mod notify;
pub mod patterns;
pub mod rate_limit;
pub mod router;
pub mod rules;
pub mod types;

// Re-exports for convenience
pub use approval::{ApprovalDecision, ApprovalRequest, RequestType};
pub use config::{CoordinatorConfig, EngineConfig, RuleSet};
pub use coordinator::{
    ApprovalCoordinator, ApprovalStats, Approver, ResolutionOutcome, ResolvedApproval,
};
pub use engine::{
    GuardrailEngine, GuardrailStats, ToolExecutionRequest, ValidationRequest, ValidationResult,
};
pub use error::{Error, Result};
pub use gate::{Admission, Gate, GateBuilder};
pub use ledger::{Violation, ViolationLedger};
pub use notify::{ApprovalEvent, ApprovalSink, ChannelSink, NullSink};
pub use patterns::PatternLibrary;
pub use rate_limit::{RateLimitSettings, SlidingWindowLimiter};
pub use router::{ApprovalRouter, ApprovalRule, RouteAction, RouteDecision};
pub use rules::{GuardrailRule, RuleAction, RuleConditions, RuleConfig, RuleType};
pub use types::{Identity, RequestId, RuleId, Sensitivity, Severity};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::approval::{ApprovalDecision, ApprovalRequest, RequestType};
    pub use crate::config::RuleSet;
    pub use crate::engine::{GuardrailEngine, ToolExecutionRequest, ValidationRequest};
    pub use crate::error::{Error, Result};
    pub use crate::gate::{Admission, Gate};
    pub use crate::router::{ApprovalRule, RouteAction};
    pub use crate::rules::{GuardrailRule, RuleAction, RuleType};
    pub use crate::types::*;
}
