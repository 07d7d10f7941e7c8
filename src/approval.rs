//! Approval request and decision model
//!
//! A pending sensitive operation, the votes cast on it, and the terminal
//! decision that resolves it. Requests are never mutated after resolution.

use crate::types::{RequestId, Sensitivity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Approver ID recorded on system-generated terminal decisions
pub const SYSTEM_APPROVER: &str = "system";

/// Reason recorded when a request times out unresolved
pub const TIMEOUT_REASON: &str = "Approval request timed out";

/// Default time a request may stay pending
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Default number of distinct approvals required
pub const DEFAULT_REQUIRED_APPROVERS: usize = 1;

/// Type of operation requiring approval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    /// Tool execution
    ToolExecution,
    /// Data access
    DataAccess,
    /// External API call
    ExternalApi,
    /// Any other sensitive operation
    SensitiveOperation,
}

/// A pending sensitive operation awaiting a decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Unique request identifier, generated at creation
    #[serde(default)]
    pub id: RequestId,
    /// Kind of operation
    pub request_type: RequestType,
    /// Agent asking to perform the operation
    pub agent_name: String,
    /// Operation identifier, e.g. `"delete_data"`
    pub operation: String,
    /// Human-readable description shown to approvers
    #[serde(default)]
    pub description: String,
    /// Arbitrary context for the approver
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
    /// Sensitivity of the operation
    pub sensitivity: Sensitivity,
    /// How long the request may stay pending
    #[serde(default = "default_timeout", with = "duration_millis")]
    pub timeout: Duration,
    /// Distinct approvals required to resolve as approved
    #[serde(default = "default_required_approvers")]
    pub required_approvers: usize,
    /// Arbitrary request metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn default_required_approvers() -> usize {
    DEFAULT_REQUIRED_APPROVERS
}

/// Serialize durations as integer milliseconds so rule files stay readable
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

impl ApprovalRequest {
    /// Create a request with default timeout and approver count
    pub fn new(
        request_type: RequestType,
        agent_name: impl Into<String>,
        operation: impl Into<String>,
        sensitivity: Sensitivity,
    ) -> Self {
        Self {
            id: RequestId::new(),
            request_type,
            agent_name: agent_name.into(),
            operation: operation.into(),
            description: String::new(),
            context: HashMap::new(),
            sensitivity,
            timeout: DEFAULT_TIMEOUT,
            required_approvers: DEFAULT_REQUIRED_APPROVERS,
            metadata: HashMap::new(),
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the required approver count
    pub fn with_required_approvers(mut self, count: usize) -> Self {
        self.required_approvers = count;
        self
    }

    /// Attach a context entry
    pub fn with_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }
}

/// One approver's vote, or a system-generated terminal decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalDecision {
    /// Request this decision belongs to
    pub request_id: RequestId,
    /// The vote
    pub approved: bool,
    /// Who decided; `"system"` for synthesized decisions
    pub approver_id: String,
    /// Why, when given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// When the decision was recorded
    pub timestamp: DateTime<Utc>,
    /// Caveats attached to an approval
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<String>,
}

impl ApprovalDecision {
    /// Record an approver's vote
    pub fn vote(
        request_id: RequestId,
        approver_id: impl Into<String>,
        approved: bool,
        reason: Option<String>,
        conditions: Vec<String>,
    ) -> Self {
        Self {
            request_id,
            approved,
            approver_id: approver_id.into(),
            reason,
            timestamp: Utc::now(),
            conditions,
        }
    }

    /// Synthesize a system decision
    pub fn system(request_id: RequestId, approved: bool, reason: impl Into<String>) -> Self {
        Self {
            request_id,
            approved,
            approver_id: SYSTEM_APPROVER.to_string(),
            reason: Some(reason.into()),
            timestamp: Utc::now(),
            conditions: Vec::new(),
        }
    }

    /// True for decisions synthesized by the coordinator
    pub fn is_system(&self) -> bool {
        self.approver_id == SYSTEM_APPROVER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults() {
        let req = ApprovalRequest::new(
            RequestType::ToolExecution,
            "assistant",
            "delete_data",
            Sensitivity::High,
        );
        assert_eq!(req.timeout, Duration::from_secs(300));
        assert_eq!(req.required_approvers, 1);
    }

    #[test]
    fn request_round_trips_with_millisecond_timeout() {
        let req = ApprovalRequest::new(
            RequestType::DataAccess,
            "assistant",
            "export",
            Sensitivity::Medium,
        )
        .with_timeout(Duration::from_millis(1500));

        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["timeout"], 1500);

        let back: ApprovalRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back.timeout, Duration::from_millis(1500));
        assert_eq!(back.id, req.id);
    }

    #[test]
    fn system_decisions_are_flagged() {
        let d = ApprovalDecision::system(RequestId::new(), false, TIMEOUT_REASON);
        assert!(d.is_system());
        assert!(!d.approved);
        assert_eq!(d.reason.as_deref(), Some(TIMEOUT_REASON));
    }
}
