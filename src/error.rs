//! Error types for the vigil admission-control library

use thiserror::Error;

/// Result type alias for vigil operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the vigil library
#[derive(Debug, Error)]
pub enum Error {
    /// A rule failed validation at registration time
    #[error("Invalid rule '{rule}': {reason}")]
    InvalidRule { rule: String, reason: String },

    /// A regex pattern failed to compile at registration time
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Caller passed a structurally invalid request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Approval request was rejected
    #[error("Approval denied: {0}")]
    ApprovalDenied(String),

    /// Approval request timed out before resolution
    #[error("Approval timeout: {0}")]
    ApprovalTimeout(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rule-set file could not be parsed
    #[error("Rule set error: {0}")]
    RuleSet(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an invalid-rule error
    pub fn invalid_rule(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRule {
            rule: rule.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid-pattern error
    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid-input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a rule-set error
    pub fn rule_set(msg: impl Into<String>) -> Self {
        Self::RuleSet(msg.into())
    }

    /// Create an other error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}
