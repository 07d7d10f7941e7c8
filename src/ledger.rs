//! Append-only, capped, per-identity log of rule violations

use crate::rules::RuleType;
use crate::types::{Identity, RuleId};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Default maximum retained violations per identity
pub const DEFAULT_LEDGER_CAP: usize = 1000;

/// A single recorded rule violation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    /// When the violation was recorded
    pub timestamp: DateTime<Utc>,
    /// Caller the violation is attributed to
    pub identity: Identity,
    /// Rule that blocked the request
    pub rule_id: RuleId,
    /// Rule name at the time of the violation
    pub rule_name: String,
    /// Rule category, used for grouped statistics
    pub rule_type: RuleType,
    /// The offending input content
    pub input: String,
}

/// Capped per-identity violation history.
///
/// Appends evict the oldest entry once an identity reaches the cap.
#[derive(Debug)]
pub struct ViolationLedger {
    cap: usize,
    entries: DashMap<String, VecDeque<Violation>>,
}

impl ViolationLedger {
    /// Create a ledger retaining at most `cap` violations per identity
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            entries: DashMap::new(),
        }
    }

    /// Record a violation under its identity
    pub fn record(&self, violation: Violation) {
        let mut entry = self
            .entries
            .entry(violation.identity.as_str().to_string())
            .or_default();
        if entry.len() >= self.cap {
            entry.pop_front();
        }
        entry.push_back(violation);
    }

    /// Violations for one identity, oldest first
    pub fn history(&self, identity: &str) -> Vec<Violation> {
        self.entries
            .get(identity)
            .map(|e| e.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Violations across all identities, oldest first per identity
    pub fn all(&self) -> Vec<Violation> {
        let mut out = Vec::new();
        for entry in self.entries.iter() {
            out.extend(entry.value().iter().cloned());
        }
        out.sort_by_key(|v| v.timestamp);
        out
    }

    /// Total recorded violations
    pub fn total(&self) -> usize {
        self.entries.iter().map(|e| e.value().len()).sum()
    }

    /// Violation counts grouped by rule type
    pub fn counts_by_rule_type(&self) -> HashMap<&'static str, usize> {
        let mut counts = HashMap::new();
        for entry in self.entries.iter() {
            for v in entry.value() {
                *counts.entry(v.rule_type.as_str()).or_insert(0) += 1;
            }
        }
        counts
    }
}

impl Default for ViolationLedger {
    fn default() -> Self {
        Self::new(DEFAULT_LEDGER_CAP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violation(identity: &str, rule_type: RuleType) -> Violation {
        Violation {
            timestamp: Utc::now(),
            identity: Identity::new(identity),
            rule_id: RuleId::new(),
            rule_name: "test".to_string(),
            rule_type,
            input: "input".to_string(),
        }
    }

    #[test]
    fn records_per_identity() {
        let ledger = ViolationLedger::default();
        ledger.record(violation("a", RuleType::ContentFilter));
        ledger.record(violation("b", RuleType::SecurityCheck));

        assert_eq!(ledger.history("a").len(), 1);
        assert_eq!(ledger.history("b").len(), 1);
        assert_eq!(ledger.history("c").len(), 0);
        assert_eq!(ledger.total(), 2);
    }

    #[test]
    fn cap_evicts_oldest_first() {
        let ledger = ViolationLedger::new(3);
        for i in 0..5 {
            let mut v = violation("u", RuleType::ContentFilter);
            v.input = format!("input-{}", i);
            ledger.record(v);
        }

        let history = ledger.history("u");
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].input, "input-2");
        assert_eq!(history[2].input, "input-4");
    }

    #[test]
    fn counts_grouped_by_type() {
        let ledger = ViolationLedger::default();
        ledger.record(violation("u", RuleType::ContentFilter));
        ledger.record(violation("u", RuleType::ContentFilter));
        ledger.record(violation("u", RuleType::SecurityCheck));

        let counts = ledger.counts_by_rule_type();
        assert_eq!(counts["content_filter"], 2);
        assert_eq!(counts["security_check"], 1);
    }
}
