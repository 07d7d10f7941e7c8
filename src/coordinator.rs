//! Approval coordination
//!
//! Holds pending approval requests, collects votes from approvers, and
//! resolves each request exactly once: on a rejection, on reaching quorum,
//! or on timeout, whichever fires first. Resolution is an atomic
//! check-and-remove on the pending map, so racing paths cannot both claim a
//! request; the losing paths become no-ops.

use crate::approval::{
    ApprovalDecision, ApprovalRequest, SYSTEM_APPROVER, TIMEOUT_REASON,
};
use crate::config::CoordinatorConfig;
use crate::error::{Error, Result};
use crate::notify::{ApprovalSink, NullSink};
use crate::router::{ApprovalRouter, ApprovalRule, RouteDecision};
use crate::types::{RequestId, RuleId};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::oneshot;

/// How a resolved request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionOutcome {
    /// Quorum of human approvals reached
    Approved,
    /// A human rejection arrived
    Rejected,
    /// The timeout elapsed with no resolution
    TimedOut,
    /// A routing rule approved without human involvement
    AutoApproved,
    /// A routing rule rejected without human involvement
    AutoRejected,
}

/// A resolved request folded into decision history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedApproval {
    /// The request as escalated (overrides applied)
    pub request: ApprovalRequest,
    /// The resolving decision
    pub decision: ApprovalDecision,
    /// Every vote recorded while the request was pending
    pub votes: Vec<ApprovalDecision>,
    /// How the request ended
    pub outcome: ResolutionOutcome,
    /// When the request was created
    pub created_at: DateTime<Utc>,
    /// When the request resolved
    pub resolved_at: DateTime<Utc>,
}

/// Aggregate approval statistics over a trailing window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalStats {
    /// Requests resolved inside the window
    pub total: usize,
    /// Approved, including auto-approvals
    pub approved: usize,
    /// Rejected, including auto-rejections
    pub rejected: usize,
    /// Timed out unresolved
    pub timed_out: usize,
    /// Resolved by a routing rule with no human involved
    pub auto_resolved: usize,
    /// Mean creation-to-resolution latency over manually-decided requests,
    /// in milliseconds; `None` when no request in the window was decided by
    /// a human
    pub avg_resolution_ms: Option<f64>,
}

/// A registered human approver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approver {
    /// Opaque approver identifier
    pub id: String,
    /// Display name
    pub name: String,
}

/// A request waiting for votes, with its one-shot completion channel.
///
/// The sender lives inside the pending entry: whoever removes the entry is
/// the only party that can ever complete the waiter.
struct PendingEntry {
    request: ApprovalRequest,
    votes: Vec<ApprovalDecision>,
    approved_by: HashSet<String>,
    created_at: DateTime<Utc>,
    tx: oneshot::Sender<ApprovalDecision>,
}

/// Collects approver decisions and resolves pending requests.
///
/// Explicitly constructed; multiple coordinators can coexist for testing.
pub struct ApprovalCoordinator {
    config: CoordinatorConfig,
    router: ApprovalRouter,
    sink: Arc<dyn ApprovalSink>,
    pending: Mutex<HashMap<RequestId, PendingEntry>>,
    history: Mutex<VecDeque<ResolvedApproval>>,
    approvers: RwLock<Vec<Approver>>,
}

impl ApprovalCoordinator {
    /// Create a coordinator with a no-op notification sink
    pub fn new(config: CoordinatorConfig) -> Self {
        Self::with_sink(config, Arc::new(NullSink))
    }

    /// Create a coordinator that reports lifecycle events to `sink`
    pub fn with_sink(config: CoordinatorConfig, sink: Arc<dyn ApprovalSink>) -> Self {
        Self {
            config,
            router: ApprovalRouter::new(),
            sink,
            pending: Mutex::new(HashMap::new()),
            history: Mutex::new(VecDeque::new()),
            approvers: RwLock::new(Vec::new()),
        }
    }

    /// Coordinator configuration
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Register a routing rule
    pub fn add_rule(&self, rule: ApprovalRule) -> Result<RuleId> {
        self.router.add_rule(rule)
    }

    /// Remove a routing rule by ID
    pub fn remove_rule(&self, id: RuleId) -> bool {
        self.router.remove_rule(id)
    }

    /// Defensive copy of the routing rules
    pub fn rules(&self) -> Vec<ApprovalRule> {
        self.router.rules()
    }

    /// Register a human approver; duplicate IDs are ignored
    pub fn register_approver(&self, id: impl Into<String>, name: impl Into<String>) {
        let approver = Approver {
            id: id.into(),
            name: name.into(),
        };
        let mut approvers = self.approvers.write();
        if !approvers.iter().any(|a| a.id == approver.id) {
            approvers.push(approver);
        }
    }

    /// Registered approvers
    pub fn approvers(&self) -> Vec<Approver> {
        self.approvers.read().clone()
    }

    /// Submit a sensitive operation and suspend until it resolves.
    ///
    /// Routing happens first: an `approve`/`reject` rule resolves the call
    /// synchronously with a system decision and the request never enters the
    /// pending set. Escalated requests suspend until a rejection, quorum, or
    /// the timeout — whichever happens first. The outcome is always a
    /// terminal [`ApprovalDecision`]; callers branch on `approved`.
    ///
    /// This is a long-latency operation: an escalated request can suspend
    /// for its full timeout. Do not block a shared worker pool on it.
    pub async fn request_approval(
        &self,
        mut request: ApprovalRequest,
    ) -> Result<ApprovalDecision> {
        if request.agent_name.trim().is_empty() {
            return Err(Error::invalid_input("agent_name must not be empty"));
        }
        if request.operation.trim().is_empty() {
            return Err(Error::invalid_input("operation must not be empty"));
        }
        if request.required_approvers == 0 {
            return Err(Error::invalid_input("required_approvers must be at least 1"));
        }

        match self.router.route(&request) {
            RouteDecision::Approve { rule_name } => {
                let decision = ApprovalDecision::system(
                    request.id,
                    true,
                    format!("Auto-approved by rule {}", rule_name),
                );
                self.record_auto_resolution(request, decision.clone(), ResolutionOutcome::AutoApproved)
                    .await;
                Ok(decision)
            }
            RouteDecision::Reject { rule_name } => {
                let decision = ApprovalDecision::system(
                    request.id,
                    false,
                    format!("Auto-rejected by rule {}", rule_name),
                );
                self.record_auto_resolution(request, decision.clone(), ResolutionOutcome::AutoRejected)
                    .await;
                Ok(decision)
            }
            RouteDecision::Escalate {
                required_approvers,
                timeout,
            } => {
                request.required_approvers = required_approvers;
                request.timeout = timeout;
                self.escalate(request).await
            }
        }
    }

    /// Record one approver's vote on a pending request.
    ///
    /// Returns `false` when the request is unknown or already resolved. A
    /// rejection resolves the request immediately; an approval counts once
    /// per distinct approver and resolves the request when quorum is
    /// reached, otherwise a progress notification is emitted and the
    /// request stays pending under its original timer.
    pub async fn submit_approval(
        &self,
        request_id: RequestId,
        approver_id: &str,
        approved: bool,
        reason: Option<String>,
        conditions: Vec<String>,
    ) -> bool {
        let decision =
            ApprovalDecision::vote(request_id, approver_id, approved, reason, conditions);

        enum Step {
            Resolved(PendingEntry, ApprovalDecision, ResolutionOutcome),
            Progress(usize, usize),
        }

        let step = {
            let mut pending = self.pending.lock();
            let Some(entry) = pending.get_mut(&request_id) else {
                drop(pending);
                tracing::warn!(
                    request = %request_id,
                    approver = approver_id,
                    "vote on unknown or already-resolved approval request"
                );
                return false;
            };

            entry.votes.push(decision.clone());

            if !approved {
                let entry = pending.remove(&request_id).expect("entry present");
                Step::Resolved(entry, decision, ResolutionOutcome::Rejected)
            } else {
                entry.approved_by.insert(approver_id.to_string());
                let received = entry.approved_by.len();
                let required = entry.request.required_approvers;
                if received >= required {
                    let entry = pending.remove(&request_id).expect("entry present");
                    Step::Resolved(entry, decision, ResolutionOutcome::Approved)
                } else {
                    Step::Progress(received, required)
                }
            }
        };

        match step {
            Step::Resolved(entry, decision, outcome) => {
                self.resolve_entry(entry, decision, outcome).await;
            }
            Step::Progress(received, required) => {
                tracing::debug!(
                    request = %request_id,
                    approver = approver_id,
                    received,
                    required,
                    "approval progress"
                );
                self.sink.progress(request_id, received, required).await;
            }
        }

        true
    }

    /// Requests currently awaiting decisions
    pub fn pending_approvals(&self) -> Vec<ApprovalRequest> {
        self.pending
            .lock()
            .values()
            .map(|e| e.request.clone())
            .collect()
    }

    /// Resolved requests, most recent first, up to `limit`
    pub fn approval_history(&self, limit: usize) -> Vec<ResolvedApproval> {
        self.history
            .lock()
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    /// Statistics over requests resolved in the last `days` days
    pub fn approval_stats(&self, days: i64) -> ApprovalStats {
        let cutoff = Utc::now() - ChronoDuration::days(days);
        let history = self.history.lock();

        let mut stats = ApprovalStats {
            total: 0,
            approved: 0,
            rejected: 0,
            timed_out: 0,
            auto_resolved: 0,
            avg_resolution_ms: None,
        };

        let mut manual_latency_ms = 0.0;
        let mut manual_count = 0usize;

        for resolved in history.iter().filter(|r| r.resolved_at >= cutoff) {
            stats.total += 1;
            match resolved.outcome {
                ResolutionOutcome::Approved => stats.approved += 1,
                ResolutionOutcome::Rejected => stats.rejected += 1,
                ResolutionOutcome::TimedOut => stats.timed_out += 1,
                ResolutionOutcome::AutoApproved => {
                    stats.approved += 1;
                    stats.auto_resolved += 1;
                }
                ResolutionOutcome::AutoRejected => {
                    stats.rejected += 1;
                    stats.auto_resolved += 1;
                }
            }

            if !resolved.decision.is_system() {
                let latency = resolved.resolved_at - resolved.created_at;
                manual_latency_ms += latency.num_milliseconds() as f64;
                manual_count += 1;
            }
        }

        if manual_count > 0 {
            stats.avg_resolution_ms = Some(manual_latency_ms / manual_count as f64);
        }
        stats
    }

    async fn escalate(&self, request: ApprovalRequest) -> Result<ApprovalDecision> {
        let id = request.id;
        let timeout = request.timeout;
        let (tx, mut rx) = oneshot::channel();

        {
            let mut pending = self.pending.lock();
            pending.insert(
                id,
                PendingEntry {
                    request: request.clone(),
                    votes: Vec::new(),
                    approved_by: HashSet::new(),
                    created_at: Utc::now(),
                    tx,
                },
            );
        }

        tracing::info!(
            request = %id,
            operation = %request.operation,
            required_approvers = request.required_approvers,
            timeout_ms = timeout.as_millis() as u64,
            "approval request escalated"
        );
        self.sink.requested(&request).await;

        match tokio::time::timeout(timeout, &mut rx).await {
            Ok(Ok(decision)) => Ok(decision),
            Ok(Err(_)) => Err(Error::other("approval channel closed before resolution")),
            Err(_) => {
                // Timer fired. Claiming the entry decides the race: if it is
                // already gone, a decision won and is sitting in the channel.
                match self.claim_timeout(id).await {
                    Some(decision) => Ok(decision),
                    None => rx
                        .await
                        .map_err(|_| Error::other("approval channel closed before resolution")),
                }
            }
        }
    }

    /// Resolve a timed-out request, unless another path already claimed it.
    async fn claim_timeout(&self, id: RequestId) -> Option<ApprovalDecision> {
        let entry = self.pending.lock().remove(&id)?;
        let decision = ApprovalDecision::system(id, false, TIMEOUT_REASON);
        tracing::info!(request = %id, "approval request timed out");
        self.push_history(ResolvedApproval {
            request: entry.request,
            decision: decision.clone(),
            votes: entry.votes,
            outcome: ResolutionOutcome::TimedOut,
            created_at: entry.created_at,
            resolved_at: Utc::now(),
        });
        self.sink.resolved(&decision).await;
        Some(decision)
    }

    /// Complete a claimed entry: history first, then wake the waiter, then
    /// notify.
    async fn resolve_entry(
        &self,
        entry: PendingEntry,
        decision: ApprovalDecision,
        outcome: ResolutionOutcome,
    ) {
        tracing::info!(
            request = %decision.request_id,
            approver = %decision.approver_id,
            approved = decision.approved,
            outcome = ?outcome,
            "approval request resolved"
        );
        self.push_history(ResolvedApproval {
            request: entry.request,
            decision: decision.clone(),
            votes: entry.votes,
            outcome,
            created_at: entry.created_at,
            resolved_at: Utc::now(),
        });
        // The waiter may have vanished (caller dropped); resolution stands.
        let _ = entry.tx.send(decision.clone());
        self.sink.resolved(&decision).await;
    }

    async fn record_auto_resolution(
        &self,
        request: ApprovalRequest,
        decision: ApprovalDecision,
        outcome: ResolutionOutcome,
    ) {
        debug_assert_eq!(decision.approver_id, SYSTEM_APPROVER);
        tracing::info!(
            request = %request.id,
            operation = %request.operation,
            approved = decision.approved,
            "approval request auto-resolved"
        );
        let now = Utc::now();
        self.push_history(ResolvedApproval {
            request,
            decision: decision.clone(),
            votes: Vec::new(),
            outcome,
            created_at: now,
            resolved_at: now,
        });
        self.sink.resolved(&decision).await;
    }

    fn push_history(&self, resolved: ResolvedApproval) {
        let mut history = self.history.lock();
        if history.len() >= self.config.history_cap {
            history.pop_front();
        }
        history.push_back(resolved);
    }
}

impl Default for ApprovalCoordinator {
    fn default() -> Self {
        Self::new(CoordinatorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::RequestType;
    use crate::notify::{ApprovalEvent, ChannelSink};
    use crate::router::{RouteAction, RouteConditions};
    use crate::types::Sensitivity;
    use std::time::Duration;

    fn request(operation: &str, sensitivity: Sensitivity) -> ApprovalRequest {
        ApprovalRequest::new(RequestType::SensitiveOperation, "assistant", operation, sensitivity)
    }

    fn coordinator_with_sink() -> (
        Arc<ApprovalCoordinator>,
        tokio::sync::mpsc::UnboundedReceiver<ApprovalEvent>,
    ) {
        let (sink, rx) = ChannelSink::new();
        let coordinator = Arc::new(ApprovalCoordinator::with_sink(
            CoordinatorConfig::default(),
            Arc::new(sink),
        ));
        (coordinator, rx)
    }

    async fn wait_for_request(
        rx: &mut tokio::sync::mpsc::UnboundedReceiver<ApprovalEvent>,
    ) -> RequestId {
        loop {
            match rx.recv().await.expect("sink open") {
                ApprovalEvent::Requested { request } => return request.id,
                _ => continue,
            }
        }
    }

    #[tokio::test]
    async fn single_approval_resolves_request() {
        let (coordinator, mut rx) = coordinator_with_sink();

        let waiter = {
            let c = coordinator.clone();
            tokio::spawn(async move {
                c.request_approval(request("delete_data", Sensitivity::High))
                    .await
            })
        };

        let id = wait_for_request(&mut rx).await;
        assert_eq!(coordinator.pending_approvals().len(), 1);

        assert!(
            coordinator
                .submit_approval(id, "alice", true, Some("looks fine".to_string()), vec![])
                .await
        );

        let decision = waiter.await.unwrap().unwrap();
        assert!(decision.approved);
        assert_eq!(decision.approver_id, "alice");
        assert!(coordinator.pending_approvals().is_empty());
    }

    #[tokio::test]
    async fn quorum_of_two_requires_distinct_approvers() {
        let (coordinator, mut rx) = coordinator_with_sink();

        let waiter = {
            let c = coordinator.clone();
            tokio::spawn(async move {
                c.request_approval(
                    request("wipe_env", Sensitivity::Critical).with_required_approvers(2),
                )
                .await
            })
        };

        let id = wait_for_request(&mut rx).await;

        // Two votes from the same approver do not reach quorum.
        assert!(coordinator.submit_approval(id, "alice", true, None, vec![]).await);
        assert!(coordinator.submit_approval(id, "alice", true, None, vec![]).await);
        assert_eq!(coordinator.pending_approvals().len(), 1);

        assert!(coordinator.submit_approval(id, "bob", true, None, vec![]).await);

        let decision = waiter.await.unwrap().unwrap();
        assert!(decision.approved);
        assert_eq!(decision.approver_id, "bob");

        let resolved = &coordinator.approval_history(1)[0];
        assert_eq!(resolved.outcome, ResolutionOutcome::Approved);
        assert_eq!(resolved.votes.len(), 3);
    }

    #[tokio::test]
    async fn rejection_resolves_immediately() {
        let (coordinator, mut rx) = coordinator_with_sink();

        let waiter = {
            let c = coordinator.clone();
            tokio::spawn(async move {
                c.request_approval(
                    request("rotate_keys", Sensitivity::High).with_required_approvers(3),
                )
                .await
            })
        };

        let id = wait_for_request(&mut rx).await;
        coordinator.submit_approval(id, "alice", true, None, vec![]).await;
        coordinator
            .submit_approval(id, "bob", false, Some("not now".to_string()), vec![])
            .await;

        let decision = waiter.await.unwrap().unwrap();
        assert!(!decision.approved);
        assert_eq!(decision.approver_id, "bob");

        // Votes after resolution are refused.
        assert!(!coordinator.submit_approval(id, "carol", true, None, vec![]).await);
        assert_eq!(
            coordinator.approval_history(1)[0].outcome,
            ResolutionOutcome::Rejected
        );
    }

    #[tokio::test]
    async fn timeout_resolves_as_system_rejection() {
        let coordinator = Arc::new(ApprovalCoordinator::default());

        let decision = coordinator
            .request_approval(
                request("export_all", Sensitivity::High)
                    .with_timeout(Duration::from_millis(50)),
            )
            .await
            .unwrap();

        assert!(!decision.approved);
        assert_eq!(decision.approver_id, SYSTEM_APPROVER);
        assert_eq!(decision.reason.as_deref(), Some(TIMEOUT_REASON));
        assert!(coordinator.pending_approvals().is_empty());
        assert_eq!(
            coordinator.approval_history(1)[0].outcome,
            ResolutionOutcome::TimedOut
        );
    }

    #[tokio::test]
    async fn auto_approve_rule_resolves_synchronously() {
        let (coordinator, mut rx) = coordinator_with_sink();
        coordinator
            .add_rule(
                ApprovalRule::new("auto-approve-low", RouteAction::Approve).with_conditions(
                    RouteConditions {
                        sensitivity: vec![Sensitivity::Low],
                        keywords: vec!["read".to_string()],
                        ..Default::default()
                    },
                ),
            )
            .unwrap();

        let decision = coordinator
            .request_approval(request("read_operation", Sensitivity::Low))
            .await
            .unwrap();

        assert!(decision.approved);
        assert_eq!(decision.approver_id, SYSTEM_APPROVER);
        assert!(decision.reason.as_deref().unwrap().contains("auto-approve-low"));
        assert!(coordinator.pending_approvals().is_empty());

        // The only event is the resolution; the request never became pending.
        match rx.recv().await.unwrap() {
            ApprovalEvent::Resolved { decision: d } => assert!(d.approved),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn auto_reject_rule_resolves_synchronously() {
        let coordinator = Arc::new(ApprovalCoordinator::default());
        coordinator
            .add_rule(
                ApprovalRule::new("block-prod-writes", RouteAction::Reject).with_conditions(
                    RouteConditions {
                        operations: vec!["write_prod".to_string()],
                        ..Default::default()
                    },
                ),
            )
            .unwrap();

        let decision = coordinator
            .request_approval(request("write_prod", Sensitivity::Medium))
            .await
            .unwrap();
        assert!(!decision.approved);
        assert!(decision.is_system());
    }

    #[tokio::test]
    async fn rule_overrides_apply_to_escalated_requests() {
        let (coordinator, mut rx) = coordinator_with_sink();
        coordinator
            .add_rule(
                ApprovalRule::new("destructive-ops", RouteAction::RequireApproval)
                    .with_conditions(RouteConditions {
                        keywords: vec!["delete".to_string()],
                        ..Default::default()
                    })
                    .with_required_approvers(2),
            )
            .unwrap();

        let waiter = {
            let c = coordinator.clone();
            tokio::spawn(async move {
                c.request_approval(request("delete_data", Sensitivity::High)).await
            })
        };

        let id = wait_for_request(&mut rx).await;
        let pending = coordinator.pending_approvals();
        assert_eq!(pending[0].required_approvers, 2);

        coordinator.submit_approval(id, "alice", true, None, vec![]).await;

        // One of two approvals: progress, still pending.
        match rx.recv().await.unwrap() {
            ApprovalEvent::Progress { received, required, .. } => {
                assert_eq!((received, required), (1, 2));
            }
            other => panic!("unexpected event: {:?}", other),
        }

        coordinator.submit_approval(id, "bob", true, None, vec![]).await;
        assert!(waiter.await.unwrap().unwrap().approved);
    }

    #[tokio::test]
    async fn unknown_request_id_returns_false() {
        let coordinator = ApprovalCoordinator::default();
        assert!(
            !coordinator
                .submit_approval(RequestId::new(), "alice", true, None, vec![])
                .await
        );
    }

    #[tokio::test]
    async fn invalid_requests_are_rejected_up_front() {
        let coordinator = ApprovalCoordinator::default();

        let no_operation = request("", Sensitivity::Low);
        assert!(coordinator.request_approval(no_operation).await.is_err());

        let mut no_agent = request("op", Sensitivity::Low);
        no_agent.agent_name = String::new();
        assert!(coordinator.request_approval(no_agent).await.is_err());

        let zero_quorum = request("op", Sensitivity::Low).with_required_approvers(0);
        assert!(coordinator.request_approval(zero_quorum).await.is_err());
    }

    #[tokio::test]
    async fn history_is_most_recent_first_and_capped() {
        let coordinator = Arc::new(ApprovalCoordinator::new(CoordinatorConfig {
            history_cap: 2,
            ..Default::default()
        }));
        coordinator
            .add_rule(ApprovalRule::new("approve-all", RouteAction::Approve))
            .unwrap();

        for op in ["first", "second", "third"] {
            coordinator
                .request_approval(request(op, Sensitivity::Low))
                .await
                .unwrap();
        }

        let history = coordinator.approval_history(10);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].request.operation, "third");
        assert_eq!(history[1].request.operation, "second");

        assert_eq!(coordinator.approval_history(1).len(), 1);
    }

    #[tokio::test]
    async fn stats_count_outcomes_and_manual_latency() {
        let (coordinator, mut rx) = coordinator_with_sink();
        coordinator
            .add_rule(
                ApprovalRule::new("auto", RouteAction::Approve).with_conditions(RouteConditions {
                    operations: vec!["auto_op".to_string()],
                    ..Default::default()
                }),
            )
            .unwrap();

        // One auto-approval, one manual rejection, one timeout.
        coordinator
            .request_approval(request("auto_op", Sensitivity::Low))
            .await
            .unwrap();

        let waiter = {
            let c = coordinator.clone();
            tokio::spawn(async move {
                c.request_approval(request("manual_op", Sensitivity::High)).await
            })
        };
        let id = wait_for_request(&mut rx).await;
        coordinator.submit_approval(id, "alice", false, None, vec![]).await;
        waiter.await.unwrap().unwrap();

        coordinator
            .request_approval(
                request("slow_op", Sensitivity::High).with_timeout(Duration::from_millis(20)),
            )
            .await
            .unwrap();

        let stats = coordinator.approval_stats(7);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.approved, 1);
        assert_eq!(stats.rejected, 2);
        assert_eq!(stats.timed_out, 1);
        assert_eq!(stats.auto_resolved, 1);
        // Only the manual rejection contributes latency.
        assert!(stats.avg_resolution_ms.is_some());
    }

    #[tokio::test]
    async fn concurrent_requests_resolve_independently() {
        let (coordinator, mut rx) = coordinator_with_sink();

        let waiters: Vec<_> = (0..4)
            .map(|i| {
                let c = coordinator.clone();
                tokio::spawn(async move {
                    c.request_approval(request(&format!("op_{}", i), Sensitivity::Medium))
                        .await
                })
            })
            .collect();

        let mut ids = Vec::new();
        for _ in 0..4 {
            ids.push(wait_for_request(&mut rx).await);
        }
        assert_eq!(coordinator.pending_approvals().len(), 4);

        for id in &ids {
            coordinator.submit_approval(*id, "alice", true, None, vec![]).await;
        }

        let decisions = futures::future::join_all(waiters).await;
        for d in decisions {
            assert!(d.unwrap().unwrap().approved);
        }
        assert!(coordinator.pending_approvals().is_empty());
    }

    #[tokio::test]
    async fn approver_registry_is_bookkeeping_only() {
        let coordinator = ApprovalCoordinator::default();
        coordinator.register_approver("alice", "Alice");
        coordinator.register_approver("alice", "Alice again");
        coordinator.register_approver("bob", "Bob");

        let approvers = coordinator.approvers();
        assert_eq!(approvers.len(), 2);
        assert_eq!(approvers[0].name, "Alice");
    }
}
