//! Human approval workflow demonstration
//!
//! Escalates a destructive operation to a two-approver quorum, with a
//! background task standing in for the human transport layer.

use std::sync::Arc;
use std::time::Duration;
use vigil::coordinator::ApprovalCoordinator;
use vigil::notify::{ApprovalEvent, ChannelSink};
use vigil::prelude::*;
use vigil::CoordinatorConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let (sink, mut events) = ChannelSink::new();
    let coordinator = Arc::new(ApprovalCoordinator::with_sink(
        CoordinatorConfig::default(),
        Arc::new(sink),
    ));
    coordinator.register_approver("alice", "Alice");
    coordinator.register_approver("bob", "Bob");

    // Low-sensitivity reads resolve without a human in the loop.
    coordinator.add_rule(
        ApprovalRule::new("auto-approve-low", RouteAction::Approve).with_conditions(
            vigil::router::RouteConditions {
                sensitivity: vec![Sensitivity::Low],
                keywords: vec!["read".to_string()],
                ..Default::default()
            },
        ),
    )?;

    let decision = coordinator
        .request_approval(ApprovalRequest::new(
            RequestType::DataAccess,
            "report-agent",
            "read_dashboard",
            Sensitivity::Low,
        ))
        .await?;
    println!(
        "read_dashboard: approved={} by {}",
        decision.approved, decision.approver_id
    );

    // Stand-in for the transport layer: approve whatever arrives, twice.
    let approvals = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    ApprovalEvent::Requested { request } => {
                        println!(
                            "pending: {} ({} approvers required)",
                            request.operation, request.required_approvers
                        );
                        for approver in ["alice", "bob"] {
                            coordinator
                                .submit_approval(
                                    request.id,
                                    approver,
                                    true,
                                    Some("reviewed".to_string()),
                                    vec![],
                                )
                                .await;
                        }
                    }
                    ApprovalEvent::Progress {
                        received, required, ..
                    } => {
                        println!("progress: {}/{}", received, required);
                    }
                    ApprovalEvent::Resolved { decision } => {
                        println!(
                            "resolved: approved={} by {}",
                            decision.approved, decision.approver_id
                        );
                        // The auto-approval above also lands here; keep
                        // draining until a human-decided resolution.
                        if !decision.is_system() {
                            break;
                        }
                    }
                }
            }
        })
    };

    let decision = coordinator
        .request_approval(
            ApprovalRequest::new(
                RequestType::SensitiveOperation,
                "cleanup-agent",
                "delete_stale_records",
                Sensitivity::High,
            )
            .with_description("Deletes rows older than 90 days")
            .with_required_approvers(2)
            .with_timeout(Duration::from_secs(30)),
        )
        .await?;
    println!(
        "delete_stale_records: approved={} by {}",
        decision.approved, decision.approver_id
    );

    approvals.await?;

    let stats = coordinator.approval_stats(7);
    println!(
        "last 7 days: {} total, {} approved, {} rejected, {} timed out",
        stats.total, stats.approved, stats.rejected, stats.timed_out
    );

    Ok(())
}
