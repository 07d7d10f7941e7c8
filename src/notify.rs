//! Outbound approval notifications
//!
//! The coordinator reports lifecycle events through an [`ApprovalSink`]; the
//! embedding application decides how they reach humans (push, poll, webhook).
//! This crate ships a no-op sink and an in-process channel sink.

use crate::approval::{ApprovalDecision, ApprovalRequest};
use crate::types::RequestId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Consumer of approval lifecycle events
#[async_trait]
pub trait ApprovalSink: Send + Sync {
    /// A request entered the pending set and awaits human decisions
    async fn requested(&self, request: &ApprovalRequest);

    /// An approval arrived but quorum is not yet reached
    async fn progress(&self, request_id: RequestId, received: usize, required: usize);

    /// A request resolved; `decision` is the resolving decision
    async fn resolved(&self, decision: &ApprovalDecision);
}

/// Sink that drops every event
#[derive(Debug, Default)]
pub struct NullSink;

#[async_trait]
impl ApprovalSink for NullSink {
    async fn requested(&self, _request: &ApprovalRequest) {}

    async fn progress(&self, _request_id: RequestId, _received: usize, _required: usize) {}

    async fn resolved(&self, _decision: &ApprovalDecision) {}
}

/// An approval lifecycle event as delivered by [`ChannelSink`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ApprovalEvent {
    /// A request awaits human decisions
    Requested {
        /// The full pending request
        request: ApprovalRequest,
    },
    /// Quorum progress on a pending request
    Progress {
        /// The pending request
        request_id: RequestId,
        /// Approvals received so far
        received: usize,
        /// Approvals required to resolve
        required: usize,
    },
    /// A request resolved
    Resolved {
        /// The resolving decision
        decision: ApprovalDecision,
    },
}

/// Sink that forwards events over an unbounded in-process channel.
///
/// Dropping the receiver silently discards further events; notification
/// delivery must never stall resolution.
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ApprovalEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver the transport layer drains
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ApprovalEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ApprovalSink for ChannelSink {
    async fn requested(&self, request: &ApprovalRequest) {
        let _ = self.tx.send(ApprovalEvent::Requested {
            request: request.clone(),
        });
    }

    async fn progress(&self, request_id: RequestId, received: usize, required: usize) {
        let _ = self.tx.send(ApprovalEvent::Progress {
            request_id,
            received,
            required,
        });
    }

    async fn resolved(&self, decision: &ApprovalDecision) {
        let _ = self.tx.send(ApprovalEvent::Resolved {
            decision: decision.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::RequestType;
    use crate::types::Sensitivity;

    #[tokio::test]
    async fn channel_sink_forwards_events() {
        let (sink, mut rx) = ChannelSink::new();
        let request = ApprovalRequest::new(
            RequestType::DataAccess,
            "assistant",
            "export",
            Sensitivity::Medium,
        );

        sink.requested(&request).await;
        sink.progress(request.id, 1, 2).await;

        match rx.recv().await.unwrap() {
            ApprovalEvent::Requested { request: r } => assert_eq!(r.id, request.id),
            other => panic!("unexpected event: {:?}", other),
        }
        match rx.recv().await.unwrap() {
            ApprovalEvent::Progress { received, required, .. } => {
                assert_eq!((received, required), (1, 2));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn dropped_receiver_does_not_error() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        let request = ApprovalRequest::new(
            RequestType::DataAccess,
            "assistant",
            "export",
            Sensitivity::Low,
        );
        sink.requested(&request).await;
    }
}
