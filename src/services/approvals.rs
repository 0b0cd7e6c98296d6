use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::domain::{Actor, ApprovalFlow, ApprovalState, NewApprovalFlow, ReviewItem};
use crate::error::{DomainError, DomainResult};
use crate::policy::{AccessPolicy, Operation};
use crate::repository::DocumentRepository;

use super::non_blank;

pub const AUTO_APPROVAL_COMMENT: &str = "automatic approval";
pub const AWAITING_REVIEW_COMMENT: &str = "awaiting review";

/// Flow attached to a fresh upload. Reviewers approve their own uploads.
pub fn initial_flow(author: &Actor) -> NewApprovalFlow {
    if author.role.is_reviewer() {
        NewApprovalFlow {
            id: Uuid::new_v4(),
            state: ApprovalState::Approved,
            reviewer_id: Some(author.user_id),
            comment: Some(AUTO_APPROVAL_COMMENT.to_string()),
        }
    } else {
        NewApprovalFlow {
            id: Uuid::new_v4(),
            state: ApprovalState::Pending,
            reviewer_id: None,
            comment: Some(AWAITING_REVIEW_COMMENT.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct ApprovalWorkflow {
    documents: Arc<dyn DocumentRepository>,
    policy: AccessPolicy,
}

impl ApprovalWorkflow {
    pub fn new(documents: Arc<dyn DocumentRepository>, policy: AccessPolicy) -> Self {
        Self { documents, policy }
    }

    /// Records a decision. A terminal flow is overwritten; concurrent
    /// decisions on one flow resolve as last write wins.
    pub fn decide(
        &self,
        actor: &Actor,
        flow_id: Uuid,
        approved: bool,
        comment: Option<String>,
    ) -> DomainResult<ApprovalFlow> {
        self.policy.require(actor, Operation::ReviewApprovals)?;

        let previous = self
            .documents
            .find_flow(flow_id)?
            .ok_or_else(|| DomainError::not_found("approval flow not found"))?;

        let state = if approved {
            ApprovalState::Approved
        } else {
            ApprovalState::Rejected
        };

        if previous.state.is_terminal() {
            info!(
                flow_id = %flow_id,
                previous = %previous.state,
                next = %state,
                "overwriting an earlier decision"
            );
        }

        let flow = self
            .documents
            .record_decision(flow_id, state, actor.user_id, non_blank(comment))?
            .ok_or_else(|| DomainError::not_found("approval flow not found"))?;

        info!(
            flow_id = %flow.id,
            document_id = %flow.document_id,
            state = %flow.state,
            reviewer = %actor.user_id,
            "approval decided"
        );
        Ok(flow)
    }

    /// Pending flows, oldest first.
    pub fn list_pending(&self, actor: &Actor) -> DomainResult<Vec<ReviewItem>> {
        self.policy.require(actor, Operation::ReviewApprovals)?;
        Ok(self.documents.list_reviews(ApprovalState::Pending)?)
    }
}
