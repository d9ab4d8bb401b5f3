//! Topic status state machine.
//!
//! Every status change a topic goes through is made here. Callers mutate a
//! local copy of the [`Topic`] and hand it to storage; nothing in this module
//! touches other topics.
//!
//! # State Transition Diagram
//!
//! ```text
//! PENDING ─ record_approval ─► UNDER_REVIEW ─ record_approval ─► APPROVED
//!    │ └──────── approve_legacy ────────────────────────────────────┘ │
//!    └─ reject_legacy ─► REJECTED                                     │
//!                                                                     ▼
//!           APPROVED ─ pass(W4) ─► PASSED_REVIEW_1 ─ pass(W8) ─► PASSED_REVIEW_2 ─ pass(W12) ─► PASSED_REVIEW_3
//!               └──────────── fail ──────┴──────────── fail ──────────┴──► FAILED
//! ```

use crate::{CapstoneResult, Milestone, Topic, TopicStatus, WorkflowError};
use chrono::Utc;

/// Returns the set of statuses reachable from `from` in one step.
///
/// Terminal states (REJECTED, FAILED, PASSED_REVIEW_3) return an empty slice.
pub fn valid_transitions(from: TopicStatus) -> &'static [TopicStatus] {
    use TopicStatus::*;
    match from {
        Pending => &[UnderReview, Approved, Rejected],
        UnderReview => &[Approved],
        Approved => &[PassedReview1, Failed],
        PassedReview1 => &[PassedReview2, Failed],
        PassedReview2 => &[PassedReview3, Failed],
        Rejected | Failed | PassedReview3 => &[],
    }
}

/// Check whether a transition from `from` to `to` is valid.
pub fn can_transition(from: TopicStatus, to: TopicStatus) -> bool {
    valid_transitions(from).contains(&to)
}

/// Validate a transition for `topic`, reporting `InvalidStatus` when it is not allowed.
pub fn validate_transition(topic: &Topic, to: TopicStatus, operation: &str) -> CapstoneResult<()> {
    if can_transition(topic.status, to) {
        Ok(())
    } else {
        Err(invalid_status(topic, operation))
    }
}

fn invalid_status(topic: &Topic, operation: &str) -> crate::CapstoneError {
    WorkflowError::InvalidStatus {
        topic_id: topic.topic_id,
        status: topic.status,
        operation: operation.to_string(),
    }
    .into()
}

/// Stateless driver of topic status transitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopicLifecycle;

impl TopicLifecycle {
    /// Validate and apply a single transition.
    pub fn transition(topic: &mut Topic, to: TopicStatus, operation: &str) -> CapstoneResult<()> {
        validate_transition(topic, to, operation)?;
        tracing::debug!(
            topic_id = %topic.topic_id,
            from = %topic.status,
            to = %to,
            operation,
            "topic status transition"
        );
        topic.status = to;
        topic.updated_at = Utc::now();
        Ok(())
    }

    /// Count one more distinct approval.
    ///
    /// The first approval forces UNDER_REVIEW; reaching `required_approvals`
    /// forces APPROVED. With a single required approval the topic goes
    /// straight from PENDING to APPROVED.
    pub fn record_approval(topic: &mut Topic) -> CapstoneResult<TopicStatus> {
        if !topic.status.is_awaiting_approval() || topic.approval_count >= topic.required_approvals
        {
            return Err(invalid_status(topic, "approve"));
        }

        let count = topic.approval_count + 1;
        let next = if count >= topic.required_approvals {
            TopicStatus::Approved
        } else {
            TopicStatus::UnderReview
        };

        if next != topic.status {
            Self::transition(topic, next, "approve")?;
        } else {
            topic.updated_at = Utc::now();
        }
        topic.approval_count = count;
        Ok(topic.status)
    }

    /// Single-approver approval by a head of department. PENDING only.
    pub fn approve_legacy(topic: &mut Topic) -> CapstoneResult<()> {
        if topic.status != TopicStatus::Pending {
            return Err(invalid_status(topic, "approve"));
        }
        Self::transition(topic, TopicStatus::Approved, "approve")
    }

    /// Single-approver rejection by a head of department. PENDING only.
    pub fn reject_legacy(topic: &mut Topic) -> CapstoneResult<()> {
        if topic.status != TopicStatus::Pending {
            return Err(invalid_status(topic, "reject"));
        }
        Self::transition(topic, TopicStatus::Rejected, "reject")
    }

    /// Advance the topic after `milestone`'s council accepted it.
    pub fn pass_milestone(topic: &mut Topic, milestone: Milestone) -> CapstoneResult<()> {
        if topic.status != milestone.required_status() {
            return Err(invalid_status(topic, "pass milestone review for"));
        }
        Self::transition(topic, milestone.passed_status(), "pass milestone review for")
    }

    /// Fail the topic after a milestone council rejected it.
    pub fn fail_milestone(topic: &mut Topic) -> CapstoneResult<()> {
        if !topic.status.is_in_review() {
            return Err(invalid_status(topic, "fail milestone review for"));
        }
        Self::transition(topic, TopicStatus::Failed, "fail milestone review for")
    }
}
