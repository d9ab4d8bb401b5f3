//! Core entity structures
//!
//! Entities reference each other by ID only. Relations are resolved through
//! explicit storage lookups, never through back-pointers.

use crate::{
    AccountId, AccountRole, ApprovalId, CouncilRole, CouncilStatus, DefenseCouncilId,
    Milestone, MilestoneCouncilId, MembershipId, MembershipRole, ReviewResult, SeatDecision,
    Semester, Timestamp, TopicId, TopicStatus, MILESTONE_COUNCIL_SIZE,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Thesis topic moving through approval and milestone review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub topic_id: TopicId,
    pub title: String,
    pub description: Option<String>,
    pub status: TopicStatus,
    /// Distinct approvals recorded so far (never exceeds `required_approvals`)
    pub approval_count: u32,
    pub required_approvals: u32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Optimistic concurrency counter, bumped by storage on every committed update
    pub version: u64,
}

impl Topic {
    /// Create a new PENDING topic.
    pub fn new(title: &str, description: Option<String>, required_approvals: u32) -> Self {
        let now = Utc::now();
        Self {
            topic_id: TopicId::now_v7(),
            title: title.to_string(),
            description,
            status: TopicStatus::Pending,
            approval_count: 0,
            required_approvals,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Approval ratio in `"{count}/{required}"` form.
    pub fn approval_ratio(&self) -> String {
        format!("{}/{}", self.approval_count, self.required_approvals)
    }

    /// Whether the approval consensus has been reached.
    pub fn is_fully_approved(&self) -> bool {
        self.status == TopicStatus::Approved && self.approval_count >= self.required_approvals
    }
}

/// One approver's sign-off on a topic. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    pub approval_id: ApprovalId,
    pub topic_id: TopicId,
    pub approver_email: String,
    pub approver_name: String,
    pub approved_at: Timestamp,
    pub comment: Option<String>,
}

impl Approval {
    /// Record a new approval.
    pub fn new(
        topic_id: TopicId,
        approver_email: &str,
        approver_name: &str,
        comment: Option<String>,
    ) -> Self {
        Self {
            approval_id: ApprovalId::now_v7(),
            topic_id,
            approver_email: approver_email.to_string(),
            approver_name: approver_name.to_string(),
            approved_at: Utc::now(),
            comment,
        }
    }
}

/// Link between an account and a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub membership_id: MembershipId,
    pub topic_id: TopicId,
    pub account_id: AccountId,
    pub account_name: String,
    pub role: MembershipRole,
    pub joined_at: Timestamp,
}

impl Membership {
    /// The creator row, written together with the topic.
    pub fn creator(topic_id: TopicId, account_id: AccountId, account_name: &str) -> Self {
        Self::with_role(topic_id, account_id, account_name, MembershipRole::Creator)
    }

    /// A regular member row.
    pub fn member(topic_id: TopicId, account_id: AccountId, account_name: &str) -> Self {
        Self::with_role(topic_id, account_id, account_name, MembershipRole::Member)
    }

    fn with_role(
        topic_id: TopicId,
        account_id: AccountId,
        account_name: &str,
        role: MembershipRole,
    ) -> Self {
        Self {
            membership_id: MembershipId::now_v7(),
            topic_id,
            account_id,
            account_name: account_name.to_string(),
            role,
            joined_at: Utc::now(),
        }
    }

    pub fn is_creator(&self) -> bool {
        self.role == MembershipRole::Creator
    }
}

/// A seat on a defense council.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouncilSeat {
    pub role: CouncilRole,
    pub account_id: AccountId,
}

/// Final defense council: four lecturers booked at one (date, slot).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefenseCouncil {
    pub council_id: DefenseCouncilId,
    pub topic_id: TopicId,
    pub semester: Semester,
    pub date: NaiveDate,
    /// Time slot of the day, 1-based
    pub slot: u8,
    pub status: CouncilStatus,
    pub seats: Vec<CouncilSeat>,
    pub created_at: Timestamp,
}

impl DefenseCouncil {
    /// Account IDs sitting on this council, in seat order.
    pub fn account_ids(&self) -> Vec<AccountId> {
        self.seats.iter().map(|s| s.account_id).collect()
    }

    /// The account holding the given role (first match for MEMBER).
    pub fn seat_holder(&self, role: CouncilRole) -> Option<AccountId> {
        self.seats
            .iter()
            .find(|s| s.role == role)
            .map(|s| s.account_id)
    }
}

/// A seat on a milestone review council.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneSeat {
    pub account_id: AccountId,
    pub comments: Option<String>,
    pub decision: SeatDecision,
}

impl MilestoneSeat {
    pub fn pending(account_id: AccountId) -> Self {
        Self {
            account_id,
            comments: None,
            decision: SeatDecision::Pending,
        }
    }
}

/// Two-lecturer council reviewing one progress milestone of a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneCouncil {
    pub council_id: MilestoneCouncilId,
    pub topic_id: TopicId,
    pub milestone: Milestone,
    pub review_date: NaiveDate,
    pub status: CouncilStatus,
    pub result: Option<ReviewResult>,
    pub seats: [MilestoneSeat; MILESTONE_COUNCIL_SIZE],
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Optimistic concurrency counter, bumped by storage on every committed update
    pub version: u64,
}

impl MilestoneCouncil {
    /// Create a PLANNED council with two pending seats.
    pub fn planned(
        topic_id: TopicId,
        milestone: Milestone,
        review_date: NaiveDate,
        lecturers: [AccountId; MILESTONE_COUNCIL_SIZE],
    ) -> Self {
        let now = Utc::now();
        Self {
            council_id: MilestoneCouncilId::now_v7(),
            topic_id,
            milestone,
            review_date,
            status: CouncilStatus::Planned,
            result: None,
            seats: lecturers.map(MilestoneSeat::pending),
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// The two lecturers on this council.
    pub fn lecturer_ids(&self) -> [AccountId; MILESTONE_COUNCIL_SIZE] {
        self.seats.each_ref().map(|s| s.account_id)
    }

    /// Mutable access to the seat held by `account_id`.
    pub fn seat_mut(&mut self, account_id: AccountId) -> Option<&mut MilestoneSeat> {
        self.seats.iter_mut().find(|s| s.account_id == account_id)
    }

    pub fn is_passed(&self) -> bool {
        self.result == Some(ReviewResult::Passed)
    }
}

/// Account as exposed by the external directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub account_id: AccountId,
    pub name: String,
    pub email: String,
    pub role: AccountRole,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_topic_is_pending() {
        let topic = Topic::new("Graph coloring", None, 2);
        assert_eq!(topic.status, TopicStatus::Pending);
        assert_eq!(topic.approval_count, 0);
        assert_eq!(topic.approval_ratio(), "0/2");
        assert!(!topic.is_fully_approved());
    }

    #[test]
    fn test_membership_constructors() {
        let topic_id = TopicId::now_v7();
        let account_id = AccountId::now_v7();
        assert!(Membership::creator(topic_id, account_id, "Ana").is_creator());
        assert!(!Membership::member(topic_id, account_id, "Ana").is_creator());
    }

    #[test]
    fn test_planned_milestone_council_has_pending_seats() {
        let a = AccountId::now_v7();
        let b = AccountId::now_v7();
        let date = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
        let mut council = MilestoneCouncil::planned(TopicId::now_v7(), Milestone::Week4, date, [a, b]);

        assert_eq!(council.status, CouncilStatus::Planned);
        assert!(council.result.is_none());
        assert_eq!(council.lecturer_ids(), [a, b]);
        assert!(council
            .seats
            .iter()
            .all(|s| s.decision == SeatDecision::Pending));
        assert!(council.seat_mut(b).is_some());
        assert!(council.seat_mut(AccountId::now_v7()).is_none());
    }
}
