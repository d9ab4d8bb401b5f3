//! Staged writes and the read guards they depend on.

use capstone_core::{
    AccountId, Approval, DefenseCouncil, Membership, MilestoneCouncil, MilestoneCouncilId, Topic,
    TopicId,
};
use chrono::NaiveDate;

/// A version observed during a transaction that must still hold at commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionGuard {
    /// Topic row as read.
    Topic { topic_id: TopicId, version: u64 },
    /// Milestone council row as read.
    MilestoneCouncil {
        council_id: MilestoneCouncilId,
        version: u64,
    },
    /// Membership set of one topic.
    Memberships { topic_id: TopicId, version: u64 },
    /// Set of bookings at one (date, slot) cell of the defense calendar.
    Slot {
        date: NaiveDate,
        slot: u8,
        version: u64,
    },
}

/// One staged write.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    InsertTopic(Topic),
    /// Replace a topic; the carried `version` is the one it was read at.
    UpdateTopic(Topic),
    /// Remove a topic together with everything that references it.
    DeleteTopic(TopicId),
    InsertApproval(Approval),
    InsertMembership(Membership),
    DeleteMembership {
        topic_id: TopicId,
        account_id: AccountId,
    },
    InsertDefenseCouncil(DefenseCouncil),
    InsertMilestoneCouncil(MilestoneCouncil),
    /// Replace a milestone council; the carried `version` is the one it was read at.
    UpdateMilestoneCouncil(MilestoneCouncil),
}

/// Everything one transaction wants to apply, as a single unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub guards: Vec<VersionGuard>,
    pub mutations: Vec<Mutation>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a guard, ignoring exact duplicates.
    pub fn guard(&mut self, guard: VersionGuard) {
        if !self.guards.contains(&guard) {
            self.guards.push(guard);
        }
    }

    pub fn push(&mut self, mutation: Mutation) {
        self.mutations.push(mutation);
    }

    /// True when there is nothing to write.
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }
}
