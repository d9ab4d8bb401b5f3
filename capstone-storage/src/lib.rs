//! Capstone Storage - Storage Trait and In-Memory Implementation
//!
//! Defines the storage abstraction for Capstone entities. Reads are plain
//! queries; writes only happen through [`StorageTrait::commit`], which
//! applies a whole [`ChangeSet`] or nothing.

mod change_set;
mod memory;
mod transaction;

pub use change_set::{ChangeSet, Mutation, VersionGuard};
pub use memory::{InMemoryStorage, StorageSnapshot};
pub use transaction::{run_transaction, Transaction};

use capstone_core::{
    AccountId, Approval, CapstoneResult, DefenseCouncil, Membership, Milestone, MilestoneCouncil,
    MilestoneCouncilId, Topic, TopicId, TopicStatus,
};
use chrono::NaiveDate;

// ============================================================================
// STORAGE TRAIT
// ============================================================================

/// Storage trait for Capstone entities.
///
/// Implementations must make `commit` atomic: every guard is checked and
/// every mutation applied under one exclusive section, or the store is left
/// untouched.
pub trait StorageTrait: Send + Sync {
    // === Topic Operations ===

    /// Get a topic by ID.
    fn topic_get(&self, id: TopicId) -> CapstoneResult<Option<Topic>>;

    /// List all topics, oldest first.
    fn topic_list(&self) -> CapstoneResult<Vec<Topic>>;

    /// List topics in the given status, oldest first.
    fn topic_list_by_status(&self, status: TopicStatus) -> CapstoneResult<Vec<Topic>>;

    // === Approval Operations ===

    /// Approvals of a topic ordered by `approved_at`.
    fn approval_list_by_topic(&self, topic_id: TopicId) -> CapstoneResult<Vec<Approval>>;

    /// Approvals given by one approver.
    fn approval_list_by_approver(&self, approver_email: &str) -> CapstoneResult<Vec<Approval>>;

    // === Membership Operations ===

    /// The membership linking `account_id` to `topic_id`, if any.
    fn membership_get(
        &self,
        topic_id: TopicId,
        account_id: AccountId,
    ) -> CapstoneResult<Option<Membership>>;

    /// Memberships of a topic ordered by `joined_at`.
    fn membership_list_by_topic(&self, topic_id: TopicId) -> CapstoneResult<Vec<Membership>>;

    /// Version of a topic's membership set; bumped on every join and removal.
    fn membership_version(&self, topic_id: TopicId) -> CapstoneResult<u64>;

    // === Defense Council Operations ===

    /// The defense council of a topic, if one was assigned.
    fn defense_council_get_by_topic(
        &self,
        topic_id: TopicId,
    ) -> CapstoneResult<Option<DefenseCouncil>>;

    /// Defense councils booked at one (date, slot).
    fn defense_council_list_by_slot(
        &self,
        date: NaiveDate,
        slot: u8,
    ) -> CapstoneResult<Vec<DefenseCouncil>>;

    /// Booking version of a (date, slot) cell; 0 if nothing was ever booked there.
    fn slot_version(&self, date: NaiveDate, slot: u8) -> CapstoneResult<u64>;

    // === Milestone Council Operations ===

    /// Get a milestone council by ID.
    fn milestone_council_get(
        &self,
        id: MilestoneCouncilId,
    ) -> CapstoneResult<Option<MilestoneCouncil>>;

    /// The council reviewing `milestone` of a topic, if created.
    fn milestone_council_get_by_milestone(
        &self,
        topic_id: TopicId,
        milestone: Milestone,
    ) -> CapstoneResult<Option<MilestoneCouncil>>;

    /// Milestone councils of a topic ordered by milestone.
    fn milestone_council_list_by_topic(
        &self,
        topic_id: TopicId,
    ) -> CapstoneResult<Vec<MilestoneCouncil>>;

    // === Writes ===

    /// Validate guards and constraints, then apply every mutation.
    ///
    /// Fails with `VersionConflict` when a guard no longer holds and with
    /// `UniqueViolation` when a mutation would break a uniqueness rule.
    fn commit(&self, changes: ChangeSet) -> CapstoneResult<()>;
}
