//! In-memory storage
//!
//! One ordered table per entity type behind a single lock. Readers share the
//! lock; `commit` takes it exclusively, validates against the live tables and
//! swaps in the updated copy only when every mutation succeeded.

use crate::{ChangeSet, Mutation, StorageTrait, VersionGuard};
use capstone_core::{
    AccountId, Approval, ApprovalId, CapstoneResult, DefenseCouncil, DefenseCouncilId,
    EntityIdType, EntityType, Membership, MembershipId, Milestone, MilestoneCouncil,
    MilestoneCouncilId, StorageError, Topic, TopicId, TopicStatus,
};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

// ============================================================================
// TABLES
// ============================================================================

/// Contents of an [`InMemoryStorage`] at one point in time.
///
/// Tables are keyed by UUIDv7 IDs, so iteration follows creation order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StorageSnapshot {
    pub topics: BTreeMap<TopicId, Topic>,
    pub approvals: BTreeMap<ApprovalId, Approval>,
    pub memberships: BTreeMap<MembershipId, Membership>,
    pub defense_councils: BTreeMap<DefenseCouncilId, DefenseCouncil>,
    pub milestone_councils: BTreeMap<MilestoneCouncilId, MilestoneCouncil>,
    /// Membership set version per topic.
    pub membership_versions: BTreeMap<TopicId, u64>,
    /// Booking version per (date, slot) cell.
    pub slot_versions: BTreeMap<(NaiveDate, u8), u64>,
}

fn slot_key(date: NaiveDate, slot: u8) -> String {
    format!("{}#{}", date, slot)
}

fn already_exists(entity_type: EntityType) -> StorageError {
    StorageError::InsertFailed {
        entity_type,
        reason: "already exists".to_string(),
    }
}

fn unique(constraint: &str) -> StorageError {
    StorageError::UniqueViolation {
        constraint: constraint.to_string(),
    }
}

impl StorageSnapshot {
    fn check_guard(&self, guard: &VersionGuard) -> Result<(), StorageError> {
        let (entity_type, key, expected, found) = match *guard {
            VersionGuard::Topic { topic_id, version } => (
                EntityType::Topic,
                topic_id.to_string(),
                version,
                self.topics.get(&topic_id).map(|t| t.version),
            ),
            VersionGuard::MilestoneCouncil {
                council_id,
                version,
            } => (
                EntityType::MilestoneCouncil,
                council_id.to_string(),
                version,
                self.milestone_councils.get(&council_id).map(|c| c.version),
            ),
            VersionGuard::Memberships { topic_id, version } => (
                EntityType::Membership,
                topic_id.to_string(),
                version,
                Some(self.membership_version(topic_id)),
            ),
            VersionGuard::Slot {
                date,
                slot,
                version,
            } => (
                EntityType::Slot,
                slot_key(date, slot),
                version,
                Some(self.slot_version(date, slot)),
            ),
        };

        if found == Some(expected) {
            Ok(())
        } else {
            Err(StorageError::VersionConflict {
                entity_type,
                key,
                expected,
                found: found.unwrap_or(0),
            })
        }
    }

    fn slot_version(&self, date: NaiveDate, slot: u8) -> u64 {
        self.slot_versions.get(&(date, slot)).copied().unwrap_or(0)
    }

    fn bump_slot(&mut self, date: NaiveDate, slot: u8) {
        *self.slot_versions.entry((date, slot)).or_insert(0) += 1;
    }

    fn membership_version(&self, topic_id: TopicId) -> u64 {
        self.membership_versions.get(&topic_id).copied().unwrap_or(0)
    }

    fn bump_memberships(&mut self, topic_id: TopicId) {
        *self.membership_versions.entry(topic_id).or_insert(0) += 1;
    }

    fn require_topic(&self, topic_id: TopicId) -> Result<(), StorageError> {
        if self.topics.contains_key(&topic_id) {
            Ok(())
        } else {
            Err(StorageError::not_found(topic_id))
        }
    }

    fn apply(&mut self, mutation: Mutation) -> Result<(), StorageError> {
        match mutation {
            Mutation::InsertTopic(topic) => {
                if self.topics.contains_key(&topic.topic_id) {
                    return Err(already_exists(EntityType::Topic));
                }
                self.topics.insert(topic.topic_id, topic);
            }

            Mutation::UpdateTopic(mut topic) => {
                let stored = self
                    .topics
                    .get(&topic.topic_id)
                    .ok_or_else(|| StorageError::not_found(topic.topic_id))?;
                if stored.version != topic.version {
                    return Err(StorageError::VersionConflict {
                        entity_type: EntityType::Topic,
                        key: topic.topic_id.to_string(),
                        expected: topic.version,
                        found: stored.version,
                    });
                }
                topic.version += 1;
                self.topics.insert(topic.topic_id, topic);
            }

            Mutation::DeleteTopic(topic_id) => {
                self.require_topic(topic_id)?;
                self.topics.remove(&topic_id);
                self.approvals.retain(|_, a| a.topic_id != topic_id);
                self.memberships.retain(|_, m| m.topic_id != topic_id);
                self.bump_memberships(topic_id);
                self.milestone_councils.retain(|_, c| c.topic_id != topic_id);

                let released: Vec<(NaiveDate, u8)> = self
                    .defense_councils
                    .values()
                    .filter(|c| c.topic_id == topic_id)
                    .map(|c| (c.date, c.slot))
                    .collect();
                self.defense_councils.retain(|_, c| c.topic_id != topic_id);
                for (date, slot) in released {
                    self.bump_slot(date, slot);
                }
            }

            Mutation::InsertApproval(approval) => {
                self.require_topic(approval.topic_id)?;
                if self.approvals.contains_key(&approval.approval_id) {
                    return Err(already_exists(EntityType::Approval));
                }
                if self.approvals.values().any(|a| {
                    a.topic_id == approval.topic_id
                        && a.approver_email.eq_ignore_ascii_case(&approval.approver_email)
                }) {
                    return Err(unique("approval_topic_approver"));
                }
                self.approvals.insert(approval.approval_id, approval);
            }

            Mutation::InsertMembership(membership) => {
                self.require_topic(membership.topic_id)?;
                if self.memberships.contains_key(&membership.membership_id) {
                    return Err(already_exists(EntityType::Membership));
                }
                let same_topic = || {
                    self.memberships
                        .values()
                        .filter(|m| m.topic_id == membership.topic_id)
                };
                if same_topic().any(|m| m.account_id == membership.account_id) {
                    return Err(unique("membership_topic_account"));
                }
                if membership.is_creator() && same_topic().any(|m| m.is_creator()) {
                    return Err(unique("membership_topic_creator"));
                }
                self.bump_memberships(membership.topic_id);
                self.memberships.insert(membership.membership_id, membership);
            }

            Mutation::DeleteMembership {
                topic_id,
                account_id,
            } => {
                let membership_id = self
                    .memberships
                    .values()
                    .find(|m| m.topic_id == topic_id && m.account_id == account_id)
                    .map(|m| m.membership_id)
                    .ok_or(StorageError::NotFound {
                        entity_type: EntityType::Membership,
                        id: account_id.as_uuid(),
                    })?;
                self.memberships.remove(&membership_id);
                self.bump_memberships(topic_id);
            }

            Mutation::InsertDefenseCouncil(council) => {
                self.require_topic(council.topic_id)?;
                if self.defense_councils.contains_key(&council.council_id) {
                    return Err(already_exists(EntityType::DefenseCouncil));
                }
                if self
                    .defense_councils
                    .values()
                    .any(|c| c.topic_id == council.topic_id)
                {
                    return Err(unique("defense_council_topic"));
                }

                let seated: HashSet<AccountId> = council.account_ids().into_iter().collect();
                if seated.len() != council.seats.len() {
                    return Err(StorageError::InsertFailed {
                        entity_type: EntityType::DefenseCouncil,
                        reason: "seats must reference distinct accounts".to_string(),
                    });
                }
                let double_booked = self
                    .defense_councils
                    .values()
                    .filter(|c| c.date == council.date && c.slot == council.slot)
                    .flat_map(|c| c.seats.iter())
                    .any(|seat| seated.contains(&seat.account_id));
                if double_booked {
                    return Err(unique("defense_council_slot_seat"));
                }

                self.bump_slot(council.date, council.slot);
                self.defense_councils.insert(council.council_id, council);
            }

            Mutation::InsertMilestoneCouncil(council) => {
                self.require_topic(council.topic_id)?;
                if self.milestone_councils.contains_key(&council.council_id) {
                    return Err(already_exists(EntityType::MilestoneCouncil));
                }
                if self
                    .milestone_councils
                    .values()
                    .any(|c| c.topic_id == council.topic_id && c.milestone == council.milestone)
                {
                    return Err(unique("milestone_council_topic_milestone"));
                }
                self.milestone_councils.insert(council.council_id, council);
            }

            Mutation::UpdateMilestoneCouncil(mut council) => {
                let stored = self
                    .milestone_councils
                    .get(&council.council_id)
                    .ok_or_else(|| StorageError::not_found(council.council_id))?;
                if stored.version != council.version {
                    return Err(StorageError::VersionConflict {
                        entity_type: EntityType::MilestoneCouncil,
                        key: council.council_id.to_string(),
                        expected: council.version,
                        found: stored.version,
                    });
                }
                council.version += 1;
                self.milestone_councils.insert(council.council_id, council);
            }
        }
        Ok(())
    }
}

// ============================================================================
// IN-MEMORY STORAGE
// ============================================================================

/// Thread-safe in-memory store.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    tables: RwLock<StorageSnapshot>,
}

impl InMemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StorageSnapshot>, StorageError> {
        self.tables.read().map_err(|_| StorageError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StorageSnapshot>, StorageError> {
        self.tables.write().map_err(|_| StorageError::LockPoisoned)
    }

    /// Copy of every table.
    pub fn snapshot(&self) -> CapstoneResult<StorageSnapshot> {
        Ok(self.read()?.clone())
    }

    /// Get count of stored topics.
    pub fn topic_count(&self) -> CapstoneResult<usize> {
        Ok(self.read()?.topics.len())
    }

    /// Get count of stored approvals.
    pub fn approval_count(&self) -> CapstoneResult<usize> {
        Ok(self.read()?.approvals.len())
    }

    /// Get count of stored memberships.
    pub fn membership_count(&self) -> CapstoneResult<usize> {
        Ok(self.read()?.memberships.len())
    }

    /// Get count of stored defense councils.
    pub fn defense_council_count(&self) -> CapstoneResult<usize> {
        Ok(self.read()?.defense_councils.len())
    }

    /// Get count of stored milestone councils.
    pub fn milestone_council_count(&self) -> CapstoneResult<usize> {
        Ok(self.read()?.milestone_councils.len())
    }
}

impl StorageTrait for InMemoryStorage {
    // === Topic Operations ===

    fn topic_get(&self, id: TopicId) -> CapstoneResult<Option<Topic>> {
        Ok(self.read()?.topics.get(&id).cloned())
    }

    fn topic_list(&self) -> CapstoneResult<Vec<Topic>> {
        Ok(self.read()?.topics.values().cloned().collect())
    }

    fn topic_list_by_status(&self, status: TopicStatus) -> CapstoneResult<Vec<Topic>> {
        let tables = self.read()?;
        Ok(tables
            .topics
            .values()
            .filter(|t| t.status == status)
            .cloned()
            .collect())
    }

    // === Approval Operations ===

    fn approval_list_by_topic(&self, topic_id: TopicId) -> CapstoneResult<Vec<Approval>> {
        let tables = self.read()?;
        let mut result: Vec<Approval> = tables
            .approvals
            .values()
            .filter(|a| a.topic_id == topic_id)
            .cloned()
            .collect();
        result.sort_by_key(|a| (a.approved_at, a.approval_id));
        Ok(result)
    }

    fn approval_list_by_approver(&self, approver_email: &str) -> CapstoneResult<Vec<Approval>> {
        let tables = self.read()?;
        Ok(tables
            .approvals
            .values()
            .filter(|a| a.approver_email.eq_ignore_ascii_case(approver_email))
            .cloned()
            .collect())
    }

    // === Membership Operations ===

    fn membership_get(
        &self,
        topic_id: TopicId,
        account_id: AccountId,
    ) -> CapstoneResult<Option<Membership>> {
        let tables = self.read()?;
        Ok(tables
            .memberships
            .values()
            .find(|m| m.topic_id == topic_id && m.account_id == account_id)
            .cloned())
    }

    fn membership_list_by_topic(&self, topic_id: TopicId) -> CapstoneResult<Vec<Membership>> {
        let tables = self.read()?;
        let mut result: Vec<Membership> = tables
            .memberships
            .values()
            .filter(|m| m.topic_id == topic_id)
            .cloned()
            .collect();
        result.sort_by_key(|m| (m.joined_at, m.membership_id));
        Ok(result)
    }

    fn membership_version(&self, topic_id: TopicId) -> CapstoneResult<u64> {
        Ok(self.read()?.membership_version(topic_id))
    }

    // === Defense Council Operations ===

    fn defense_council_get_by_topic(
        &self,
        topic_id: TopicId,
    ) -> CapstoneResult<Option<DefenseCouncil>> {
        let tables = self.read()?;
        Ok(tables
            .defense_councils
            .values()
            .find(|c| c.topic_id == topic_id)
            .cloned())
    }

    fn defense_council_list_by_slot(
        &self,
        date: NaiveDate,
        slot: u8,
    ) -> CapstoneResult<Vec<DefenseCouncil>> {
        let tables = self.read()?;
        Ok(tables
            .defense_councils
            .values()
            .filter(|c| c.date == date && c.slot == slot)
            .cloned()
            .collect())
    }

    fn slot_version(&self, date: NaiveDate, slot: u8) -> CapstoneResult<u64> {
        Ok(self.read()?.slot_version(date, slot))
    }

    // === Milestone Council Operations ===

    fn milestone_council_get(
        &self,
        id: MilestoneCouncilId,
    ) -> CapstoneResult<Option<MilestoneCouncil>> {
        Ok(self.read()?.milestone_councils.get(&id).cloned())
    }

    fn milestone_council_get_by_milestone(
        &self,
        topic_id: TopicId,
        milestone: Milestone,
    ) -> CapstoneResult<Option<MilestoneCouncil>> {
        let tables = self.read()?;
        Ok(tables
            .milestone_councils
            .values()
            .find(|c| c.topic_id == topic_id && c.milestone == milestone)
            .cloned())
    }

    fn milestone_council_list_by_topic(
        &self,
        topic_id: TopicId,
    ) -> CapstoneResult<Vec<MilestoneCouncil>> {
        let tables = self.read()?;
        let mut result: Vec<MilestoneCouncil> = tables
            .milestone_councils
            .values()
            .filter(|c| c.topic_id == topic_id)
            .cloned()
            .collect();
        result.sort_by_key(|c| c.milestone);
        Ok(result)
    }

    // === Writes ===

    fn commit(&self, changes: ChangeSet) -> CapstoneResult<()> {
        let mut tables = self.write()?;
        for guard in &changes.guards {
            tables.check_guard(guard)?;
        }
        if changes.is_empty() {
            return Ok(());
        }

        let mut next = tables.clone();
        for mutation in changes.mutations {
            next.apply(mutation)?;
        }
        *tables = next;
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
