//! Scoped transactions with optimistic retry
//!
//! A [`Transaction`] reads straight from storage and stages writes locally.
//! Every read a decision depends on leaves a [`VersionGuard`] behind, so the
//! commit fails if anything it looked at changed in the meantime. Staged
//! writes are not visible to reads made through the same transaction.

use crate::{ChangeSet, Mutation, StorageTrait, VersionGuard};
use capstone_core::{
    AccountId, Approval, CapstoneResult, DefenseCouncil, Membership, Milestone, MilestoneCouncil,
    MilestoneCouncilId, StorageError, Topic, TopicId, WorkflowError,
};
use chrono::NaiveDate;
use std::collections::HashSet;

/// Unit of work over a [`StorageTrait`].
pub struct Transaction<'a> {
    storage: &'a dyn StorageTrait,
    changes: ChangeSet,
}

impl<'a> Transaction<'a> {
    /// Start an empty transaction.
    pub fn new(storage: &'a dyn StorageTrait) -> Self {
        Self {
            storage,
            changes: ChangeSet::new(),
        }
    }

    // === Guarded reads ===

    /// Load a topic, failing with `NotFound`.
    pub fn topic(&mut self, topic_id: TopicId) -> CapstoneResult<Topic> {
        let topic = self
            .storage
            .topic_get(topic_id)?
            .ok_or_else(|| StorageError::not_found(topic_id))?;
        self.changes.guard(VersionGuard::Topic {
            topic_id,
            version: topic.version,
        });
        Ok(topic)
    }

    /// Load a milestone council, failing with `NotFound`.
    pub fn milestone_council(
        &mut self,
        council_id: MilestoneCouncilId,
    ) -> CapstoneResult<MilestoneCouncil> {
        let council = self
            .storage
            .milestone_council_get(council_id)?
            .ok_or_else(|| StorageError::not_found(council_id))?;
        self.guard_council(&council);
        Ok(council)
    }

    /// The council for `milestone` of a topic, guarded when present.
    pub fn milestone_council_for(
        &mut self,
        topic_id: TopicId,
        milestone: Milestone,
    ) -> CapstoneResult<Option<MilestoneCouncil>> {
        let council = self
            .storage
            .milestone_council_get_by_milestone(topic_id, milestone)?;
        if let Some(council) = &council {
            self.guard_council(council);
        }
        Ok(council)
    }

    /// Accounts already seated on a defense council at (date, slot).
    ///
    /// Guards the slot, so a concurrent booking there forces a retry.
    pub fn booked_accounts(
        &mut self,
        date: NaiveDate,
        slot: u8,
    ) -> CapstoneResult<HashSet<AccountId>> {
        let version = self.storage.slot_version(date, slot)?;
        let booked = self
            .storage
            .defense_council_list_by_slot(date, slot)?
            .iter()
            .flat_map(|c| c.account_ids())
            .collect();
        self.changes.guard(VersionGuard::Slot {
            date,
            slot,
            version,
        });
        Ok(booked)
    }

    /// Every membership of a topic, creator included.
    ///
    /// Guards the membership set, so a concurrent join or removal forces a retry.
    pub fn memberships(&mut self, topic_id: TopicId) -> CapstoneResult<Vec<Membership>> {
        let version = self.storage.membership_version(topic_id)?;
        let memberships = self.storage.membership_list_by_topic(topic_id)?;
        self.changes
            .guard(VersionGuard::Memberships { topic_id, version });
        Ok(memberships)
    }

    fn guard_council(&mut self, council: &MilestoneCouncil) {
        self.changes.guard(VersionGuard::MilestoneCouncil {
            council_id: council.council_id,
            version: council.version,
        });
    }

    // === Unguarded reads (backed by uniqueness constraints at commit) ===

    /// Whether `approver_email` already approved the topic.
    pub fn has_approved(&self, topic_id: TopicId, approver_email: &str) -> CapstoneResult<bool> {
        Ok(self
            .storage
            .approval_list_by_topic(topic_id)?
            .iter()
            .any(|a| a.approver_email.eq_ignore_ascii_case(approver_email)))
    }

    /// Approvals of a topic ordered by `approved_at`.
    pub fn approvals(&self, topic_id: TopicId) -> CapstoneResult<Vec<Approval>> {
        self.storage.approval_list_by_topic(topic_id)
    }

    pub fn membership(
        &self,
        topic_id: TopicId,
        account_id: AccountId,
    ) -> CapstoneResult<Option<Membership>> {
        self.storage.membership_get(topic_id, account_id)
    }

    pub fn defense_council_for(&self, topic_id: TopicId) -> CapstoneResult<Option<DefenseCouncil>> {
        self.storage.defense_council_get_by_topic(topic_id)
    }

    // === Staged writes ===

    /// Queue a write for commit.
    pub fn stage(&mut self, mutation: Mutation) {
        self.changes.push(mutation);
    }

    /// Stage a topic update and return the row as it will read after commit.
    pub fn update_topic(&mut self, topic: Topic) -> Topic {
        let committed = Topic {
            version: topic.version + 1,
            ..topic.clone()
        };
        self.stage(Mutation::UpdateTopic(topic));
        committed
    }

    /// Stage a milestone council update and return the row as it will read after commit.
    pub fn update_milestone_council(&mut self, council: MilestoneCouncil) -> MilestoneCouncil {
        let committed = MilestoneCouncil {
            version: council.version + 1,
            ..council.clone()
        };
        self.stage(Mutation::UpdateMilestoneCouncil(council));
        committed
    }

    /// The accumulated change set.
    pub fn into_change_set(self) -> ChangeSet {
        self.changes
    }
}

/// Run `op` in a fresh transaction and commit what it staged.
///
/// A commit that fails with a retryable conflict re-runs `op` from scratch,
/// at most `max_retries` extra times; after that `Conflict` is returned.
/// Errors returned by `op` itself abort without committing anything.
pub fn run_transaction<T, F>(
    storage: &dyn StorageTrait,
    max_retries: u32,
    mut op: F,
) -> CapstoneResult<T>
where
    F: FnMut(&mut Transaction<'_>) -> CapstoneResult<T>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        let mut tx = Transaction::new(storage);
        let value = op(&mut tx)?;

        match storage.commit(tx.into_change_set()) {
            Ok(()) => return Ok(value),
            Err(err) if err.is_retryable_conflict() => {
                if attempt > max_retries {
                    tracing::warn!(attempts = attempt, error = %err, "giving up after commit conflicts");
                    return Err(WorkflowError::Conflict { attempts: attempt }.into());
                }
                tracing::debug!(attempt, error = %err, "commit conflict, retrying transaction");
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryStorage;
    use capstone_core::{CapstoneError, ErrorKind, TopicStatus};
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    fn seeded(storage: &InMemoryStorage) -> Topic {
        let topic = Topic::new("Incremental parsing", None, 2);
        run_transaction(storage, 0, |tx| {
            tx.stage(Mutation::InsertTopic(topic.clone()));
            Ok(())
        })
        .unwrap();
        topic
    }

    /// Delegates to an in-memory store but sneaks a competing write in before
    /// the first `conflicts` commits.
    struct Interfering {
        inner: InMemoryStorage,
        topic_id: TopicId,
        conflicts: AtomicU64,
    }

    impl StorageTrait for Interfering {
        fn topic_get(&self, id: TopicId) -> CapstoneResult<Option<Topic>> {
            self.inner.topic_get(id)
        }
        fn topic_list(&self) -> CapstoneResult<Vec<Topic>> {
            self.inner.topic_list()
        }
        fn topic_list_by_status(&self, status: TopicStatus) -> CapstoneResult<Vec<Topic>> {
            self.inner.topic_list_by_status(status)
        }
        fn approval_list_by_topic(&self, topic_id: TopicId) -> CapstoneResult<Vec<Approval>> {
            self.inner.approval_list_by_topic(topic_id)
        }
        fn approval_list_by_approver(&self, email: &str) -> CapstoneResult<Vec<Approval>> {
            self.inner.approval_list_by_approver(email)
        }
        fn membership_get(
            &self,
            topic_id: TopicId,
            account_id: AccountId,
        ) -> CapstoneResult<Option<Membership>> {
            self.inner.membership_get(topic_id, account_id)
        }
        fn membership_list_by_topic(&self, topic_id: TopicId) -> CapstoneResult<Vec<Membership>> {
            self.inner.membership_list_by_topic(topic_id)
        }
        fn membership_version(&self, topic_id: TopicId) -> CapstoneResult<u64> {
            self.inner.membership_version(topic_id)
        }
        fn defense_council_get_by_topic(
            &self,
            topic_id: TopicId,
        ) -> CapstoneResult<Option<DefenseCouncil>> {
            self.inner.defense_council_get_by_topic(topic_id)
        }
        fn defense_council_list_by_slot(
            &self,
            date: NaiveDate,
            slot: u8,
        ) -> CapstoneResult<Vec<DefenseCouncil>> {
            self.inner.defense_council_list_by_slot(date, slot)
        }
        fn slot_version(&self, date: NaiveDate, slot: u8) -> CapstoneResult<u64> {
            self.inner.slot_version(date, slot)
        }
        fn milestone_council_get(
            &self,
            id: MilestoneCouncilId,
        ) -> CapstoneResult<Option<MilestoneCouncil>> {
            self.inner.milestone_council_get(id)
        }
        fn milestone_council_get_by_milestone(
            &self,
            topic_id: TopicId,
            milestone: Milestone,
        ) -> CapstoneResult<Option<MilestoneCouncil>> {
            self.inner.milestone_council_get_by_milestone(topic_id, milestone)
        }
        fn milestone_council_list_by_topic(
            &self,
            topic_id: TopicId,
        ) -> CapstoneResult<Vec<MilestoneCouncil>> {
            self.inner.milestone_council_list_by_topic(topic_id)
        }
        fn commit(&self, changes: ChangeSet) -> CapstoneResult<()> {
            let remaining = self.conflicts.load(Ordering::SeqCst);
            if remaining > 0 {
                self.conflicts.store(remaining - 1, Ordering::SeqCst);
                let mut topic = self.inner.topic_get(self.topic_id)?.ok_or_else(|| {
                    CapstoneError::from(StorageError::not_found(self.topic_id))
                })?;
                topic.description = Some(format!("edited {remaining}"));
                self.inner.commit(ChangeSet {
                    guards: Vec::new(),
                    mutations: vec![Mutation::UpdateTopic(topic)],
                })?;
            }
            self.inner.commit(changes)
        }
    }

    fn interfering(conflicts: u64) -> Interfering {
        let inner = InMemoryStorage::new();
        let topic = seeded(&inner);
        Interfering {
            inner,
            topic_id: topic.topic_id,
            conflicts: AtomicU64::new(conflicts),
        }
    }

    fn approve_once(
        storage: &dyn StorageTrait,
        topic_id: TopicId,
        runs: &AtomicUsize,
        retries: u32,
    ) -> CapstoneResult<()> {
        run_transaction(storage, retries, |tx| {
            runs.fetch_add(1, Ordering::SeqCst);
            let topic = tx.topic(topic_id)?;
            tx.stage(Mutation::InsertApproval(Approval::new(
                topic.topic_id,
                "hod@uni.edu",
                "Head",
                None,
            )));
            Ok(())
        })
    }

    #[test]
    fn test_commit_applies_staged_writes() {
        let storage = InMemoryStorage::new();
        let topic = seeded(&storage);
        let runs = AtomicUsize::new(0);

        approve_once(&storage, topic.topic_id, &runs, 3).unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(storage.approval_count().unwrap(), 1);
    }

    #[test]
    fn test_closure_error_commits_nothing() {
        let storage = InMemoryStorage::new();
        let topic = seeded(&storage);
        let before = storage.snapshot().unwrap();

        let result: CapstoneResult<()> = run_transaction(&storage, 3, |tx| {
            tx.stage(Mutation::DeleteTopic(topic.topic_id));
            Err(WorkflowError::Unauthorized {
                account_id: AccountId::nil(),
                action: "delete topic".to_string(),
            }
            .into())
        });

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Unauthorized);
        assert_eq!(storage.snapshot().unwrap(), before);
    }

    #[test]
    fn test_missing_topic_is_not_found() {
        let storage = InMemoryStorage::new();
        let result = run_transaction(&storage, 3, |tx| tx.topic(TopicId::now_v7()));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_conflict_is_retried_until_success() {
        let storage = interfering(2);
        let runs = AtomicUsize::new(0);

        approve_once(&storage, storage.topic_id, &runs, 3).unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert_eq!(storage.inner.approval_count().unwrap(), 1);
    }

    #[test]
    fn test_conflict_surfaces_after_retries_exhausted() {
        let storage = interfering(10);
        let runs = AtomicUsize::new(0);

        let result = approve_once(&storage, storage.topic_id, &runs, 2);

        assert_eq!(
            result,
            Err(CapstoneError::Workflow(WorkflowError::Conflict { attempts: 3 }))
        );
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert_eq!(storage.inner.approval_count().unwrap(), 0);
    }

    #[test]
    fn test_booked_accounts_guards_slot() {
        let storage = InMemoryStorage::new();
        let date = NaiveDate::from_ymd_opt(2026, 9, 3).unwrap();
        let mut tx = Transaction::new(&storage);

        assert!(tx.booked_accounts(date, 1).unwrap().is_empty());
        let changes = tx.into_change_set();
        assert_eq!(
            changes.guards,
            vec![VersionGuard::Slot {
                date,
                slot: 1,
                version: 0
            }]
        );
    }

    #[test]
    fn test_memberships_guard_detects_join() {
        let storage = InMemoryStorage::new();
        let topic = seeded(&storage);
        let mut tx = Transaction::new(&storage);
        assert!(tx.memberships(topic.topic_id).unwrap().is_empty());

        run_transaction(&storage, 0, |join| {
            join.stage(Mutation::InsertMembership(Membership::member(
                topic.topic_id,
                AccountId::now_v7(),
                "Linh",
            )));
            Ok(())
        })
        .unwrap();

        let err = storage.commit(tx.into_change_set()).unwrap_err();
        assert!(err.is_retryable_conflict());
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }
}
