//! Topic Approval
//!
//! Multi-approver consensus (`approve`) plus the older single-approver
//! flow where a head of department decides alone. Reaching APPROVED sends
//! one notification to the topic creator after the commit.

use capstone_core::{
    AccountDirectory, AccountId, AccountRole, Approval, CapstoneResult, EngineConfig,
    NotificationSink, StorageError, Topic, TopicId, TopicLifecycle, TopicStatus, ValidationError,
    WorkflowError,
};
use capstone_storage::{run_transaction, Mutation, StorageTrait, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Result of a successful `approve` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalOutcome {
    pub topic_id: TopicId,
    /// Topic status after this approval
    pub status: TopicStatus,
    /// `"{count}/{required}"`
    pub ratio: String,
    /// Every approval of the topic, oldest first, this one included
    pub approvals: Vec<Approval>,
}

/// Approval workflows and approval queries.
#[derive(Clone)]
pub struct ApprovalLedger {
    storage: Arc<dyn StorageTrait>,
    directory: Arc<dyn AccountDirectory>,
    notifier: Arc<dyn NotificationSink>,
    config: EngineConfig,
}

impl ApprovalLedger {
    pub fn new(
        storage: Arc<dyn StorageTrait>,
        directory: Arc<dyn AccountDirectory>,
        notifier: Arc<dyn NotificationSink>,
        config: EngineConfig,
    ) -> Self {
        Self {
            storage,
            directory,
            notifier,
            config,
        }
    }

    fn transact<T>(
        &self,
        op: impl FnMut(&mut Transaction<'_>) -> CapstoneResult<T>,
    ) -> CapstoneResult<T> {
        run_transaction(self.storage.as_ref(), self.config.max_conflict_retries, op)
    }

    // === Consensus approval ===

    /// Record one distinct approval.
    ///
    /// Checks run in this order: the topic exists, the approver has not
    /// approved it before, and the topic still awaits approval.
    pub fn approve(
        &self,
        topic_id: TopicId,
        approver_email: &str,
        approver_name: &str,
        comment: Option<String>,
    ) -> CapstoneResult<ApprovalOutcome> {
        let approver_email = normalize_email(approver_email);
        if approver_email.is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "approver_email".to_string(),
            }
            .into());
        }

        let (outcome, title) = self.transact(|tx| {
            let mut topic = tx.topic(topic_id)?;
            if tx.has_approved(topic_id, &approver_email)? {
                return Err(WorkflowError::AlreadyApproved {
                    topic_id,
                    approver_email: approver_email.clone(),
                }
                .into());
            }

            TopicLifecycle::record_approval(&mut topic)?;
            let approval =
                Approval::new(topic_id, &approver_email, approver_name, comment.clone());
            let mut approvals = tx.approvals(topic_id)?;
            approvals.push(approval.clone());

            tx.stage(Mutation::InsertApproval(approval));
            let topic = tx.update_topic(topic);
            let outcome = ApprovalOutcome {
                topic_id,
                status: topic.status,
                ratio: topic.approval_ratio(),
                approvals,
            };
            Ok((outcome, topic.title))
        })?;

        tracing::info!(
            topic_id = %topic_id,
            approver = %approver_email,
            ratio = %outcome.ratio,
            status = %outcome.status,
            "topic approval recorded"
        );

        if outcome.status == TopicStatus::Approved {
            self.notify_creator(topic_id, &title);
        }
        Ok(outcome)
    }

    // === Single-approver flow ===

    /// Approve a PENDING topic outright. Head of department only.
    pub fn approve_legacy(&self, topic_id: TopicId, actor_id: AccountId) -> CapstoneResult<Topic> {
        self.require_head(actor_id, "approve topics")?;
        let topic = self.transact(|tx| {
            let mut topic = tx.topic(topic_id)?;
            TopicLifecycle::approve_legacy(&mut topic)?;
            Ok(tx.update_topic(topic))
        })?;

        tracing::info!(topic_id = %topic_id, actor_id = %actor_id, "topic approved by head of department");
        self.notify_creator(topic_id, &topic.title);
        Ok(topic)
    }

    /// Reject a PENDING topic. Head of department only.
    pub fn reject_legacy(&self, topic_id: TopicId, actor_id: AccountId) -> CapstoneResult<Topic> {
        self.require_head(actor_id, "reject topics")?;
        let topic = self.transact(|tx| {
            let mut topic = tx.topic(topic_id)?;
            TopicLifecycle::reject_legacy(&mut topic)?;
            Ok(tx.update_topic(topic))
        })?;

        tracing::info!(topic_id = %topic_id, actor_id = %actor_id, "topic rejected by head of department");
        Ok(topic)
    }

    fn require_head(&self, actor_id: AccountId, action: &str) -> CapstoneResult<()> {
        let actor = self
            .directory
            .get_account(actor_id)
            .ok_or_else(|| StorageError::not_found(actor_id))?;
        if actor.role != AccountRole::HeadOfDepartment {
            return Err(WorkflowError::Unauthorized {
                account_id: actor_id,
                action: action.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Tell the creator their topic was approved. Never fails the caller.
    fn notify_creator(&self, topic_id: TopicId, title: &str) {
        let creator = match self.storage.membership_list_by_topic(topic_id) {
            Ok(members) => members.into_iter().find(|m| m.is_creator()),
            Err(err) => {
                tracing::warn!(topic_id = %topic_id, error = %err, "could not load topic creator");
                return;
            }
        };
        let Some(email) = creator
            .and_then(|m| self.directory.get_account(m.account_id))
            .map(|account| account.email)
        else {
            tracing::warn!(topic_id = %topic_id, "topic creator has no directory entry, skipping notification");
            return;
        };

        if let Err(err) = self.notifier.notify_topic_approved(&email, title, topic_id) {
            tracing::warn!(
                topic_id = %topic_id,
                to = %email,
                error = %err,
                "approval notification failed"
            );
        }
    }

    // === Queries ===

    /// Topics still awaiting approval that `approver_email` has not approved.
    pub fn pending_for(&self, approver_email: &str) -> CapstoneResult<Vec<Topic>> {
        let approved = self.approved_topics(approver_email)?;
        self.awaiting_approval(|t| !approved.contains(&t.topic_id))
    }

    /// UNDER_REVIEW topics that `approver_email` has already approved.
    pub fn partially_approved_by(&self, approver_email: &str) -> CapstoneResult<Vec<Topic>> {
        let approved = self.approved_topics(approver_email)?;
        Ok(self
            .storage
            .topic_list_by_status(TopicStatus::UnderReview)?
            .into_iter()
            .filter(|t| approved.contains(&t.topic_id))
            .collect())
    }

    /// APPROVED topics whose approval count reached the requirement.
    pub fn fully_approved(&self) -> CapstoneResult<Vec<Topic>> {
        Ok(self
            .storage
            .topic_list_by_status(TopicStatus::Approved)?
            .into_iter()
            .filter(Topic::is_fully_approved)
            .collect())
    }

    /// Approvals of a topic, oldest first.
    pub fn approvals_for(&self, topic_id: TopicId) -> CapstoneResult<Vec<Approval>> {
        if self.storage.topic_get(topic_id)?.is_none() {
            return Err(StorageError::not_found(topic_id).into());
        }
        self.storage.approval_list_by_topic(topic_id)
    }

    fn approved_topics(&self, approver_email: &str) -> CapstoneResult<HashSet<TopicId>> {
        Ok(self
            .storage
            .approval_list_by_approver(&normalize_email(approver_email))?
            .into_iter()
            .map(|a| a.topic_id)
            .collect())
    }

    fn awaiting_approval(&self, keep: impl Fn(&Topic) -> bool) -> CapstoneResult<Vec<Topic>> {
        let mut topics = self.storage.topic_list_by_status(TopicStatus::Pending)?;
        topics.extend(self.storage.topic_list_by_status(TopicStatus::UnderReview)?);
        topics.retain(|t| keep(t));
        topics.sort_by_key(|t| (t.created_at, t.topic_id));
        Ok(topics)
    }
}

/// Approvers are identified by email, compared without regard to case.
fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MembershipRegistry;
    use capstone_core::{EntityType, ErrorKind};
    use capstone_storage::InMemoryStorage;
    use capstone_test_utils::assertions::{assert_kind, assert_not_found, assert_store_unchanged};
    use capstone_test_utils::fixtures::{test_config, Campus};
    use capstone_test_utils::{FailingNotifier, RecordingNotifier};

    struct Fixture {
        storage: Arc<InMemoryStorage>,
        campus: Campus,
        notifier: Arc<RecordingNotifier>,
        registry: MembershipRegistry,
        ledger: ApprovalLedger,
    }

    fn fixture() -> Fixture {
        let storage = Arc::new(InMemoryStorage::new());
        let campus = Campus::new(3, 2);
        let notifier = Arc::new(RecordingNotifier::new());
        let registry = MembershipRegistry::new(storage.clone(), test_config());
        let ledger = ApprovalLedger::new(
            storage.clone(),
            campus.directory.clone(),
            notifier.clone(),
            test_config(),
        );
        Fixture {
            storage,
            campus,
            notifier,
            registry,
            ledger,
        }
    }

    impl Fixture {
        fn topic(&self) -> Topic {
            let student = &self.campus.students[0];
            self.registry
                .create_topic("Verified compilers", None, student.account_id, &student.name)
                .unwrap()
        }
    }

    #[test]
    fn test_two_approvals_reach_consensus() {
        let fx = fixture();
        let topic = fx.topic();

        let first = fx.ledger.approve(topic.topic_id, "a@uni.edu", "A", None).unwrap();
        assert_eq!(first.status, TopicStatus::UnderReview);
        assert_eq!(first.ratio, "1/2");
        assert!(fx.notifier.sent().is_empty());

        let second = fx
            .ledger
            .approve(topic.topic_id, "b@uni.edu", "B", Some("solid plan".to_string()))
            .unwrap();
        assert_eq!(second.status, TopicStatus::Approved);
        assert_eq!(second.ratio, "2/2");
        assert_eq!(second.approvals.len(), 2);
        assert_eq!(second.approvals[1].comment.as_deref(), Some("solid plan"));

        let sent = fx.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to_email, fx.campus.students[0].email);
        assert_eq!(sent[0].topic_id, topic.topic_id);
    }

    #[test]
    fn test_duplicate_approval_leaves_store_untouched() {
        let fx = fixture();
        let topic = fx.topic();
        fx.ledger.approve(topic.topic_id, "a@uni.edu", "A", None).unwrap();
        let before = fx.storage.snapshot().unwrap();

        let again = fx.ledger.approve(topic.topic_id, "a@uni.edu", "A", None);

        assert_kind(&again, ErrorKind::AlreadyApproved);
        assert_store_unchanged(&fx.storage, &before);
    }

    #[test]
    fn test_approval_on_approved_topic_is_invalid_status() {
        let fx = fixture();
        let topic = fx.topic();
        fx.ledger.approve(topic.topic_id, "a@uni.edu", "A", None).unwrap();
        fx.ledger.approve(topic.topic_id, "b@uni.edu", "B", None).unwrap();

        let third = fx.ledger.approve(topic.topic_id, "c@uni.edu", "C", None);
        assert_kind(&third, ErrorKind::InvalidStatus);

        let stored = fx.storage.topic_get(topic.topic_id).unwrap().unwrap();
        assert_eq!(stored.approval_count, 2);
    }

    #[test]
    fn test_already_approved_wins_over_invalid_status() {
        let fx = fixture();
        let topic = fx.topic();
        fx.ledger.approve(topic.topic_id, "a@uni.edu", "A", None).unwrap();
        fx.ledger.approve(topic.topic_id, "b@uni.edu", "B", None).unwrap();

        let again = fx.ledger.approve(topic.topic_id, "a@uni.edu", "A", None);
        assert_kind(&again, ErrorKind::AlreadyApproved);
    }

    #[test]
    fn test_approve_unknown_topic() {
        let fx = fixture();
        let result = fx.ledger.approve(TopicId::now_v7(), "a@uni.edu", "A", None);
        assert_not_found(&result, EntityType::Topic);
    }

    #[test]
    fn test_notification_failure_does_not_fail_approval() {
        let storage = Arc::new(InMemoryStorage::new());
        let campus = Campus::new(1, 1);
        let notifier = Arc::new(FailingNotifier::new());
        let registry = MembershipRegistry::new(storage.clone(), test_config());
        let ledger = ApprovalLedger::new(
            storage.clone(),
            campus.directory.clone(),
            notifier.clone(),
            test_config(),
        );
        let student = &campus.students[0];
        let topic = registry
            .create_topic("Proof search", None, student.account_id, &student.name)
            .unwrap();

        ledger.approve(topic.topic_id, "a@uni.edu", "A", None).unwrap();
        let outcome = ledger.approve(topic.topic_id, "b@uni.edu", "B", None).unwrap();

        assert_eq!(outcome.status, TopicStatus::Approved);
        assert_eq!(notifier.attempts(), 1);
    }

    #[test]
    fn test_approval_queries() {
        let fx = fixture();
        let first = fx.topic();
        let second = fx.topic();
        fx.ledger.approve(first.topic_id, "a@uni.edu", "A", None).unwrap();

        let pending_a: Vec<TopicId> = fx
            .ledger
            .pending_for("a@uni.edu")
            .unwrap()
            .iter()
            .map(|t| t.topic_id)
            .collect();
        assert_eq!(pending_a, vec![second.topic_id]);

        let pending_b = fx.ledger.pending_for("b@uni.edu").unwrap();
        assert_eq!(pending_b.len(), 2);

        let partial = fx.ledger.partially_approved_by("a@uni.edu").unwrap();
        assert_eq!(partial.len(), 1);
        assert_eq!(partial[0].topic_id, first.topic_id);
        assert!(fx.ledger.fully_approved().unwrap().is_empty());

        fx.ledger.approve(first.topic_id, "b@uni.edu", "B", None).unwrap();
        let full = fx.ledger.fully_approved().unwrap();
        assert_eq!(full.len(), 1);
        assert!(fx.ledger.partially_approved_by("a@uni.edu").unwrap().is_empty());
    }

    #[test]
    fn test_legacy_flow_requires_head_of_department() {
        let fx = fixture();
        let topic = fx.topic();

        let by_lecturer = fx.ledger.approve_legacy(topic.topic_id, fx.campus.lecturer_id(0));
        assert_kind(&by_lecturer, ErrorKind::Unauthorized);

        let unknown = fx.ledger.reject_legacy(topic.topic_id, AccountId::now_v7());
        assert_not_found(&unknown, EntityType::Account);

        let approved = fx
            .ledger
            .approve_legacy(topic.topic_id, fx.campus.head.account_id)
            .unwrap();
        assert_eq!(approved.status, TopicStatus::Approved);
        assert_eq!(fx.notifier.sent().len(), 1);

        let reject_after = fx.ledger.reject_legacy(topic.topic_id, fx.campus.head.account_id);
        assert_kind(&reject_after, ErrorKind::InvalidStatus);
    }

    #[test]
    fn test_legacy_reject() {
        let fx = fixture();
        let topic = fx.topic();
        let rejected = fx
            .ledger
            .reject_legacy(topic.topic_id, fx.campus.head.account_id)
            .unwrap();
        assert_eq!(rejected.status, TopicStatus::Rejected);
        assert!(fx.notifier.sent().is_empty());
    }

    #[test]
    fn test_outcome_serializes_ratio_and_status() {
        let fx = fixture();
        let topic = fx.topic();
        let outcome = fx.ledger.approve(topic.topic_id, "a@uni.edu", "A", None).unwrap();

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["ratio"], "1/2");
        assert_eq!(json["status"], serde_json::to_value(TopicStatus::UnderReview).unwrap());
        let back: ApprovalOutcome = serde_json::from_value(json).unwrap();
        assert_eq!(back, outcome);
    }

    #[test]
    fn test_approver_email_is_case_insensitive() {
        let fx = fixture();
        let topic = fx.topic();
        let first = fx
            .ledger
            .approve(topic.topic_id, "Ha.Nguyen@Uni.EDU", "Ha", None)
            .unwrap();
        assert_eq!(first.approvals[0].approver_email, "ha.nguyen@uni.edu");

        let again = fx
            .ledger
            .approve(topic.topic_id, " ha.nguyen@uni.edu ", "Ha", None);
        assert_kind(&again, ErrorKind::AlreadyApproved);

        let stored = fx.storage.topic_get(topic.topic_id).unwrap().unwrap();
        assert_eq!(stored.approval_count, 1);
        assert!(fx.ledger.pending_for("HA.NGUYEN@UNI.EDU").unwrap().is_empty());
        assert_eq!(
            fx.ledger.partially_approved_by("HA.NGUYEN@UNI.EDU").unwrap().len(),
            1
        );
    }
}
