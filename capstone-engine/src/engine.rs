//! Engine facade
//!
//! [`CapstoneEngine`] wires the four workflow components to one storage
//! backend and one set of collaborators. It is the surface a transport
//! layer wraps; every call is synchronous and returns a typed result.

use crate::{
    ApprovalLedger, ApprovalOutcome, CouncilScheduler, MembershipRegistry, ProgressReviewWorkflow,
};
use capstone_core::{
    AccountDirectory, AccountId, Approval, CapstoneResult, Clock, DefenseCouncil, EngineConfig,
    GradeDecision, LoggingNotificationSink, Membership, Milestone, MilestoneCouncil,
    MilestoneCouncilId, NotificationSink, RandomSource, StdRandomSource, StorageError,
    SystemClock, Topic, TopicId, TopicStatus, MILESTONE_COUNCIL_SIZE,
};
use capstone_storage::StorageTrait;
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Thesis topic workflow engine.
#[derive(Clone)]
pub struct CapstoneEngine {
    config: EngineConfig,
    storage: Arc<dyn StorageTrait>,
    membership: MembershipRegistry,
    approvals: ApprovalLedger,
    scheduler: CouncilScheduler,
    reviews: ProgressReviewWorkflow,
}

impl CapstoneEngine {
    /// Build an engine. Fails if `config` does not validate.
    pub fn new(
        config: EngineConfig,
        storage: Arc<dyn StorageTrait>,
        directory: Arc<dyn AccountDirectory>,
        notifier: Arc<dyn NotificationSink>,
        random: Arc<dyn RandomSource>,
        clock: Arc<dyn Clock>,
    ) -> CapstoneResult<Self> {
        config.validate()?;

        let membership = MembershipRegistry::new(storage.clone(), config.clone());
        let approvals = ApprovalLedger::new(
            storage.clone(),
            directory.clone(),
            notifier,
            config.clone(),
        );
        let scheduler = CouncilScheduler::new(
            storage.clone(),
            directory.clone(),
            random,
            clock,
            config.clone(),
        );
        let reviews = ProgressReviewWorkflow::new(storage.clone(), directory, config.clone());

        tracing::info!(
            required_approvals = config.required_approvals,
            max_conflict_retries = config.max_conflict_retries,
            "capstone engine ready"
        );
        Ok(Self {
            config,
            storage,
            membership,
            approvals,
            scheduler,
            reviews,
        })
    }

    /// Engine with log-only notifications, an entropy-seeded random source
    /// and the system clock.
    pub fn with_defaults(
        config: EngineConfig,
        storage: Arc<dyn StorageTrait>,
        directory: Arc<dyn AccountDirectory>,
    ) -> CapstoneResult<Self> {
        Self::new(
            config,
            storage,
            directory,
            Arc::new(LoggingNotificationSink),
            Arc::new(StdRandomSource::from_entropy()),
            Arc::new(SystemClock),
        )
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ========================================================================
    // TOPICS & MEMBERSHIP
    // ========================================================================

    pub fn create_topic(
        &self,
        title: &str,
        description: Option<String>,
        creator_id: AccountId,
        creator_name: &str,
    ) -> CapstoneResult<Topic> {
        self.membership
            .create_topic(title, description, creator_id, creator_name)
    }

    pub fn join_topic(
        &self,
        topic_id: TopicId,
        account_id: AccountId,
        account_name: &str,
    ) -> CapstoneResult<Membership> {
        self.membership.join(topic_id, account_id, account_name)
    }

    pub fn remove_member(&self, topic_id: TopicId, account_id: AccountId) -> CapstoneResult<()> {
        self.membership.remove_member(topic_id, account_id)
    }

    pub fn can_user_edit_topic(
        &self,
        topic_id: TopicId,
        account_id: AccountId,
    ) -> CapstoneResult<bool> {
        self.membership.can_edit(topic_id, account_id)
    }

    pub fn update_topic(
        &self,
        topic_id: TopicId,
        editor_id: AccountId,
        title: &str,
        description: Option<String>,
    ) -> CapstoneResult<Topic> {
        self.membership
            .update_topic(topic_id, editor_id, title, description)
    }

    pub fn delete_topic(&self, topic_id: TopicId, actor_id: AccountId) -> CapstoneResult<()> {
        self.membership.delete_topic(topic_id, actor_id)
    }

    pub fn get_topic(&self, topic_id: TopicId) -> CapstoneResult<Topic> {
        self.storage
            .topic_get(topic_id)?
            .ok_or_else(|| StorageError::not_found(topic_id).into())
    }

    /// All topics in creation order.
    pub fn list_topics(&self) -> CapstoneResult<Vec<Topic>> {
        self.storage.topic_list()
    }

    pub fn list_topics_by_status(&self, status: TopicStatus) -> CapstoneResult<Vec<Topic>> {
        self.storage.topic_list_by_status(status)
    }

    pub fn get_members(&self, topic_id: TopicId) -> CapstoneResult<Vec<Membership>> {
        self.membership.members(topic_id)
    }

    pub fn get_affiliated_accounts(
        &self,
        topic_id: TopicId,
    ) -> CapstoneResult<BTreeSet<AccountId>> {
        self.membership.affiliated_accounts(topic_id)
    }

    // ========================================================================
    // APPROVAL
    // ========================================================================

    /// Multi-approver consensus approval.
    pub fn approve_topic_v2(
        &self,
        topic_id: TopicId,
        approver_email: &str,
        approver_name: &str,
        comment: Option<String>,
    ) -> CapstoneResult<ApprovalOutcome> {
        self.approvals
            .approve(topic_id, approver_email, approver_name, comment)
    }

    pub fn approve_legacy(&self, topic_id: TopicId, actor_id: AccountId) -> CapstoneResult<Topic> {
        self.approvals.approve_legacy(topic_id, actor_id)
    }

    pub fn reject_legacy(&self, topic_id: TopicId, actor_id: AccountId) -> CapstoneResult<Topic> {
        self.approvals.reject_legacy(topic_id, actor_id)
    }

    pub fn get_pending_approvals_for(&self, approver_email: &str) -> CapstoneResult<Vec<Topic>> {
        self.approvals.pending_for(approver_email)
    }

    pub fn get_partially_approved_by(&self, approver_email: &str) -> CapstoneResult<Vec<Topic>> {
        self.approvals.partially_approved_by(approver_email)
    }

    pub fn get_fully_approved(&self) -> CapstoneResult<Vec<Topic>> {
        self.approvals.fully_approved()
    }

    pub fn get_approvals(&self, topic_id: TopicId) -> CapstoneResult<Vec<Approval>> {
        self.approvals.approvals_for(topic_id)
    }

    // ========================================================================
    // COUNCILS
    // ========================================================================

    pub fn assign_defense_council(
        &self,
        topic_id: TopicId,
        semester_token: &str,
    ) -> CapstoneResult<DefenseCouncil> {
        self.scheduler
            .assign_defense_council(topic_id, semester_token)
    }

    pub fn get_defense_council(&self, topic_id: TopicId) -> CapstoneResult<Option<DefenseCouncil>> {
        self.scheduler.defense_council_for(topic_id)
    }

    pub fn create_milestone_council(
        &self,
        topic_id: TopicId,
        milestone: Milestone,
        review_date: NaiveDate,
        lecturers: [AccountId; MILESTONE_COUNCIL_SIZE],
    ) -> CapstoneResult<MilestoneCouncil> {
        self.reviews
            .create_milestone_council(topic_id, milestone, review_date, lecturers)
    }

    pub fn grade_council(
        &self,
        council_id: MilestoneCouncilId,
        grader_id: AccountId,
        decision: GradeDecision,
        comments: Option<String>,
    ) -> CapstoneResult<MilestoneCouncil> {
        self.reviews
            .grade_council(council_id, grader_id, decision, comments)
    }

    pub fn get_milestone_councils(
        &self,
        topic_id: TopicId,
    ) -> CapstoneResult<Vec<MilestoneCouncil>> {
        self.reviews.milestone_councils_for(topic_id)
    }

    pub fn get_milestone_council(
        &self,
        council_id: MilestoneCouncilId,
    ) -> CapstoneResult<MilestoneCouncil> {
        self.reviews.milestone_council(council_id)
    }
}
