//! Milestone Progress Reviews
//!
//! Two-lecturer councils review a topic at WEEK_4, WEEK_8 and WEEK_12.
//! Each later council must keep exactly one lecturer from the previous one,
//! and a council's consensus moves the topic forward or fails it in the
//! same commit as the grade.

use crate::membership::affiliated_in;
use capstone_core::{
    evaluate_consensus, has_continuity, is_lecturer, lecturer_overlap, AccountDirectory,
    AccountId, CapstoneError, CapstoneResult, CouncilStatus, EngineConfig, GradeDecision,
    Milestone, MilestoneCouncil, MilestoneCouncilId, ReviewResult, StorageError, TopicId,
    TopicLifecycle, WorkflowError, MILESTONE_COUNCIL_SIZE,
};
use capstone_storage::{run_transaction, Mutation, StorageTrait, Transaction};
use chrono::{NaiveDate, Utc};
use std::sync::Arc;

/// Milestone council creation and grading.
#[derive(Clone)]
pub struct ProgressReviewWorkflow {
    storage: Arc<dyn StorageTrait>,
    directory: Arc<dyn AccountDirectory>,
    config: EngineConfig,
}

impl ProgressReviewWorkflow {
    pub fn new(
        storage: Arc<dyn StorageTrait>,
        directory: Arc<dyn AccountDirectory>,
        config: EngineConfig,
    ) -> Self {
        Self {
            storage,
            directory,
            config,
        }
    }

    fn transact<T>(
        &self,
        op: impl FnMut(&mut Transaction<'_>) -> CapstoneResult<T>,
    ) -> CapstoneResult<T> {
        run_transaction(self.storage.as_ref(), self.config.max_conflict_retries, op)
    }

    /// Create the PLANNED council reviewing `milestone` of a topic.
    ///
    /// Validation order: topic exists, the two lecturers are distinct
    /// council-eligible accounts, neither is affiliated with the topic, no
    /// council exists yet for this milestone, then the milestone chain rule.
    pub fn create_milestone_council(
        &self,
        topic_id: TopicId,
        milestone: Milestone,
        review_date: NaiveDate,
        lecturers: [AccountId; MILESTONE_COUNCIL_SIZE],
    ) -> CapstoneResult<MilestoneCouncil> {
        if self.storage.topic_get(topic_id)?.is_none() {
            return Err(StorageError::not_found(topic_id).into());
        }
        if lecturers[0] == lecturers[1] {
            return Err(WorkflowError::MemberNotValid {
                reason: "the two reviewers must be different lecturers".to_string(),
            }
            .into());
        }
        for account_id in lecturers {
            let account = self
                .directory
                .get_account(account_id)
                .ok_or_else(|| StorageError::not_found(account_id))?;
            if !is_lecturer(&account) {
                return Err(WorkflowError::MemberNotValid {
                    reason: format!(
                        "{} ({}) cannot sit on a review council",
                        account.name, account.role
                    ),
                }
                .into());
            }
        }

        let council = self.transact(|tx| {
            let topic = tx.topic(topic_id)?;

            let affiliated = affiliated_in(tx, topic_id)?;
            if let Some(account_id) = lecturers.iter().find(|id| affiliated.contains(*id)) {
                return Err(WorkflowError::MemberCannotBeSupervisor {
                    topic_id,
                    account_id: *account_id,
                }
                .into());
            }

            if tx.milestone_council_for(topic_id, milestone)?.is_some() {
                return Err(WorkflowError::InvalidStatus {
                    topic_id,
                    status: topic.status,
                    operation: format!("create another {} council for", milestone),
                }
                .into());
            }

            if let Some(previous) = milestone.previous() {
                let prior = tx.milestone_council_for(topic_id, previous)?.ok_or(
                    WorkflowError::PreviousReviewCouncilNotFound {
                        topic_id,
                        milestone: previous,
                    },
                )?;
                if !prior.is_passed() {
                    return Err(WorkflowError::InvalidStatus {
                        topic_id,
                        status: topic.status,
                        operation: format!(
                            "create a {} council before {} passed for",
                            milestone, previous
                        ),
                    }
                    .into());
                }
                let prior_ids = prior.lecturer_ids();
                if !has_continuity(&prior_ids, &lecturers) {
                    return Err(WorkflowError::MemberNotValid {
                        reason: format!(
                            "{} council must keep exactly one {} reviewer, found {}",
                            milestone,
                            previous,
                            lecturer_overlap(&prior_ids, &lecturers)
                        ),
                    }
                    .into());
                }
            }

            if topic.status != milestone.required_status() {
                return Err(WorkflowError::InvalidStatus {
                    topic_id,
                    status: topic.status,
                    operation: format!("create a {} council for", milestone),
                }
                .into());
            }

            let council = MilestoneCouncil::planned(topic_id, milestone, review_date, lecturers);
            tx.stage(Mutation::InsertMilestoneCouncil(council.clone()));
            Ok(council)
        })?;

        tracing::info!(
            topic_id = %topic_id,
            council_id = %council.council_id,
            milestone = %milestone,
            "milestone council created"
        );
        Ok(council)
    }

    /// Record one reviewer's decision.
    ///
    /// A reviewer may change their decision while the council is PLANNED.
    /// Any REJECT completes the council as NOT_PASSED and fails the topic;
    /// two ACCEPTs complete it as PASSED and advance the topic.
    pub fn grade_council(
        &self,
        council_id: MilestoneCouncilId,
        grader_id: AccountId,
        decision: GradeDecision,
        comments: Option<String>,
    ) -> CapstoneResult<MilestoneCouncil> {
        let council = self.transact(|tx| {
            let mut council = tx.milestone_council(council_id)?;
            if !council.lecturer_ids().contains(&grader_id) {
                return Err(not_member(council_id, grader_id));
            }
            if council.status != CouncilStatus::Planned {
                return Err(WorkflowError::CouncilAlreadyGraded { council_id }.into());
            }

            let seat = council
                .seat_mut(grader_id)
                .ok_or_else(|| not_member(council_id, grader_id))?;
            seat.decision = decision.into();
            seat.comments = comments.clone();
            council.updated_at = Utc::now();

            if let Some(result) = evaluate_consensus(&council.seats) {
                let mut topic = tx.topic(council.topic_id)?;
                match result {
                    ReviewResult::Passed => {
                        TopicLifecycle::pass_milestone(&mut topic, council.milestone)?
                    }
                    ReviewResult::NotPassed => TopicLifecycle::fail_milestone(&mut topic)?,
                }
                council.status = CouncilStatus::Completed;
                council.result = Some(result);
                tx.update_topic(topic);
            }
            Ok(tx.update_milestone_council(council))
        })?;

        tracing::info!(
            council_id = %council_id,
            grader_id = %grader_id,
            decision = ?decision,
            result = ?council.result,
            "milestone council graded"
        );
        Ok(council)
    }

    /// Councils of a topic ordered WEEK_4, WEEK_8, WEEK_12.
    pub fn milestone_councils_for(&self, topic_id: TopicId) -> CapstoneResult<Vec<MilestoneCouncil>> {
        if self.storage.topic_get(topic_id)?.is_none() {
            return Err(StorageError::not_found(topic_id).into());
        }
        self.storage.milestone_council_list_by_topic(topic_id)
    }

    pub fn milestone_council(&self, council_id: MilestoneCouncilId) -> CapstoneResult<MilestoneCouncil> {
        self.storage
            .milestone_council_get(council_id)?
            .ok_or_else(|| StorageError::not_found(council_id).into())
    }
}

fn not_member(council_id: MilestoneCouncilId, account_id: AccountId) -> CapstoneError {
    WorkflowError::LecturerIsNotMember {
        council_id,
        account_id,
    }
    .into()
}
