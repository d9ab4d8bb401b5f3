//! Topic Membership
//!
//! Creation of topics with their creator row, joining, leaving, and the
//! edit/delete rights that follow from membership.

use capstone_core::{
    AccountId, CapstoneError, CapstoneResult, EngineConfig, EntityIdType, EntityType, Membership,
    StorageError, Topic, TopicId, TopicStatus, ValidationError, WorkflowError,
};
use capstone_storage::{run_transaction, Mutation, StorageTrait, Transaction};
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Membership and topic ownership operations.
#[derive(Clone)]
pub struct MembershipRegistry {
    storage: Arc<dyn StorageTrait>,
    config: EngineConfig,
}

impl MembershipRegistry {
    pub fn new(storage: Arc<dyn StorageTrait>, config: EngineConfig) -> Self {
        Self { storage, config }
    }

    fn transact<T>(
        &self,
        op: impl FnMut(&mut Transaction<'_>) -> CapstoneResult<T>,
    ) -> CapstoneResult<T> {
        run_transaction(self.storage.as_ref(), self.config.max_conflict_retries, op)
    }

    // === Commands ===

    /// Create a PENDING topic and its creator membership atomically.
    pub fn create_topic(
        &self,
        title: &str,
        description: Option<String>,
        creator_id: AccountId,
        creator_name: &str,
    ) -> CapstoneResult<Topic> {
        let title = required_title(title)?;
        let topic = Topic::new(title, description, self.config.required_approvals);
        let creator = Membership::creator(topic.topic_id, creator_id, creator_name);

        self.transact(|tx| {
            tx.stage(Mutation::InsertTopic(topic.clone()));
            tx.stage(Mutation::InsertMembership(creator.clone()));
            Ok(())
        })?;

        tracing::info!(
            topic_id = %topic.topic_id,
            creator_id = %creator_id,
            "topic created"
        );
        Ok(topic)
    }

    /// Add `account_id` to a topic as a regular member.
    pub fn join(
        &self,
        topic_id: TopicId,
        account_id: AccountId,
        account_name: &str,
    ) -> CapstoneResult<Membership> {
        let membership = self.transact(|tx| {
            tx.topic(topic_id)?;
            if tx.membership(topic_id, account_id)?.is_some() {
                return Err(WorkflowError::AlreadyMember {
                    topic_id,
                    account_id,
                }
                .into());
            }
            let membership = Membership::member(topic_id, account_id, account_name);
            tx.stage(Mutation::InsertMembership(membership.clone()));
            Ok(membership)
        })?;

        tracing::info!(topic_id = %topic_id, account_id = %account_id, "member joined topic");
        Ok(membership)
    }

    /// Remove a non-creator member.
    pub fn remove_member(&self, topic_id: TopicId, account_id: AccountId) -> CapstoneResult<()> {
        self.transact(|tx| {
            tx.topic(topic_id)?;
            let membership =
                tx.membership(topic_id, account_id)?
                    .ok_or_else(|| StorageError::NotFound {
                        entity_type: EntityType::Membership,
                        id: account_id.as_uuid(),
                    })?;
            if membership.is_creator() {
                return Err(WorkflowError::CannotRemoveCreator {
                    topic_id,
                    account_id,
                }
                .into());
            }
            tx.stage(Mutation::DeleteMembership {
                topic_id,
                account_id,
            });
            Ok(())
        })?;

        tracing::info!(topic_id = %topic_id, account_id = %account_id, "member removed from topic");
        Ok(())
    }

    /// Change title and description. Members only, PENDING topics only.
    pub fn update_topic(
        &self,
        topic_id: TopicId,
        editor_id: AccountId,
        title: &str,
        description: Option<String>,
    ) -> CapstoneResult<Topic> {
        let title = required_title(title)?;
        self.transact(|tx| {
            let mut topic = tx.topic(topic_id)?;
            if tx.membership(topic_id, editor_id)?.is_none() {
                return Err(unauthorized(editor_id, "edit this topic"));
            }
            if topic.status != TopicStatus::Pending {
                return Err(WorkflowError::InvalidStatus {
                    topic_id,
                    status: topic.status,
                    operation: "edit".to_string(),
                }
                .into());
            }
            topic.title = title.to_string();
            topic.description = description.clone();
            topic.updated_at = Utc::now();
            Ok(tx.update_topic(topic))
        })
    }

    /// Delete a PENDING or REJECTED topic with everything that hangs off it.
    /// Only the creator may do this.
    pub fn delete_topic(&self, topic_id: TopicId, actor_id: AccountId) -> CapstoneResult<()> {
        self.transact(|tx| {
            let topic = tx.topic(topic_id)?;
            let is_creator = tx
                .membership(topic_id, actor_id)?
                .is_some_and(|m| m.is_creator());
            if !is_creator {
                return Err(unauthorized(actor_id, "delete this topic"));
            }
            if !matches!(topic.status, TopicStatus::Pending | TopicStatus::Rejected) {
                return Err(WorkflowError::InvalidStatus {
                    topic_id,
                    status: topic.status,
                    operation: "delete".to_string(),
                }
                .into());
            }
            tx.stage(Mutation::DeleteTopic(topic_id));
            Ok(())
        })?;

        tracing::info!(topic_id = %topic_id, actor_id = %actor_id, "topic deleted");
        Ok(())
    }

    // === Queries ===

    /// True iff `account_id` holds a membership (creator or member) on the topic.
    pub fn can_edit(&self, topic_id: TopicId, account_id: AccountId) -> CapstoneResult<bool> {
        Ok(self.storage.membership_get(topic_id, account_id)?.is_some())
    }

    /// All members of a topic, creator included, in join order.
    pub fn members(&self, topic_id: TopicId) -> CapstoneResult<Vec<Membership>> {
        if self.storage.topic_get(topic_id)?.is_none() {
            return Err(StorageError::not_found(topic_id).into());
        }
        self.storage.membership_list_by_topic(topic_id)
    }

    /// Accounts affiliated with the topic. These may never review it.
    pub fn affiliated_accounts(&self, topic_id: TopicId) -> CapstoneResult<BTreeSet<AccountId>> {
        Ok(self
            .storage
            .membership_list_by_topic(topic_id)?
            .into_iter()
            .map(|m| m.account_id)
            .collect())
    }
}

/// Affiliated accounts as seen from inside a transaction.
pub(crate) fn affiliated_in(
    tx: &mut Transaction<'_>,
    topic_id: TopicId,
) -> CapstoneResult<BTreeSet<AccountId>> {
    Ok(tx
        .memberships(topic_id)?
        .into_iter()
        .map(|m| m.account_id)
        .collect())
}

fn required_title(title: &str) -> CapstoneResult<&str> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: "title".to_string(),
        }
        .into());
    }
    Ok(title)
}

fn unauthorized(account_id: AccountId, action: &str) -> CapstoneError {
    WorkflowError::Unauthorized {
        account_id,
        action: action.to_string(),
    }
    .into()
}
