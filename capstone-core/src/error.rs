//! Error types for Capstone operations

use crate::{
    AccountId, DefenseCouncilId, EntityIdType, EntityType, Milestone, MilestoneCouncilId,
    TopicId, TopicStatus,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {entity_type:?} with id {id}")]
    NotFound { entity_type: EntityType, id: Uuid },

    #[error("Insert failed for {entity_type:?}: {reason}")]
    InsertFailed { entity_type: EntityType, reason: String },

    #[error("Version conflict on {entity_type:?} {key}: expected {expected}, found {found}")]
    VersionConflict {
        entity_type: EntityType,
        key: String,
        expected: u64,
        found: u64,
    },

    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

impl StorageError {
    /// NotFound for any strongly-typed ID.
    pub fn not_found<I: EntityIdType>(id: I) -> Self {
        StorageError::NotFound {
            entity_type: I::ENTITY_TYPE,
            id: id.as_uuid(),
        }
    }

    /// Whether re-running the transaction against fresh state may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StorageError::VersionConflict { .. } | StorageError::UniqueViolation { .. }
        )
    }
}

/// Workflow rule violations raised by the approval and review engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Topic {topic_id} already approved by {approver_email}")]
    AlreadyApproved {
        topic_id: TopicId,
        approver_email: String,
    },

    #[error("Account {account_id} is already a member of topic {topic_id}")]
    AlreadyMember {
        topic_id: TopicId,
        account_id: AccountId,
    },

    #[error("Cannot {operation} topic {topic_id} in status {status}")]
    InvalidStatus {
        topic_id: TopicId,
        status: TopicStatus,
        operation: String,
    },

    #[error("Unknown semester: {token}")]
    InvalidSemester { token: String },

    #[error("Not enough lecturers available: need {required}, found {available}")]
    NotEnoughLecturers { required: usize, available: usize },

    #[error("Lecturer {account_id} supervises topic {topic_id} and cannot review it")]
    MemberCannotBeSupervisor {
        topic_id: TopicId,
        account_id: AccountId,
    },

    #[error("Invalid council members: {reason}")]
    MemberNotValid { reason: String },

    #[error("No {milestone} review council found for topic {topic_id}")]
    PreviousReviewCouncilNotFound {
        topic_id: TopicId,
        milestone: Milestone,
    },

    #[error("Lecturer {account_id} holds no seat on council {council_id}")]
    LecturerIsNotMember {
        council_id: MilestoneCouncilId,
        account_id: AccountId,
    },

    #[error("Council {council_id} has already been graded")]
    CouncilAlreadyGraded { council_id: MilestoneCouncilId },

    #[error("Cannot remove creator {account_id} from topic {topic_id}")]
    CannotRemoveCreator {
        topic_id: TopicId,
        account_id: AccountId,
    },

    #[error("Account {account_id} is not allowed to {action}")]
    Unauthorized { account_id: AccountId, action: String },

    #[error("Topic {topic_id} already has defense council {council_id}")]
    CouncilAlreadyAssigned {
        topic_id: TopicId,
        council_id: DefenseCouncilId,
    },

    #[error("Transaction conflict persisted after {attempts} attempts")]
    Conflict { attempts: u32 },
}

/// Input validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Capstone errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CapstoneError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for Capstone operations.
pub type CapstoneResult<T> = Result<T, CapstoneError>;

// ============================================================================
// ERROR KINDS
// ============================================================================

/// Flat error classification for transport layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    AlreadyApproved,
    AlreadyMember,
    InvalidStatus,
    InvalidSemester,
    NotEnoughLecturers,
    MemberCannotBeSupervisor,
    MemberNotValid,
    PreviousReviewCouncilNotFound,
    LecturerIsNotMember,
    CouncilAlreadyGraded,
    CannotRemoveCreator,
    Unauthorized,
    Conflict,
    Validation,
    Internal,
}

impl CapstoneError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CapstoneError::Storage(StorageError::NotFound { .. }) => ErrorKind::NotFound,
            CapstoneError::Storage(err) if err.is_retryable() => ErrorKind::Conflict,
            CapstoneError::Storage(_) => ErrorKind::Internal,
            CapstoneError::Workflow(err) => match err {
                WorkflowError::AlreadyApproved { .. } => ErrorKind::AlreadyApproved,
                WorkflowError::AlreadyMember { .. } => ErrorKind::AlreadyMember,
                WorkflowError::InvalidStatus { .. } => ErrorKind::InvalidStatus,
                WorkflowError::CouncilAlreadyAssigned { .. } => ErrorKind::InvalidStatus,
                WorkflowError::InvalidSemester { .. } => ErrorKind::InvalidSemester,
                WorkflowError::NotEnoughLecturers { .. } => ErrorKind::NotEnoughLecturers,
                WorkflowError::MemberCannotBeSupervisor { .. } => {
                    ErrorKind::MemberCannotBeSupervisor
                }
                WorkflowError::MemberNotValid { .. } => ErrorKind::MemberNotValid,
                WorkflowError::PreviousReviewCouncilNotFound { .. } => {
                    ErrorKind::PreviousReviewCouncilNotFound
                }
                WorkflowError::LecturerIsNotMember { .. } => ErrorKind::LecturerIsNotMember,
                WorkflowError::CouncilAlreadyGraded { .. } => ErrorKind::CouncilAlreadyGraded,
                WorkflowError::CannotRemoveCreator { .. } => ErrorKind::CannotRemoveCreator,
                WorkflowError::Unauthorized { .. } => ErrorKind::Unauthorized,
                WorkflowError::Conflict { .. } => ErrorKind::Conflict,
            },
            CapstoneError::Validation(_) => ErrorKind::Validation,
            CapstoneError::Config(_) => ErrorKind::Internal,
        }
    }

    /// Whether this error is a retryable commit conflict.
    pub fn is_retryable_conflict(&self) -> bool {
        matches!(self, CapstoneError::Storage(err) if err.is_retryable())
    }
}

// =============================================================================
// TESTS
// =============================================================================
