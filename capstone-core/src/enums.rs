//! Enum types for Capstone entities

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// PARSE ERROR
// ============================================================================

/// Error when parsing an enum from its database string representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumParseError {
    /// Name of the enum being parsed
    pub kind: &'static str,
    /// The rejected input
    pub value: String,
}

impl EnumParseError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

impl fmt::Display for EnumParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid {}: {}", self.kind, self.value)
    }
}

impl std::error::Error for EnumParseError {}

/// Implements `Display` and `FromStr` on top of `as_db_str` / `from_db_str`.
macro_rules! db_str_traits {
    ($name:ident) => {
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.as_db_str())
            }
        }

        impl FromStr for $name {
            type Err = EnumParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_db_str(s)
            }
        }
    };
}

// ============================================================================
// ENTITY TYPE
// ============================================================================

/// Entity type discriminator for polymorphic references and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Topic,
    Approval,
    Membership,
    DefenseCouncil,
    MilestoneCouncil,
    Account,
    /// A (date, slot) booking cell of the defense calendar
    Slot,
}

// ============================================================================
// TOPIC STATUS
// ============================================================================

/// Status of a thesis topic.
///
/// ```text
/// PENDING ──► UNDER_REVIEW ──► APPROVED ──► PASSED_REVIEW_1 ──► PASSED_REVIEW_2 ──► PASSED_REVIEW_3
///    │                            │               │                  │
///    └──► REJECTED                └───────────────┴──────────────────┴──► FAILED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TopicStatus {
    /// Created, waiting for the first approval
    #[default]
    Pending,
    /// At least one approver has signed off
    UnderReview,
    /// Approval consensus reached
    Approved,
    /// Rejected by the head of department
    Rejected,
    /// Week 4 review passed
    #[serde(rename = "PASSED_REVIEW_1")]
    PassedReview1,
    /// Week 8 review passed
    #[serde(rename = "PASSED_REVIEW_2")]
    PassedReview2,
    /// Week 12 review passed
    #[serde(rename = "PASSED_REVIEW_3")]
    PassedReview3,
    /// A milestone review was not passed
    Failed,
}

impl TopicStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [TopicStatus; 8] = [
        TopicStatus::Pending,
        TopicStatus::UnderReview,
        TopicStatus::Approved,
        TopicStatus::Rejected,
        TopicStatus::PassedReview1,
        TopicStatus::PassedReview2,
        TopicStatus::PassedReview3,
        TopicStatus::Failed,
    ];

    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            TopicStatus::Pending => "PENDING",
            TopicStatus::UnderReview => "UNDER_REVIEW",
            TopicStatus::Approved => "APPROVED",
            TopicStatus::Rejected => "REJECTED",
            TopicStatus::PassedReview1 => "PASSED_REVIEW_1",
            TopicStatus::PassedReview2 => "PASSED_REVIEW_2",
            TopicStatus::PassedReview3 => "PASSED_REVIEW_3",
            TopicStatus::Failed => "FAILED",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, EnumParseError> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(TopicStatus::Pending),
            "UNDER_REVIEW" => Ok(TopicStatus::UnderReview),
            "APPROVED" => Ok(TopicStatus::Approved),
            "REJECTED" => Ok(TopicStatus::Rejected),
            "PASSED_REVIEW_1" => Ok(TopicStatus::PassedReview1),
            "PASSED_REVIEW_2" => Ok(TopicStatus::PassedReview2),
            "PASSED_REVIEW_3" => Ok(TopicStatus::PassedReview3),
            "FAILED" => Ok(TopicStatus::Failed),
            _ => Err(EnumParseError::new("topic status", s)),
        }
    }

    /// Terminal states accept no further status transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TopicStatus::Rejected | TopicStatus::Failed | TopicStatus::PassedReview3
        )
    }

    /// Whether the topic is still collecting approvals.
    pub fn is_awaiting_approval(&self) -> bool {
        matches!(self, TopicStatus::Pending | TopicStatus::UnderReview)
    }

    /// Whether a milestone review may still fail the topic.
    pub fn is_in_review(&self) -> bool {
        matches!(
            self,
            TopicStatus::Approved | TopicStatus::PassedReview1 | TopicStatus::PassedReview2
        )
    }

    /// Whether a defense council may be attached in this state.
    pub fn accepts_defense_council(&self) -> bool {
        matches!(
            self,
            TopicStatus::Approved
                | TopicStatus::PassedReview1
                | TopicStatus::PassedReview2
                | TopicStatus::PassedReview3
        )
    }
}

db_str_traits!(TopicStatus);

// ============================================================================
// MEMBERSHIP / COUNCIL ROLES
// ============================================================================

/// Role of an account within a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipRole {
    /// The account that created the topic (exactly one per topic)
    Creator,
    /// An account that joined afterwards
    Member,
}

impl MembershipRole {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            MembershipRole::Creator => "CREATOR",
            MembershipRole::Member => "MEMBER",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, EnumParseError> {
        match s.to_uppercase().as_str() {
            "CREATOR" => Ok(MembershipRole::Creator),
            "MEMBER" => Ok(MembershipRole::Member),
            _ => Err(EnumParseError::new("membership role", s)),
        }
    }
}

db_str_traits!(MembershipRole);

/// Seat role on a defense council.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CouncilRole {
    Chairman,
    Secretary,
    Member,
}

impl CouncilRole {
    /// Seat roles in assignment order: seat 0 chairs, seat 1 records, the rest sit.
    pub const SEATING_ORDER: [CouncilRole; 4] = [
        CouncilRole::Chairman,
        CouncilRole::Secretary,
        CouncilRole::Member,
        CouncilRole::Member,
    ];

    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            CouncilRole::Chairman => "CHAIRMAN",
            CouncilRole::Secretary => "SECRETARY",
            CouncilRole::Member => "MEMBER",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, EnumParseError> {
        match s.to_uppercase().as_str() {
            "CHAIRMAN" => Ok(CouncilRole::Chairman),
            "SECRETARY" => Ok(CouncilRole::Secretary),
            "MEMBER" => Ok(CouncilRole::Member),
            _ => Err(EnumParseError::new("council role", s)),
        }
    }
}

db_str_traits!(CouncilRole);

/// Role of an account in the external directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountRole {
    Student,
    Lecturer,
    HeadOfDepartment,
    Admin,
}

impl AccountRole {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            AccountRole::Student => "STUDENT",
            AccountRole::Lecturer => "LECTURER",
            AccountRole::HeadOfDepartment => "HEAD_OF_DEPARTMENT",
            AccountRole::Admin => "ADMIN",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, EnumParseError> {
        match s.to_uppercase().as_str() {
            "STUDENT" => Ok(AccountRole::Student),
            "LECTURER" => Ok(AccountRole::Lecturer),
            "HEAD_OF_DEPARTMENT" => Ok(AccountRole::HeadOfDepartment),
            "ADMIN" => Ok(AccountRole::Admin),
            _ => Err(EnumParseError::new("account role", s)),
        }
    }

    /// Lecturers and heads of department may sit on review councils.
    pub fn can_sit_on_council(&self) -> bool {
        matches!(self, AccountRole::Lecturer | AccountRole::HeadOfDepartment)
    }
}

db_str_traits!(AccountRole);

// ============================================================================
// COUNCILS
// ============================================================================

/// Lifecycle status shared by defense and milestone councils.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CouncilStatus {
    #[default]
    Planned,
    Completed,
}

impl CouncilStatus {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            CouncilStatus::Planned => "PLANNED",
            CouncilStatus::Completed => "COMPLETED",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, EnumParseError> {
        match s.to_uppercase().as_str() {
            "PLANNED" => Ok(CouncilStatus::Planned),
            "COMPLETED" => Ok(CouncilStatus::Completed),
            _ => Err(EnumParseError::new("council status", s)),
        }
    }
}

db_str_traits!(CouncilStatus);

/// Outcome of a completed milestone review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewResult {
    Passed,
    NotPassed,
}

impl ReviewResult {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            ReviewResult::Passed => "PASSED",
            ReviewResult::NotPassed => "NOT_PASSED",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, EnumParseError> {
        match s.to_uppercase().as_str() {
            "PASSED" => Ok(ReviewResult::Passed),
            "NOT_PASSED" => Ok(ReviewResult::NotPassed),
            _ => Err(EnumParseError::new("review result", s)),
        }
    }
}

db_str_traits!(ReviewResult);

/// Decision held by a milestone council seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatDecision {
    #[default]
    Pending,
    Accept,
    Reject,
}

impl SeatDecision {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            SeatDecision::Pending => "PENDING",
            SeatDecision::Accept => "ACCEPT",
            SeatDecision::Reject => "REJECT",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, EnumParseError> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(SeatDecision::Pending),
            "ACCEPT" => Ok(SeatDecision::Accept),
            "REJECT" => Ok(SeatDecision::Reject),
            _ => Err(EnumParseError::new("seat decision", s)),
        }
    }
}

db_str_traits!(SeatDecision);

/// A grade a lecturer can submit. Unlike [`SeatDecision`] it cannot be pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GradeDecision {
    Accept,
    Reject,
}

impl From<GradeDecision> for SeatDecision {
    fn from(decision: GradeDecision) -> Self {
        match decision {
            GradeDecision::Accept => SeatDecision::Accept,
            GradeDecision::Reject => SeatDecision::Reject,
        }
    }
}

// ============================================================================
// MILESTONES
// ============================================================================

/// Progress-review checkpoint in the thesis timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Milestone {
    #[serde(rename = "WEEK_4")]
    Week4,
    #[serde(rename = "WEEK_8")]
    Week8,
    #[serde(rename = "WEEK_12")]
    Week12,
}

impl Milestone {
    /// All milestones in review order.
    pub const ALL: [Milestone; 3] = [Milestone::Week4, Milestone::Week8, Milestone::Week12];

    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Milestone::Week4 => "WEEK_4",
            Milestone::Week8 => "WEEK_8",
            Milestone::Week12 => "WEEK_12",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, EnumParseError> {
        match s.to_uppercase().as_str() {
            "WEEK_4" => Ok(Milestone::Week4),
            "WEEK_8" => Ok(Milestone::Week8),
            "WEEK_12" => Ok(Milestone::Week12),
            _ => Err(EnumParseError::new("milestone", s)),
        }
    }

    /// The milestone that must have passed before this one can be reviewed.
    pub fn previous(&self) -> Option<Milestone> {
        match self {
            Milestone::Week4 => None,
            Milestone::Week8 => Some(Milestone::Week4),
            Milestone::Week12 => Some(Milestone::Week8),
        }
    }

    /// Topic status required before this milestone's council can be created.
    pub fn required_status(&self) -> TopicStatus {
        match self {
            Milestone::Week4 => TopicStatus::Approved,
            Milestone::Week8 => TopicStatus::PassedReview1,
            Milestone::Week12 => TopicStatus::PassedReview2,
        }
    }

    /// Topic status reached when this milestone's review passes.
    pub fn passed_status(&self) -> TopicStatus {
        match self {
            Milestone::Week4 => TopicStatus::PassedReview1,
            Milestone::Week8 => TopicStatus::PassedReview2,
            Milestone::Week12 => TopicStatus::PassedReview3,
        }
    }
}

db_str_traits!(Milestone);

// ============================================================================
// SEMESTERS
// ============================================================================

/// Academic semester used to anchor defense scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Semester {
    Spring,
    Summer,
    Fall,
    Winter,
}

impl Semester {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Semester::Spring => "SPRING",
            Semester::Summer => "SUMMER",
            Semester::Fall => "FALL",
            Semester::Winter => "WINTER",
        }
    }

    /// Parse a semester token (case-insensitive, surrounding whitespace ignored).
    pub fn from_db_str(s: &str) -> Result<Self, EnumParseError> {
        match s.trim().to_uppercase().as_str() {
            "SPRING" => Ok(Semester::Spring),
            "SUMMER" => Ok(Semester::Summer),
            "FALL" => Ok(Semester::Fall),
            "WINTER" => Ok(Semester::Winter),
            _ => Err(EnumParseError::new("semester", s)),
        }
    }

    /// Month in which the semester's defense window opens.
    pub fn anchor_month(&self) -> u32 {
        match self {
            Semester::Spring => 3,
            Semester::Summer => 6,
            Semester::Fall => 9,
            Semester::Winter => 12,
        }
    }

    /// First day of the defense window in the given year.
    pub fn anchor_date(&self, year: i32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, self.anchor_month(), 1)
    }
}

db_str_traits!(Semester);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_status_db_roundtrip() {
        for status in TopicStatus::ALL {
            assert_eq!(TopicStatus::from_db_str(status.as_db_str()), Ok(status));
        }
        assert!(TopicStatus::from_db_str("ARCHIVED").is_err());
    }

    #[test]
    fn test_topic_status_serde_names() {
        let json = serde_json::to_string(&TopicStatus::PassedReview2).unwrap();
        assert_eq!(json, "\"PASSED_REVIEW_2\"");
        let json = serde_json::to_string(&TopicStatus::UnderReview).unwrap();
        assert_eq!(json, "\"UNDER_REVIEW\"");
    }

    #[test]
    fn test_terminal_states() {
        assert!(TopicStatus::Rejected.is_terminal());
        assert!(TopicStatus::Failed.is_terminal());
        assert!(TopicStatus::PassedReview3.is_terminal());
        assert!(!TopicStatus::Approved.is_terminal());
    }

    #[test]
    fn test_milestone_chain() {
        assert_eq!(Milestone::Week4.previous(), None);
        assert_eq!(Milestone::Week8.previous(), Some(Milestone::Week4));
        assert_eq!(Milestone::Week12.previous(), Some(Milestone::Week8));
        for milestone in Milestone::ALL {
            if let Some(previous) = milestone.previous() {
                assert_eq!(previous.passed_status(), milestone.required_status());
            }
        }
    }

    #[test]
    fn test_milestone_serde_names() {
        let json = serde_json::to_string(&Milestone::Week12).unwrap();
        assert_eq!(json, "\"WEEK_12\"");
    }

    #[test]
    fn test_semester_tokens_are_case_insensitive() {
        assert_eq!("spring".parse::<Semester>(), Ok(Semester::Spring));
        assert_eq!(" Fall ".parse::<Semester>(), Ok(Semester::Fall));
        assert!("AUTUMN".parse::<Semester>().is_err());
    }

    #[test]
    fn test_semester_anchor_dates() {
        let expected = [
            (Semester::Spring, 3),
            (Semester::Summer, 6),
            (Semester::Fall, 9),
            (Semester::Winter, 12),
        ];
        for (semester, month) in expected {
            let date = semester.anchor_date(2026).unwrap();
            assert_eq!(date, NaiveDate::from_ymd_opt(2026, month, 1).unwrap());
        }
    }

    #[test]
    fn test_seating_order() {
        assert_eq!(CouncilRole::SEATING_ORDER[0], CouncilRole::Chairman);
        assert_eq!(CouncilRole::SEATING_ORDER[1], CouncilRole::Secretary);
        assert_eq!(CouncilRole::SEATING_ORDER[2], CouncilRole::Member);
        assert_eq!(CouncilRole::SEATING_ORDER[3], CouncilRole::Member);
    }

    #[test]
    fn test_grade_decision_maps_to_seat_decision() {
        assert_eq!(SeatDecision::from(GradeDecision::Accept), SeatDecision::Accept);
        assert_eq!(SeatDecision::from(GradeDecision::Reject), SeatDecision::Reject);
    }

    #[test]
    fn test_account_role_council_eligibility() {
        assert!(AccountRole::Lecturer.can_sit_on_council());
        assert!(AccountRole::HeadOfDepartment.can_sit_on_council());
        assert!(!AccountRole::Student.can_sit_on_council());
    }
}
