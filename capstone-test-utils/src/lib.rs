//! Capstone Test Utilities
//!
//! Centralized test infrastructure for the Capstone workspace:
//! - In-memory fakes for the engine's collaborators
//! - Proptest generators for entity types
//! - Test fixtures for common scenarios
//! - Custom assertions for Capstone-specific validation

// Re-export the in-memory store from its source crate
pub use capstone_storage::{InMemoryStorage, StorageSnapshot, StorageTrait};

// Re-export core types for convenience
pub use capstone_core::{
    Account, AccountDirectory, AccountId, AccountRole, CapstoneError, CapstoneResult, Clock,
    EngineConfig, EntityIdType, EntityType, ErrorKind, GradeDecision, Milestone,
    NotificationError, NotificationSink, RandomSource, Semester, StdRandomSource, StorageError,
    Topic, TopicId, TopicStatus, WorkflowError,
};

use chrono::NaiveDate;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

// ============================================================================
// FAKE COLLABORATORS
// ============================================================================

/// Account directory backed by a fixed list.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    accounts: RwLock<Vec<Account>>,
}

impl StaticDirectory {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self {
            accounts: RwLock::new(accounts),
        }
    }

    /// Add an account after construction.
    pub fn insert(&self, account: Account) {
        self.accounts
            .write()
            .expect("directory lock poisoned")
            .push(account);
    }

    fn find(&self, predicate: impl Fn(&Account) -> bool) -> Option<Account> {
        self.accounts
            .read()
            .expect("directory lock poisoned")
            .iter()
            .find(|a| predicate(a))
            .cloned()
    }
}

impl AccountDirectory for StaticDirectory {
    fn get_account(&self, account_id: AccountId) -> Option<Account> {
        self.find(|a| a.account_id == account_id)
    }

    fn get_account_by_email(&self, email: &str) -> Option<Account> {
        self.find(|a| a.email.eq_ignore_ascii_case(email))
    }

    fn list_lecturers(&self) -> Vec<Account> {
        self.accounts
            .read()
            .expect("directory lock poisoned")
            .iter()
            .filter(|a| a.role.can_sit_on_council())
            .cloned()
            .collect()
    }
}

/// A notification captured by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub to_email: String,
    pub topic_title: String,
    pub topic_id: TopicId,
}

/// Notification sink that remembers every call.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentNotification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything sent so far, in call order.
    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().expect("notifier lock poisoned").clone()
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify_topic_approved(
        &self,
        to_email: &str,
        topic_title: &str,
        topic_id: TopicId,
    ) -> Result<(), NotificationError> {
        self.sent
            .lock()
            .expect("notifier lock poisoned")
            .push(SentNotification {
                to_email: to_email.to_string(),
                topic_title: topic_title.to_string(),
                topic_id,
            });
        Ok(())
    }
}

/// Notification sink whose delivery always fails.
#[derive(Debug, Default)]
pub struct FailingNotifier {
    attempts: AtomicUsize,
}

impl FailingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of delivery attempts made.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl NotificationSink for FailingNotifier {
    fn notify_topic_approved(
        &self,
        _to_email: &str,
        _topic_title: &str,
        _topic_id: TopicId,
    ) -> Result<(), NotificationError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(NotificationError::new("smtp relay unavailable"))
    }
}

/// Clock pinned to one date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Random source that replays scripted draws and never shuffles.
///
/// Each `uniform` call takes the next scripted value, clamped into the
/// requested range; once the script runs out it returns `low`.
#[derive(Debug, Default)]
pub struct ScriptedRandom {
    values: Mutex<VecDeque<u32>>,
}

impl ScriptedRandom {
    pub fn new(values: impl IntoIterator<Item = u32>) -> Self {
        Self {
            values: Mutex::new(values.into_iter().collect()),
        }
    }

    /// Append more draws to the script.
    pub fn push(&self, values: impl IntoIterator<Item = u32>) {
        self.values
            .lock()
            .expect("script lock poisoned")
            .extend(values);
    }
}

impl RandomSource for ScriptedRandom {
    fn uniform(&self, low: u32, high_inclusive: u32) -> u32 {
        self.values
            .lock()
            .expect("script lock poisoned")
            .pop_front()
            .map(|v| v.clamp(low, high_inclusive.max(low)))
            .unwrap_or(low)
    }

    fn shuffle(&self, _ids: &mut [AccountId]) {}
}

/// Seeded production random source.
pub fn seeded_random(seed: u64) -> StdRandomSource {
    StdRandomSource::with_seed(seed)
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating Capstone entity types.

    use super::*;
    use proptest::prelude::*;
    use uuid::Uuid;

    // === Identity Generators ===

    /// Generate a random UUID.
    pub fn arb_uuid() -> impl Strategy<Value = Uuid> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    /// Generate a random TopicId.
    pub fn arb_topic_id() -> impl Strategy<Value = TopicId> {
        arb_uuid().prop_map(TopicId::new)
    }

    /// Generate a random AccountId.
    pub fn arb_account_id() -> impl Strategy<Value = AccountId> {
        arb_uuid().prop_map(AccountId::new)
    }

    // === Enum Generators ===

    pub fn arb_topic_status() -> impl Strategy<Value = TopicStatus> {
        prop::sample::select(TopicStatus::ALL.to_vec())
    }

    pub fn arb_milestone() -> impl Strategy<Value = Milestone> {
        prop::sample::select(Milestone::ALL.to_vec())
    }

    pub fn arb_semester() -> impl Strategy<Value = Semester> {
        prop_oneof![
            Just(Semester::Spring),
            Just(Semester::Summer),
            Just(Semester::Fall),
            Just(Semester::Winter),
        ]
    }

    /// A valid semester token in random letter case.
    pub fn arb_semester_token() -> impl Strategy<Value = String> {
        (arb_semester(), any::<bool>()).prop_map(|(semester, lower)| {
            let token = semester.as_db_str();
            if lower {
                token.to_lowercase()
            } else {
                token.to_string()
            }
        })
    }

    /// A token that is not any semester name.
    pub fn arb_invalid_semester_token() -> impl Strategy<Value = String> {
        "[a-z]{1,10}".prop_filter("must not name a semester", |s| {
            s.parse::<Semester>().is_err()
        })
    }

    pub fn arb_grade_decision() -> impl Strategy<Value = GradeDecision> {
        prop_oneof![Just(GradeDecision::Accept), Just(GradeDecision::Reject)]
    }

    // === Entity Generators ===

    /// Generate a non-blank topic title.
    pub fn arb_title() -> impl Strategy<Value = String> {
        "[A-Z][a-z]{2,12}( [a-z]{2,10}){0,4}"
    }

    /// Generate a university email address.
    pub fn arb_email() -> impl Strategy<Value = String> {
        "[a-z]{3,10}\\.[a-z]{2,8}@uni\\.edu"
    }

    /// Generate an account with the given role.
    pub fn arb_account(role: AccountRole) -> impl Strategy<Value = Account> {
        ("[A-Z][a-z]{2,10}", arb_email()).prop_map(move |(name, email)| Account {
            account_id: AccountId::now_v7(),
            name,
            email,
            role,
        })
    }

    /// Generate `count` lecturers with distinct emails.
    pub fn arb_lecturers(count: usize) -> impl Strategy<Value = Vec<Account>> {
        prop::collection::vec(arb_account(AccountRole::Lecturer), count).prop_map(|mut accounts| {
            for (i, account) in accounts.iter_mut().enumerate() {
                account.email = format!("lecturer{}.{}", i, account.email);
            }
            accounts
        })
    }

    /// Generate a fresh PENDING topic.
    pub fn arb_topic() -> impl Strategy<Value = Topic> {
        (arb_title(), proptest::option::of("[a-z ]{0,40}"), 1u32..4)
            .prop_map(|(title, description, required)| Topic::new(&title, description, required))
    }

    /// Generate a valid engine configuration.
    pub fn arb_valid_config() -> impl Strategy<Value = EngineConfig> {
        (1u32..4, 0u32..5, 1u32..10, 1u8..8).prop_map(
            |(required_approvals, max_conflict_retries, defense_window_days, slots_per_day)| {
                EngineConfig {
                    required_approvals,
                    max_conflict_retries,
                    defense_window_days,
                    slots_per_day,
                }
            },
        )
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common scenarios.

    use super::*;
    use std::sync::Arc;

    /// Build an account with an email derived from the name.
    pub fn account(name: &str, role: AccountRole) -> Account {
        let local: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        Account {
            account_id: AccountId::now_v7(),
            name: name.to_string(),
            email: format!("{}@uni.edu", local),
            role,
        }
    }

    pub fn lecturer(name: &str) -> Account {
        account(name, AccountRole::Lecturer)
    }

    pub fn student(name: &str) -> Account {
        account(name, AccountRole::Student)
    }

    pub fn head_of_department(name: &str) -> Account {
        account(name, AccountRole::HeadOfDepartment)
    }

    /// Default engine configuration with a tight retry budget.
    pub fn test_config() -> EngineConfig {
        EngineConfig {
            max_conflict_retries: 2,
            ..EngineConfig::default()
        }
    }

    /// A mid-January date, before the spring defense window opens.
    pub fn january_2026() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 15).expect("valid date")
    }

    /// A date suitable for milestone reviews.
    pub fn review_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 10).expect("valid date")
    }

    /// A department: one head, some lecturers, some students.
    #[derive(Debug, Clone)]
    pub struct Campus {
        pub directory: Arc<StaticDirectory>,
        pub head: Account,
        pub lecturers: Vec<Account>,
        pub students: Vec<Account>,
    }

    impl Campus {
        /// Build a campus with `lecturers` lecturers and `students` students.
        ///
        /// The head of department also counts as council-eligible.
        pub fn new(lecturers: usize, students: usize) -> Self {
            let head = head_of_department("Dean Tran");
            let lecturers: Vec<Account> = (0..lecturers)
                .map(|i| lecturer(&format!("Lecturer {}", i)))
                .collect();
            let students: Vec<Account> = (0..students)
                .map(|i| student(&format!("Student {}", i)))
                .collect();

            let mut all = vec![head.clone()];
            all.extend(lecturers.iter().cloned());
            all.extend(students.iter().cloned());

            Self {
                directory: Arc::new(StaticDirectory::new(all)),
                head,
                lecturers,
                students,
            }
        }

        /// The `index`-th lecturer's ID.
        pub fn lecturer_id(&self, index: usize) -> AccountId {
            self.lecturers[index].account_id
        }

        /// The `index`-th student's ID.
        pub fn student_id(&self, index: usize) -> AccountId {
            self.students[index].account_id
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertion functions for Capstone-specific validation.

    use super::*;

    /// Assert that a CapstoneResult is Ok.
    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &CapstoneResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert that a CapstoneResult is Err.
    #[track_caller]
    pub fn assert_err<T: std::fmt::Debug>(result: &CapstoneResult<T>) {
        assert!(result.is_err(), "Expected Err, got Ok: {:?}", result);
    }

    /// Assert that a CapstoneResult failed with the given error kind.
    #[track_caller]
    pub fn assert_kind<T: std::fmt::Debug>(result: &CapstoneResult<T>, kind: ErrorKind) {
        match result {
            Err(err) => assert_eq!(err.kind(), kind, "Wrong error kind for {:?}", err),
            Ok(value) => panic!("Expected {:?} error, got Ok: {:?}", kind, value),
        }
    }

    /// Assert that a CapstoneResult is a NotFound storage error.
    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(
        result: &CapstoneResult<T>,
        entity_type: EntityType,
    ) {
        match result {
            Err(CapstoneError::Storage(StorageError::NotFound {
                entity_type: et, ..
            })) => {
                assert_eq!(*et, entity_type, "Wrong entity type in NotFound error");
            }
            other => panic!(
                "Expected NotFound error for {:?}, got: {:?}",
                entity_type, other
            ),
        }
    }

    /// Assert that a CapstoneResult is a Config error.
    #[track_caller]
    pub fn assert_config_error<T: std::fmt::Debug>(result: &CapstoneResult<T>) {
        match result {
            Err(CapstoneError::Config(_)) => {}
            other => panic!("Expected Config error, got: {:?}", other),
        }
    }

    /// Assert that a Topic has the expected status.
    #[track_caller]
    pub fn assert_topic_status(topic: &Topic, expected: TopicStatus) {
        assert_eq!(
            topic.status, expected,
            "Topic status mismatch: expected {:?}, got {:?}",
            expected, topic.status
        );
    }

    /// Assert that approval bookkeeping respects the threshold.
    #[track_caller]
    pub fn assert_approvals_bounded(topic: &Topic) {
        assert!(
            topic.approval_count <= topic.required_approvals,
            "Approval count {} exceeds required {}",
            topic.approval_count,
            topic.required_approvals
        );
    }

    /// Assert that the store holds exactly the given snapshot.
    #[track_caller]
    pub fn assert_store_unchanged(storage: &InMemoryStorage, before: &StorageSnapshot) {
        let after = storage.snapshot().expect("snapshot");
        assert!(
            &after == before,
            "Store changed:\nbefore: {:#?}\nafter: {:#?}",
            before,
            after
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================
