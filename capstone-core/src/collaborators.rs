//! Collaborator traits
//!
//! Narrow interfaces to the things the engine consumes but does not own:
//! the account directory, outgoing notifications, randomness and the
//! calendar. Each comes with a production implementation; test doubles live
//! in `capstone-test-utils`.

use crate::{Account, AccountId, TopicId};
use chrono::{NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

// ============================================================================
// ACCOUNT DIRECTORY
// ============================================================================

/// Read-only view of the account store.
pub trait AccountDirectory: Send + Sync {
    /// Look up an account by ID.
    fn get_account(&self, account_id: AccountId) -> Option<Account>;

    /// Look up an account by email address.
    fn get_account_by_email(&self, email: &str) -> Option<Account>;

    /// Every account allowed to sit on a defense council.
    fn list_lecturers(&self) -> Vec<Account>;
}

// ============================================================================
// NOTIFICATIONS
// ============================================================================

/// Delivery failure reported by a [`NotificationSink`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Notification delivery failed: {reason}")]
pub struct NotificationError {
    pub reason: String,
}

impl NotificationError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Outgoing notification channel.
///
/// Called after a commit. Failures never roll back engine state.
pub trait NotificationSink: Send + Sync {
    /// Tell the topic creator that the topic reached APPROVED.
    fn notify_topic_approved(
        &self,
        to_email: &str,
        topic_title: &str,
        topic_id: TopicId,
    ) -> Result<(), NotificationError>;
}

/// Notification sink that only emits a tracing event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotificationSink;

impl NotificationSink for LoggingNotificationSink {
    fn notify_topic_approved(
        &self,
        to_email: &str,
        topic_title: &str,
        topic_id: TopicId,
    ) -> Result<(), NotificationError> {
        tracing::info!(
            to = to_email,
            topic_title,
            topic_id = %topic_id,
            "topic approved notification"
        );
        Ok(())
    }
}

// ============================================================================
// RANDOMNESS
// ============================================================================

/// Source of randomness for defense scheduling.
pub trait RandomSource: Send + Sync {
    /// Uniform integer in `low..=high_inclusive`.
    fn uniform(&self, low: u32, high_inclusive: u32) -> u32;

    /// Shuffle account IDs in place.
    fn shuffle(&self, ids: &mut [AccountId]);
}

/// [`RandomSource`] backed by [`StdRng`].
///
/// Seed it with [`StdRandomSource::with_seed`] to make scheduling
/// reproducible.
#[derive(Debug)]
pub struct StdRandomSource {
    rng: Mutex<StdRng>,
}

impl StdRandomSource {
    /// Seeded from the operating system.
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Deterministic source for a given seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for StdRandomSource {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl RandomSource for StdRandomSource {
    fn uniform(&self, low: u32, high_inclusive: u32) -> u32 {
        if high_inclusive <= low {
            return low;
        }
        // A panic while holding the lock cannot leave the generator invalid.
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.random_range(low..=high_inclusive)
    }

    fn shuffle(&self, ids: &mut [AccountId]) {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        ids.shuffle(&mut *rng);
    }
}

// ============================================================================
// CLOCK
// ============================================================================

/// Calendar abstraction so scheduling can be pinned in tests.
pub trait Clock: Send + Sync {
    /// Current date (UTC).
    fn today(&self) -> NaiveDate;
}

/// Production clock using system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// Whether the account may be drawn for a defense council.
pub fn is_lecturer(account: &Account) -> bool {
    account.role.can_sit_on_council()
}
