//! Milestone review rules
//!
//! Pure functions over council seats. The engine loads the councils and
//! decides what to persist; nothing here touches storage.

use crate::{AccountId, MilestoneSeat, ReviewResult, SeatDecision, MILESTONE_COUNCIL_SIZE};

type Reviewers = [AccountId; MILESTONE_COUNCIL_SIZE];

/// Number of lecturers two councils have in common.
pub fn lecturer_overlap(previous: &Reviewers, next: &Reviewers) -> usize {
    next.iter().filter(|id| previous.contains(id)).count()
}

/// Whether `next` keeps exactly one lecturer from `previous`.
///
/// Consecutive milestone councils must share one reviewer for continuity
/// while bringing in one fresh reviewer.
pub fn has_continuity(previous: &Reviewers, next: &Reviewers) -> bool {
    lecturer_overlap(previous, next) == 1
}

/// Review outcome for the current seat decisions.
///
/// A single REJECT fails the review even while the other seat is pending.
/// Passing needs every seat on ACCEPT. Returns `None` while undecided.
pub fn evaluate_consensus(seats: &[MilestoneSeat]) -> Option<ReviewResult> {
    if seats.iter().any(|s| s.decision == SeatDecision::Reject) {
        return Some(ReviewResult::NotPassed);
    }
    if !seats.is_empty() && seats.iter().all(|s| s.decision == SeatDecision::Accept) {
        return Some(ReviewResult::Passed);
    }
    None
}
