//! Property-Based Tests for Defense Council Scheduling
//!
//! **Property: Conflict-free seating**
//!
//! For any random draw, a defense council seats four distinct lecturers in
//! CHAIRMAN, SECRETARY, MEMBER, MEMBER order, none of them affiliated with
//! the topic and none already booked at the same (date, slot).

use capstone_core::{
    AccountId, CapstoneError, CouncilRole, ErrorKind, TopicStatus, WorkflowError,
    DEFENSE_COUNCIL_SIZE,
};
use capstone_test_utils::assertions::assert_kind;
use capstone_test_utils::generators::arb_semester_token;
use chrono::NaiveDate;
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

#[path = "support/harness.rs"]
mod harness;
use harness::TestHarness;

// ============================================================================
// SCENARIOS
// ============================================================================

#[test]
fn test_three_available_lecturers_is_not_enough() {
    // Head of department plus two lecturers.
    let h = TestHarness::new(2, 1);
    let topic = h.topic_by(0);
    h.engine
        .approve_legacy(topic.topic_id, h.campus.head.account_id)
        .unwrap();

    let err = h.assert_fails_cleanly(|engine| engine.assign_defense_council(topic.topic_id, "FALL"));
    assert_eq!(
        err,
        CapstoneError::from(WorkflowError::NotEnoughLecturers {
            required: 4,
            available: 3,
        })
    );
}

#[test]
fn test_exactly_four_available_lecturers_are_all_seated() {
    let h = TestHarness::new(3, 1);
    let topic = h.topic_by(0);
    h.engine
        .approve_legacy(topic.topic_id, h.campus.head.account_id)
        .unwrap();
    h.script.push([4, 5]);

    let council = h
        .engine
        .assign_defense_council(topic.topic_id, "summer")
        .unwrap();

    assert_eq!(council.date, NaiveDate::from_ymd_opt(2026, 6, 5).unwrap());
    assert_eq!(council.slot, 5);
    let roles: Vec<CouncilRole> = council.seats.iter().map(|s| s.role).collect();
    assert_eq!(
        roles,
        vec![
            CouncilRole::Chairman,
            CouncilRole::Secretary,
            CouncilRole::Member,
            CouncilRole::Member
        ]
    );
    let seated: HashSet<AccountId> = council.account_ids().into_iter().collect();
    let mut eligible: HashSet<AccountId> = h.campus.lecturers.iter().map(|l| l.account_id).collect();
    eligible.insert(h.campus.head.account_id);
    assert_eq!(seated, eligible);
    assert_eq!(
        h.engine.get_defense_council(topic.topic_id).unwrap(),
        Some(council)
    );
}

#[test]
fn test_affiliated_lecturer_shrinks_the_pool() {
    let h = TestHarness::new(3, 1);
    let topic = h.topic_by(0);
    let supervisor = &h.campus.lecturers[2];
    h.engine
        .join_topic(topic.topic_id, supervisor.account_id, &supervisor.name)
        .unwrap();
    h.engine
        .approve_legacy(topic.topic_id, h.campus.head.account_id)
        .unwrap();

    let err = h.assert_fails_cleanly(|engine| engine.assign_defense_council(topic.topic_id, "fall"));
    assert_eq!(err.kind(), ErrorKind::NotEnoughLecturers);
}

#[test]
fn test_invalid_semester_and_status() {
    let h = TestHarness::new(4, 1);
    let topic = h.topic_by(0);

    let err = h.assert_fails_cleanly(|engine| engine.assign_defense_council(topic.topic_id, "fall"));
    assert_eq!(err.kind(), ErrorKind::InvalidStatus);

    h.approve(topic.topic_id);
    let err =
        h.assert_fails_cleanly(|engine| engine.assign_defense_council(topic.topic_id, "monsoon"));
    assert_eq!(err.kind(), ErrorKind::InvalidSemester);
}

#[test]
fn test_one_council_per_topic() {
    let h = TestHarness::new(8, 1);
    let topic = h.approved_topic(0);
    h.engine.assign_defense_council(topic.topic_id, "fall").unwrap();

    let err = h.assert_fails_cleanly(|engine| engine.assign_defense_council(topic.topic_id, "spring"));
    assert!(matches!(
        err,
        CapstoneError::Workflow(WorkflowError::CouncilAlreadyAssigned { .. })
    ));
}

#[test]
fn test_concurrent_bookings_at_one_slot_never_share_a_lecturer() {
    // Eight eligible accounts cover exactly two councils at the single slot
    // the empty script always draws.
    let h = Arc::new(TestHarness::new(7, 4));
    let topics: Vec<_> = (0..4).map(|i| h.approved_topic(i).topic_id).collect();

    let handles: Vec<_> = topics
        .iter()
        .map(|&topic_id| {
            let h = Arc::clone(&h);
            thread::spawn(move || h.engine.assign_defense_council(topic_id, "spring"))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|t| t.join().unwrap()).collect();

    let councils: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(councils.len(), 2);
    for result in results.iter().filter(|r| r.is_err()) {
        assert_kind(result, ErrorKind::NotEnoughLecturers);
    }

    let mut seen = HashSet::new();
    for council in &councils {
        for id in council.account_ids() {
            assert!(seen.insert(id), "lecturer {} double-booked", id);
        }
    }
    assert_eq!(h.storage.defense_council_count().unwrap(), 2);
}

// ============================================================================
// PROPERTIES
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_seated_council_is_valid(
        seed in any::<u64>(),
        token in arb_semester_token(),
        topics in 1usize..4,
    ) {
        // Head plus fifteen lecturers; each topic is supervised by one of them.
        let h = TestHarness::seeded(seed, 15, topics);
        let mut booked: Vec<(NaiveDate, u8, HashSet<AccountId>)> = Vec::new();

        for i in 0..topics {
            let topic = h.topic_by(i);
            let supervisor = &h.campus.lecturers[14 - i];
            h.engine
                .join_topic(topic.topic_id, supervisor.account_id, &supervisor.name)
                .unwrap();
            h.approve(topic.topic_id);

            let council = h.engine.assign_defense_council(topic.topic_id, &token).unwrap();
            let seated: HashSet<AccountId> = council.account_ids().into_iter().collect();

            prop_assert_eq!(seated.len(), DEFENSE_COUNCIL_SIZE);
            prop_assert!(!seated.contains(&supervisor.account_id));
            prop_assert!(!seated.contains(&h.campus.student_id(i)));
            prop_assert!((1..=5).contains(&council.slot));
            prop_assert_eq!(council.seats[0].role, CouncilRole::Chairman);
            prop_assert_eq!(council.seats[1].role, CouncilRole::Secretary);

            for (date, slot, others) in &booked {
                if *date == council.date && *slot == council.slot {
                    prop_assert!(seated.is_disjoint(others));
                }
            }
            booked.push((council.date, council.slot, seated));
            prop_assert_eq!(h.status(topic.topic_id), TopicStatus::Approved);
        }
    }
}
