//! Defense Council Scheduling
//!
//! Picks a random (date, slot) inside the semester's defense window and
//! seats four lecturers who are free at that slot and not affiliated with
//! the topic. The slot read is version-guarded, so two schedulers racing
//! for the same lecturers at the same slot cannot both commit.

use crate::membership::affiliated_in;
use capstone_core::{
    is_lecturer, AccountDirectory, AccountId, CapstoneResult, Clock, CouncilRole, CouncilSeat, CouncilStatus,
    DefenseCouncil, DefenseCouncilId, EngineConfig, RandomSource, Semester, TopicId,
    ValidationError, WorkflowError, DEFENSE_COUNCIL_SIZE,
};
use capstone_storage::{run_transaction, Mutation, StorageTrait};
use chrono::{Datelike, Days, NaiveDate, Utc};
use std::collections::HashSet;
use std::sync::Arc;

/// Assigns defense councils.
#[derive(Clone)]
pub struct CouncilScheduler {
    storage: Arc<dyn StorageTrait>,
    directory: Arc<dyn AccountDirectory>,
    random: Arc<dyn RandomSource>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl CouncilScheduler {
    pub fn new(
        storage: Arc<dyn StorageTrait>,
        directory: Arc<dyn AccountDirectory>,
        random: Arc<dyn RandomSource>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            storage,
            directory,
            random,
            clock,
            config,
        }
    }

    /// Book a defense council for a topic in the given semester.
    ///
    /// The semester token is case-insensitive (`spring`, `summer`, `fall`, `winter`).
    /// Its anchor date is taken in the clock's current year.
    pub fn assign_defense_council(
        &self,
        topic_id: TopicId,
        semester_token: &str,
    ) -> CapstoneResult<DefenseCouncil> {
        let semester: Semester =
            semester_token
                .parse()
                .map_err(|_| WorkflowError::InvalidSemester {
                    token: semester_token.to_string(),
                })?;
        let anchor = semester
            .anchor_date(self.clock.today().year())
            .ok_or_else(|| WorkflowError::InvalidSemester {
                token: semester_token.to_string(),
            })?;
        let lecturers = distinct_ids(
            self.directory
                .list_lecturers()
                .iter()
                .filter(|account| is_lecturer(account))
                .map(|account| account.account_id),
        );

        let council = run_transaction(
            self.storage.as_ref(),
            self.config.max_conflict_retries,
            |tx| {
                let topic = tx.topic(topic_id)?;
                if !topic.status.accepts_defense_council() {
                    return Err(WorkflowError::InvalidStatus {
                        topic_id,
                        status: topic.status,
                        operation: "assign a defense council to".to_string(),
                    }
                    .into());
                }
                if let Some(existing) = tx.defense_council_for(topic_id)? {
                    return Err(WorkflowError::CouncilAlreadyAssigned {
                        topic_id,
                        council_id: existing.council_id,
                    }
                    .into());
                }

                let (date, slot) = self.draw_slot(anchor)?;
                let booked = tx.booked_accounts(date, slot)?;
                let affiliated = affiliated_in(tx, topic_id)?;
                let mut pool: Vec<AccountId> = lecturers
                    .iter()
                    .copied()
                    .filter(|id| !booked.contains(id) && !affiliated.contains(id))
                    .collect();
                if pool.len() < DEFENSE_COUNCIL_SIZE {
                    return Err(WorkflowError::NotEnoughLecturers {
                        required: DEFENSE_COUNCIL_SIZE,
                        available: pool.len(),
                    }
                    .into());
                }

                self.random.shuffle(&mut pool);
                let council = DefenseCouncil {
                    council_id: DefenseCouncilId::now_v7(),
                    topic_id,
                    semester,
                    date,
                    slot,
                    status: CouncilStatus::Planned,
                    seats: seat(&pool),
                    created_at: Utc::now(),
                };
                tx.stage(Mutation::InsertDefenseCouncil(council.clone()));
                Ok(council)
            },
        )?;

        tracing::info!(
            topic_id = %topic_id,
            council_id = %council.council_id,
            date = %council.date,
            slot = council.slot,
            "defense council assigned"
        );
        Ok(council)
    }

    /// The defense council of a topic, if one was assigned.
    pub fn defense_council_for(&self, topic_id: TopicId) -> CapstoneResult<Option<DefenseCouncil>> {
        self.storage.defense_council_get_by_topic(topic_id)
    }

    /// Uniform day offset in `[0, window)` and uniform slot in `[1, slots_per_day]`.
    fn draw_slot(&self, anchor: NaiveDate) -> CapstoneResult<(NaiveDate, u8)> {
        let offset = self
            .random
            .uniform(0, self.config.defense_window_days.saturating_sub(1));
        let slot = self.random.uniform(1, u32::from(self.config.slots_per_day));

        let date = anchor
            .checked_add_days(Days::new(u64::from(offset)))
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "defense_window_days".to_string(),
                reason: format!("{} days past {} is out of range", offset, anchor),
            })?;
        let slot = u8::try_from(slot).map_err(|_| ValidationError::InvalidValue {
            field: "slots_per_day".to_string(),
            reason: format!("slot {} does not fit", slot),
        })?;
        Ok((date, slot))
    }
}

/// First `DEFENSE_COUNCIL_SIZE` candidates, seated in `SEATING_ORDER`.
fn seat(candidates: &[AccountId]) -> Vec<CouncilSeat> {
    CouncilRole::SEATING_ORDER
        .iter()
        .zip(candidates)
        .map(|(role, account_id)| CouncilSeat {
            role: *role,
            account_id: *account_id,
        })
        .collect()
}

fn distinct_ids(ids: impl Iterator<Item = AccountId>) -> Vec<AccountId> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(*id)).collect()
}
