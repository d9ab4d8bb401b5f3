#![allow(dead_code)]

use std::sync::Arc;

use capstone_core::{
    CapstoneError, CapstoneResult, EngineConfig, RandomSource, Topic, TopicId, TopicStatus,
};
use capstone_engine::CapstoneEngine;
use capstone_storage::{InMemoryStorage, StorageSnapshot, StorageTrait};
use capstone_test_utils::assertions::assert_store_unchanged;
use capstone_test_utils::fixtures::{january_2026, test_config, Campus};
use capstone_test_utils::{seeded_random, FixedClock, RecordingNotifier, ScriptedRandom};

/// A fully wired engine over an in-memory store and fake collaborators.
pub struct TestHarness {
    pub storage: Arc<InMemoryStorage>,
    pub campus: Campus,
    pub notifier: Arc<RecordingNotifier>,
    /// Draws replayed by the engine, unless built with [`TestHarness::seeded`]
    pub script: Arc<ScriptedRandom>,
    pub engine: CapstoneEngine,
}

impl TestHarness {
    /// Engine with scripted randomness: every draw returns the low end of
    /// its range until values are pushed onto `script`.
    pub fn new(lecturers: usize, students: usize) -> Self {
        Self::with_config(test_config(), lecturers, students)
    }

    pub fn with_config(config: EngineConfig, lecturers: usize, students: usize) -> Self {
        let script = Arc::new(ScriptedRandom::new(Vec::<u32>::new()));
        Self::build(config, lecturers, students, script.clone(), script)
    }

    /// Engine drawing from a seeded `StdRng`.
    pub fn seeded(seed: u64, lecturers: usize, students: usize) -> Self {
        let script = Arc::new(ScriptedRandom::new(Vec::<u32>::new()));
        Self::build(
            test_config(),
            lecturers,
            students,
            Arc::new(seeded_random(seed)),
            script,
        )
    }

    fn build(
        config: EngineConfig,
        lecturers: usize,
        students: usize,
        random: Arc<dyn RandomSource>,
        script: Arc<ScriptedRandom>,
    ) -> Self {
        let storage = Arc::new(InMemoryStorage::new());
        let campus = Campus::new(lecturers, students);
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = CapstoneEngine::new(
            config,
            storage.clone(),
            campus.directory.clone(),
            notifier.clone(),
            random,
            Arc::new(FixedClock(january_2026())),
        )
        .expect("valid test config");

        Self {
            storage,
            campus,
            notifier,
            script,
            engine,
        }
    }

    /// A PENDING topic created by the `student`-th student.
    pub fn topic_by(&self, student: usize) -> Topic {
        let creator = &self.campus.students[student];
        self.engine
            .create_topic(
                &format!("Thesis of {}", creator.name),
                None,
                creator.account_id,
                &creator.name,
            )
            .expect("create topic")
    }

    /// Drive a topic to APPROVED through consensus approval by lecturers.
    pub fn approve(&self, topic_id: TopicId) -> Topic {
        let required = self.engine.config().required_approvals as usize;
        for approver in self.campus.lecturers.iter().take(required) {
            self.engine
                .approve_topic_v2(topic_id, &approver.email, &approver.name, None)
                .expect("approve topic");
        }
        self.topic(topic_id)
    }

    /// A topic created by the `student`-th student and approved.
    pub fn approved_topic(&self, student: usize) -> Topic {
        let topic = self.topic_by(student);
        self.approve(topic.topic_id)
    }

    pub fn topic(&self, topic_id: TopicId) -> Topic {
        self.engine.get_topic(topic_id).expect("topic exists")
    }

    pub fn status(&self, topic_id: TopicId) -> TopicStatus {
        self.topic(topic_id).status
    }

    pub fn snapshot(&self) -> StorageSnapshot {
        self.storage.snapshot().expect("snapshot")
    }

    #[track_caller]
    pub fn assert_unchanged(&self, before: &StorageSnapshot) {
        assert_store_unchanged(&self.storage, before);
    }

    /// Run a call that must fail and check it left the store untouched.
    #[track_caller]
    pub fn assert_fails_cleanly<T: std::fmt::Debug>(
        &self,
        op: impl FnOnce(&CapstoneEngine) -> CapstoneResult<T>,
    ) -> CapstoneError {
        let before = self.snapshot();
        let err = match op(&self.engine) {
            Err(err) => err,
            Ok(value) => panic!("expected failure, got {:?}", value),
        };
        self.assert_unchanged(&before);
        err
    }

    pub fn storage(&self) -> &dyn StorageTrait {
        self.storage.as_ref()
    }
}
