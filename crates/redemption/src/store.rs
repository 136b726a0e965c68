//! Persistence boundary for redemption records.
//!
//! The engine owns this state; it must survive restarts, keyed for fast
//! lookup by subject and by achievement independently. Production
//! deployments implement `RedemptionStore` over the platform's document
//! store; the DashMap-backed implementation here serves tests and demo
//! mode.

use dashmap::DashMap;
use uuid::Uuid;

use crate::types::{RedemptionRecord, TransitionEvent};

pub type RecordKey = (String, Uuid);

pub trait RedemptionStore: Send + Sync {
    fn get(&self, subject_id: &str, achievement_id: Uuid) -> Option<RedemptionRecord>;

    fn put(&self, record: RedemptionRecord);

    fn list_for_subject(&self, subject_id: &str) -> Vec<RedemptionRecord>;

    fn list_for_achievement(&self, achievement_id: Uuid) -> Vec<RedemptionRecord>;

    fn append_audit(&self, subject_id: &str, achievement_id: Uuid, event: TransitionEvent);

    fn audit(&self, subject_id: &str, achievement_id: Uuid) -> Vec<TransitionEvent>;
}

/// Lock-free in-memory store with dual secondary indexes.
#[derive(Default)]
pub struct InMemoryStore {
    records: DashMap<RecordKey, RedemptionRecord>,
    by_subject: DashMap<String, Vec<Uuid>>,
    by_achievement: DashMap<Uuid, Vec<String>>,
    audits: DashMap<RecordKey, Vec<TransitionEvent>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RedemptionStore for InMemoryStore {
    fn get(&self, subject_id: &str, achievement_id: Uuid) -> Option<RedemptionRecord> {
        self.records
            .get(&(subject_id.to_string(), achievement_id))
            .map(|r| r.clone())
    }

    fn put(&self, record: RedemptionRecord) {
        let key = (record.subject_id.clone(), record.achievement_id);
        if self.records.insert(key, record.clone()).is_none() {
            self.by_subject
                .entry(record.subject_id.clone())
                .or_default()
                .push(record.achievement_id);
            self.by_achievement
                .entry(record.achievement_id)
                .or_default()
                .push(record.subject_id);
        }
    }

    fn list_for_subject(&self, subject_id: &str) -> Vec<RedemptionRecord> {
        let Some(ids) = self.by_subject.get(subject_id) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| self.get(subject_id, *id))
            .collect()
    }

    fn list_for_achievement(&self, achievement_id: Uuid) -> Vec<RedemptionRecord> {
        let Some(subjects) = self.by_achievement.get(&achievement_id) else {
            return Vec::new();
        };
        subjects
            .iter()
            .filter_map(|s| self.get(s, achievement_id))
            .collect()
    }

    fn append_audit(&self, subject_id: &str, achievement_id: Uuid, event: TransitionEvent) {
        self.audits
            .entry((subject_id.to_string(), achievement_id))
            .or_default()
            .push(event);
    }

    fn audit(&self, subject_id: &str, achievement_id: Uuid) -> Vec<TransitionEvent> {
        self.audits
            .get(&(subject_id.to_string(), achievement_id))
            .map(|a| a.clone())
            .unwrap_or_default()
    }
}
