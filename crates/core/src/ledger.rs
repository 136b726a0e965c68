//! Visit ledger interface — the read-only stream of recorded visits this
//! engine computes over.
//!
//! Check-in capture (QR decoding, camera) lives upstream; the engine only
//! consumes the resulting history through the `VisitLedger` trait. Modules
//! accept an `Arc<dyn VisitLedger>` so storage backends can be swapped
//! without touching the computation.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

// ─── Subjects ───────────────────────────────────────────────────────────────

/// Who is being evaluated — barbers rank on the leaderboard, both kinds
/// can hold achievements.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    Barber,
    Client,
}

/// Identity and start reference for a subject. `joined_at` anchors
/// duration requirements and the seniority tie-break.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectInfo {
    pub subject_id: String,
    pub kind: SubjectKind,
    pub display_name: String,
    pub joined_at: DateTime<Utc>,
}

// ─── Visits ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisitKind {
    WalkIn,
    Reservation,
    Service,
}

/// One recorded visit. `flags` carries named milestone predicates recorded
/// upstream (e.g. "onboarding_complete").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitRecord {
    pub id: Uuid,
    pub subject_id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: VisitKind,
    pub client_id: Option<String>,
    #[serde(default)]
    pub reward_redeemed: bool,
    #[serde(default)]
    pub flags: Vec<String>,
}

// ─── Ledger Trait ───────────────────────────────────────────────────────────

/// Read-only access to recorded visit history.
///
/// Implementations must return history ordered by timestamp ascending.
/// Failures surface as `EngineError::DataUnavailable` so batch callers can
/// omit the affected subject instead of aborting.
pub trait VisitLedger: Send + Sync {
    fn get_history(
        &self,
        subject_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> EngineResult<Vec<VisitRecord>>;

    fn get_subject(&self, subject_id: &str) -> EngineResult<SubjectInfo>;

    fn list_subjects(&self, kind: SubjectKind) -> EngineResult<Vec<SubjectInfo>>;
}

// ─── In-Memory Ledger ───────────────────────────────────────────────────────

/// DashMap-backed ledger for tests and the demo mode of the service binary.
/// Production deployments implement `VisitLedger` over the platform's
/// document store.
#[derive(Default)]
pub struct InMemoryLedger {
    subjects: DashMap<String, SubjectInfo>,
    visits: DashMap<String, Vec<VisitRecord>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_subject(&self, subject: SubjectInfo) {
        self.subjects.insert(subject.subject_id.clone(), subject);
    }

    pub fn record_visit(&self, visit: VisitRecord) {
        let mut entry = self.visits.entry(visit.subject_id.clone()).or_default();
        entry.push(visit);
        entry.sort_by_key(|v| v.timestamp);
    }

    pub fn visit_count(&self, subject_id: &str) -> usize {
        self.visits.get(subject_id).map(|v| v.len()).unwrap_or(0)
    }
}

impl VisitLedger for InMemoryLedger {
    fn get_history(
        &self,
        subject_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> EngineResult<Vec<VisitRecord>> {
        let history = self
            .visits
            .get(subject_id)
            .map(|v| v.clone())
            .unwrap_or_default();
        Ok(match since {
            Some(cutoff) => history.into_iter().filter(|v| v.timestamp >= cutoff).collect(),
            None => history,
        })
    }

    fn get_subject(&self, subject_id: &str) -> EngineResult<SubjectInfo> {
        self.subjects
            .get(subject_id)
            .map(|s| s.clone())
            .ok_or_else(|| EngineError::DataUnavailable(format!("unknown subject {}", subject_id)))
    }

    fn list_subjects(&self, kind: SubjectKind) -> EngineResult<Vec<SubjectInfo>> {
        let mut subjects: Vec<SubjectInfo> = self
            .subjects
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| s.value().clone())
            .collect();
        subjects.sort_by(|a, b| a.subject_id.cmp(&b.subject_id));
        Ok(subjects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn visit(subject: &str, offset_days: i64) -> VisitRecord {
        VisitRecord {
            id: Uuid::new_v4(),
            subject_id: subject.to_string(),
            timestamp: Utc::now() - Duration::days(offset_days),
            kind: VisitKind::WalkIn,
            client_id: Some("client-1".to_string()),
            reward_redeemed: false,
            flags: Vec::new(),
        }
    }

    #[test]
    fn test_history_ordered_by_timestamp() {
        let ledger = InMemoryLedger::new();
        ledger.record_visit(visit("b1", 1));
        ledger.record_visit(visit("b1", 10));
        ledger.record_visit(visit("b1", 5));

        let history = ledger.get_history("b1", None).unwrap();
        assert_eq!(history.len(), 3);
        assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn test_history_since_cutoff() {
        let ledger = InMemoryLedger::new();
        ledger.record_visit(visit("b1", 40));
        ledger.record_visit(visit("b1", 2));

        let cutoff = Utc::now() - Duration::days(7);
        let recent = ledger.get_history("b1", Some(cutoff)).unwrap();
        assert_eq!(recent.len(), 1);
    }

    #[test]
    fn test_unknown_subject_is_data_unavailable() {
        let ledger = InMemoryLedger::new();
        let err = ledger.get_subject("ghost").unwrap_err();
        assert!(matches!(err, EngineError::DataUnavailable(_)));
    }

    #[test]
    fn test_missing_history_is_empty_not_error() {
        let ledger = InMemoryLedger::new();
        assert!(ledger.get_history("ghost", None).unwrap().is_empty());
    }
}
