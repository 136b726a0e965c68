use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a subject's claim on an achievement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RedemptionState {
    /// Requirement not yet met.
    Locked,
    /// Requirement met, reward not yet claimed.
    Earned,
    /// A manual handoff is in flight.
    PendingRedemption,
    /// Reward claimed.
    Redeemed,
}

/// The engine-owned persistent record per (subject, achievement) — the
/// single place completion and redemption truth lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedemptionRecord {
    pub subject_id: String,
    pub achievement_id: Uuid,
    pub state: RedemptionState,
    pub earned_at: Option<DateTime<Utc>>,
    pub redeemed_at: Option<DateTime<Utc>>,
    pub redeemed_by: Option<String>,
    pub notes: Option<String>,
    /// Confirmed completions, bounded by the definition's cap.
    pub completion_count: u32,
}

impl RedemptionRecord {
    pub fn locked(subject_id: &str, achievement_id: Uuid) -> Self {
        Self {
            subject_id: subject_id.to_string(),
            achievement_id,
            state: RedemptionState::Locked,
            earned_at: None,
            redeemed_at: None,
            redeemed_by: None,
            notes: None,
            completion_count: 0,
        }
    }

    /// Whether the subject has ever satisfied the requirement — used for
    /// prerequisite checks, where a missing record reads as unearned.
    pub fn has_earned(&self) -> bool {
        self.state != RedemptionState::Locked || self.completion_count > 0
    }
}

/// One entry of the append-only transition history. Only the latest state
/// on the record is authoritative for business logic; this trail exists
/// for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub at: DateTime<Utc>,
    pub from: RedemptionState,
    pub to: RedemptionState,
    pub actor: Option<String>,
    pub notes: Option<String>,
}
