//! Progress snapshot types — derived per (subject, achievement), recomputed
//! from the ledger on demand and never persisted as a source of truth.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Day/month breakdown for duration-based requirements. Months are whole
/// 30-day blocks; the "X months, Y days" rendering is left to callers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DurationProgress {
    pub total_days: i64,
    pub whole_months: i64,
    pub remaining_days: i64,
}

impl DurationProgress {
    pub fn from_days(total_days: i64) -> Self {
        let total_days = total_days.max(0);
        Self {
            total_days,
            whole_months: total_days / 30,
            remaining_days: total_days % 30,
        }
    }
}

/// Computed standing of one subject against one achievement definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectProgress {
    pub subject_id: String,
    pub achievement_id: Uuid,
    pub current_value: f64,
    pub requirement_value: f64,
    /// Clamped to 0–100 regardless of the raw ratio.
    pub progress_percentage: u32,
    pub is_earned: bool,
    pub duration: Option<DurationProgress>,
}

impl SubjectProgress {
    /// min(100, round(current / requirement * 100)). Total over any input:
    /// a non-positive requirement reports 0. A value still short of the
    /// requirement never rounds up to 100, so 100 always means met.
    pub fn percentage(current: f64, requirement: f64) -> u32 {
        if requirement <= 0.0 || current <= 0.0 {
            return 0;
        }
        let rounded = ((current / requirement) * 100.0).round().min(100.0) as u32;
        if rounded == 100 && current < requirement {
            99
        } else {
            rounded
        }
    }
}
