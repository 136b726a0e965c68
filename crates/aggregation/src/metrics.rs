//! Aggregate metric computation per subject, feeding the leaderboard.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use trimtrack_core::ledger::{SubjectInfo, VisitRecord};
use trimtrack_leaderboard::SubjectMetrics;

/// Rolling window a ranking is computed over.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RankingWindow {
    #[default]
    AllTime,
    Month,
    Week,
}

impl RankingWindow {
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            RankingWindow::AllTime => None,
            RankingWindow::Month => Some(now - Duration::days(30)),
            RankingWindow::Week => Some(now - Duration::days(7)),
        }
    }
}

/// Collapses a visit history into the aggregate metrics the ranker
/// consumes. `rewards_earned` comes from the redemption store, not the
/// ledger.
pub fn subject_metrics(
    info: &SubjectInfo,
    history: &[VisitRecord],
    rewards_earned: u64,
    window: RankingWindow,
    now: DateTime<Utc>,
) -> SubjectMetrics {
    let cutoff = window.cutoff(now);
    let in_window: Vec<&VisitRecord> = history
        .iter()
        .filter(|v| cutoff.map_or(true, |c| v.timestamp >= c) && v.timestamp <= now)
        .collect();

    let total_visits = in_window.len() as u64;

    let mut visits_per_client: HashMap<&str, u32> = HashMap::new();
    for visit in &in_window {
        if let Some(client) = visit.client_id.as_deref() {
            *visits_per_client.entry(client).or_insert(0) += 1;
        }
    }
    let unique_clients = visits_per_client.len() as u64;
    let returning = visits_per_client.values().filter(|&&n| n >= 2).count() as u64;
    let retention_rate = if unique_clients > 0 {
        (returning as f64 / unique_clients as f64) * 100.0
    } else {
        0.0
    };

    // Visits per day over the span from the first in-window visit to now.
    let efficiency = match in_window.first() {
        Some(first) => {
            let span_days = (now - first.timestamp).num_days().max(1);
            total_visits as f64 / span_days as f64
        }
        None => 0.0,
    };

    SubjectMetrics {
        subject_id: info.subject_id.clone(),
        display_name: info.display_name.clone(),
        joined_at: info.joined_at,
        total_visits,
        unique_clients,
        retention_rate,
        efficiency,
        rewards_earned,
    }
}
