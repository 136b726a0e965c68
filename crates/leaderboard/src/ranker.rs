//! Ranks subjects by a chosen metric or by the weighted composite score.
//!
//! Ranking is a strict total order: ties break on total visits, then
//! seniority (earlier join date), then subject identity, so identical
//! inputs always produce identical rank lists.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use trimtrack_core::config::LeaderboardConfig;

// ─── Inputs ─────────────────────────────────────────────────────────────────

/// Aggregate performance metrics for one subject over the ranking window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectMetrics {
    pub subject_id: String,
    pub display_name: String,
    pub joined_at: DateTime<Utc>,
    pub total_visits: u64,
    pub unique_clients: u64,
    /// Returning clients ÷ unique clients, 0–100.
    pub retention_rate: f64,
    /// Average visits per day over the active span.
    pub efficiency: f64,
    pub rewards_earned: u64,
}

/// Which metric drives the ordering.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RankingMetric {
    #[default]
    Overall,
    Visits,
    Clients,
    Efficiency,
    Retention,
    Rewards,
}

/// Weighting of the composite score. Supplied by administration via
/// configuration, never hard-coded in the ranking path.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MetricWeights {
    pub visits: f64,
    pub clients: f64,
    pub retention: f64,
    pub efficiency: f64,
    pub rewards: f64,
}

impl Default for MetricWeights {
    fn default() -> Self {
        Self::from(&LeaderboardConfig::default())
    }
}

impl From<&LeaderboardConfig> for MetricWeights {
    fn from(config: &LeaderboardConfig) -> Self {
        Self {
            visits: config.visits_weight,
            clients: config.clients_weight,
            retention: config.retention_weight,
            efficiency: config.efficiency_weight,
            rewards: config.rewards_weight,
        }
    }
}

// ─── Outputs ────────────────────────────────────────────────────────────────

/// Top-3 decorations; no badges below third place.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Badge {
    Gold,
    Silver,
    Bronze,
}

impl Badge {
    fn for_rank(rank: u32) -> Option<Badge> {
        match rank {
            1 => Some(Badge::Gold),
            2 => Some(Badge::Silver),
            3 => Some(Badge::Bronze),
            _ => None,
        }
    }
}

/// One row of a ranking. Derived per request, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub subject_id: String,
    pub display_name: String,
    /// 1-based, contiguous, no shared ranks.
    pub rank: u32,
    pub score: f64,
    pub metrics: SubjectMetrics,
    pub badge: Option<Badge>,
}

// ─── Ranker ─────────────────────────────────────────────────────────────────

/// Stateless ranker; safe to call concurrently.
#[derive(Debug, Clone)]
pub struct LeaderboardRanker {
    weights: MetricWeights,
}

impl LeaderboardRanker {
    pub fn new(weights: MetricWeights) -> Self {
        Self { weights }
    }

    /// Orders `subjects` by `metric`. An empty input yields an empty
    /// ranking; all-zero subjects still receive a rank through the
    /// tie-break chain.
    pub fn rank(&self, subjects: &[SubjectMetrics], metric: RankingMetric) -> Vec<LeaderboardEntry> {
        if subjects.is_empty() {
            return Vec::new();
        }

        let scored: Vec<(f64, &SubjectMetrics)> = match metric {
            RankingMetric::Overall => {
                let scores = self.composite_scores(subjects);
                scores.into_iter().zip(subjects.iter()).collect()
            }
            _ => subjects
                .iter()
                .map(|s| (Self::single_metric(s, metric), s))
                .collect(),
        };

        let mut ordered = scored;
        ordered.sort_by(|a, b| Self::compare(a, b));

        ordered
            .into_iter()
            .enumerate()
            .map(|(i, (score, metrics))| {
                let rank = i as u32 + 1;
                LeaderboardEntry {
                    subject_id: metrics.subject_id.clone(),
                    display_name: metrics.display_name.clone(),
                    rank,
                    score,
                    metrics: metrics.clone(),
                    badge: Badge::for_rank(rank),
                }
            })
            .collect()
    }

    fn single_metric(subject: &SubjectMetrics, metric: RankingMetric) -> f64 {
        match metric {
            RankingMetric::Visits => subject.total_visits as f64,
            RankingMetric::Clients => subject.unique_clients as f64,
            RankingMetric::Efficiency => subject.efficiency,
            RankingMetric::Retention => subject.retention_rate,
            RankingMetric::Rewards => subject.rewards_earned as f64,
            RankingMetric::Overall => unreachable!("composite handled separately"),
        }
    }

    /// Weighted sum of metrics, each max-scaled to 0–1 over the input set.
    /// A metric nobody scores on normalizes to zero for everyone.
    fn composite_scores(&self, subjects: &[SubjectMetrics]) -> Vec<f64> {
        let max_visits = subjects.iter().map(|s| s.total_visits).max().unwrap_or(0) as f64;
        let max_clients = subjects.iter().map(|s| s.unique_clients).max().unwrap_or(0) as f64;
        let max_retention = subjects.iter().map(|s| s.retention_rate).fold(0.0, f64::max);
        let max_efficiency = subjects.iter().map(|s| s.efficiency).fold(0.0, f64::max);
        let max_rewards = subjects.iter().map(|s| s.rewards_earned).max().unwrap_or(0) as f64;

        let norm = |value: f64, max: f64| if max > 0.0 { value / max } else { 0.0 };

        subjects
            .iter()
            .map(|s| {
                self.weights.visits * norm(s.total_visits as f64, max_visits)
                    + self.weights.clients * norm(s.unique_clients as f64, max_clients)
                    + self.weights.retention * norm(s.retention_rate, max_retention)
                    + self.weights.efficiency * norm(s.efficiency, max_efficiency)
                    + self.weights.rewards * norm(s.rewards_earned as f64, max_rewards)
            })
            .collect()
    }

    /// Descending score, then the deterministic tie-break chain:
    /// higher total visits, earlier join date, subject identity.
    fn compare(a: &(f64, &SubjectMetrics), b: &(f64, &SubjectMetrics)) -> Ordering {
        b.0.partial_cmp(&a.0)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.1.total_visits.cmp(&a.1.total_visits))
            .then_with(|| a.1.joined_at.cmp(&b.1.joined_at))
            .then_with(|| a.1.subject_id.cmp(&b.1.subject_id))
    }
}

impl Default for LeaderboardRanker {
    fn default() -> Self {
        Self::new(MetricWeights::default())
    }
}
