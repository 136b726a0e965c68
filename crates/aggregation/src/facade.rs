//! Batch orchestration over the loyalty core. One computation per subject,
//! fanned out and joined back in input order so downstream tie-breaks stay
//! deterministic. A subject whose data is unavailable is annotated and
//! omitted, never fatal to the batch.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use trimtrack_core::catalog::{AchievementCatalog, AchievementTier};
use trimtrack_core::error::EngineResult;
use trimtrack_core::ledger::{SubjectKind, VisitLedger};
use trimtrack_core::progress::SubjectProgress;
use trimtrack_leaderboard::{
    LeaderboardEntry, LeaderboardRanker, MetricWeights, RankingMetric, SubjectMetrics,
};
use trimtrack_redemption::{RedemptionEngine, RedemptionRecord};

use crate::metrics::{subject_metrics, RankingWindow};

// ─── Result Types ───────────────────────────────────────────────────────────

/// One achievement's standing for a subject: computed progress plus the
/// authoritative redemption record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchievementStatus {
    pub achievement_id: Uuid,
    pub title: String,
    pub tier: AchievementTier,
    pub points: u32,
    pub progress: SubjectProgress,
    pub record: RedemptionRecord,
}

/// Unearned achievement closest to completion, for UI nudges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextBestHint {
    pub achievement_id: Uuid,
    pub title: String,
    pub progress_percentage: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectSummary {
    pub subject_id: String,
    pub display_name: String,
    pub statuses: Vec<AchievementStatus>,
    pub total_achievements: usize,
    pub earned: usize,
    pub redeemed: usize,
    /// Mean of the individual progress percentages, rounded.
    pub overall_percentage: u32,
    /// Points from achievements earned at least once.
    pub total_points: u32,
    pub next_best: Option<NextBestHint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedSubject {
    pub subject_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub summaries: Vec<SubjectSummary>,
    pub skipped: Vec<SkippedSubject>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardOutcome {
    pub entries: Vec<LeaderboardEntry>,
    pub skipped: Vec<SkippedSubject>,
}

// ─── Facade ─────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AggregationFacade {
    ledger: Arc<dyn VisitLedger>,
    catalog: Arc<AchievementCatalog>,
    engine: Arc<RedemptionEngine>,
    ranker: LeaderboardRanker,
}

impl AggregationFacade {
    pub fn new(
        ledger: Arc<dyn VisitLedger>,
        catalog: Arc<AchievementCatalog>,
        engine: Arc<RedemptionEngine>,
        weights: MetricWeights,
    ) -> Self {
        Self {
            ledger,
            catalog,
            engine,
            ranker: LeaderboardRanker::new(weights),
        }
    }

    pub fn catalog(&self) -> &AchievementCatalog {
        &self.catalog
    }

    /// Per-achievement progress and redemption state for one subject,
    /// evaluated against every active definition that applies to its kind.
    pub fn subject_summary(
        &self,
        subject_id: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<SubjectSummary> {
        let info = self.ledger.get_subject(subject_id)?;
        let history = self.ledger.get_history(subject_id, None)?;

        let mut statuses = Vec::new();
        for definition in self.catalog.active_as_of(now) {
            if definition.applies_to != info.kind {
                continue;
            }
            let (progress, record) = self.engine.sync_progress(&info, &history, definition, now);
            statuses.push(AchievementStatus {
                achievement_id: definition.id,
                title: definition.title.clone(),
                tier: definition.tier,
                points: definition.points,
                progress,
                record,
            });
        }

        let total_achievements = statuses.len();
        let earned = statuses.iter().filter(|s| s.record.has_earned()).count();
        let redeemed = statuses
            .iter()
            .filter(|s| s.record.completion_count > 0)
            .count();
        let overall_percentage = if total_achievements > 0 {
            let sum: u32 = statuses.iter().map(|s| s.progress.progress_percentage).sum();
            (sum as f64 / total_achievements as f64).round() as u32
        } else {
            0
        };
        let total_points = statuses
            .iter()
            .filter(|s| s.record.has_earned())
            .map(|s| s.points)
            .sum();

        let next_best = statuses
            .iter()
            .filter(|s| !s.record.has_earned())
            .max_by(|a, b| {
                a.progress
                    .progress_percentage
                    .cmp(&b.progress.progress_percentage)
                    .then_with(|| a.tier.cmp(&b.tier))
                    .then_with(|| b.title.cmp(&a.title))
            })
            .map(|s| NextBestHint {
                achievement_id: s.achievement_id,
                title: s.title.clone(),
                progress_percentage: s.progress.progress_percentage,
            });

        Ok(SubjectSummary {
            subject_id: info.subject_id,
            display_name: info.display_name,
            statuses,
            total_achievements,
            earned,
            redeemed,
            overall_percentage,
            total_points,
            next_best,
        })
    }

    /// Summaries for a batch of subjects, one task per subject, joined in
    /// input order. Unavailable subjects are skipped with an annotation.
    pub async fn batch_summaries(
        &self,
        subject_ids: &[String],
        now: DateTime<Utc>,
    ) -> BatchOutcome {
        let handles: Vec<_> = subject_ids
            .iter()
            .map(|id| {
                let facade = self.clone();
                let id = id.clone();
                tokio::spawn(async move { (id.clone(), facade.subject_summary(&id, now)) })
            })
            .collect();

        let mut summaries = Vec::new();
        let mut skipped = Vec::new();
        for handle in handles {
            match handle.await {
                Ok((_, Ok(summary))) => summaries.push(summary),
                Ok((id, Err(e))) => {
                    warn!(subject_id = %id, error = %e, "Subject skipped from batch");
                    skipped.push(SkippedSubject {
                        subject_id: id,
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Batch worker panicked");
                    skipped.push(SkippedSubject {
                        subject_id: String::new(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        BatchOutcome { summaries, skipped }
    }

    /// Ranks all barbers on the chosen metric over the window. Roster
    /// unavailability is fatal; individual subject failures are not.
    pub async fn leaderboard(
        &self,
        metric: RankingMetric,
        window: RankingWindow,
        now: DateTime<Utc>,
    ) -> EngineResult<LeaderboardOutcome> {
        let roster = self.ledger.list_subjects(SubjectKind::Barber)?;

        let handles: Vec<_> = roster
            .into_iter()
            .map(|info| {
                let facade = self.clone();
                tokio::spawn(async move {
                    let id = info.subject_id.clone();
                    (id, facade.metrics_for(info, window, now))
                })
            })
            .collect();

        let mut subjects: Vec<SubjectMetrics> = Vec::new();
        let mut skipped = Vec::new();
        for handle in handles {
            match handle.await {
                Ok((_, Ok(metrics))) => subjects.push(metrics),
                Ok((id, Err(e))) => {
                    warn!(subject_id = %id, error = %e, "Subject skipped from leaderboard");
                    skipped.push(SkippedSubject {
                        subject_id: id,
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Leaderboard worker panicked");
                    skipped.push(SkippedSubject {
                        subject_id: String::new(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let entries = self.ranker.rank(&subjects, metric);
        Ok(LeaderboardOutcome { entries, skipped })
    }

    fn metrics_for(
        &self,
        info: trimtrack_core::ledger::SubjectInfo,
        window: RankingWindow,
        now: DateTime<Utc>,
    ) -> EngineResult<SubjectMetrics> {
        let history = self.ledger.get_history(&info.subject_id, window.cutoff(now))?;
        let rewards_earned = self
            .engine
            .records_for_subject(&info.subject_id)
            .iter()
            .filter(|r| r.has_earned())
            .count() as u64;
        Ok(subject_metrics(&info, &history, rewards_earned, window, now))
    }
}
