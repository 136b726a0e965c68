//! Aggregation facade — orchestrates the progress calculator, redemption
//! engine, and leaderboard ranker over batches of subjects, tolerating
//! per-subject failure.

pub mod facade;
pub mod metrics;

pub use facade::{
    AchievementStatus, AggregationFacade, BatchOutcome, LeaderboardOutcome, NextBestHint,
    SkippedSubject, SubjectSummary,
};
pub use metrics::RankingWindow;
