//! Leaderboard ranking — pure, deterministic ordering of subjects by
//! performance metrics with configurable composite weighting.

pub mod ranker;

pub use ranker::{
    Badge, LeaderboardEntry, LeaderboardRanker, MetricWeights, RankingMetric, SubjectMetrics,
};
