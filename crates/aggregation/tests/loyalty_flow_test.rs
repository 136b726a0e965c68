//! End-to-end flow over the loyalty core: seeded ledger and catalog,
//! progress evaluation, redemption lifecycle, and leaderboard ranking.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use trimtrack_aggregation::{AggregationFacade, RankingWindow};
use trimtrack_core::catalog::{
    AchievementCatalog, AchievementCategory, AchievementDefinition, AchievementTier,
    RequirementDetails, RequirementType, RewardSpec, RewardType,
};
use trimtrack_core::error::EngineError;
use trimtrack_core::ledger::{InMemoryLedger, SubjectInfo, SubjectKind, VisitKind, VisitRecord};
use trimtrack_leaderboard::{Badge, MetricWeights, RankingMetric};
use trimtrack_redemption::{InMemoryStore, RedemptionEngine, RedemptionState};

fn count_achievement(title: &str, requirement_value: u32) -> AchievementDefinition {
    AchievementDefinition {
        id: Uuid::new_v4(),
        title: title.to_string(),
        description: String::new(),
        category: AchievementCategory::Visits,
        applies_to: SubjectKind::Barber,
        requirement_type: RequirementType::Count,
        requirement_value,
        details: RequirementDetails::default(),
        tier: AchievementTier::Silver,
        points: 100,
        reward: Some(RewardSpec {
            reward_type: RewardType::FreeService,
            value: 25.0,
            description: "Free cut".to_string(),
        }),
        prerequisites: Vec::new(),
        is_repeatable: false,
        max_completions: None,
        is_active: true,
        valid_from: None,
        valid_until: None,
    }
}

fn barber(id: &str, joined_days_ago: i64) -> SubjectInfo {
    SubjectInfo {
        subject_id: id.to_string(),
        kind: SubjectKind::Barber,
        display_name: id.to_string(),
        joined_at: Utc::now() - Duration::days(joined_days_ago),
    }
}

fn seed_visits(ledger: &InMemoryLedger, subject_id: &str, count: usize) {
    for i in 0..count {
        ledger.record_visit(VisitRecord {
            id: Uuid::new_v4(),
            subject_id: subject_id.to_string(),
            timestamp: Utc::now() - Duration::days(count as i64 - i as i64),
            kind: VisitKind::WalkIn,
            client_id: Some(format!("client-{}", i % 5)),
            reward_redeemed: false,
            flags: Vec::new(),
        });
    }
}

fn facade_with(
    ledger: Arc<InMemoryLedger>,
    catalog: AchievementCatalog,
) -> (AggregationFacade, Arc<RedemptionEngine>) {
    let engine = Arc::new(RedemptionEngine::new(Arc::new(InMemoryStore::new())));
    let facade = AggregationFacade::new(
        ledger,
        Arc::new(catalog),
        engine.clone(),
        MetricWeights::default(),
    );
    (facade, engine)
}

#[tokio::test]
async fn earn_and_redeem_flow() {
    let ledger = Arc::new(InMemoryLedger::new());
    ledger.add_subject(barber("barber-1", 400));
    seed_visits(&ledger, "barber-1", 12);

    let definition = count_achievement("Regular Chair", 10);
    let achievement_id = definition.id;
    let catalog = AchievementCatalog::new(vec![definition.clone()]).unwrap();
    let (facade, engine) = facade_with(ledger, catalog);

    let summary = facade.subject_summary("barber-1", Utc::now()).unwrap();
    assert_eq!(summary.total_achievements, 1);
    assert_eq!(summary.earned, 1);
    assert_eq!(summary.redeemed, 0);
    assert_eq!(summary.overall_percentage, 100);
    assert_eq!(summary.total_points, 100);
    assert_eq!(
        summary.statuses[0].record.state,
        RedemptionState::Earned
    );

    let redeemed = engine
        .confirm_redemption(&definition, "barber-1", "front-desk", Some("picked up"))
        .unwrap();
    assert_eq!(redeemed.state, RedemptionState::Redeemed);
    assert_eq!(redeemed.completion_count, 1);

    // A stale client retrying the confirmation sees the conflict.
    let err = engine
        .confirm_redemption(&definition, "barber-1", "front-desk", None)
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));

    let audit = engine.audit_history("barber-1", achievement_id);
    assert_eq!(audit.len(), 2);
    assert_eq!(audit[0].to, RedemptionState::Earned);
    assert_eq!(audit[1].to, RedemptionState::Redeemed);
}

#[tokio::test]
async fn unearned_subject_cannot_redeem() {
    let ledger = Arc::new(InMemoryLedger::new());
    ledger.add_subject(barber("barber-1", 400));
    seed_visits(&ledger, "barber-1", 3);

    let definition = count_achievement("Regular Chair", 10);
    let catalog = AchievementCatalog::new(vec![definition.clone()]).unwrap();
    let (facade, engine) = facade_with(ledger, catalog);

    let summary = facade.subject_summary("barber-1", Utc::now()).unwrap();
    assert_eq!(summary.earned, 0);
    assert_eq!(summary.statuses[0].record.state, RedemptionState::Locked);
    assert_eq!(summary.next_best.as_ref().unwrap().progress_percentage, 30);

    let err = engine
        .confirm_redemption(&definition, "barber-1", "front-desk", None)
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
}

#[tokio::test]
async fn batch_tolerates_missing_subject() {
    let ledger = Arc::new(InMemoryLedger::new());
    ledger.add_subject(barber("barber-1", 400));
    seed_visits(&ledger, "barber-1", 5);

    let catalog = AchievementCatalog::new(vec![count_achievement("Regular Chair", 10)]).unwrap();
    let (facade, _) = facade_with(ledger, catalog);

    let outcome = facade
        .batch_summaries(
            &["barber-1".to_string(), "ghost".to_string()],
            Utc::now(),
        )
        .await;
    assert_eq!(outcome.summaries.len(), 1);
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.skipped[0].subject_id, "ghost");
}

#[tokio::test]
async fn leaderboard_seniority_tie_break_and_badges() {
    let ledger = Arc::new(InMemoryLedger::new());
    // Identical recent activity; barber-2 joined earlier.
    ledger.add_subject(barber("barber-1", 100));
    ledger.add_subject(barber("barber-2", 500));
    ledger.add_subject(barber("barber-3", 50));
    seed_visits(&ledger, "barber-1", 10);
    seed_visits(&ledger, "barber-2", 10);
    seed_visits(&ledger, "barber-3", 4);

    let catalog = AchievementCatalog::new(vec![count_achievement("Regular Chair", 100)]).unwrap();
    let (facade, _) = facade_with(ledger, catalog);

    let outcome = facade
        .leaderboard(RankingMetric::Overall, RankingWindow::AllTime, Utc::now())
        .await
        .unwrap();
    assert!(outcome.skipped.is_empty());
    assert_eq!(outcome.entries.len(), 3);

    let order: Vec<&str> = outcome
        .entries
        .iter()
        .map(|e| e.subject_id.as_str())
        .collect();
    assert_eq!(order, vec!["barber-2", "barber-1", "barber-3"]);

    let ranks: Vec<u32> = outcome.entries.iter().map(|e| e.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3]);
    assert_eq!(outcome.entries[0].badge, Some(Badge::Gold));
    assert_eq!(outcome.entries[1].badge, Some(Badge::Silver));
    assert_eq!(outcome.entries[2].badge, Some(Badge::Bronze));
}

#[tokio::test]
async fn leaderboard_empty_roster_is_empty_ranking() {
    let ledger = Arc::new(InMemoryLedger::new());
    let catalog = AchievementCatalog::new(Vec::new()).unwrap();
    let (facade, _) = facade_with(ledger, catalog);

    let outcome = facade
        .leaderboard(RankingMetric::Visits, RankingWindow::Week, Utc::now())
        .await
        .unwrap();
    assert!(outcome.entries.is_empty());
}
