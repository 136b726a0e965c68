//! Demo seeding — a small shop with three barbers and a starter catalog so
//! the service runs end-to-end without external collaborators.

use chrono::{Duration, Utc};
use uuid::Uuid;

use trimtrack_core::catalog::{
    AchievementCatalog, AchievementCategory, AchievementDefinition, AchievementTier, CountTarget,
    RequirementDetails, RequirementType, RewardSpec, RewardType, Timeframe,
};
use trimtrack_core::error::EngineResult;
use trimtrack_core::ledger::{InMemoryLedger, SubjectInfo, SubjectKind, VisitKind, VisitRecord};

pub fn catalog() -> EngineResult<AchievementCatalog> {
    let first_chair = AchievementDefinition {
        id: Uuid::new_v4(),
        title: "First Chair".to_string(),
        description: "Complete 10 visits".to_string(),
        category: AchievementCategory::Visits,
        applies_to: SubjectKind::Barber,
        requirement_type: RequirementType::Count,
        requirement_value: 10,
        details: RequirementDetails::default(),
        tier: AchievementTier::Bronze,
        points: 50,
        reward: None,
        prerequisites: Vec::new(),
        is_repeatable: false,
        max_completions: None,
        is_active: true,
        valid_from: None,
        valid_until: None,
    };

    let crowd_favorite = AchievementDefinition {
        id: Uuid::new_v4(),
        title: "Crowd Favorite".to_string(),
        description: "Serve 15 unique clients this month".to_string(),
        category: AchievementCategory::Clients,
        applies_to: SubjectKind::Barber,
        requirement_type: RequirementType::Count,
        requirement_value: 15,
        details: RequirementDetails {
            timeframe: Some(Timeframe::Monthly),
            count_target: Some(CountTarget::UniqueClients),
            ..Default::default()
        },
        tier: AchievementTier::Silver,
        points: 150,
        reward: Some(RewardSpec {
            reward_type: RewardType::Recognition,
            value: 0.0,
            description: "Featured on the shop board".to_string(),
        }),
        prerequisites: vec![first_chair.id],
        is_repeatable: true,
        max_completions: Some(12),
        is_active: true,
        valid_from: None,
        valid_until: None,
    };

    let steady_hands = AchievementDefinition {
        id: Uuid::new_v4(),
        title: "Steady Hands".to_string(),
        description: "Six months behind the chair".to_string(),
        category: AchievementCategory::Tenure,
        applies_to: SubjectKind::Barber,
        requirement_type: RequirementType::Days,
        requirement_value: 180,
        details: RequirementDetails::default(),
        tier: AchievementTier::Gold,
        points: 300,
        reward: Some(RewardSpec {
            reward_type: RewardType::Product,
            value: 40.0,
            description: "Premium shears set".to_string(),
        }),
        prerequisites: Vec::new(),
        is_repeatable: false,
        max_completions: None,
        is_active: true,
        valid_from: None,
        valid_until: None,
    };

    AchievementCatalog::new(vec![first_chair, crowd_favorite, steady_hands])
}

pub fn seed(ledger: &InMemoryLedger) {
    let now = Utc::now();
    let barbers = [("barber-ana", 700, 24), ("barber-leo", 300, 16), ("barber-kai", 90, 6)];

    for (id, joined_days, visits) in barbers {
        ledger.add_subject(SubjectInfo {
            subject_id: id.to_string(),
            kind: SubjectKind::Barber,
            display_name: id.trim_start_matches("barber-").to_string(),
            joined_at: now - Duration::days(joined_days),
        });
        for i in 0..visits {
            ledger.record_visit(VisitRecord {
                id: Uuid::new_v4(),
                subject_id: id.to_string(),
                timestamp: now - Duration::days((visits - i) as i64 * 2),
                kind: VisitKind::WalkIn,
                client_id: Some(format!("client-{}", i % 9)),
                reward_redeemed: false,
                flags: Vec::new(),
            });
        }
    }
}
