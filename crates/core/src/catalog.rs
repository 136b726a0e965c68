//! Achievement catalog domain types — the definitions the loyalty engine
//! evaluates subjects against.
//!
//! Definitions are owned by catalog administration and read-only during a
//! computation pass. Validation happens once at catalog construction so the
//! calculators never re-validate:
//! - requirement value must be positive
//! - non-repeatable achievements cannot allow multiple completions
//! - prerequisite references must resolve and must not form a cycle

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::ledger::SubjectKind;

// ─── Classification ─────────────────────────────────────────────────────────

/// What aspect of a subject's work an achievement rewards.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AchievementCategory {
    Tenure,
    Visits,
    Clients,
    Consistency,
    Quality,
    Teamwork,
    Learning,
    Milestone,
}

/// How the requirement is measured.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RequirementType {
    /// Number of qualifying ledger entries.
    Count,
    /// Elapsed whole days since the subject's start reference.
    Days,
    /// Consecutive qualifying periods with no gap.
    Streak,
    /// Ratio of two metrics over the timeframe, expressed 0–100.
    Percentage,
    /// Binary pass-through flag recorded in the ledger.
    Milestone,
}

/// Achievement tier levels, ordered bronze < silver < gold < platinum < diamond.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AchievementTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
}

/// Calendar window a requirement is measured over.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    Daily,
    Weekly,
    Monthly,
    Yearly,
    #[default]
    AllTime,
}

/// What a `Count` requirement counts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum CountTarget {
    #[default]
    Visits,
    UniqueClients,
    RewardsRedeemed,
}

// ─── Requirement Details ────────────────────────────────────────────────────

/// Optional refinements on how a requirement is measured.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequirementDetails {
    /// Window the measurement applies to. Absent means all-time.
    #[serde(default)]
    pub timeframe: Option<Timeframe>,
    /// For streaks: only the currently active run counts.
    #[serde(default)]
    pub consecutive_required: bool,
    /// For counts: which ledger entries qualify.
    #[serde(default)]
    pub count_target: Option<CountTarget>,
    /// Minimum size of the qualifying set before the measurement is valid.
    /// Below the floor a percentage reports 0 and cannot be earned.
    #[serde(default)]
    pub minimum_value: Option<u32>,
    /// Cap on the qualifying set size.
    #[serde(default)]
    pub maximum_value: Option<u32>,
    /// For milestones: the named ledger flag that satisfies the requirement.
    #[serde(default)]
    pub milestone_flag: Option<String>,
}

// ─── Reward ─────────────────────────────────────────────────────────────────

/// Tangible reward attached to an achievement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RewardType {
    FreeService,
    Discount,
    Product,
    Recognition,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardSpec {
    pub reward_type: RewardType,
    /// Monetary or percentage value, interpretation depends on the type.
    pub value: f64,
    pub description: String,
}

// ─── Achievement Definition ─────────────────────────────────────────────────

/// A catalog-defined goal with a requirement, tier, and optional reward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AchievementDefinition {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: AchievementCategory,
    pub applies_to: SubjectKind,
    pub requirement_type: RequirementType,
    pub requirement_value: u32,
    #[serde(default)]
    pub details: RequirementDetails,
    pub tier: AchievementTier,
    pub points: u32,
    #[serde(default)]
    pub reward: Option<RewardSpec>,
    /// Achievements that must be earned before this one.
    #[serde(default)]
    pub prerequisites: Vec<Uuid>,
    #[serde(default)]
    pub is_repeatable: bool,
    /// Completion cap for repeatable achievements. Absent means unlimited.
    #[serde(default)]
    pub max_completions: Option<u32>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

impl AchievementDefinition {
    /// Whether `at` falls inside the definition's validity window.
    pub fn is_within_validity(&self, at: DateTime<Utc>) -> bool {
        if let Some(from) = self.valid_from {
            if at < from {
                return false;
            }
        }
        if let Some(until) = self.valid_until {
            if at > until {
                return false;
            }
        }
        true
    }

    /// Effective completion cap: non-repeatable achievements cap at one.
    pub fn effective_max_completions(&self) -> Option<u32> {
        if self.is_repeatable {
            self.max_completions
        } else {
            Some(1)
        }
    }
}

// ─── Catalog ────────────────────────────────────────────────────────────────

/// Validated, immutable collection of achievement definitions.
#[derive(Debug, Clone)]
pub struct AchievementCatalog {
    definitions: Vec<AchievementDefinition>,
    by_id: HashMap<Uuid, usize>,
}

impl AchievementCatalog {
    /// Builds a catalog, rejecting malformed definitions so evaluation
    /// never needs to re-validate.
    pub fn new(definitions: Vec<AchievementDefinition>) -> EngineResult<Self> {
        let by_id: HashMap<Uuid, usize> = definitions
            .iter()
            .enumerate()
            .map(|(i, d)| (d.id, i))
            .collect();

        if by_id.len() != definitions.len() {
            return Err(EngineError::Configuration(
                "duplicate achievement id in catalog".to_string(),
            ));
        }

        for def in &definitions {
            if def.requirement_value == 0 {
                return Err(EngineError::Configuration(format!(
                    "achievement '{}' has zero requirement value",
                    def.title
                )));
            }
            if !def.is_repeatable && def.max_completions.map_or(false, |m| m > 1) {
                return Err(EngineError::Configuration(format!(
                    "achievement '{}' is not repeatable but allows multiple completions",
                    def.title
                )));
            }
            if def.max_completions == Some(0) {
                return Err(EngineError::Configuration(format!(
                    "achievement '{}' has a zero completion cap",
                    def.title
                )));
            }
            for prereq in &def.prerequisites {
                if !by_id.contains_key(prereq) {
                    return Err(EngineError::Configuration(format!(
                        "achievement '{}' references unknown prerequisite {}",
                        def.title, prereq
                    )));
                }
            }
        }

        Self::check_prerequisite_cycles(&definitions, &by_id)?;

        tracing::info!(count = definitions.len(), "Achievement catalog loaded");

        Ok(Self { definitions, by_id })
    }

    /// Depth-first search over prerequisite edges with tri-state marking.
    fn check_prerequisite_cycles(
        definitions: &[AchievementDefinition],
        by_id: &HashMap<Uuid, usize>,
    ) -> EngineResult<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }

        let mut marks = vec![Mark::Unvisited; definitions.len()];

        fn visit(
            idx: usize,
            definitions: &[AchievementDefinition],
            by_id: &HashMap<Uuid, usize>,
            marks: &mut [Mark],
        ) -> EngineResult<()> {
            match marks[idx] {
                Mark::Done => return Ok(()),
                Mark::InProgress => {
                    return Err(EngineError::Configuration(format!(
                        "prerequisite cycle involving achievement '{}'",
                        definitions[idx].title
                    )));
                }
                Mark::Unvisited => {}
            }
            marks[idx] = Mark::InProgress;
            for prereq in &definitions[idx].prerequisites {
                let next = by_id[prereq];
                visit(next, definitions, by_id, marks)?;
            }
            marks[idx] = Mark::Done;
            Ok(())
        }

        for idx in 0..definitions.len() {
            visit(idx, definitions, by_id, &mut marks)?;
        }
        Ok(())
    }

    pub fn get(&self, id: &Uuid) -> Option<&AchievementDefinition> {
        self.by_id.get(id).map(|&i| &self.definitions[i])
    }

    /// Definitions open for new eligibility checks at `as_of`: active and
    /// inside their validity window. Deactivation never revokes completions
    /// already redeemed, it only stops new ones.
    pub fn active_as_of(&self, as_of: DateTime<Utc>) -> Vec<&AchievementDefinition> {
        self.definitions
            .iter()
            .filter(|d| d.is_active && d.is_within_validity(as_of))
            .collect()
    }

    pub fn definitions(&self) -> &[AchievementDefinition] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
