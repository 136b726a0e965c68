//! Evaluates one subject's visit history against one achievement
//! definition, producing a `SubjectProgress` snapshot.
//!
//! The calculator is a total function: malformed or missing ledger data for
//! a subject yields a zero current value, never an error. Validation of the
//! definitions themselves happened at catalog load.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use trimtrack_core::catalog::{
    AchievementDefinition, CountTarget, RequirementType, Timeframe,
};
use trimtrack_core::ledger::{SubjectInfo, VisitRecord};
use trimtrack_core::progress::{DurationProgress, SubjectProgress};

use crate::periods::{period_index, window_start};

/// Stateless progress calculator. Safe to share and call concurrently for
/// different subjects.
#[derive(Debug, Default, Clone)]
pub struct ProgressCalculator;

impl ProgressCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Computes the standing of `subject` against `definition`.
    ///
    /// `history` must be ordered by timestamp ascending (the ledger
    /// contract). `prereq_earned` reports whether a prerequisite
    /// achievement has been earned; a missing record reads as unearned.
    /// `now` is passed in so results are reproducible.
    pub fn evaluate(
        &self,
        subject: &SubjectInfo,
        history: &[VisitRecord],
        definition: &AchievementDefinition,
        prereq_earned: &dyn Fn(Uuid) -> bool,
        now: DateTime<Utc>,
    ) -> SubjectProgress {
        let timeframe = definition.details.timeframe.unwrap_or_default();

        let mut duration = None;
        let mut sample_ok = true;

        let current_value = match definition.requirement_type {
            RequirementType::Count => self.count_value(history, definition, timeframe, now),
            RequirementType::Days => {
                let days = (now - subject.joined_at).num_days().max(0);
                duration = Some(DurationProgress::from_days(days));
                days as f64
            }
            RequirementType::Streak => self.streak_value(history, definition, timeframe, now),
            RequirementType::Percentage => {
                let (rate, ok) = self.percentage_value(history, definition, timeframe, now);
                sample_ok = ok;
                rate
            }
            RequirementType::Milestone => self.milestone_value(history, definition),
        };

        let requirement_value = definition.requirement_value as f64;

        // Below the sample floor a percentage reports zero so a tiny
        // qualifying set cannot produce a false positive.
        let (current_value, progress_percentage) = if sample_ok {
            (
                current_value,
                SubjectProgress::percentage(current_value, requirement_value),
            )
        } else {
            (0.0, 0)
        };

        let prerequisites_met = definition
            .prerequisites
            .iter()
            .all(|id| prereq_earned(*id));

        let is_earned = sample_ok
            && current_value >= requirement_value
            && prerequisites_met
            && definition.is_within_validity(now);

        SubjectProgress {
            subject_id: subject.subject_id.clone(),
            achievement_id: definition.id,
            current_value,
            requirement_value,
            progress_percentage,
            is_earned,
            duration,
        }
    }

    /// Ledger entries matching the count target inside the current instance
    /// of the timeframe window.
    fn count_value(
        &self,
        history: &[VisitRecord],
        definition: &AchievementDefinition,
        timeframe: Timeframe,
        now: DateTime<Utc>,
    ) -> f64 {
        let cutoff = window_start(timeframe, now);
        let in_window = history
            .iter()
            .filter(|v| cutoff.map_or(true, |c| v.timestamp >= c) && v.timestamp <= now);

        let count = match definition.details.count_target.unwrap_or_default() {
            CountTarget::Visits => in_window.count(),
            CountTarget::UniqueClients => {
                let mut clients: Vec<&str> = in_window
                    .filter_map(|v| v.client_id.as_deref())
                    .collect();
                clients.sort_unstable();
                clients.dedup();
                clients.len()
            }
            CountTarget::RewardsRedeemed => in_window.filter(|v| v.reward_redeemed).count(),
        };

        let capped = match definition.details.maximum_value {
            Some(max) => count.min(max as usize),
            None => count,
        };
        capped as f64
    }

    /// Longest run of consecutive qualifying periods, or the currently
    /// active run when `consecutive_required` is set. A period qualifies
    /// when it contains at least one visit; a broken active streak reads
    /// as zero even if a longer historical one exists.
    fn streak_value(
        &self,
        history: &[VisitRecord],
        definition: &AchievementDefinition,
        timeframe: Timeframe,
        now: DateTime<Utc>,
    ) -> f64 {
        let mut indexes: Vec<i64> = history
            .iter()
            .filter(|v| v.timestamp <= now)
            .map(|v| period_index(timeframe, v.timestamp))
            .collect();
        indexes.sort_unstable();
        indexes.dedup();

        if indexes.is_empty() {
            return 0.0;
        }

        let mut best_run: i64 = 1;
        let mut last_run: i64 = 1;
        for pair in indexes.windows(2) {
            if pair[1] - pair[0] == 1 {
                last_run += 1;
            } else {
                last_run = 1;
            }
            best_run = best_run.max(last_run);
        }

        if definition.details.consecutive_required {
            // The run is still alive if its last qualifying period is the
            // current one or the one immediately before (the current period
            // is still in progress).
            let current = period_index(timeframe, now);
            let last = indexes[indexes.len() - 1];
            if current - last <= 1 {
                last_run as f64
            } else {
                0.0
            }
        } else {
            best_run as f64
        }
    }

    /// Client retention rate over the window: returning clients (two or
    /// more visits) divided by unique clients, expressed 0–100. A zero
    /// denominator yields zero, not an error. Returns `(rate, sample_ok)`
    /// where `sample_ok` is false below the minimum qualifying-set size.
    fn percentage_value(
        &self,
        history: &[VisitRecord],
        definition: &AchievementDefinition,
        timeframe: Timeframe,
        now: DateTime<Utc>,
    ) -> (f64, bool) {
        let cutoff = window_start(timeframe, now);
        let mut visits_per_client: HashMap<&str, u32> = HashMap::new();
        for visit in history
            .iter()
            .filter(|v| cutoff.map_or(true, |c| v.timestamp >= c) && v.timestamp <= now)
        {
            if let Some(client) = visit.client_id.as_deref() {
                *visits_per_client.entry(client).or_insert(0) += 1;
            }
        }

        let unique = visits_per_client.len();
        let returning = visits_per_client.values().filter(|&&n| n >= 2).count();

        if let Some(min) = definition.details.minimum_value {
            if unique < min as usize {
                return (0.0, false);
            }
        }

        let denominator = match definition.details.maximum_value {
            Some(max) => unique.min(max as usize),
            None => unique,
        };

        if denominator == 0 {
            return (0.0, true);
        }
        ((returning as f64 / denominator as f64) * 100.0, true)
    }

    /// Binary pass-through: the named ledger flag either appears in the
    /// history or it does not.
    fn milestone_value(&self, history: &[VisitRecord], definition: &AchievementDefinition) -> f64 {
        let Some(flag) = definition.details.milestone_flag.as_deref() else {
            return 0.0;
        };
        let reached = history
            .iter()
            .any(|v| v.flags.iter().any(|f| f == flag));
        if reached {
            definition.requirement_value as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use trimtrack_core::catalog::{
        AchievementCategory, AchievementTier, RequirementDetails,
    };
    use trimtrack_core::ledger::{SubjectKind, VisitKind};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 15, 12, 0, 0).unwrap()
    }

    fn subject() -> SubjectInfo {
        SubjectInfo {
            subject_id: "barber-1".to_string(),
            kind: SubjectKind::Barber,
            display_name: "Sam".to_string(),
            joined_at: now() - Duration::days(95),
        }
    }

    fn definition(requirement_type: RequirementType, value: u32) -> AchievementDefinition {
        AchievementDefinition {
            id: Uuid::new_v4(),
            title: "test".to_string(),
            description: String::new(),
            category: AchievementCategory::Visits,
            applies_to: SubjectKind::Barber,
            requirement_type,
            requirement_value: value,
            details: RequirementDetails::default(),
            tier: AchievementTier::Bronze,
            points: 10,
            reward: None,
            prerequisites: Vec::new(),
            is_repeatable: false,
            max_completions: None,
            is_active: true,
            valid_from: None,
            valid_until: None,
        }
    }

    fn visit(days_ago: i64, client: &str) -> VisitRecord {
        VisitRecord {
            id: Uuid::new_v4(),
            subject_id: "barber-1".to_string(),
            timestamp: now() - Duration::days(days_ago),
            kind: VisitKind::WalkIn,
            client_id: Some(client.to_string()),
            reward_redeemed: false,
            flags: Vec::new(),
        }
    }

    fn no_prereqs(_: Uuid) -> bool {
        true
    }

    #[test]
    fn test_zero_visits_zero_progress() {
        let calc = ProgressCalculator::new();
        let def = definition(RequirementType::Count, 10);
        let progress = calc.evaluate(&subject(), &[], &def, &no_prereqs, now());
        assert_eq!(progress.current_value, 0.0);
        assert_eq!(progress.progress_percentage, 0);
        assert!(!progress.is_earned);
    }

    #[test]
    fn test_count_earned_and_clamped() {
        let calc = ProgressCalculator::new();
        let def = definition(RequirementType::Count, 10);
        let history: Vec<VisitRecord> = (0..12).map(|i| visit(i, "c")).collect();
        let progress = calc.evaluate(&subject(), &history, &def, &no_prereqs, now());
        assert_eq!(progress.current_value, 12.0);
        assert_eq!(progress.progress_percentage, 100);
        assert!(progress.is_earned);
    }

    #[test]
    fn test_count_monthly_window_excludes_older_visits() {
        let calc = ProgressCalculator::new();
        let mut def = definition(RequirementType::Count, 10);
        def.details.timeframe = Some(Timeframe::Monthly);
        // now() is July 15th: 5 visits in July, 5 in June.
        let history: Vec<VisitRecord> =
            (0..5).map(|i| visit(i, "c")).chain((20..25).map(|i| visit(i, "c"))).collect();
        let progress = calc.evaluate(&subject(), &history, &def, &no_prereqs, now());
        assert_eq!(progress.current_value, 5.0);
    }

    #[test]
    fn test_count_unique_clients() {
        let calc = ProgressCalculator::new();
        let mut def = definition(RequirementType::Count, 3);
        def.details.count_target = Some(CountTarget::UniqueClients);
        let history = vec![visit(1, "a"), visit(2, "a"), visit(3, "b")];
        let progress = calc.evaluate(&subject(), &history, &def, &no_prereqs, now());
        assert_eq!(progress.current_value, 2.0);
        assert!(!progress.is_earned);
    }

    #[test]
    fn test_days_duration_breakdown() {
        let calc = ProgressCalculator::new();
        let def = definition(RequirementType::Days, 90);
        let progress = calc.evaluate(&subject(), &[], &def, &no_prereqs, now());
        assert_eq!(progress.current_value, 95.0);
        assert!(progress.is_earned);
        let duration = progress.duration.unwrap();
        assert_eq!(duration.whole_months, 3);
        assert_eq!(duration.remaining_days, 5);
    }

    #[test]
    fn test_streak_best_historical() {
        let calc = ProgressCalculator::new();
        let mut def = definition(RequirementType::Streak, 4);
        def.details.timeframe = Some(Timeframe::Weekly);
        // Three consecutive weeks long ago, then a gap, then one recent week.
        let history = vec![visit(70, "c"), visit(63, "c"), visit(56, "c"), visit(2, "c")];
        let progress = calc.evaluate(&subject(), &history, &def, &no_prereqs, now());
        assert_eq!(progress.current_value, 3.0);
    }

    #[test]
    fn test_streak_consecutive_required_broken_resets_to_zero() {
        let calc = ProgressCalculator::new();
        let mut def = definition(RequirementType::Streak, 4);
        def.details.timeframe = Some(Timeframe::Weekly);
        def.details.consecutive_required = true;
        // Long historical streak, nothing in the last three weeks.
        let history = vec![visit(70, "c"), visit(63, "c"), visit(56, "c"), visit(49, "c")];
        let progress = calc.evaluate(&subject(), &history, &def, &no_prereqs, now());
        assert_eq!(progress.current_value, 0.0);
    }

    #[test]
    fn test_streak_consecutive_required_active_run_counts() {
        let calc = ProgressCalculator::new();
        let mut def = definition(RequirementType::Streak, 2);
        def.details.timeframe = Some(Timeframe::Weekly);
        def.details.consecutive_required = true;
        let history = vec![visit(8, "c"), visit(2, "c")];
        let progress = calc.evaluate(&subject(), &history, &def, &no_prereqs, now());
        assert_eq!(progress.current_value, 2.0);
        assert!(progress.is_earned);
    }

    #[test]
    fn test_percentage_retention_scenario() {
        let calc = ProgressCalculator::new();
        let def = definition(RequirementType::Percentage, 50);
        // 10 unique clients, 3 of them returning.
        let mut history = Vec::new();
        for i in 0..10 {
            history.push(visit(10 + i, &format!("c{}", i)));
        }
        for i in 0..3 {
            history.push(visit(i, &format!("c{}", i)));
        }
        let progress = calc.evaluate(&subject(), &history, &def, &no_prereqs, now());
        assert_eq!(progress.current_value, 30.0);
        assert_eq!(progress.progress_percentage, 60);
        assert!(!progress.is_earned);
    }

    #[test]
    fn test_percentage_zero_denominator_is_zero() {
        let calc = ProgressCalculator::new();
        let def = definition(RequirementType::Percentage, 50);
        let progress = calc.evaluate(&subject(), &[], &def, &no_prereqs, now());
        assert_eq!(progress.current_value, 0.0);
        assert!(!progress.is_earned);
    }

    #[test]
    fn test_percentage_below_sample_floor_reports_zero() {
        let calc = ProgressCalculator::new();
        let mut def = definition(RequirementType::Percentage, 50);
        def.details.minimum_value = Some(5);
        // Two clients, both returning: 100% raw rate, but under the floor.
        let history = vec![visit(1, "a"), visit(2, "a"), visit(3, "b"), visit(4, "b")];
        let progress = calc.evaluate(&subject(), &history, &def, &no_prereqs, now());
        assert_eq!(progress.current_value, 0.0);
        assert_eq!(progress.progress_percentage, 0);
        assert!(!progress.is_earned);
    }

    #[test]
    fn test_milestone_flag_pass_through() {
        let calc = ProgressCalculator::new();
        let mut def = definition(RequirementType::Milestone, 1);
        def.details.milestone_flag = Some("onboarding_complete".to_string());

        let mut flagged = visit(1, "a");
        flagged.flags.push("onboarding_complete".to_string());

        let missing = calc.evaluate(&subject(), &[visit(2, "a")], &def, &no_prereqs, now());
        assert!(!missing.is_earned);

        let reached = calc.evaluate(&subject(), &[flagged], &def, &no_prereqs, now());
        assert!(reached.is_earned);
        assert_eq!(reached.progress_percentage, 100);
    }

    #[test]
    fn test_unmet_prerequisite_blocks_earning() {
        let calc = ProgressCalculator::new();
        let mut def = definition(RequirementType::Count, 2);
        def.prerequisites = vec![Uuid::new_v4()];
        let history = vec![visit(1, "a"), visit(2, "b")];
        let progress = calc.evaluate(&subject(), &history, &def, &|_| false, now());
        assert_eq!(progress.progress_percentage, 100);
        assert!(!progress.is_earned);
    }

    #[test]
    fn test_outside_validity_window_reports_progress_but_not_earned() {
        let calc = ProgressCalculator::new();
        let mut def = definition(RequirementType::Count, 2);
        def.valid_until = Some(now() - Duration::days(1));
        let history = vec![visit(1, "a"), visit(2, "b"), visit(3, "c")];
        let progress = calc.evaluate(&subject(), &history, &def, &no_prereqs, now());
        assert_eq!(progress.progress_percentage, 100);
        assert!(!progress.is_earned);
    }

    #[test]
    fn test_all_time_count_monotone_in_history() {
        let calc = ProgressCalculator::new();
        let def = definition(RequirementType::Count, 10);
        let mut history = Vec::new();
        let mut last_pct = 0;
        for i in 0..15 {
            history.push(visit(15 - i, "c"));
            let progress = calc.evaluate(&subject(), &history, &def, &no_prereqs, now());
            assert!(progress.progress_percentage >= last_pct);
            last_pct = progress.progress_percentage;
        }
        assert_eq!(last_pct, 100);
    }
}
