//! Transition engine over redemption records.
//!
//! All transitions for a given (subject, achievement) pair are serialized
//! through a per-key mutex held for the whole read-check-write, so two
//! confirmations racing for a capped achievement cannot both succeed.
//! Cross-key operations proceed fully in parallel.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use trimtrack_core::catalog::AchievementDefinition;
use trimtrack_core::error::{EngineError, EngineResult};
use trimtrack_core::ledger::{SubjectInfo, VisitRecord};
use trimtrack_core::progress::SubjectProgress;
use trimtrack_progress::ProgressCalculator;

use crate::state_machine::RedemptionStateMachine;
use crate::store::{RecordKey, RedemptionStore};
use crate::types::{RedemptionRecord, RedemptionState, TransitionEvent};

pub struct RedemptionEngine {
    store: Arc<dyn RedemptionStore>,
    state_machine: RedemptionStateMachine,
    calculator: ProgressCalculator,
    locks: DashMap<RecordKey, Arc<Mutex<()>>>,
}

impl RedemptionEngine {
    pub fn new(store: Arc<dyn RedemptionStore>) -> Self {
        Self {
            store,
            state_machine: RedemptionStateMachine::new(),
            calculator: ProgressCalculator::new(),
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, subject_id: &str, achievement_id: Uuid) -> Arc<Mutex<()>> {
        self.locks
            .entry((subject_id.to_string(), achievement_id))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn under_completion_cap(
        record: &RedemptionRecord,
        definition: &AchievementDefinition,
    ) -> bool {
        definition
            .effective_max_completions()
            .map_or(true, |max| record.completion_count < max)
    }

    fn apply_transition(
        &self,
        record: &mut RedemptionRecord,
        to: RedemptionState,
        actor: Option<&str>,
        notes: Option<&str>,
        at: DateTime<Utc>,
    ) {
        let from = record.state;
        record.state = to;
        self.store.append_audit(
            &record.subject_id,
            record.achievement_id,
            TransitionEvent {
                at,
                from,
                to,
                actor: actor.map(str::to_string),
                notes: notes.map(str::to_string),
            },
        );
        debug!(
            subject_id = %record.subject_id,
            achievement_id = %record.achievement_id,
            ?from,
            ?to,
            "Redemption transition"
        );
    }

    /// Evaluates progress and reconciles the redemption record with it.
    ///
    /// Idempotent from the caller's perspective; the only automatic
    /// transitions are `locked → earned` on first discovery, and the
    /// repeatable `redeemed → earned` cycle when the history recorded
    /// after the last redemption satisfies the requirement again.
    pub fn sync_progress(
        &self,
        subject: &SubjectInfo,
        history: &[VisitRecord],
        definition: &AchievementDefinition,
        now: DateTime<Utc>,
    ) -> (SubjectProgress, RedemptionRecord) {
        let lock = self.lock_for(&subject.subject_id, definition.id);
        let _guard = lock.lock();

        let mut record = self
            .store
            .get(&subject.subject_id, definition.id)
            .unwrap_or_else(|| {
                let record = RedemptionRecord::locked(&subject.subject_id, definition.id);
                self.store.put(record.clone());
                record
            });

        let store = &self.store;
        let subject_id = subject.subject_id.clone();
        let prereq_earned = move |id: Uuid| {
            store
                .get(&subject_id, id)
                .map(|r| r.has_earned())
                .unwrap_or(false)
        };

        let repeat_eligible = record.state == RedemptionState::Redeemed
            && definition.is_repeatable
            && Self::under_completion_cap(&record, definition);

        // A redeemed repeatable achievement is measured against the next
        // qualifying cycle: only history recorded after the redemption.
        let progress = if repeat_eligible {
            let cycle: Vec<VisitRecord> = history
                .iter()
                .filter(|v| record.redeemed_at.map_or(true, |t| v.timestamp > t))
                .cloned()
                .collect();
            self.calculator
                .evaluate(subject, &cycle, definition, &prereq_earned, now)
        } else {
            self.calculator
                .evaluate(subject, history, definition, &prereq_earned, now)
        };

        match record.state {
            RedemptionState::Locked if progress.is_earned => {
                self.apply_transition(&mut record, RedemptionState::Earned, None, None, now);
                record.earned_at = Some(now);
                self.store.put(record.clone());
                metrics::counter!("loyalty.achievements_earned").increment(1);
                info!(
                    subject_id = %subject.subject_id,
                    achievement = %definition.title,
                    "Achievement earned"
                );
            }
            RedemptionState::Redeemed if repeat_eligible && progress.is_earned => {
                self.apply_transition(&mut record, RedemptionState::Earned, None, None, now);
                record.earned_at = Some(now);
                self.store.put(record.clone());
                metrics::counter!("loyalty.repeat_cycles").increment(1);
                info!(
                    subject_id = %subject.subject_id,
                    achievement = %definition.title,
                    cycle = record.completion_count + 1,
                    "Repeatable achievement earned again"
                );
            }
            _ => {}
        }

        (progress, record)
    }

    /// Flags intent to redeem, for rewards with a manual handoff step.
    pub fn request_redemption(
        &self,
        subject_id: &str,
        achievement_id: Uuid,
        actor: &str,
    ) -> EngineResult<RedemptionRecord> {
        let lock = self.lock_for(subject_id, achievement_id);
        let _guard = lock.lock();

        let mut record = self.store.get(subject_id, achievement_id).ok_or_else(|| {
            EngineError::NotFound(format!(
                "no redemption record for subject {} achievement {}",
                subject_id, achievement_id
            ))
        })?;

        self.state_machine
            .check(record.state, RedemptionState::PendingRedemption)?;

        self.apply_transition(
            &mut record,
            RedemptionState::PendingRedemption,
            Some(actor),
            None,
            Utc::now(),
        );
        self.store.put(record.clone());
        metrics::counter!("loyalty.redemptions_requested").increment(1);
        info!(
            subject_id = %subject_id,
            achievement_id = %achievement_id,
            actor = %actor,
            "Redemption requested"
        );

        Ok(record)
    }

    /// Confirms a redemption from `earned` or `pending_redemption`,
    /// incrementing the completion count.
    pub fn confirm_redemption(
        &self,
        definition: &AchievementDefinition,
        subject_id: &str,
        actor: &str,
        notes: Option<&str>,
    ) -> EngineResult<RedemptionRecord> {
        let lock = self.lock_for(subject_id, definition.id);
        let _guard = lock.lock();

        let mut record = self.store.get(subject_id, definition.id).ok_or_else(|| {
            EngineError::NotFound(format!(
                "no redemption record for subject {} achievement {}",
                subject_id, definition.id
            ))
        })?;

        self.state_machine
            .check(record.state, RedemptionState::Redeemed)?;

        if let Some(max) = definition.effective_max_completions() {
            if record.completion_count >= max {
                return Err(EngineError::CompletionLimitExceeded(format!(
                    "achievement '{}' already completed {} of {} times",
                    definition.title, record.completion_count, max
                )));
            }
        }

        let now = Utc::now();
        self.apply_transition(
            &mut record,
            RedemptionState::Redeemed,
            Some(actor),
            notes,
            now,
        );
        record.redeemed_at = Some(now);
        record.redeemed_by = Some(actor.to_string());
        record.notes = notes.map(str::to_string);
        record.completion_count += 1;
        self.store.put(record.clone());
        metrics::counter!("loyalty.redemptions").increment(1);
        info!(
            subject_id = %subject_id,
            achievement = %definition.title,
            completion = record.completion_count,
            actor = %actor,
            "Redemption confirmed"
        );

        Ok(record)
    }

    pub fn record(&self, subject_id: &str, achievement_id: Uuid) -> Option<RedemptionRecord> {
        self.store.get(subject_id, achievement_id)
    }

    pub fn records_for_subject(&self, subject_id: &str) -> Vec<RedemptionRecord> {
        self.store.list_for_subject(subject_id)
    }

    pub fn records_for_achievement(&self, achievement_id: Uuid) -> Vec<RedemptionRecord> {
        self.store.list_for_achievement(achievement_id)
    }

    /// Full transition history for a record, oldest first.
    pub fn audit_history(&self, subject_id: &str, achievement_id: Uuid) -> Vec<TransitionEvent> {
        self.store.audit(subject_id, achievement_id)
    }
}
