//! Karma ledger
//!
//! Every karma change goes through [`KarmaLedger::append`]. Appends for one
//! user are serialized; badge and level checks run after the entry is
//! written and never undo it.

use std::sync::Arc;

use chrono::Utc;
use common::config::Limits;
use common::models::{KarmaEntry, KarmaSource, NewKarmaEntry, UserBadge, UserKarmaProfile};
use common::validation::{check_entry_amount, next_total};
use common::{Error, KarmaEvent, Level, LevelTable, Result};
use db::{KarmaStore, StoreError};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::badges::{BadgeEvaluation, BadgeEvaluator};
use crate::engagement::{Engagement, RewardTable};
use crate::events::EventBus;
use crate::locks::UserLocks;

/// What a single append produced
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendOutcome {
    pub entry: KarmaEntry,
    /// Total after the entry and any badge rewards it triggered
    pub total_karma: i64,
    pub level: Level,
    /// Set when this append moved the user up a level
    pub leveled_up: Option<Level>,
    pub badges: Vec<UserBadge>,
}

pub struct KarmaLedger {
    store: Arc<dyn KarmaStore>,
    evaluator: BadgeEvaluator,
    bus: EventBus,
    locks: UserLocks,
    levels: Arc<LevelTable>,
    rewards: RewardTable,
    limits: Limits,
    max_retries: u32,
}

impl KarmaLedger {
    pub fn new(
        store: Arc<dyn KarmaStore>,
        evaluator: BadgeEvaluator,
        bus: EventBus,
        locks: UserLocks,
        levels: Arc<LevelTable>,
        limits: Limits,
        max_retries: u32,
    ) -> Self {
        Self {
            store,
            evaluator,
            bus,
            locks,
            levels,
            rewards: RewardTable::default(),
            limits,
            max_retries,
        }
    }

    pub fn with_rewards(mut self, rewards: RewardTable) -> Self {
        self.rewards = rewards;
        self
    }

    pub fn levels(&self) -> &LevelTable {
        &self.levels
    }

    /// Record a karma change for a user.
    ///
    /// Fails with `Validation` for a zero or oversized amount, a sign that
    /// contradicts the source or a total that would leave the supported
    /// range. Fails with `NotFound` for an unknown user and `Conflict` once
    /// the retry budget for lost ledger positions is spent. Badge evaluation
    /// failures are logged and queued for the reconciler; they never fail
    /// the append.
    pub async fn append(
        &self,
        user_id: Uuid,
        amount: i64,
        source: KarmaSource,
        description: &str,
    ) -> Result<AppendOutcome> {
        check_amount(amount, source, self.limits.max_entry_amount)?;
        let description = description.trim();
        if description.is_empty() {
            return Err(Error::validation("description is required"));
        }
        self.require_user(user_id).await?;

        let _guard = self.locks.lock(user_id).await;

        let (before, entry) = self
            .write_entry(user_id, amount, source, description)
            .await?;
        debug!(
            "Ledger {} #{}: {:+} ({}) for {}",
            source.as_str(),
            entry.seq,
            amount,
            description,
            user_id
        );
        self.bus
            .publish(KarmaEvent::for_amount(user_id, amount, description));

        let evaluation = match self.evaluator.evaluate_locked(user_id).await {
            Ok(evaluation) => {
                if !evaluation.is_complete() {
                    let reason = format!("award failed: {}", evaluation.failed.join(", "));
                    self.queue_reevaluation(user_id, &reason).await;
                }
                evaluation
            }
            Err(e) => {
                warn!("Badge evaluation failed for {}: {}", user_id, e);
                self.queue_reevaluation(user_id, &e.to_string()).await;
                BadgeEvaluation::default()
            }
        };

        let total_karma = (before + amount).saturating_add(evaluation.karma_awarded);
        let leveled_up =
            announce_level_change(&self.bus, &self.levels, user_id, before, total_karma);

        Ok(AppendOutcome {
            entry,
            total_karma,
            level: self.levels.level_for(total_karma),
            leveled_up,
            badges: evaluation.awarded,
        })
    }

    /// Validate an engagement, map it through the reward table and append
    pub async fn record(&self, user_id: Uuid, engagement: &Engagement) -> Result<AppendOutcome> {
        let draft = engagement.to_draft(&self.rewards)?;
        self.append(user_id, draft.amount, draft.source, &draft.description)
            .await
    }

    /// Insert at the next ledger position, retrying positions lost to
    /// another writer. Returns the total before the entry.
    async fn write_entry(
        &self,
        user_id: Uuid,
        amount: i64,
        source: KarmaSource,
        description: &str,
    ) -> Result<(i64, KarmaEntry)> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let head = self.store.ledger_head(user_id).await?;
            next_total(head.total, amount)?;
            let new_entry = NewKarmaEntry {
                user_id,
                seq: head.last_seq + 1,
                amount,
                source,
                description: description.to_string(),
                created_at: Utc::now(),
            };

            match self.store.append_entry(new_entry).await {
                Ok(entry) => return Ok((head.total, entry)),
                Err(StoreError::Conflict { seq, .. }) if attempt <= self.max_retries => {
                    debug!(
                        "Ledger position {} for {} taken (attempt {}), retrying",
                        seq, user_id, attempt
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// A page of the user's entries, newest first.
    ///
    /// `limit` defaults to the configured default and is capped at the
    /// configured maximum.
    pub async fn history(
        &self,
        user_id: Uuid,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<KarmaEntry>> {
        let limit = limit.unwrap_or(self.limits.history_default);
        let offset = offset.unwrap_or(0);
        if limit < 1 {
            return Err(Error::validation("limit must be at least 1"));
        }
        if offset < 0 {
            return Err(Error::validation("offset must not be negative"));
        }
        self.require_user(user_id).await?;

        let limit = limit.min(self.limits.history_max);
        Ok(self.store.history(user_id, limit, offset).await?)
    }

    /// Sum of every entry the user has
    pub async fn total(&self, user_id: Uuid) -> Result<i64> {
        self.require_user(user_id).await?;
        Ok(self.store.ledger_head(user_id).await?.total)
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<UserKarmaProfile> {
        self.require_user(user_id).await?;

        let stats = self.store.stats(user_id).await?;
        let badges = self.store.user_badges(user_id).await?;
        let resolved = self.levels.resolve(stats.total_karma);

        Ok(UserKarmaProfile {
            user_id,
            total_karma: stats.total_karma,
            current_level: resolved.level,
            level_progress: resolved.progress,
            stats,
            badges,
        })
    }

    /// Leave the user for the reconciler to re-evaluate
    async fn queue_reevaluation(&self, user_id: Uuid, reason: &str) {
        if let Err(e) = self.store.mark_pending(user_id, reason).await {
            error!(
                "Could not queue badge re-evaluation for {}: {} (after: {})",
                user_id, e, reason
            );
        }
    }

    async fn require_user(&self, user_id: Uuid) -> Result<()> {
        match self.store.get_user(user_id).await? {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(format!("user {}", user_id))),
        }
    }
}

/// Reject entries the ledger never accepts from callers
fn check_amount(amount: i64, source: KarmaSource, max: i64) -> Result<()> {
    if amount == 0 {
        return Err(Error::validation("karma amount must not be zero"));
    }
    check_entry_amount("karma", amount, max)?;
    match source {
        KarmaSource::Badge => Err(Error::validation(
            "BADGE entries are only written by badge awards",
        )),
        KarmaSource::Penalty if amount > 0 => {
            Err(Error::validation("PENALTY amount must be negative"))
        }
        KarmaSource::Bonus if amount < 0 => Err(Error::validation("BONUS amount must be positive")),
        _ => Ok(()),
    }
}

/// Publish `level:up` when `after` sits on a higher level than `before`.
///
/// Called once per append with the totals either side of it, so a single
/// threshold crossing produces exactly one event.
pub(crate) fn announce_level_change(
    bus: &EventBus,
    levels: &LevelTable,
    user_id: Uuid,
    before: i64,
    after: i64,
) -> Option<Level> {
    let old = levels.level_for(before);
    let new = levels.level_for(after);

    if new > old {
        info!("⬆️ User {} reached {} ({} karma)", user_id, new, after);
        bus.publish(KarmaEvent::LevelUp {
            user_id,
            new_level: new,
            reason: format!("Reached {} karma", after),
        });
        Some(new)
    } else {
        if new < old {
            info!("User {} dropped to {} ({} karma)", user_id, new, after);
        }
        None
    }
}
