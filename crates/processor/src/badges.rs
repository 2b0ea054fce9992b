//! Badge unlocking and progress

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use common::models::{Badge, BadgeProgress, KarmaEntry, KarmaSource, NewKarmaEntry, UserBadge};
use common::{KarmaEvent, LevelTable};
use db::{KarmaStore, StoreError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::events::EventBus;
use crate::ledger::announce_level_change;
use crate::locks::UserLocks;

/// Outcome of one evaluation pass for a user
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BadgeEvaluation {
    pub awarded: Vec<UserBadge>,
    /// Karma added by badge rewards
    pub karma_awarded: i64,
    /// Badges whose award failed and must be retried later
    pub failed: Vec<String>,
}

impl BadgeEvaluation {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Checks badge criteria against a user's stats and records new unlocks
#[derive(Clone)]
pub struct BadgeEvaluator {
    store: Arc<dyn KarmaStore>,
    bus: EventBus,
    locks: UserLocks,
    levels: Arc<LevelTable>,
    max_retries: u32,
}

impl BadgeEvaluator {
    pub fn new(
        store: Arc<dyn KarmaStore>,
        bus: EventBus,
        locks: UserLocks,
        levels: Arc<LevelTable>,
        max_retries: u32,
    ) -> Self {
        Self {
            store,
            bus,
            locks,
            levels,
            max_retries,
        }
    }

    /// Award every badge the user newly qualifies for.
    ///
    /// Safe to call repeatedly: badges already held are skipped and the
    /// store refuses a second award of the same badge.
    pub async fn evaluate(&self, user_id: Uuid) -> common::Result<BadgeEvaluation> {
        self.require_user(user_id).await?;
        let _guard = self.locks.lock(user_id).await;
        self.evaluate_announced(user_id).await
    }

    /// Evaluate and, once every award has landed, take the user off the
    /// re-evaluation queue.
    ///
    /// Both steps run under the user's lock, so a failure queued by an
    /// append for the same user is never cleared before it is retried.
    pub async fn evaluate_and_clear(&self, user_id: Uuid) -> common::Result<BadgeEvaluation> {
        self.require_user(user_id).await?;
        let _guard = self.locks.lock(user_id).await;
        let evaluation = self.evaluate_announced(user_id).await?;
        if evaluation.is_complete() {
            self.store.clear_pending(user_id).await?;
        }
        Ok(evaluation)
    }

    async fn evaluate_announced(&self, user_id: Uuid) -> common::Result<BadgeEvaluation> {
        let before = self.store.ledger_head(user_id).await?.total;
        let evaluation = self.evaluate_locked(user_id).await?;
        announce_level_change(
            &self.bus,
            &self.levels,
            user_id,
            before,
            before.saturating_add(evaluation.karma_awarded),
        );
        Ok(evaluation)
    }

    async fn require_user(&self, user_id: Uuid) -> common::Result<()> {
        match self.store.get_user(user_id).await? {
            Some(_) => Ok(()),
            None => Err(common::Error::NotFound(format!("user {}", user_id))),
        }
    }

    /// Evaluation body; the caller holds the user's lock.
    pub(crate) async fn evaluate_locked(&self, user_id: Uuid) -> common::Result<BadgeEvaluation> {
        let badges: Vec<Badge> = self
            .store
            .list_badges()
            .await?
            .into_iter()
            .filter(|b| b.active)
            .collect();
        let mut held: HashSet<String> = self
            .store
            .user_badges(user_id)
            .await?
            .into_iter()
            .map(|b| b.badge_id)
            .collect();

        let mut evaluation = BadgeEvaluation::default();
        let mut failed: HashSet<String> = HashSet::new();

        // An award can itself satisfy another criterion (badge count, total
        // karma), so repeat until a pass unlocks nothing.
        loop {
            let stats = self.store.stats(user_id).await?;
            let eligible: Vec<&Badge> = badges
                .iter()
                .filter(|b| !held.contains(&b.badge_id) && !failed.contains(&b.badge_id))
                .filter(|b| b.criterion.is_met(&stats))
                .collect();

            if eligible.is_empty() {
                break;
            }

            let mut progressed = false;
            for badge in eligible {
                match self.award_one(user_id, badge).await {
                    Ok(Some((user_badge, entry))) => {
                        info!(
                            "🏆 Badge unlocked: {} for user {}",
                            badge.badge_id, user_id
                        );
                        held.insert(badge.badge_id.clone());
                        self.bus.publish(KarmaEvent::BadgeEarned {
                            user_id,
                            badge_id: badge.badge_id.clone(),
                            reason: badge.description.clone(),
                        });
                        if let Some(entry) = entry {
                            evaluation.karma_awarded =
                                evaluation.karma_awarded.saturating_add(entry.amount);
                            self.bus.publish(KarmaEvent::for_amount(
                                user_id,
                                entry.amount,
                                entry.description,
                            ));
                        }
                        evaluation.awarded.push(user_badge);
                        progressed = true;
                    }
                    Ok(None) => {
                        debug!("{} already held by {}", badge.badge_id, user_id);
                        held.insert(badge.badge_id.clone());
                    }
                    Err(e) => {
                        warn!(
                            "Failed to award {} to user {}: {}",
                            badge.badge_id, user_id, e
                        );
                        failed.insert(badge.badge_id.clone());
                        evaluation.failed.push(badge.badge_id.clone());
                    }
                }
            }

            if !progressed {
                break;
            }
        }

        Ok(evaluation)
    }

    /// Write the badge and its reward atomically, retrying lost positions
    async fn award_one(
        &self,
        user_id: Uuid,
        badge: &Badge,
    ) -> Result<Option<(UserBadge, Option<KarmaEntry>)>, StoreError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let reward = if badge.karma_reward > 0 {
                let head = self.store.ledger_head(user_id).await?;
                Some(NewKarmaEntry {
                    user_id,
                    seq: head.last_seq + 1,
                    amount: badge.karma_reward,
                    source: KarmaSource::Badge,
                    description: format!("Badge earned: {}", badge.name),
                    created_at: Utc::now(),
                })
            } else {
                None
            };

            match self
                .store
                .award_badge(user_id, &badge.badge_id, reward, Utc::now())
                .await
            {
                Err(StoreError::Conflict { seq, .. }) if attempt <= self.max_retries => {
                    debug!(
                        "Position {} taken while awarding {} to {}, retrying",
                        seq, badge.badge_id, user_id
                    );
                }
                other => return other,
            }
        }
    }

    /// Completion toward every active badge
    pub async fn progress(&self, user_id: Uuid) -> common::Result<Vec<BadgeProgress>> {
        self.require_user(user_id).await?;

        let stats = self.store.stats(user_id).await?;
        let earned: HashMap<String, chrono::DateTime<Utc>> = self
            .store
            .user_badges(user_id)
            .await?
            .into_iter()
            .map(|b| (b.badge_id, b.earned_at))
            .collect();

        Ok(self
            .store
            .list_badges()
            .await?
            .into_iter()
            .filter(|b| b.active)
            .map(|badge| {
                let earned_at = earned.get(&badge.badge_id).copied();
                let percentage = if earned_at.is_some() {
                    100.0
                } else {
                    badge.criterion.percentage(&stats)
                };
                BadgeProgress {
                    current: stats.get(badge.criterion.stat),
                    target: badge.criterion.threshold,
                    percentage,
                    earned: earned_at.is_some(),
                    earned_at,
                    badge,
                }
            })
            .collect())
    }
}
