//! Storage seam used by the processor

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::models::{
    Badge, KarmaEntry, KarmaTally, LedgerHead, NewKarmaEntry, User, UserBadge, UserStats,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{badges, leaderboard, ledger, pending, users, StoreError};

/// Persistence for users, the karma ledger and badges.
///
/// Implementations must keep the ledger append-only, reject a second
/// entry at the same `(user_id, seq)` with `StoreError::Conflict`, and
/// write a badge award together with its reward entry or not at all.
#[async_trait]
pub trait KarmaStore: Send + Sync {
    async fn upsert_user(
        &self,
        username: &str,
        avatar_url: Option<&str>,
    ) -> Result<User, StoreError>;

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError>;

    async fn ledger_head(&self, user_id: Uuid) -> Result<LedgerHead, StoreError>;

    async fn append_entry(&self, entry: NewKarmaEntry) -> Result<KarmaEntry, StoreError>;

    /// Entries newest first
    async fn history(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<KarmaEntry>, StoreError>;

    async fn stats(&self, user_id: Uuid) -> Result<UserStats, StoreError>;

    async fn list_badges(&self) -> Result<Vec<Badge>, StoreError>;

    async fn get_badge(&self, badge_id: &str) -> Result<Option<Badge>, StoreError>;

    async fn create_badge(&self, badge: Badge) -> Result<Badge, StoreError>;

    async fn set_badge_active(&self, badge_id: &str, active: bool) -> Result<Badge, StoreError>;

    async fn user_badges(&self, user_id: Uuid) -> Result<Vec<UserBadge>, StoreError>;

    /// `Ok(None)` when the user already holds the badge
    async fn award_badge(
        &self,
        user_id: Uuid,
        badge_id: &str,
        reward: Option<NewKarmaEntry>,
        earned_at: DateTime<Utc>,
    ) -> Result<Option<(UserBadge, Option<KarmaEntry>)>, StoreError>;

    /// Window karma per active user, ordered for ranking and truncated
    async fn tallies(
        &self,
        since: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<KarmaTally>, StoreError>;

    async fn mark_pending(&self, user_id: Uuid, reason: &str) -> Result<(), StoreError>;

    async fn pending_users(&self, limit: i64) -> Result<Vec<Uuid>, StoreError>;

    async fn clear_pending(&self, user_id: Uuid) -> Result<(), StoreError>;
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl KarmaStore for PgStore {
    async fn upsert_user(
        &self,
        username: &str,
        avatar_url: Option<&str>,
    ) -> Result<User, StoreError> {
        Ok(users::upsert(&self.pool, username, avatar_url).await?)
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(users::get_by_id(&self.pool, user_id).await?)
    }

    async fn ledger_head(&self, user_id: Uuid) -> Result<LedgerHead, StoreError> {
        Ok(ledger::head(&self.pool, user_id).await?)
    }

    async fn append_entry(&self, entry: NewKarmaEntry) -> Result<KarmaEntry, StoreError> {
        ledger::insert(&self.pool, &entry).await
    }

    async fn history(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<KarmaEntry>, StoreError> {
        ledger::history(&self.pool, user_id, limit, offset).await
    }

    async fn stats(&self, user_id: Uuid) -> Result<UserStats, StoreError> {
        Ok(ledger::stats(&self.pool, user_id).await?)
    }

    async fn list_badges(&self) -> Result<Vec<Badge>, StoreError> {
        badges::list(&self.pool).await
    }

    async fn get_badge(&self, badge_id: &str) -> Result<Option<Badge>, StoreError> {
        badges::get(&self.pool, badge_id).await
    }

    async fn create_badge(&self, badge: Badge) -> Result<Badge, StoreError> {
        badges::create(&self.pool, &badge).await
    }

    async fn set_badge_active(&self, badge_id: &str, active: bool) -> Result<Badge, StoreError> {
        badges::set_active(&self.pool, badge_id, active).await
    }

    async fn user_badges(&self, user_id: Uuid) -> Result<Vec<UserBadge>, StoreError> {
        Ok(badges::list_for_user(&self.pool, user_id).await?)
    }

    async fn award_badge(
        &self,
        user_id: Uuid,
        badge_id: &str,
        reward: Option<NewKarmaEntry>,
        earned_at: DateTime<Utc>,
    ) -> Result<Option<(UserBadge, Option<KarmaEntry>)>, StoreError> {
        badges::award(&self.pool, user_id, badge_id, reward.as_ref(), earned_at).await
    }

    async fn tallies(
        &self,
        since: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<KarmaTally>, StoreError> {
        Ok(leaderboard::tallies(&self.pool, since, limit).await?)
    }

    async fn mark_pending(&self, user_id: Uuid, reason: &str) -> Result<(), StoreError> {
        Ok(pending::mark(&self.pool, user_id, reason).await?)
    }

    async fn pending_users(&self, limit: i64) -> Result<Vec<Uuid>, StoreError> {
        Ok(pending::list(&self.pool, limit).await?)
    }

    async fn clear_pending(&self, user_id: Uuid) -> Result<(), StoreError> {
        Ok(pending::clear(&self.pool, user_id).await?)
    }
}
