//! Shared wiring for scenario tests

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::config::Limits;
use common::models::{
    Badge, KarmaEntry, KarmaTally, LedgerHead, NewKarmaEntry, User, UserBadge, UserStats,
};
use common::{KarmaEvent, LevelTable};
use db::{KarmaStore, MemoryStore, StoreError};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::catalog::BadgeCatalog;
use crate::{
    AppendOutcome, BadgeEvaluator, Engagement, EventBus, KarmaLedger, LeaderboardAggregator,
    ReconcileConfig, Reconciler, UserLocks,
};

pub const MAX_RETRIES: u32 = 3;

/// Memory store that can be told to lose ledger positions or fail awards
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    conflicts_left: AtomicU32,
    fail_awards: AtomicBool,
}

impl FlakyStore {
    /// The next `n` appends report their position as taken
    pub fn conflict_next(&self, n: u32) {
        self.conflicts_left.store(n, Ordering::SeqCst);
    }

    pub fn fail_awards(&self, fail: bool) {
        self.fail_awards.store(fail, Ordering::SeqCst);
    }

    fn take_conflict(&self) -> bool {
        self.conflicts_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl KarmaStore for FlakyStore {
    async fn upsert_user(
        &self,
        username: &str,
        avatar_url: Option<&str>,
    ) -> Result<User, StoreError> {
        self.inner.upsert_user(username, avatar_url).await
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        self.inner.get_user(user_id).await
    }

    async fn ledger_head(&self, user_id: Uuid) -> Result<LedgerHead, StoreError> {
        self.inner.ledger_head(user_id).await
    }

    async fn append_entry(&self, entry: NewKarmaEntry) -> Result<KarmaEntry, StoreError> {
        if self.take_conflict() {
            return Err(StoreError::Conflict {
                user_id: entry.user_id,
                seq: entry.seq,
            });
        }
        self.inner.append_entry(entry).await
    }

    async fn history(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<KarmaEntry>, StoreError> {
        self.inner.history(user_id, limit, offset).await
    }

    async fn stats(&self, user_id: Uuid) -> Result<UserStats, StoreError> {
        self.inner.stats(user_id).await
    }

    async fn list_badges(&self) -> Result<Vec<Badge>, StoreError> {
        self.inner.list_badges().await
    }

    async fn get_badge(&self, badge_id: &str) -> Result<Option<Badge>, StoreError> {
        self.inner.get_badge(badge_id).await
    }

    async fn create_badge(&self, badge: Badge) -> Result<Badge, StoreError> {
        self.inner.create_badge(badge).await
    }

    async fn set_badge_active(&self, badge_id: &str, active: bool) -> Result<Badge, StoreError> {
        self.inner.set_badge_active(badge_id, active).await
    }

    async fn user_badges(&self, user_id: Uuid) -> Result<Vec<UserBadge>, StoreError> {
        self.inner.user_badges(user_id).await
    }

    async fn award_badge(
        &self,
        user_id: Uuid,
        badge_id: &str,
        reward: Option<NewKarmaEntry>,
        earned_at: DateTime<Utc>,
    ) -> Result<Option<(UserBadge, Option<KarmaEntry>)>, StoreError> {
        if self.fail_awards.load(Ordering::SeqCst) {
            return Err(StoreError::Decode("award store unavailable".to_string()));
        }
        self.inner
            .award_badge(user_id, badge_id, reward, earned_at)
            .await
    }

    async fn tallies(
        &self,
        since: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<KarmaTally>, StoreError> {
        self.inner.tallies(since, limit).await
    }

    async fn mark_pending(&self, user_id: Uuid, reason: &str) -> Result<(), StoreError> {
        self.inner.mark_pending(user_id, reason).await
    }

    async fn pending_users(&self, limit: i64) -> Result<Vec<Uuid>, StoreError> {
        self.inner.pending_users(limit).await
    }

    async fn clear_pending(&self, user_id: Uuid) -> Result<(), StoreError> {
        self.inner.clear_pending(user_id).await
    }
}

/// Every service wired to one store
pub struct Harness {
    pub store: Arc<FlakyStore>,
    pub bus: EventBus,
    pub evaluator: BadgeEvaluator,
    pub ledger: Arc<KarmaLedger>,
    pub locks: UserLocks,
    pub leaderboard: LeaderboardAggregator,
    pub catalog: BadgeCatalog,
    pub reconciler: Reconciler,
}

impl Harness {
    /// No badges defined
    pub fn bare() -> Self {
        Self::with_levels(LevelTable::default())
    }

    /// Default badge catalog seeded
    pub async fn seeded() -> Self {
        let harness = Self::bare();
        harness
            .catalog
            .seed_defaults()
            .await
            .expect("seed badges");
        harness
    }

    pub fn with_levels(levels: LevelTable) -> Self {
        let store = Arc::new(FlakyStore::default());
        let dyn_store: Arc<dyn KarmaStore> = store.clone();
        let levels = Arc::new(levels);
        let bus = EventBus::new(1024);
        let locks = UserLocks::new();
        let limits = Limits::default();

        let evaluator = BadgeEvaluator::new(
            dyn_store.clone(),
            bus.clone(),
            locks.clone(),
            levels.clone(),
            MAX_RETRIES,
        );
        let ledger = KarmaLedger::new(
            dyn_store.clone(),
            evaluator.clone(),
            bus.clone(),
            locks.clone(),
            levels.clone(),
            limits,
            MAX_RETRIES,
        );

        Self {
            leaderboard: LeaderboardAggregator::new(dyn_store.clone(), levels, limits),
            catalog: BadgeCatalog::new(dyn_store.clone()),
            reconciler: Reconciler::new(dyn_store, evaluator.clone(), ReconcileConfig::default()),
            store,
            bus,
            evaluator,
            ledger: Arc::new(ledger),
            locks,
        }
    }

    pub async fn user(&self, username: &str) -> Uuid {
        self.store
            .upsert_user(username, None)
            .await
            .expect("create user")
            .id
    }

    pub async fn record(&self, user: Uuid, engagement: Engagement) -> AppendOutcome {
        self.ledger.record(user, &engagement).await.expect("record engagement")
    }
}

/// Everything published so far
pub fn drain(rx: &mut broadcast::Receiver<KarmaEvent>) -> Vec<KarmaEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn names(events: &[KarmaEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.name()).collect()
}
