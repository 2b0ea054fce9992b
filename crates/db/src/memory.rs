//! In-process store
//!
//! Same contract as `PgStore`, held behind a single `RwLock`. Used by
//! tests and by `STORAGE=memory` deployments.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::models::{
    Badge, KarmaEntry, KarmaTally, LedgerHead, NewKarmaEntry, User, UserBadge, UserStats,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{KarmaStore, StoreError};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    usernames: HashMap<String, Uuid>,
    /// Per-user entries in sequence order
    entries: HashMap<Uuid, Vec<KarmaEntry>>,
    badges: BTreeMap<String, Badge>,
    user_badges: HashMap<Uuid, Vec<UserBadge>>,
    /// user -> (queued_at, reason)
    pending: HashMap<Uuid, (DateTime<Utc>, String)>,
}

impl Inner {
    fn require_user(&self, user_id: Uuid) -> Result<(), StoreError> {
        if self.users.contains_key(&user_id) {
            Ok(())
        } else {
            Err(StoreError::NotFound(format!("user {}", user_id)))
        }
    }

    fn last_seq(&self, user_id: Uuid) -> i64 {
        self.entries
            .get(&user_id)
            .and_then(|e| e.last())
            .map(|e| e.seq)
            .unwrap_or(0)
    }

    fn check_position(&self, entry: &NewKarmaEntry) -> Result<(), StoreError> {
        if entry.seq <= self.last_seq(entry.user_id) {
            return Err(StoreError::Conflict {
                user_id: entry.user_id,
                seq: entry.seq,
            });
        }
        Ok(())
    }

    fn push_entry(&mut self, entry: NewKarmaEntry) -> KarmaEntry {
        let stored = KarmaEntry {
            id: Uuid::new_v4(),
            user_id: entry.user_id,
            seq: entry.seq,
            amount: entry.amount,
            source: entry.source,
            description: entry.description,
            created_at: entry.created_at,
        };
        self.entries
            .entry(stored.user_id)
            .or_default()
            .push(stored.clone());
        stored
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a user with a fixed creation time
    pub async fn insert_user(&self, user: User) {
        let mut inner = self.inner.write().await;
        inner.usernames.insert(user.username.clone(), user.id);
        inner.users.insert(user.id, user);
    }
}

#[async_trait]
impl KarmaStore for MemoryStore {
    async fn upsert_user(
        &self,
        username: &str,
        avatar_url: Option<&str>,
    ) -> Result<User, StoreError> {
        let mut inner = self.inner.write().await;
        if let Some(id) = inner.usernames.get(username).copied() {
            if let Some(user) = inner.users.get_mut(&id) {
                user.avatar_url = avatar_url.map(str::to_string);
                return Ok(user.clone());
            }
        }

        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            avatar_url: avatar_url.map(str::to_string),
            created_at: Utc::now(),
        };
        inner.usernames.insert(user.username.clone(), user.id);
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.inner.read().await.users.get(&user_id).cloned())
    }

    async fn ledger_head(&self, user_id: Uuid) -> Result<LedgerHead, StoreError> {
        let inner = self.inner.read().await;
        let entries = inner.entries.get(&user_id);
        Ok(LedgerHead {
            total: entries.map(|e| e.iter().map(|x| x.amount).sum()).unwrap_or(0),
            last_seq: inner.last_seq(user_id),
        })
    }

    async fn append_entry(&self, entry: NewKarmaEntry) -> Result<KarmaEntry, StoreError> {
        let mut inner = self.inner.write().await;
        inner.require_user(entry.user_id)?;
        inner.check_position(&entry)?;
        Ok(inner.push_entry(entry))
    }

    async fn history(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<KarmaEntry>, StoreError> {
        let inner = self.inner.read().await;
        let Some(entries) = inner.entries.get(&user_id) else {
            return Ok(Vec::new());
        };
        Ok(entries
            .iter()
            .rev()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn stats(&self, user_id: Uuid) -> Result<UserStats, StoreError> {
        let inner = self.inner.read().await;
        let mut stats = UserStats::default();
        for entry in inner.entries.get(&user_id).into_iter().flatten() {
            stats.apply(entry.amount, entry.source);
        }
        stats.badges_earned = inner
            .user_badges
            .get(&user_id)
            .map(|b| b.len() as i64)
            .unwrap_or(0);
        Ok(stats)
    }

    async fn list_badges(&self) -> Result<Vec<Badge>, StoreError> {
        Ok(self.inner.read().await.badges.values().cloned().collect())
    }

    async fn get_badge(&self, badge_id: &str) -> Result<Option<Badge>, StoreError> {
        Ok(self.inner.read().await.badges.get(badge_id).cloned())
    }

    async fn create_badge(&self, badge: Badge) -> Result<Badge, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.badges.contains_key(&badge.badge_id) {
            return Err(StoreError::Duplicate(format!("badge {}", badge.badge_id)));
        }
        inner.badges.insert(badge.badge_id.clone(), badge.clone());
        Ok(badge)
    }

    async fn set_badge_active(&self, badge_id: &str, active: bool) -> Result<Badge, StoreError> {
        let mut inner = self.inner.write().await;
        let badge = inner
            .badges
            .get_mut(badge_id)
            .ok_or_else(|| StoreError::NotFound(format!("badge {}", badge_id)))?;
        badge.active = active;
        Ok(badge.clone())
    }

    async fn user_badges(&self, user_id: Uuid) -> Result<Vec<UserBadge>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .user_badges
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn award_badge(
        &self,
        user_id: Uuid,
        badge_id: &str,
        reward: Option<NewKarmaEntry>,
        earned_at: DateTime<Utc>,
    ) -> Result<Option<(UserBadge, Option<KarmaEntry>)>, StoreError> {
        let mut inner = self.inner.write().await;
        inner.require_user(user_id)?;
        if !inner.badges.contains_key(badge_id) {
            return Err(StoreError::NotFound(format!("badge {}", badge_id)));
        }
        let already = inner
            .user_badges
            .get(&user_id)
            .is_some_and(|held| held.iter().any(|b| b.badge_id == badge_id));
        if already {
            return Ok(None);
        }
        // Validate the reward position before writing anything
        if let Some(reward) = &reward {
            inner.check_position(reward)?;
        }

        let user_badge = UserBadge {
            user_id,
            badge_id: badge_id.to_string(),
            earned_at,
        };
        inner
            .user_badges
            .entry(user_id)
            .or_default()
            .push(user_badge.clone());
        let entry = reward.map(|r| inner.push_entry(r));

        Ok(Some((user_badge, entry)))
    }

    async fn tallies(
        &self,
        since: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<KarmaTally>, StoreError> {
        let inner = self.inner.read().await;
        let mut tallies: Vec<KarmaTally> = inner
            .entries
            .iter()
            .filter_map(|(user_id, entries)| {
                let in_window: Vec<&KarmaEntry> = entries
                    .iter()
                    .filter(|e| since.map_or(true, |s| e.created_at >= s))
                    .collect();
                if in_window.is_empty() {
                    return None;
                }
                let user = inner.users.get(user_id)?.clone();
                Some(KarmaTally {
                    user,
                    window_karma: in_window.iter().map(|e| e.amount).sum(),
                    total_karma: entries.iter().map(|e| e.amount).sum(),
                })
            })
            .collect();

        tallies.sort_by(KarmaTally::ranking_cmp);
        tallies.truncate(limit.max(0) as usize);
        Ok(tallies)
    }

    async fn mark_pending(&self, user_id: Uuid, reason: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.require_user(user_id)?;
        let queued_at = inner
            .pending
            .get(&user_id)
            .map(|(at, _)| *at)
            .unwrap_or_else(Utc::now);
        inner.pending.insert(user_id, (queued_at, reason.to_string()));
        Ok(())
    }

    async fn pending_users(&self, limit: i64) -> Result<Vec<Uuid>, StoreError> {
        let inner = self.inner.read().await;
        let mut queued: Vec<(DateTime<Utc>, Uuid)> =
            inner.pending.iter().map(|(id, (at, _))| (*at, *id)).collect();
        queued.sort();
        Ok(queued
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|(_, id)| id)
            .collect())
    }

    async fn clear_pending(&self, user_id: Uuid) -> Result<(), StoreError> {
        self.inner.write().await.pending.remove(&user_id);
        Ok(())
    }
}
