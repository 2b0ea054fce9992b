//! Leaderboard ranking

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::config::Limits;
use common::models::{LeaderboardEntry, Timeframe};
use common::{LevelTable, Result};
use db::KarmaStore;
use tracing::debug;

/// Ranks users by karma earned inside a timeframe. Read-only.
#[derive(Clone)]
pub struct LeaderboardAggregator {
    store: Arc<dyn KarmaStore>,
    levels: Arc<LevelTable>,
    limits: Limits,
}

impl LeaderboardAggregator {
    pub fn new(store: Arc<dyn KarmaStore>, levels: Arc<LevelTable>, limits: Limits) -> Self {
        Self {
            store,
            levels,
            limits,
        }
    }

    pub async fn rank(
        &self,
        timeframe: Timeframe,
        limit: Option<i64>,
    ) -> Result<Vec<LeaderboardEntry>> {
        self.rank_at(timeframe, limit, Utc::now()).await
    }

    /// Rank as of `now`. Users with no karma in the window are left out,
    /// `totalKarma` is the window sum and the level comes from all-time
    /// karma.
    pub async fn rank_at(
        &self,
        timeframe: Timeframe,
        limit: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<Vec<LeaderboardEntry>> {
        let limit = limit
            .unwrap_or(self.limits.leaderboard_default)
            .clamp(1, self.limits.leaderboard_max);

        let tallies = self.store.tallies(timeframe.since(now), limit).await?;
        debug!(
            "Leaderboard {}: {} users (limit {})",
            timeframe.as_str(),
            tallies.len(),
            limit
        );

        Ok(tallies
            .into_iter()
            .enumerate()
            .map(|(idx, tally)| LeaderboardEntry {
                rank: idx as i32 + 1,
                user_id: tally.user.id,
                username: tally.user.username,
                avatar: tally.user.avatar_url,
                total_karma: tally.window_karma,
                current_level: self.levels.level_for(tally.total_karma),
                timeframe,
            })
            .collect())
    }
}
