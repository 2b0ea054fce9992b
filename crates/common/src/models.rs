//! Domain models

use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::levels::{Level, LevelProgress};
use crate::Error;

/// A community member
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// What kind of engagement produced a ledger entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KarmaSource {
    Post,
    Comment,
    Reaction,
    Prediction,
    Poll,
    Moderation,
    Badge,
    Bonus,
    Penalty,
}

impl KarmaSource {
    pub const ALL: [KarmaSource; 9] = [
        KarmaSource::Post,
        KarmaSource::Comment,
        KarmaSource::Reaction,
        KarmaSource::Prediction,
        KarmaSource::Poll,
        KarmaSource::Moderation,
        KarmaSource::Badge,
        KarmaSource::Bonus,
        KarmaSource::Penalty,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            KarmaSource::Post => "POST",
            KarmaSource::Comment => "COMMENT",
            KarmaSource::Reaction => "REACTION",
            KarmaSource::Prediction => "PREDICTION",
            KarmaSource::Poll => "POLL",
            KarmaSource::Moderation => "MODERATION",
            KarmaSource::Badge => "BADGE",
            KarmaSource::Bonus => "BONUS",
            KarmaSource::Penalty => "PENALTY",
        }
    }
}

impl FromStr for KarmaSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KarmaSource::ALL
            .into_iter()
            .find(|src| src.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::Validation(format!("unknown karma source '{}'", s)))
    }
}

/// An immutable ledger record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KarmaEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Per-user position in the ledger, starting at 1
    pub seq: i64,
    pub amount: i64,
    pub source: KarmaSource,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// A ledger record about to be written
#[derive(Debug, Clone)]
pub struct NewKarmaEntry {
    pub user_id: Uuid,
    pub seq: i64,
    pub amount: i64,
    pub source: KarmaSource,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Running total and last sequence number of a user's ledger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerHead {
    pub total: i64,
    pub last_seq: i64,
}

/// Counter a badge criterion can be expressed over
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum StatKind {
    PostsCreated,
    CommentsCreated,
    ReactionsGiven,
    PredictionsMade,
    PollsParticipated,
    ModerationActions,
    BadgesEarned,
    TotalKarma,
}

impl StatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatKind::PostsCreated => "postsCreated",
            StatKind::CommentsCreated => "commentsCreated",
            StatKind::ReactionsGiven => "reactionsGiven",
            StatKind::PredictionsMade => "predictionsMade",
            StatKind::PollsParticipated => "pollsParticipated",
            StatKind::ModerationActions => "moderationActions",
            StatKind::BadgesEarned => "badgesEarned",
            StatKind::TotalKarma => "totalKarma",
        }
    }

    /// The engagement counter a positive entry of `source` increments, if any
    pub fn counted_by(source: KarmaSource) -> Option<StatKind> {
        match source {
            KarmaSource::Post => Some(StatKind::PostsCreated),
            KarmaSource::Comment => Some(StatKind::CommentsCreated),
            KarmaSource::Reaction => Some(StatKind::ReactionsGiven),
            KarmaSource::Prediction => Some(StatKind::PredictionsMade),
            KarmaSource::Poll => Some(StatKind::PollsParticipated),
            KarmaSource::Moderation => Some(StatKind::ModerationActions),
            KarmaSource::Badge | KarmaSource::Bonus | KarmaSource::Penalty => None,
        }
    }
}

impl FromStr for StatKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            StatKind::PostsCreated,
            StatKind::CommentsCreated,
            StatKind::ReactionsGiven,
            StatKind::PredictionsMade,
            StatKind::PollsParticipated,
            StatKind::ModerationActions,
            StatKind::BadgesEarned,
            StatKind::TotalKarma,
        ]
        .into_iter()
        .find(|k| k.as_str().eq_ignore_ascii_case(s))
        .ok_or_else(|| Error::Validation(format!("unknown stat '{}'", s)))
    }
}

/// Engagement counters, derived from the ledger
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub posts_created: i64,
    pub comments_created: i64,
    pub reactions_given: i64,
    pub predictions_made: i64,
    pub polls_participated: i64,
    pub moderation_actions: i64,
    pub badges_earned: i64,
    pub total_karma: i64,
}

impl UserStats {
    pub fn get(&self, kind: StatKind) -> i64 {
        match kind {
            StatKind::PostsCreated => self.posts_created,
            StatKind::CommentsCreated => self.comments_created,
            StatKind::ReactionsGiven => self.reactions_given,
            StatKind::PredictionsMade => self.predictions_made,
            StatKind::PollsParticipated => self.polls_participated,
            StatKind::ModerationActions => self.moderation_actions,
            StatKind::BadgesEarned => self.badges_earned,
            StatKind::TotalKarma => self.total_karma,
        }
    }

    fn slot(&mut self, kind: StatKind) -> &mut i64 {
        match kind {
            StatKind::PostsCreated => &mut self.posts_created,
            StatKind::CommentsCreated => &mut self.comments_created,
            StatKind::ReactionsGiven => &mut self.reactions_given,
            StatKind::PredictionsMade => &mut self.predictions_made,
            StatKind::PollsParticipated => &mut self.polls_participated,
            StatKind::ModerationActions => &mut self.moderation_actions,
            StatKind::BadgesEarned => &mut self.badges_earned,
            StatKind::TotalKarma => &mut self.total_karma,
        }
    }

    /// Fold one ledger entry into the counters
    pub fn apply(&mut self, entry_amount: i64, source: KarmaSource) {
        self.total_karma = self.total_karma.saturating_add(entry_amount);
        if entry_amount > 0 {
            if let Some(kind) = StatKind::counted_by(source) {
                let slot = self.slot(kind);
                *slot = slot.saturating_add(1);
            }
        }
    }

    /// Set an individual counter
    pub fn set(&mut self, kind: StatKind, value: i64) {
        *self.slot(kind) = value;
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BadgeCategory {
    Posting,
    Engagement,
    Prediction,
    Moderation,
    Special,
}

impl BadgeCategory {
    pub const ALL: [BadgeCategory; 5] = [
        BadgeCategory::Posting,
        BadgeCategory::Engagement,
        BadgeCategory::Prediction,
        BadgeCategory::Moderation,
        BadgeCategory::Special,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BadgeCategory::Posting => "POSTING",
            BadgeCategory::Engagement => "ENGAGEMENT",
            BadgeCategory::Prediction => "PREDICTION",
            BadgeCategory::Moderation => "MODERATION",
            BadgeCategory::Special => "SPECIAL",
        }
    }
}

impl FromStr for BadgeCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BadgeCategory::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::Validation(format!("unknown badge category '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BadgeRarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

impl BadgeRarity {
    pub const ALL: [BadgeRarity; 5] = [
        BadgeRarity::Common,
        BadgeRarity::Uncommon,
        BadgeRarity::Rare,
        BadgeRarity::Epic,
        BadgeRarity::Legendary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BadgeRarity::Common => "COMMON",
            BadgeRarity::Uncommon => "UNCOMMON",
            BadgeRarity::Rare => "RARE",
            BadgeRarity::Epic => "EPIC",
            BadgeRarity::Legendary => "LEGENDARY",
        }
    }
}

impl FromStr for BadgeRarity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BadgeRarity::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::Validation(format!("unknown badge rarity '{}'", s)))
    }
}

/// Unlock condition: a stat reaching a threshold
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BadgeCriterion {
    pub stat: StatKind,
    pub threshold: i64,
}

impl BadgeCriterion {
    pub fn is_met(&self, stats: &UserStats) -> bool {
        stats.get(self.stat) >= self.threshold
    }

    /// Completion toward the threshold, 0..=100
    pub fn percentage(&self, stats: &UserStats) -> f64 {
        if self.threshold <= 0 {
            return 100.0;
        }
        let current = stats.get(self.stat).max(0) as f64;
        (current / self.threshold as f64 * 100.0).min(100.0)
    }
}

/// An operator-defined achievement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub badge_id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub color: String,
    pub category: BadgeCategory,
    pub rarity: BadgeRarity,
    pub karma_reward: i64,
    pub active: bool,
    pub criterion: BadgeCriterion,
}

/// A badge held by a user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserBadge {
    pub user_id: Uuid,
    pub badge_id: String,
    pub earned_at: DateTime<Utc>,
}

/// Per-badge completion for a user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BadgeProgress {
    pub badge: Badge,
    pub current: i64,
    pub target: i64,
    pub percentage: f64,
    pub earned: bool,
    pub earned_at: Option<DateTime<Utc>>,
}

/// Everything a client shows about a user's reputation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserKarmaProfile {
    pub user_id: Uuid,
    pub total_karma: i64,
    pub current_level: Level,
    pub level_progress: LevelProgress,
    pub stats: UserStats,
    pub badges: Vec<UserBadge>,
}

/// Window over which leaderboard karma is summed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    #[default]
    All,
    Monthly,
    Weekly,
    Daily,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::All => "all",
            Timeframe::Monthly => "monthly",
            Timeframe::Weekly => "weekly",
            Timeframe::Daily => "daily",
        }
    }

    /// Start of the window ending at `now`, or `None` for all time
    pub fn since(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Timeframe::All => None,
            Timeframe::Monthly => Some(now - Duration::days(30)),
            Timeframe::Weekly => Some(now - Duration::days(7)),
            Timeframe::Daily => Some(now - Duration::days(1)),
        }
    }
}

impl FromStr for Timeframe {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(Timeframe::All),
            "monthly" | "month" => Ok(Timeframe::Monthly),
            "weekly" | "week" => Ok(Timeframe::Weekly),
            "daily" | "day" => Ok(Timeframe::Daily),
            other => Err(Error::Validation(format!("unknown timeframe '{}'", other))),
        }
    }
}

/// Karma a user accumulated inside a window, before ranking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KarmaTally {
    pub user: User,
    pub window_karma: i64,
    pub total_karma: i64,
}

impl KarmaTally {
    /// Ranking order: window karma descending, then oldest account, then id
    pub fn ranking_cmp(a: &Self, b: &Self) -> Ordering {
        b.window_karma
            .cmp(&a.window_karma)
            .then_with(|| a.user.created_at.cmp(&b.user.created_at))
            .then_with(|| a.user.id.cmp(&b.user.id))
    }
}

/// Leaderboard entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: i32,
    pub user_id: Uuid,
    pub username: String,
    pub avatar: Option<String>,
    /// Karma earned within the requested timeframe
    pub total_karma: i64,
    /// Level from all-time karma
    pub current_level: Level,
    pub timeframe: Timeframe,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_source_parse_case_insensitive() {
        assert_eq!("post".parse::<KarmaSource>().unwrap(), KarmaSource::Post);
        assert_eq!("PENALTY".parse::<KarmaSource>().unwrap(), KarmaSource::Penalty);
    }

    #[test]
    fn test_unknown_source_is_validation_error() {
        let err = "TIP".parse::<KarmaSource>().unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_stats_apply_counts_positive_engagement_only() {
        let mut stats = UserStats::default();
        stats.apply(10, KarmaSource::Post);
        stats.apply(-10, KarmaSource::Post);
        stats.apply(5, KarmaSource::Badge);
        assert_eq!(stats.posts_created, 1);
        assert_eq!(stats.total_karma, 5);
        assert_eq!(stats.badges_earned, 0);
    }

    #[test]
    fn test_criterion_percentage_caps_at_100() {
        let criterion = BadgeCriterion {
            stat: StatKind::CommentsCreated,
            threshold: 4,
        };
        let mut stats = UserStats::default();
        stats.comments_created = 1;
        assert_eq!(criterion.percentage(&stats), 25.0);
        stats.comments_created = 9;
        assert_eq!(criterion.percentage(&stats), 100.0);
        assert!(criterion.is_met(&stats));
    }

    #[test]
    fn test_criterion_negative_karma_is_zero_progress() {
        let criterion = BadgeCriterion {
            stat: StatKind::TotalKarma,
            threshold: 100,
        };
        let stats = UserStats {
            total_karma: -20,
            ..Default::default()
        };
        assert_eq!(criterion.percentage(&stats), 0.0);
        assert!(!criterion.is_met(&stats));
    }

    #[test]
    fn test_timeframe_windows() {
        let now = Utc.with_ymd_and_hms(2026, 3, 31, 12, 0, 0).unwrap();
        assert_eq!(Timeframe::All.since(now), None);
        assert_eq!(
            Timeframe::Daily.since(now),
            Some(Utc.with_ymd_and_hms(2026, 3, 30, 12, 0, 0).unwrap())
        );
        assert_eq!(
            Timeframe::Weekly.since(now),
            Some(Utc.with_ymd_and_hms(2026, 3, 24, 12, 0, 0).unwrap())
        );
        assert_eq!(
            Timeframe::Monthly.since(now),
            Some(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_timeframe_parse() {
        assert_eq!("weekly".parse::<Timeframe>().unwrap(), Timeframe::Weekly);
        assert_eq!("ALL".parse::<Timeframe>().unwrap(), Timeframe::All);
        assert!("yearly".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_entry_serializes_camel_case() {
        let entry = KarmaEntry {
            id: Uuid::nil(),
            user_id: Uuid::nil(),
            seq: 1,
            amount: 15,
            source: KarmaSource::Post,
            description: "Created a post".to_string(),
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["userId"], Uuid::nil().to_string());
        assert_eq!(json["source"], "POST");
        assert_eq!(json["amount"], 15);
    }
}
