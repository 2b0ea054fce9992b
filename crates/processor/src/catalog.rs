//! Badge catalog: the default definitions and operator management

use std::sync::Arc;

use common::models::{Badge, BadgeCategory, BadgeCriterion, BadgeRarity, StatKind};
use common::validation::MAX_ENTRY_AMOUNT;
use common::{Error, Result};
use db::{KarmaStore, StoreError};
use tracing::info;

/// Default badge ids
pub mod defs {
    pub const FIRST_POST: &str = "first_post";
    pub const PROLIFIC_POSTER: &str = "prolific_poster";
    pub const FIRST_COMMENT: &str = "first_comment";
    pub const CONVERSATIONALIST: &str = "conversationalist";
    pub const GENEROUS_REACTOR: &str = "generous_reactor";
    pub const ORACLE: &str = "oracle";
    pub const POLL_PUNDIT: &str = "poll_pundit";
    pub const GUARDIAN: &str = "guardian";
    pub const RISING_STAR: &str = "rising_star";
    pub const COLLECTOR: &str = "collector";
}

#[allow(clippy::too_many_arguments)]
fn badge(
    badge_id: &str,
    name: &str,
    description: &str,
    icon: &str,
    color: &str,
    category: BadgeCategory,
    rarity: BadgeRarity,
    karma_reward: i64,
    stat: StatKind,
    threshold: i64,
) -> Badge {
    Badge {
        badge_id: badge_id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        icon: icon.to_string(),
        color: color.to_string(),
        category,
        rarity,
        karma_reward,
        active: true,
        criterion: BadgeCriterion { stat, threshold },
    }
}

/// The badges every deployment starts with
pub fn default_badges() -> Vec<Badge> {
    use BadgeCategory::*;
    use BadgeRarity::*;

    vec![
        badge(
            defs::FIRST_POST,
            "First Post",
            "Published your first post",
            "✍️",
            "#4caf50",
            Posting,
            Common,
            5,
            StatKind::PostsCreated,
            1,
        ),
        badge(
            defs::PROLIFIC_POSTER,
            "Prolific Poster",
            "Published 50 posts",
            "📚",
            "#2196f3",
            Posting,
            Rare,
            50,
            StatKind::PostsCreated,
            50,
        ),
        badge(
            defs::FIRST_COMMENT,
            "First Comment",
            "Joined a conversation",
            "💬",
            "#8bc34a",
            Engagement,
            Common,
            2,
            StatKind::CommentsCreated,
            1,
        ),
        badge(
            defs::CONVERSATIONALIST,
            "Conversationalist",
            "Left 100 comments",
            "🗣️",
            "#03a9f4",
            Engagement,
            Uncommon,
            25,
            StatKind::CommentsCreated,
            100,
        ),
        badge(
            defs::GENEROUS_REACTOR,
            "Generous Reactor",
            "Reacted 250 times",
            "❤️",
            "#e91e63",
            Engagement,
            Uncommon,
            15,
            StatKind::ReactionsGiven,
            250,
        ),
        badge(
            defs::ORACLE,
            "Oracle",
            "Staked on 25 predictions",
            "🔮",
            "#9c27b0",
            Prediction,
            Epic,
            75,
            StatKind::PredictionsMade,
            25,
        ),
        badge(
            defs::POLL_PUNDIT,
            "Poll Pundit",
            "Took part in 20 polls",
            "📊",
            "#ff9800",
            Engagement,
            Uncommon,
            20,
            StatKind::PollsParticipated,
            20,
        ),
        badge(
            defs::GUARDIAN,
            "Guardian",
            "Performed 10 moderation actions",
            "🛡️",
            "#607d8b",
            Moderation,
            Rare,
            40,
            StatKind::ModerationActions,
            10,
        ),
        badge(
            defs::RISING_STAR,
            "Rising Star",
            "Earned 1000 karma",
            "🌟",
            "#ffc107",
            Special,
            Epic,
            100,
            StatKind::TotalKarma,
            1_000,
        ),
        badge(
            defs::COLLECTOR,
            "Collector",
            "Unlocked 5 badges",
            "🏅",
            "#ff5722",
            Special,
            Legendary,
            150,
            StatKind::BadgesEarned,
            5,
        ),
    ]
}

/// Read and manage badge definitions
#[derive(Clone)]
pub struct BadgeCatalog {
    store: Arc<dyn KarmaStore>,
}

impl BadgeCatalog {
    pub fn new(store: Arc<dyn KarmaStore>) -> Self {
        Self { store }
    }

    /// Create any default badge that does not exist yet; returns how many
    pub async fn seed_defaults(&self) -> Result<usize> {
        let mut created = 0;
        for badge in default_badges() {
            match self.store.create_badge(badge).await {
                Ok(b) => {
                    info!("Seeded badge {}", b.badge_id);
                    created += 1;
                }
                Err(StoreError::Duplicate(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(created)
    }

    /// Active badges
    pub async fn list(&self) -> Result<Vec<Badge>> {
        Ok(self
            .store
            .list_badges()
            .await?
            .into_iter()
            .filter(|b| b.active)
            .collect())
    }

    pub async fn by_category(&self, category: BadgeCategory) -> Result<Vec<Badge>> {
        let mut badges = self.list().await?;
        badges.retain(|b| b.category == category);
        Ok(badges)
    }

    pub async fn by_rarity(&self, rarity: BadgeRarity) -> Result<Vec<Badge>> {
        let mut badges = self.list().await?;
        badges.retain(|b| b.rarity == rarity);
        Ok(badges)
    }

    pub async fn get(&self, badge_id: &str) -> Result<Badge> {
        self.store
            .get_badge(badge_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("badge {}", badge_id)))
    }

    pub async fn create(&self, badge: Badge) -> Result<Badge> {
        validate_badge(&badge)?;
        let badge = self.store.create_badge(badge).await?;
        info!("Badge {} created", badge.badge_id);
        Ok(badge)
    }

    pub async fn deactivate(&self, badge_id: &str) -> Result<Badge> {
        let badge = self.store.set_badge_active(badge_id, false).await?;
        info!("Badge {} deactivated", badge_id);
        Ok(badge)
    }
}

fn validate_badge(badge: &Badge) -> Result<()> {
    let id_ok = !badge.badge_id.is_empty()
        && badge.badge_id.len() <= 64
        && badge
            .badge_id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if !id_ok {
        return Err(Error::validation(
            "badgeId must be 1-64 characters of a-z, 0-9 or _",
        ));
    }
    if badge.name.trim().is_empty() {
        return Err(Error::validation("badge name is required"));
    }
    if !(0..=MAX_ENTRY_AMOUNT).contains(&badge.karma_reward) {
        return Err(Error::validation(format!(
            "karmaReward must be between 0 and {}",
            MAX_ENTRY_AMOUNT
        )));
    }
    if badge.criterion.threshold < 1 {
        return Err(Error::validation("criterion threshold must be at least 1"));
    }
    Ok(())
}
