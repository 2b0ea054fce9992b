//! Badge catalog and award queries

use chrono::{DateTime, Utc};
use common::models::{Badge, BadgeCriterion, KarmaEntry, NewKarmaEntry, UserBadge};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use crate::error::{classify, decode};
use crate::{ledger, StoreError};

const BADGE_COLUMNS: &str = "badge_id, name, description, icon, color, category, rarity, \
     karma_reward, active, criterion_stat, criterion_threshold";

fn badge_from_row(row: &PgRow) -> Result<Badge, StoreError> {
    let category: String = row.get("category");
    let rarity: String = row.get("rarity");
    let stat: String = row.get("criterion_stat");
    Ok(Badge {
        badge_id: row.get("badge_id"),
        name: row.get("name"),
        description: row.get("description"),
        icon: row.get("icon"),
        color: row.get("color"),
        category: decode(category.parse())?,
        rarity: decode(rarity.parse())?,
        karma_reward: row.get("karma_reward"),
        active: row.get("active"),
        criterion: BadgeCriterion {
            stat: decode(stat.parse())?,
            threshold: row.get("criterion_threshold"),
        },
    })
}

/// All badges, active or not, ordered by id
pub async fn list(pool: &PgPool) -> Result<Vec<Badge>, StoreError> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM badges ORDER BY badge_id ASC",
        BADGE_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    rows.iter().map(badge_from_row).collect()
}

pub async fn get(pool: &PgPool, badge_id: &str) -> Result<Option<Badge>, StoreError> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM badges WHERE badge_id = $1",
        BADGE_COLUMNS
    ))
    .bind(badge_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(badge_from_row).transpose()
}

/// Create a badge definition; an existing id is `Duplicate`
pub async fn create(pool: &PgPool, badge: &Badge) -> Result<Badge, StoreError> {
    sqlx::query(
        r#"
        INSERT INTO badges (badge_id, name, description, icon, color, category, rarity,
                            karma_reward, active, criterion_stat, criterion_threshold)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(&badge.badge_id)
    .bind(&badge.name)
    .bind(&badge.description)
    .bind(&badge.icon)
    .bind(&badge.color)
    .bind(badge.category.as_str())
    .bind(badge.rarity.as_str())
    .bind(badge.karma_reward)
    .bind(badge.active)
    .bind(badge.criterion.stat.as_str())
    .bind(badge.criterion.threshold)
    .execute(pool)
    .await
    .map_err(|e| {
        classify(
            e,
            || StoreError::Duplicate(format!("badge {}", badge.badge_id)),
            || StoreError::NotFound(format!("badge {}", badge.badge_id)),
        )
    })?;

    Ok(badge.clone())
}

pub async fn set_active(pool: &PgPool, badge_id: &str, active: bool) -> Result<Badge, StoreError> {
    let row = sqlx::query(&format!(
        "UPDATE badges SET active = $2 WHERE badge_id = $1 RETURNING {}",
        BADGE_COLUMNS
    ))
    .bind(badge_id)
    .bind(active)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => badge_from_row(&row),
        None => Err(StoreError::NotFound(format!("badge {}", badge_id))),
    }
}

/// Badges held by a user, oldest first
pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<UserBadge>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT user_id, badge_id, earned_at
        FROM user_badges
        WHERE user_id = $1
        ORDER BY earned_at ASC, badge_id ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| UserBadge {
            user_id: r.get("user_id"),
            badge_id: r.get("badge_id"),
            earned_at: r.get("earned_at"),
        })
        .collect())
}

/// Record a badge and its karma reward in one transaction.
///
/// Returns `None` when the user already holds the badge; nothing is
/// written in that case.
pub async fn award(
    pool: &PgPool,
    user_id: Uuid,
    badge_id: &str,
    reward: Option<&NewKarmaEntry>,
    earned_at: DateTime<Utc>,
) -> Result<Option<(UserBadge, Option<KarmaEntry>)>, StoreError> {
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO user_badges (user_id, badge_id, earned_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, badge_id) DO NOTHING
        RETURNING earned_at
        "#,
    )
    .bind(user_id)
    .bind(badge_id)
    .bind(earned_at)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| {
        classify(
            e,
            || StoreError::Duplicate(format!("badge {} for user {}", badge_id, user_id)),
            || StoreError::NotFound(format!("user {} or badge {}", user_id, badge_id)),
        )
    })?;

    let Some(row) = inserted else {
        debug!("User {} already holds {}", user_id, badge_id);
        tx.rollback().await?;
        return Ok(None);
    };

    let entry = match reward {
        Some(reward) => Some(ledger::insert(&mut *tx, reward).await?),
        None => None,
    };

    tx.commit().await?;

    Ok(Some((
        UserBadge {
            user_id,
            badge_id: badge_id.to_string(),
            earned_at: row.get("earned_at"),
        },
        entry,
    )))
}
