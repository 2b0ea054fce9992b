//! Queue of users whose badge evaluation must be retried

use sqlx::{PgPool, Row};
use uuid::Uuid;

pub async fn mark(pool: &PgPool, user_id: Uuid, reason: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO pending_evaluations (user_id, reason, queued_at)
        VALUES ($1, $2, NOW())
        ON CONFLICT (user_id) DO UPDATE SET reason = EXCLUDED.reason
        "#,
    )
    .bind(user_id)
    .bind(reason)
    .execute(pool)
    .await?;

    Ok(())
}

/// Oldest queued users first
pub async fn list(pool: &PgPool, limit: i64) -> Result<Vec<Uuid>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT user_id FROM pending_evaluations
        ORDER BY queued_at ASC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.get("user_id")).collect())
}

pub async fn clear(pool: &PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM pending_evaluations WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}
