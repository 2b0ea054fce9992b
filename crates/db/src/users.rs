//! User queries

use common::models::User;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Get or create a user by username
pub async fn upsert(
    pool: &PgPool,
    username: &str,
    avatar_url: Option<&str>,
) -> Result<User, sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO users (id, username, avatar_url, created_at)
        VALUES ($1, $2, $3, NOW())
        ON CONFLICT (username) DO UPDATE
        SET avatar_url = EXCLUDED.avatar_url
        RETURNING id, username, avatar_url, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(username)
    .bind(avatar_url)
    .fetch_one(pool)
    .await?;

    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        avatar_url: row.get("avatar_url"),
        created_at: row.get("created_at"),
    })
}

/// Get user by ID
pub async fn get_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query("SELECT id, username, avatar_url, created_at FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| User {
        id: r.get("id"),
        username: r.get("username"),
        avatar_url: r.get("avatar_url"),
        created_at: r.get("created_at"),
    }))
}
