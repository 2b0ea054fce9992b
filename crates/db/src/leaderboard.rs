//! Leaderboard queries

use chrono::{DateTime, Utc};
use common::models::{KarmaTally, User};
use sqlx::{PgPool, Row};

/// Users with ledger activity in the window, ordered for ranking.
///
/// Ordering: window karma descending, then account age, then id. Users
/// with no entries in the window are left out.
pub async fn tallies(
    pool: &PgPool,
    since: Option<DateTime<Utc>>,
    limit: i64,
) -> Result<Vec<KarmaTally>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        WITH window_totals AS (
            SELECT user_id, SUM(amount)::bigint as window_karma
            FROM karma_entries
            WHERE ($1::timestamptz IS NULL OR created_at >= $1)
            GROUP BY user_id
        ),
        all_totals AS (
            SELECT user_id, SUM(amount)::bigint as total_karma
            FROM karma_entries
            GROUP BY user_id
        )
        SELECT
            u.id, u.username, u.avatar_url, u.created_at,
            w.window_karma,
            a.total_karma
        FROM window_totals w
        JOIN users u ON u.id = w.user_id
        JOIN all_totals a ON a.user_id = w.user_id
        ORDER BY w.window_karma DESC, u.created_at ASC, u.id ASC
        LIMIT $2
        "#,
    )
    .bind(since)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| KarmaTally {
            user: User {
                id: row.get("id"),
                username: row.get("username"),
                avatar_url: row.get("avatar_url"),
                created_at: row.get("created_at"),
            },
            window_karma: row.get("window_karma"),
            total_karma: row.get("total_karma"),
        })
        .collect())
}
