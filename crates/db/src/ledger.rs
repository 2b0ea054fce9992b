//! Karma ledger queries
//!
//! The table is append-only: nothing here updates or deletes a row.

use common::models::{KarmaEntry, KarmaSource, LedgerHead, NewKarmaEntry, StatKind, UserStats};
use sqlx::postgres::PgRow;
use sqlx::{PgExecutor, PgPool, Row};
use uuid::Uuid;

use crate::error::{classify, decode};
use crate::StoreError;

fn entry_from_row(row: &PgRow) -> Result<KarmaEntry, StoreError> {
    let source: String = row.get("source");
    Ok(KarmaEntry {
        id: row.get("id"),
        user_id: row.get("user_id"),
        seq: row.get("seq"),
        amount: row.get("amount"),
        source: decode(source.parse::<KarmaSource>())?,
        description: row.get("description"),
        created_at: row.get("created_at"),
    })
}

/// Insert an entry at its per-user sequence position.
///
/// A taken position surfaces as `Conflict`, an unknown user as `NotFound`.
pub async fn insert<'e, E>(executor: E, entry: &NewKarmaEntry) -> Result<KarmaEntry, StoreError>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query(
        r#"
        INSERT INTO karma_entries (id, user_id, seq, amount, source, description, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, user_id, seq, amount, source, description, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(entry.user_id)
    .bind(entry.seq)
    .bind(entry.amount)
    .bind(entry.source.as_str())
    .bind(&entry.description)
    .bind(entry.created_at)
    .fetch_one(executor)
    .await
    .map_err(|e| {
        classify(
            e,
            || StoreError::Conflict {
                user_id: entry.user_id,
                seq: entry.seq,
            },
            || StoreError::NotFound(format!("user {}", entry.user_id)),
        )
    })?;

    entry_from_row(&row)
}

/// Current total and last sequence number for a user
pub async fn head(pool: &PgPool, user_id: Uuid) -> Result<LedgerHead, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT COALESCE(SUM(amount), 0)::bigint as total,
               COALESCE(MAX(seq), 0)::bigint as last_seq
        FROM karma_entries
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(LedgerHead {
        total: row.get("total"),
        last_seq: row.get("last_seq"),
    })
}

/// A page of a user's entries, newest first
pub async fn history(
    pool: &PgPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<KarmaEntry>, StoreError> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, seq, amount, source, description, created_at
        FROM karma_entries
        WHERE user_id = $1
        ORDER BY seq DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.iter().map(entry_from_row).collect()
}

/// Engagement counters derived from the ledger
pub async fn stats(pool: &PgPool, user_id: Uuid) -> Result<UserStats, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT
            COALESCE(SUM(amount), 0)::bigint as total_karma,
            COUNT(*) FILTER (WHERE source = 'POST' AND amount > 0) as posts_created,
            COUNT(*) FILTER (WHERE source = 'COMMENT' AND amount > 0) as comments_created,
            COUNT(*) FILTER (WHERE source = 'REACTION' AND amount > 0) as reactions_given,
            COUNT(*) FILTER (WHERE source = 'PREDICTION' AND amount > 0) as predictions_made,
            COUNT(*) FILTER (WHERE source = 'POLL' AND amount > 0) as polls_participated,
            COUNT(*) FILTER (WHERE source = 'MODERATION' AND amount > 0) as moderation_actions,
            (SELECT COUNT(*) FROM user_badges WHERE user_id = $1) as badges_earned
        FROM karma_entries
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    let mut stats = UserStats::default();
    for kind in [
        StatKind::TotalKarma,
        StatKind::PostsCreated,
        StatKind::CommentsCreated,
        StatKind::ReactionsGiven,
        StatKind::PredictionsMade,
        StatKind::PollsParticipated,
        StatKind::ModerationActions,
        StatKind::BadgesEarned,
    ] {
        stats.set(kind, row.get::<i64, _>(column_for(kind)));
    }
    Ok(stats)
}

fn column_for(kind: StatKind) -> &'static str {
    match kind {
        StatKind::PostsCreated => "posts_created",
        StatKind::CommentsCreated => "comments_created",
        StatKind::ReactionsGiven => "reactions_given",
        StatKind::PredictionsMade => "predictions_made",
        StatKind::PollsParticipated => "polls_participated",
        StatKind::ModerationActions => "moderation_actions",
        StatKind::BadgesEarned => "badges_earned",
        StatKind::TotalKarma => "total_karma",
    }
}
