//! Ledger, level and leaderboard behavior against the in-memory store

use std::collections::HashSet;

use chrono::{DateTime, Duration, TimeZone, Utc};
use common::config::Limits;
use common::levels::LevelThreshold;
use common::models::{KarmaSource, NewKarmaEntry, Timeframe, User};
use common::validation::MAX_KARMA_TOTAL;
use common::{Error, KarmaEvent, Level, LevelTable};
use db::KarmaStore;
use uuid::Uuid;

use super::fixtures::{drain, names, Harness, MAX_RETRIES};
use crate::Engagement;

#[tokio::test]
async fn test_total_matches_every_page_summed() {
    let h = Harness::bare();
    let user = h.user("alice").await;

    let mut expected = 0;
    for i in 0..57i64 {
        let (amount, source) = if i % 7 == 6 {
            (-3, KarmaSource::Penalty)
        } else {
            (i % 5 + 1, KarmaSource::Bonus)
        };
        h.ledger
            .append(user, amount, source, &format!("entry {}", i))
            .await
            .unwrap();
        expected += amount;
    }

    let mut seen = Vec::new();
    let mut offset = 0;
    loop {
        let page = h.ledger.history(user, Some(50), Some(offset)).await.unwrap();
        if page.is_empty() {
            break;
        }
        offset += page.len() as i64;
        seen.extend(page);
    }

    assert_eq!(seen.len(), 57);
    assert_eq!(seen.iter().map(|e| e.amount).sum::<i64>(), expected);
    assert_eq!(h.ledger.total(user).await.unwrap(), expected);

    // Newest first, one entry per position
    let seqs: Vec<i64> = seen.iter().map(|e| e.seq).collect();
    assert!(seqs.windows(2).all(|w| w[0] > w[1]));
    assert_eq!(seqs.iter().collect::<HashSet<_>>().len(), 57);
}

#[tokio::test]
async fn test_history_pages() {
    let h = Harness::bare();
    let user = h.user("bob").await;
    for i in 0..20 {
        h.ledger
            .append(user, 1, KarmaSource::Bonus, &format!("bonus {}", i))
            .await
            .unwrap();
    }

    let first = h.ledger.history(user, Some(20), Some(0)).await.unwrap();
    assert_eq!(first.len(), 20);
    assert_eq!(first[0].description, "bonus 19");

    let past_end = h.ledger.history(user, Some(20), Some(20)).await.unwrap();
    assert!(past_end.is_empty());

    let defaulted = h.ledger.history(user, None, None).await.unwrap();
    assert_eq!(defaulted.len(), 20);
}

#[tokio::test]
async fn test_history_limit_rules() {
    let h = Harness::bare();
    let user = h.user("carol").await;
    for i in 0..60 {
        h.ledger
            .append(user, 1, KarmaSource::Bonus, &format!("bonus {}", i))
            .await
            .unwrap();
    }

    let capped = h.ledger.history(user, Some(500), None).await.unwrap();
    assert_eq!(capped.len(), 50);

    let zero = h.ledger.history(user, Some(0), None).await.unwrap_err();
    assert!(matches!(zero, Error::Validation(_)));

    let negative = h.ledger.history(user, None, Some(-1)).await.unwrap_err();
    assert!(matches!(negative, Error::Validation(_)));
}

#[tokio::test]
async fn test_append_validation() {
    let h = Harness::bare();
    let user = h.user("dave").await;

    let cases = [
        (0, KarmaSource::Bonus, "nothing"),
        (5, KarmaSource::Badge, "sneaky"),
        (5, KarmaSource::Penalty, "wrong sign"),
        (-5, KarmaSource::Bonus, "wrong sign"),
        (5, KarmaSource::Bonus, "   "),
    ];
    for (amount, source, description) in cases {
        let err = h
            .ledger
            .append(user, amount, source, description)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "{} {:?}", amount, source);
    }

    let missing = h
        .ledger
        .append(Uuid::new_v4(), 5, KarmaSource::Bonus, "ghost")
        .await
        .unwrap_err();
    assert!(matches!(missing, Error::NotFound(_)));
    assert_eq!(h.ledger.total(user).await.unwrap(), 0);
}

fn entry_at(user_id: Uuid, seq: i64, amount: i64, created_at: DateTime<Utc>) -> NewKarmaEntry {
    NewKarmaEntry {
        user_id,
        seq,
        amount,
        source: KarmaSource::Moderation,
        description: "imported".to_string(),
        created_at,
    }
}

#[tokio::test]
async fn test_entry_amount_bounds() {
    let h = Harness::bare();
    let user = h.user("max").await;
    let max = Limits::default().max_entry_amount;

    h.ledger
        .append(user, max, KarmaSource::Bonus, "ceiling")
        .await
        .unwrap();
    h.ledger
        .append(user, -max, KarmaSource::Moderation, "floor")
        .await
        .unwrap();

    for (amount, source) in [
        (max + 1, KarmaSource::Bonus),
        (i64::MAX, KarmaSource::Bonus),
        (i64::MIN, KarmaSource::Moderation),
        (-(max + 1), KarmaSource::Penalty),
    ] {
        let err = h
            .ledger
            .append(user, amount, source, "out of range")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "{}", amount);
    }

    assert_eq!(h.ledger.total(user).await.unwrap(), 0);
    let history = h.ledger.history(user, None, None).await.unwrap();
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn test_total_cannot_leave_supported_range() {
    let h = Harness::bare();
    let user = h.user("whale").await;
    h.store
        .append_entry(entry_at(user, 1, MAX_KARMA_TOTAL - 10, Utc::now()))
        .await
        .unwrap();

    let err = h
        .ledger
        .append(user, 11, KarmaSource::Bonus, "one too many")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let outcome = h
        .ledger
        .append(user, 10, KarmaSource::Bonus, "exactly full")
        .await
        .unwrap();
    assert_eq!(outcome.total_karma, MAX_KARMA_TOTAL);
    assert_eq!(outcome.entry.seq, 2);
}

#[tokio::test]
async fn test_crossing_into_explorer_emits_one_level_up() {
    let h = Harness::bare();
    let user = h.user("erin").await;
    h.ledger
        .append(user, 15, KarmaSource::Post, "first post")
        .await
        .unwrap();

    let mut rx = h.bus.subscribe();
    let outcome = h
        .ledger
        .append(user, 40, KarmaSource::Comment, "popular comment")
        .await
        .unwrap();

    assert_eq!(outcome.total_karma, 55);
    assert_eq!(outcome.level, Level::Explorer);
    assert_eq!(outcome.leveled_up, Some(Level::Explorer));

    let events = drain(&mut rx);
    assert_eq!(names(&events), vec!["karma:earned", "level:up"]);
    assert!(matches!(
        &events[1],
        KarmaEvent::LevelUp { new_level: Level::Explorer, user_id, .. } if *user_id == user
    ));

    // Staying inside the level announces nothing
    h.ledger
        .append(user, 5, KarmaSource::Bonus, "more")
        .await
        .unwrap();
    assert_eq!(names(&drain(&mut rx)), vec!["karma:earned"]);
}

#[tokio::test]
async fn test_custom_threshold_crossing() {
    let table = LevelTable::new(vec![
        LevelThreshold {
            level: Level::Newbie,
            min_karma: 0,
        },
        LevelThreshold {
            level: Level::Explorer,
            min_karma: 100,
        },
    ])
    .unwrap();
    let h = Harness::with_levels(table);
    let user = h.user("frank").await;

    let first = h
        .ledger
        .append(user, 95, KarmaSource::Bonus, "almost")
        .await
        .unwrap();
    assert_eq!(first.leveled_up, None);

    let mut rx = h.bus.subscribe();
    let second = h
        .ledger
        .append(user, 55, KarmaSource::Bonus, "over")
        .await
        .unwrap();
    assert_eq!(second.total_karma, 150);
    assert_eq!(second.leveled_up, Some(Level::Explorer));

    let level_ups = drain(&mut rx)
        .into_iter()
        .filter(|e| e.name() == "level:up")
        .count();
    assert_eq!(level_ups, 1);

    let profile = h.ledger.profile(user).await.unwrap();
    assert_eq!(profile.current_level, Level::Explorer);
    assert_eq!(profile.level_progress.percentage, 100.0);
    assert_eq!(profile.level_progress.next_level, None);
}

#[tokio::test]
async fn test_level_drop_is_silent() {
    let h = Harness::bare();
    let user = h.user("gina").await;
    h.ledger
        .append(user, 60, KarmaSource::Bonus, "start")
        .await
        .unwrap();

    let mut rx = h.bus.subscribe();
    let outcome = h
        .record(
            user,
            Engagement::Penalty {
                amount: 20,
                reason: "spam".into(),
            },
        )
        .await;
    assert_eq!(outcome.entry.amount, -20);
    assert_eq!(outcome.level, Level::Newbie);
    assert_eq!(outcome.leveled_up, None);
    assert_eq!(names(&drain(&mut rx)), vec!["karma:deducted"]);
}

#[tokio::test]
async fn test_lost_positions_are_retried() {
    let h = Harness::bare();
    let user = h.user("hank").await;

    h.store.conflict_next(MAX_RETRIES);
    let outcome = h
        .ledger
        .append(user, 10, KarmaSource::Bonus, "contended")
        .await
        .unwrap();
    assert_eq!(outcome.entry.seq, 1);
    assert_eq!(h.ledger.total(user).await.unwrap(), 10);
}

#[tokio::test]
async fn test_retry_budget_exhausted_is_conflict() {
    let h = Harness::bare();
    let user = h.user("ivy").await;

    h.store.conflict_next(MAX_RETRIES + 1);
    let err = h
        .ledger
        .append(user, 10, KarmaSource::Bonus, "contended")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
    assert_eq!(h.ledger.total(user).await.unwrap(), 0);
}

#[tokio::test]
async fn test_leaderboard_ties_break_on_age_then_id() {
    let h = Harness::bare();
    let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let old = Uuid::from_u128(9);
    let young_a = Uuid::from_u128(1);
    let young_b = Uuid::from_u128(2);
    let top = Uuid::from_u128(3);
    for (id, name, created_at) in [
        (young_b, "young_b", t0 + Duration::days(5)),
        (old, "old", t0),
        (top, "top", t0 + Duration::days(9)),
        (young_a, "young_a", t0 + Duration::days(5)),
    ] {
        h.store
            .inner
            .insert_user(User {
                id,
                username: name.to_string(),
                avatar_url: None,
                created_at,
            })
            .await;
    }

    for id in [young_b, old, young_a] {
        h.ledger.append(id, 30, KarmaSource::Bonus, "tie").await.unwrap();
    }
    h.ledger.append(top, 80, KarmaSource::Bonus, "lead").await.unwrap();

    for _ in 0..3 {
        let board = h.leaderboard.rank(Timeframe::All, None).await.unwrap();
        let order: Vec<Uuid> = board.iter().map(|e| e.user_id).collect();
        assert_eq!(order, vec![top, old, young_a, young_b]);
        assert_eq!(
            board.iter().map(|e| e.rank).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
        assert_eq!(board[0].current_level, Level::Explorer);
    }
}

#[tokio::test]
async fn test_leaderboard_limit_and_window() {
    let h = Harness::bare();
    for i in 0..5 {
        let user = h.user(&format!("user{}", i)).await;
        h.ledger
            .append(user, 10 + i, KarmaSource::Bonus, "activity")
            .await
            .unwrap();
    }
    let quiet = h.user("quiet").await;

    let board = h.leaderboard.rank(Timeframe::Weekly, Some(3)).await.unwrap();
    assert_eq!(board.len(), 3);
    assert_eq!(board[0].total_karma, 14);
    assert!(board.iter().all(|e| e.timeframe == Timeframe::Weekly));

    // Zero clamps up to one
    let one = h.leaderboard.rank(Timeframe::All, Some(0)).await.unwrap();
    assert_eq!(one.len(), 1);

    let all = h.leaderboard.rank(Timeframe::All, Some(1_000)).await.unwrap();
    assert_eq!(all.len(), 5);
    assert!(all.iter().all(|e| e.user_id != quiet));

    // Everything falls outside a window that starts later
    let later = Utc::now() + Duration::days(3);
    let empty = h
        .leaderboard
        .rank_at(Timeframe::Daily, None, later)
        .await
        .unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn test_window_start_is_inclusive() {
    let h = Harness::bare();
    let now = Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap();
    let month_start = now - Duration::days(30);
    let day_start = now - Duration::days(1);
    let second = Duration::seconds(1);

    let veteran = h.user("veteran").await;
    let regular = h.user("regular").await;
    for entry in [
        entry_at(veteran, 1, 100, month_start - second),
        entry_at(veteran, 2, 7, month_start),
        entry_at(regular, 1, 50, day_start - second),
        entry_at(regular, 2, 3, day_start),
    ] {
        h.store.append_entry(entry).await.unwrap();
    }

    let monthly = h
        .leaderboard
        .rank_at(Timeframe::Monthly, None, now)
        .await
        .unwrap();
    let karma: Vec<(Uuid, i64)> = monthly
        .iter()
        .map(|e| (e.user_id, e.total_karma))
        .collect();
    assert_eq!(karma, vec![(regular, 53), (veteran, 7)]);
    // Level still comes from all-time karma
    assert_eq!(monthly[1].current_level, Level::Explorer);

    let daily = h
        .leaderboard
        .rank_at(Timeframe::Daily, None, now)
        .await
        .unwrap();
    assert_eq!(daily.len(), 1);
    assert_eq!(daily[0].user_id, regular);
    assert_eq!(daily[0].total_karma, 3);

    // One second later both boundary entries have aged out
    let daily = h
        .leaderboard
        .rank_at(Timeframe::Daily, None, now + second)
        .await
        .unwrap();
    assert!(daily.is_empty());
    let monthly = h
        .leaderboard
        .rank_at(Timeframe::Monthly, None, now + second)
        .await
        .unwrap();
    assert_eq!(monthly.len(), 1);
    assert_eq!(monthly[0].user_id, regular);
}

#[tokio::test]
async fn test_ranking_changes_nothing() {
    let h = Harness::seeded().await;
    let users = [h.user("ann").await, h.user("ben").await];
    for (i, user) in users.iter().enumerate() {
        h.record(
            *user,
            Engagement::PostCreated {
                post_id: format!("p{}", i),
            },
        )
        .await;
    }
    h.store.mark_pending(users[1], "award failed").await.unwrap();

    let mut before = Vec::new();
    for user in users {
        before.push((
            h.store.history(user, 50, 0).await.unwrap(),
            h.store.stats(user).await.unwrap(),
            h.store.user_badges(user).await.unwrap(),
        ));
    }
    let mut rx = h.bus.subscribe();

    for timeframe in [
        Timeframe::All,
        Timeframe::Monthly,
        Timeframe::Weekly,
        Timeframe::Daily,
    ] {
        h.leaderboard.rank(timeframe, Some(100)).await.unwrap();
    }

    let mut after = Vec::new();
    for user in users {
        after.push((
            h.store.history(user, 50, 0).await.unwrap(),
            h.store.stats(user).await.unwrap(),
            h.store.user_badges(user).await.unwrap(),
        ));
    }
    assert_eq!(before, after);
    assert_eq!(h.store.pending_users(10).await.unwrap(), vec![users[1]]);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_engagement_is_priced_by_reward_table() {
    let h = Harness::bare();
    let user = h.user("judy").await;

    let outcome = h
        .record(
            user,
            Engagement::CommentCreated {
                comment_id: "c1".into(),
            },
        )
        .await;
    assert_eq!(outcome.entry.source, KarmaSource::Comment);
    assert_eq!(outcome.entry.amount, 5);

    let stats = h.store.stats(user).await.unwrap();
    assert_eq!(stats.comments_created, 1);
}
