//! Repository tests: soft delete, revive and upsert semantics

mod common;

use common::{day, TestEnv};
use dbc_tracker::db::tracks::{self, NewTrack};
use dbc_tracker::db::{categories, users};
use dbc_tracker::recurrence::RecurrenceRule;
use dbc_tracker::scoring::ScorePoint;

#[tokio::test]
async fn test_user_soft_delete_and_revive() {
    let env = TestEnv::new(day(2023, 10, 26)).await;

    assert!(users::insert_if_not_exists(&env.pool, 5).await.unwrap());
    assert!(!users::insert_if_not_exists(&env.pool, 5).await.unwrap());
    users::add_score(&env.pool, 5, 12).await.unwrap();

    assert!(users::remove(&env.pool, 5).await.unwrap());
    assert!(!users::exists(&env.pool, 5).await.unwrap());
    assert!(users::fetch_by_id(&env.pool, 5).await.unwrap().is_none());
    assert!(!users::remove(&env.pool, 5).await.unwrap());

    // Revived row keeps its settled score
    assert!(users::insert_if_not_exists(&env.pool, 5).await.unwrap());
    assert!(users::exists(&env.pool, 5).await.unwrap());
    assert_eq!(env.score(5).await, 12);
}

#[tokio::test]
async fn test_category_insert_revives_removed_name() {
    let env = TestEnv::new(day(2023, 10, 26)).await;
    env.user(5).await;

    let id = categories::insert(&env.pool, 5, "Health").await.unwrap();
    let found = categories::fetch_by_id(&env.pool, id).await.unwrap().unwrap();
    assert_eq!((found.user_id, found.name.as_str()), (5, "Health"));

    assert!(categories::remove(&env.pool, 5, id).await.unwrap());
    assert!(categories::fetch_by_id(&env.pool, id).await.unwrap().is_none());
    assert!(categories::fetch_by_name(&env.pool, 5, "Health").await.unwrap().is_none());

    let revived = categories::insert(&env.pool, 5, "Health").await.unwrap();
    assert_eq!(revived, id);
    assert!(categories::fetch_by_name(&env.pool, 5, "Health").await.unwrap().is_some());
}

#[tokio::test]
async fn test_category_update_requires_owner() {
    let env = TestEnv::new(day(2023, 10, 26)).await;
    env.user(5).await;
    let id = categories::insert(&env.pool, 5, "Health").await.unwrap();

    assert!(!categories::update(&env.pool, 6, id, "Mine").await.unwrap());
    assert!(categories::update(&env.pool, 5, id, "Fitness").await.unwrap());
    assert_eq!(
        categories::fetch_by_id(&env.pool, id).await.unwrap().unwrap().name,
        "Fitness"
    );
}

#[tokio::test]
async fn test_upsert_keeps_processed_flag() {
    let env = TestEnv::new(day(2023, 10, 26)).await;
    let challenge = env
        .challenge(5, "Read", false, RecurrenceRule::EveryDay, day(2023, 10, 20))
        .await;
    let row = |done: bool, point: ScorePoint| NewTrack {
        user_challenge_id: challenge.id,
        user_id: 5,
        date: day(2023, 10, 20),
        done,
        point,
    };

    let mut conn = env.pool.acquire().await.unwrap();
    tracks::upsert_bulk(&mut conn, &[row(false, ScorePoint::default())])
        .await
        .unwrap();
    let stored = env.tracks(challenge.id).await;
    tracks::mark_processed(&env.pool, &[stored[0].id]).await.unwrap();

    let hit = ScorePoint { score: 1, streak: 1, delta: 1 };
    tracks::upsert_bulk(&mut conn, &[row(true, hit)]).await.unwrap();

    let stored = env.tracks(challenge.id).await;
    assert_eq!(stored.len(), 1);
    assert!(stored[0].done);
    assert_eq!(stored[0].point(), hit);
    assert!(stored[0].processed);
}

#[tokio::test]
async fn test_upsert_bulk_spans_chunks() {
    let env = TestEnv::new(day(2023, 10, 26)).await;
    let challenge = env
        .challenge(5, "Read", false, RecurrenceRule::EveryDay, day(2021, 1, 1))
        .await;

    let first = day(2021, 1, 1);
    let rows: Vec<NewTrack> = first
        .iter_days()
        .take(1200)
        .map(|date| NewTrack {
            user_challenge_id: challenge.id,
            user_id: 5,
            date,
            done: true,
            point: ScorePoint::default(),
        })
        .collect();

    let mut conn = env.pool.acquire().await.unwrap();
    let written = tracks::upsert_bulk(&mut conn, &rows).await.unwrap();

    assert_eq!(written, 1200);
    assert_eq!(env.tracks(challenge.id).await.len(), 1200);
}
