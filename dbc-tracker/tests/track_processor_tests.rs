//! Integration tests for track recompute
//!
//! Real SQLite file per test, calendar pinned with a FixedClock.
//! 2023-10-26 is a Thursday.

mod common;

use std::sync::Arc;

use common::{day, summary, TestEnv};
use dbc_tracker::error::Error;
use dbc_tracker::recurrence::RecurrenceRule;
use dbc_tracker::services::TrackOutcome;

#[tokio::test]
async fn test_single_track_today() {
    let env = TestEnv::new(day(2023, 10, 26)).await;
    let challenge = env
        .challenge(1, "Read", false, RecurrenceRule::EveryDay, day(2023, 10, 26))
        .await;
    let processor = env.processor();

    let outcome = processor
        .make_track(challenge.id, day(2023, 10, 26), true)
        .await
        .unwrap();

    assert_eq!(outcome, TrackOutcome::Applied);
    assert_eq!(
        summary(&env.tracks(challenge.id).await),
        vec![(day(2023, 10, 26), true, 1, 1, 1)]
    );
}

#[tokio::test]
async fn test_skipped_day_is_written_as_miss() {
    let env = TestEnv::new(day(2023, 10, 1)).await;
    let challenge = env
        .challenge(1, "Run", false, RecurrenceRule::EveryDay, day(2023, 10, 1))
        .await;
    let processor = env.processor();

    processor.make_track(challenge.id, day(2023, 10, 1), true).await.unwrap();
    env.clock.advance_days(2);
    processor.make_track(challenge.id, day(2023, 10, 3), true).await.unwrap();

    assert_eq!(
        summary(&env.tracks(challenge.id).await),
        vec![
            (day(2023, 10, 1), true, 1, 1, 1),
            (day(2023, 10, 2), false, 0, 0, -1),
            (day(2023, 10, 3), true, 1, 1, 1),
        ]
    );
}

#[tokio::test]
async fn test_past_day_fills_through_today() {
    let env = TestEnv::new(day(2023, 10, 26)).await;
    let challenge = env
        .challenge(1, "Walk", false, RecurrenceRule::EveryDay, day(2023, 10, 20))
        .await;

    env.processor()
        .make_track(challenge.id, day(2023, 10, 24), true)
        .await
        .unwrap();

    let tracks = env.tracks(challenge.id).await;
    let dates: Vec<_> = tracks.iter().map(|t| t.date).collect();
    assert_eq!(dates, vec![day(2023, 10, 24), day(2023, 10, 25), day(2023, 10, 26)]);
    assert!(tracks[0].done);
    assert!(tracks[1..].iter().all(|t| !t.done && t.score == 0));
    assert_eq!(tracks[1].score_daily, -1);
    assert_eq!(tracks[2].score_daily, 0);
}

#[tokio::test]
async fn test_order_independence() {
    let env = TestEnv::new(day(2023, 10, 5)).await;
    let first = env
        .challenge(1, "A", false, RecurrenceRule::EveryDay, day(2023, 10, 1))
        .await;
    let second = env
        .challenge(1, "B", false, RecurrenceRule::EveryDay, day(2023, 10, 1))
        .await;
    let processor = env.processor();

    processor.make_track(first.id, day(2023, 10, 3), true).await.unwrap();
    processor.make_track(first.id, day(2023, 10, 5), true).await.unwrap();

    processor.make_track(second.id, day(2023, 10, 5), true).await.unwrap();
    processor.make_track(second.id, day(2023, 10, 3), true).await.unwrap();

    let a = summary(&env.tracks(first.id).await);
    let b = summary(&env.tracks(second.id).await);
    assert_eq!(a, b);
    assert_eq!(
        a,
        vec![
            (day(2023, 10, 3), true, 1, 1, 1),
            (day(2023, 10, 4), false, 0, 0, -1),
            (day(2023, 10, 5), true, 1, 1, 1),
        ]
    );
}

#[tokio::test]
async fn test_make_track_is_idempotent() {
    let env = TestEnv::new(day(2023, 10, 26)).await;
    let challenge = env
        .challenge(1, "Stretch", false, RecurrenceRule::EveryDay, day(2023, 10, 20))
        .await;
    let processor = env.processor();

    processor.make_track(challenge.id, day(2023, 10, 24), true).await.unwrap();
    processor.make_track(challenge.id, day(2023, 10, 26), true).await.unwrap();
    let before = summary(&env.tracks(challenge.id).await);

    processor.make_track(challenge.id, day(2023, 10, 26), true).await.unwrap();
    let after = summary(&env.tracks(challenge.id).await);

    assert_eq!(before, after);
}

#[tokio::test]
async fn test_untracking_a_day_recomputes_the_rest() {
    let env = TestEnv::new(day(2023, 10, 26)).await;
    let challenge = env
        .challenge(1, "Swim", false, RecurrenceRule::EveryDay, day(2023, 10, 24))
        .await;
    let processor = env.processor();

    for d in 24..=26 {
        processor.make_track(challenge.id, day(2023, 10, d), true).await.unwrap();
    }
    processor.make_track(challenge.id, day(2023, 10, 25), false).await.unwrap();

    assert_eq!(
        summary(&env.tracks(challenge.id).await),
        vec![
            (day(2023, 10, 24), true, 1, 1, 1),
            (day(2023, 10, 25), false, 0, 0, -1),
            (day(2023, 10, 26), true, 1, 1, 1),
        ]
    );
}

#[tokio::test]
async fn test_future_date_rejected_today_accepted() {
    let env = TestEnv::new(day(2023, 10, 26)).await;
    let challenge = env
        .challenge(1, "Meditate", false, RecurrenceRule::EveryDay, day(2023, 10, 26))
        .await;
    let processor = env.processor();

    let tomorrow = processor
        .make_track(challenge.id, day(2023, 10, 27), true)
        .await
        .unwrap();
    assert_eq!(tomorrow, TrackOutcome::FutureDate);
    assert!(env.tracks(challenge.id).await.is_empty());

    let today = processor
        .make_track(challenge.id, day(2023, 10, 26), true)
        .await
        .unwrap();
    assert_eq!(today, TrackOutcome::Applied);
}

#[tokio::test]
async fn test_unknown_challenge_not_applied() {
    let env = TestEnv::new(day(2023, 10, 26)).await;
    let outcome = env
        .processor()
        .make_track(999, day(2023, 10, 26), true)
        .await
        .unwrap();
    assert_eq!(outcome, TrackOutcome::ChallengeNotFound);
}

#[tokio::test]
async fn test_non_occurrence_date_rejected() {
    let env = TestEnv::new(day(2023, 10, 26)).await;
    let mondays = RecurrenceRule::SpecificWeekdays([1].into_iter().collect());
    let challenge = env
        .challenge(1, "Plan week", false, mondays, day(2023, 10, 1))
        .await;

    let result = env
        .processor()
        .make_track(challenge.id, day(2023, 10, 24), true)
        .await;

    assert!(matches!(result, Err(Error::InvalidDateForPeriod(d)) if d == day(2023, 10, 24)));
    assert!(env.tracks(challenge.id).await.is_empty());
}

#[tokio::test]
async fn test_sparse_rule_only_writes_occurrences() {
    let env = TestEnv::new(day(2023, 10, 26)).await;
    // Mondays and Wednesdays
    let rule = RecurrenceRule::SpecificWeekdays([1, 3].into_iter().collect());
    let challenge = env.challenge(1, "Gym", false, rule, day(2023, 10, 1)).await;

    env.processor()
        .make_track(challenge.id, day(2023, 10, 18), true)
        .await
        .unwrap();

    let dates: Vec<_> = env.tracks(challenge.id).await.iter().map(|t| t.date).collect();
    assert_eq!(dates, vec![day(2023, 10, 18), day(2023, 10, 23), day(2023, 10, 25)]);
}

#[tokio::test]
async fn test_settled_day_is_not_rewritten() {
    let env = TestEnv::new(day(2023, 10, 16)).await;
    let challenge = env
        .challenge(1, "Read", false, RecurrenceRule::EveryDay, day(2023, 10, 16))
        .await;
    let processor = env.processor();

    for d in 16..=23 {
        processor.make_track(challenge.id, day(2023, 10, d), true).await.unwrap();
        env.clock.advance_days(1);
    }
    env.clock.advance_days(2);
    processor.settle_challenge(&challenge).await.unwrap();
    assert_eq!(env.score(1).await, 8);
    let settled = summary(&env.tracks(challenge.id).await);

    // 10-24 is the oldest day still inside the grace window
    let outcome = processor
        .make_track(challenge.id, day(2023, 10, 18), false)
        .await
        .unwrap();
    assert_eq!(outcome, TrackOutcome::Settled);
    assert_eq!(summary(&env.tracks(challenge.id).await), settled);
    assert_eq!(env.score(1).await, 8);

    let open = processor
        .make_track(challenge.id, day(2023, 10, 24), true)
        .await
        .unwrap();
    assert_eq!(open, TrackOutcome::Applied);
    assert_eq!(
        summary(&env.tracks(challenge.id).await)[8],
        (day(2023, 10, 24), true, 9, 9, 1)
    );
}

#[tokio::test]
async fn test_malformed_rule_surfaces_on_track() {
    let env = TestEnv::new(day(2023, 10, 26)).await;
    let empty = RecurrenceRule::SpecificWeekdays(Default::default());
    let challenge = env.challenge(1, "Broken", false, empty, day(2023, 10, 1)).await;

    let err = env
        .processor()
        .make_track(challenge.id, day(2023, 10, 26), true)
        .await
        .unwrap_err();

    assert!(matches!(err.root(), Error::MalformedRule(_)));
    assert_eq!(err.steps(), vec!["is_occurrence"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_tracks_serialize_per_challenge() {
    let env = TestEnv::new(day(2023, 10, 26)).await;
    let challenge = env
        .challenge(1, "Journal", false, RecurrenceRule::EveryDay, day(2023, 10, 20))
        .await;
    let processor = Arc::new(env.processor());

    let mut handles = Vec::new();
    for d in [25, 24, 26, 24, 26, 25] {
        let processor = Arc::clone(&processor);
        let id = challenge.id;
        handles.push(tokio::spawn(async move {
            processor.make_track(id, day(2023, 10, d), true).await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), TrackOutcome::Applied);
    }

    let tracks = env.tracks(challenge.id).await;
    assert_eq!(tracks.len(), 3);
    for (i, track) in tracks.iter().enumerate() {
        let n = i as i64 + 1;
        assert!(track.done);
        assert_eq!((track.score, track.last_series, track.score_daily), (n, n, 1));
    }
}
