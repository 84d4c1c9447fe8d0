//! Shared fixtures for dbc-tracker integration tests

#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use sqlx::SqlitePool;
use tempfile::TempDir;

use dbc_common::db::init_database;
use dbc_common::{Clock, FixedClock};
use dbc_tracker::db::challenges::{self, NewChallenge, UserChallenge, VISIBILITY_PRIVATE};
use dbc_tracker::db::tracks::{self, Track};
use dbc_tracker::db::users;
use dbc_tracker::recurrence::RecurrenceRule;
use dbc_tracker::services::TrackProcessor;

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Fresh database file plus a clock pinned to `today`
pub struct TestEnv {
    _dir: TempDir,
    pub pool: SqlitePool,
    pub clock: Arc<FixedClock>,
}

impl TestEnv {
    pub async fn new(today: NaiveDate) -> Self {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("dbc.db")).await.unwrap();
        Self {
            _dir: dir,
            pool,
            clock: Arc::new(FixedClock::at_day(today)),
        }
    }

    pub fn dyn_clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    pub fn processor(&self) -> TrackProcessor {
        TrackProcessor::new(self.pool.clone(), self.dyn_clock())
    }

    pub async fn user(&self, user_id: i64) {
        users::insert_if_not_exists(&self.pool, user_id).await.unwrap();
    }

    /// Insert a definition and its membership, created on `created_day`
    pub async fn challenge(
        &self,
        user_id: i64,
        name: &str,
        is_auto_track: bool,
        rule: RecurrenceRule,
        created_day: NaiveDate,
    ) -> UserChallenge {
        self.user(user_id).await;

        let definition = NewChallenge {
            owner_id: user_id,
            category_id: None,
            name: name.to_string(),
            description: None,
            image: None,
            is_auto_track,
            visibility: VISIBILITY_PRIVATE.to_string(),
            rule,
        };
        let challenge_id = challenges::insert_definition(&self.pool, &definition)
            .await
            .unwrap();
        let created_at = created_day.and_hms_opt(9, 0, 0).unwrap();
        let id = challenges::insert(&self.pool, user_id, challenge_id, created_at)
            .await
            .unwrap();

        challenges::fetch_by_id(&self.pool, id).await.unwrap().unwrap()
    }

    pub async fn reload(&self, user_challenge_id: i64) -> UserChallenge {
        challenges::fetch_by_id(&self.pool, user_challenge_id)
            .await
            .unwrap()
            .unwrap()
    }

    /// Every track of a challenge, ascending
    pub async fn tracks(&self, user_challenge_id: i64) -> Vec<Track> {
        tracks::fetch_between(&self.pool, user_challenge_id, day(1970, 1, 1), day(2999, 12, 31))
            .await
            .unwrap()
    }

    pub async fn score(&self, user_id: i64) -> i64 {
        users::fetch_by_id(&self.pool, user_id)
            .await
            .unwrap()
            .unwrap()
            .score
    }
}

/// (date, done, score, streak, delta) of each track
pub fn summary(tracks: &[Track]) -> Vec<(NaiveDate, bool, i64, i64, i64)> {
    tracks
        .iter()
        .map(|t| (t.date, t.done, t.score, t.last_series, t.score_daily))
        .collect()
}
