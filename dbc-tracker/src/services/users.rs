//! User use-cases

use std::sync::Arc;

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::debug;

use crate::db::users;
use crate::error::{Result, StepContext};
use crate::services::{Outcome, TrackProcessor};

/// User profile with the live (unsettled) score
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserInfo {
    pub id: i64,
    /// Settled aggregate score
    pub score: i64,
    /// Deltas still inside the grace window
    pub score_daily: i64,
}

#[derive(Clone)]
pub struct UsersService {
    pool: SqlitePool,
    processor: Arc<TrackProcessor>,
}

impl UsersService {
    pub fn new(pool: SqlitePool, processor: Arc<TrackProcessor>) -> Self {
        Self { pool, processor }
    }

    /// Caller's own profile; the user row is created on first contact
    pub async fn my_info(&self, user_id: i64) -> Result<Outcome<UserInfo>> {
        users::insert_if_not_exists(&self.pool, user_id)
            .await
            .step("insert_user")?;
        self.info(user_id).await
    }

    /// Profile of any live user
    pub async fn info(&self, user_id: i64) -> Result<Outcome<UserInfo>> {
        let Some(user) = users::fetch_by_id(&self.pool, user_id)
            .await
            .step("fetch_user")?
        else {
            return Ok(Outcome::NotFound(format!("user {}", user_id)));
        };

        let score_daily = self
            .processor
            .calculate_daily_score(user_id)
            .await
            .step("calculate_daily_score")?;

        Ok(Outcome::Success(UserInfo {
            id: user.id,
            score: user.score,
            score_daily,
        }))
    }

    pub async fn create_if_not_exists(&self, user_id: i64) -> Result<Outcome<()>> {
        let inserted = users::insert_if_not_exists(&self.pool, user_id)
            .await
            .step("insert_user")?;
        debug!(user_id, inserted, "Ensured user");
        Ok(Outcome::Success(()))
    }

    pub async fn remove(&self, user_id: i64) -> Result<Outcome<()>> {
        if users::remove(&self.pool, user_id).await.step("remove_user")? {
            Ok(Outcome::Success(()))
        } else {
            Ok(Outcome::NotFound(format!("user {}", user_id)))
        }
    }
}
