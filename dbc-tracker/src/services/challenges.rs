//! Challenge use-cases
//!
//! Creation, listing and search of challenges, plus the two track endpoints
//! that sit on top of [`TrackProcessor`].

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info};

use dbc_common::time::month_bounds;

use crate::db::challenges::{self, ChallengeInfo, NewChallenge, UserChallenge, VISIBILITY_PRIVATE};
use crate::db::tracks::{self, Track};
use crate::db::{categories, users};
use crate::error::{Error, Result, StepContext};
use crate::recurrence::{enumerate_backward, RecurrenceRule};
use crate::services::{Outcome, TrackOutcome, TrackProcessor};

/// Recent occurrences shown on each manually tracked challenge
pub const LAST_TRACKS_COUNT: usize = 3;

/// Default and maximum page size of the public search
pub const SEARCH_DEFAULT_LIMIT: i64 = 20;
pub const SEARCH_MAX_LIMIT: i64 = 100;

/// Challenge creation request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateChallengeForm {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    /// Category name; created for the user when missing
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub is_auto_track: bool,
    /// `every_day` (default), `week_days` or `month_dates`
    #[serde(default)]
    pub period_type: Option<String>,
    #[serde(default)]
    pub period_data: Vec<i64>,
}

/// One day of the recent-track strip
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayTrack {
    pub date: NaiveDate,
    pub done: bool,
}

/// A user's challenge as listed to its owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserChallengeView {
    /// Membership id; the id used by the track endpoints
    pub id: i64,
    pub challenge_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub category_id: Option<i64>,
    pub is_auto_track: bool,
    pub period_type: String,
    pub period_data: String,
    pub last_series: i64,
    /// Newest first; absent for auto-tracked challenges
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_tracks: Option<Vec<DayTrack>>,
}

impl From<UserChallenge> for UserChallengeView {
    fn from(c: UserChallenge) -> Self {
        Self {
            id: c.id,
            challenge_id: c.challenge_id,
            name: c.name,
            description: c.description,
            image: c.image,
            category_id: c.category_id,
            is_auto_track: c.is_auto_track,
            period_type: c.period_type,
            period_data: c.period_data,
            last_series: c.last_series,
            last_tracks: None,
        }
    }
}

/// Result of a successful creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedChallenge {
    /// Membership id
    pub id: i64,
    pub challenge_id: i64,
    pub category_id: Option<i64>,
}

/// Challenge definition with the caller's membership flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChallengeDetails {
    pub challenge: ChallengeInfo,
    pub is_member: bool,
}

/// Reply to a track-day request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackDayResult {
    /// Streak at the newest track of the challenge
    pub last_series: i64,
    /// The user's unsettled score after the change
    pub score_daily: i64,
}

#[derive(Clone)]
pub struct ChallengesService {
    pool: SqlitePool,
    processor: Arc<TrackProcessor>,
}

impl ChallengesService {
    pub fn new(pool: SqlitePool, processor: Arc<TrackProcessor>) -> Self {
        Self { pool, processor }
    }

    /// The user's challenges, newest first, with recent days for manual ones
    pub async fn user_all(&self, user_id: i64) -> Result<Outcome<Vec<UserChallengeView>>> {
        let today = self.processor.clock().today();
        let list = challenges::fetch_all_for_user(&self.pool, user_id)
            .await
            .step("fetch_challenges")?;

        let mut views = Vec::with_capacity(list.len());
        for challenge in list {
            let last_tracks = if challenge.is_auto_track {
                None
            } else {
                Some(self.last_tracks(&challenge, today).await?)
            };

            let mut view = UserChallengeView::from(challenge);
            view.last_tracks = last_tracks;
            views.push(view);
        }

        Ok(Outcome::Success(views))
    }

    async fn last_tracks(&self, challenge: &UserChallenge, today: NaiveDate) -> Result<Vec<DayTrack>> {
        let rule = challenge.rule().step("load_rule")?;
        let dates = enumerate_backward(today, &rule, LAST_TRACKS_COUNT).step("enumerate_backward")?;
        let found: HashMap<NaiveDate, bool> = tracks::fetch_by_dates(&self.pool, challenge.id, &dates)
            .await
            .step("fetch_last_tracks")?
            .into_iter()
            .map(|t| (t.date, t.done))
            .collect();

        Ok(dates
            .into_iter()
            .map(|date| DayTrack {
                date,
                done: found.get(&date).copied().unwrap_or(false),
            })
            .collect())
    }

    /// Create a private challenge and join its creator to it
    pub async fn user_create(
        &self,
        user_id: i64,
        form: CreateChallengeForm,
    ) -> Result<Outcome<CreatedChallenge>> {
        let name = form.name.trim().to_string();
        if name.is_empty() {
            return Ok(Outcome::Validation("challenge name is empty".to_string()));
        }

        let rule = match RecurrenceRule::from_parts(
            form.period_type.as_deref().unwrap_or_default(),
            form.period_data.iter().copied(),
        )
        .and_then(|rule| rule.validate().map(|_| rule))
        {
            Ok(rule) => rule,
            Err(Error::MalformedRule(message)) => return Ok(Outcome::Validation(message)),
            Err(e) => return Err(e),
        };

        users::insert_if_not_exists(&self.pool, user_id)
            .await
            .step("insert_user")?;

        if challenges::fetch_by_name(&self.pool, user_id, &name)
            .await
            .step("fetch_by_name")?
            .is_some()
        {
            return Ok(Outcome::AlreadyExists(format!("challenge '{}'", name)));
        }

        let mut tx = self.pool.begin().await.step("begin")?;

        let category_id = match form.category.as_deref().map(str::trim) {
            Some(category) if !category.is_empty() => {
                let existing = categories::fetch_by_name(&mut *tx, user_id, category)
                    .await
                    .step("fetch_category")?;
                match existing {
                    Some(found) => Some(found.id),
                    None => Some(
                        categories::insert(&mut *tx, user_id, category)
                            .await
                            .step("insert_category")?,
                    ),
                }
            }
            _ => None,
        };

        let definition = NewChallenge {
            owner_id: user_id,
            category_id,
            name: name.clone(),
            description: form.description,
            image: form.image,
            is_auto_track: form.is_auto_track,
            visibility: VISIBILITY_PRIVATE.to_string(),
            rule,
        };
        let challenge_id = challenges::insert_definition(&mut *tx, &definition)
            .await
            .step("insert_definition")?;
        let created_at = self.processor.clock().now().naive_utc();
        let id = challenges::insert(&mut *tx, user_id, challenge_id, created_at)
            .await
            .step("insert_membership")?;

        tx.commit().await.step("commit")?;

        info!(user_id, id, challenge_id, name = %name, "Challenge created");
        Ok(Outcome::Success(CreatedChallenge {
            id,
            challenge_id,
            category_id,
        }))
    }

    /// Public challenges whose name contains `search`
    pub async fn public_search(
        &self,
        search: &str,
        category_id: Option<i64>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Outcome<Vec<ChallengeInfo>>> {
        let limit = limit.unwrap_or(SEARCH_DEFAULT_LIMIT);
        let offset = offset.unwrap_or(0);
        if !(1..=SEARCH_MAX_LIMIT).contains(&limit) {
            return Ok(Outcome::Validation(format!(
                "limit must be 1-{}, got {}",
                SEARCH_MAX_LIMIT, limit
            )));
        }
        if offset < 0 {
            return Ok(Outcome::Validation(format!("offset must not be negative, got {}", offset)));
        }

        let list = challenges::search_public(&self.pool, search.trim(), category_id, limit, offset)
            .await
            .step("search_public")?;
        Ok(Outcome::Success(list))
    }

    /// Definition by id and whether the caller is a member
    pub async fn info(&self, user_id: Option<i64>, challenge_id: i64) -> Result<Outcome<ChallengeDetails>> {
        let Some(challenge) = challenges::fetch_definition(&self.pool, challenge_id)
            .await
            .step("fetch_definition")?
        else {
            return Ok(Outcome::NotFound(format!("challenge {}", challenge_id)));
        };

        let is_member = match user_id {
            Some(user_id) => challenges::is_member(&self.pool, user_id, challenge_id)
                .await
                .step("is_member")?,
            None => false,
        };

        Ok(Outcome::Success(ChallengeDetails { challenge, is_member }))
    }

    /// Leave a challenge
    pub async fn remove(&self, user_id: i64, user_challenge_id: i64) -> Result<Outcome<()>> {
        if challenges::remove(&self.pool, user_id, user_challenge_id)
            .await
            .step("remove_membership")?
        {
            Ok(Outcome::Success(()))
        } else {
            Ok(Outcome::NotFound(format!("challenge {}", user_challenge_id)))
        }
    }

    /// Mark a day done or missed and report the resulting streak and
    /// unsettled score
    pub async fn track_day(
        &self,
        user_id: i64,
        user_challenge_id: i64,
        date: NaiveDate,
        done: bool,
    ) -> Result<Outcome<TrackDayResult>> {
        if !challenges::exists_for_user(&self.pool, user_id, user_challenge_id)
            .await
            .step("exists_for_user")?
        {
            return Ok(Outcome::NotFound(format!("challenge {}", user_challenge_id)));
        }

        match self.processor.make_track(user_challenge_id, date, done).await {
            Ok(TrackOutcome::Applied) => {}
            Ok(TrackOutcome::FutureDate) => {
                return Ok(Outcome::Validation(format!("{} is in the future", date)));
            }
            Ok(TrackOutcome::ChallengeNotFound) => {
                return Ok(Outcome::NotFound(format!("challenge {}", user_challenge_id)));
            }
            Ok(TrackOutcome::Settled) => {
                return Ok(Outcome::UserError(format!("{} is already settled", date)));
            }
            Err(Error::InvalidDateForPeriod(date)) => {
                return Ok(Outcome::UserError(format!("Incorrect date for period: {}", date)));
            }
            Err(e) => return Err(e).step("make_track"),
        }

        let last_series = tracks::fetch_last(&self.pool, user_challenge_id)
            .await
            .step("fetch_last_track")?
            .map(|t| t.last_series)
            .unwrap_or(0);
        let score_daily = self
            .processor
            .calculate_daily_score(user_id)
            .await
            .step("calculate_daily_score")?;

        debug!(user_id, user_challenge_id, %date, done, last_series, score_daily, "Day tracked");
        Ok(Outcome::Success(TrackDayResult {
            last_series,
            score_daily,
        }))
    }

    /// Tracks of the calendar month containing `date`
    pub async fn month_tracks(
        &self,
        user_id: i64,
        user_challenge_id: i64,
        date: NaiveDate,
    ) -> Result<Outcome<Vec<Track>>> {
        if !challenges::exists_for_user(&self.pool, user_id, user_challenge_id)
            .await
            .step("exists_for_user")?
        {
            return Ok(Outcome::NotFound(format!("challenge {}", user_challenge_id)));
        }

        let (first, last) = month_bounds(date);
        let list = tracks::fetch_between(&self.pool, user_challenge_id, first, last)
            .await
            .step("fetch_between")?;
        Ok(Outcome::Success(list))
    }
}
