//! Challenge and track endpoints
//!
//! Dates arrive as `YYYY-MM-DDTHH:MM:SS.mmmZ` and are reduced to their UTC day
//! here; anything else is rejected with 400 before the use-case runs.

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;

use dbc_common::time::{parse_iso, to_day};

use super::error::ApiResult;
use super::identity::UserId;
use crate::db::challenges::ChallengeInfo;
use crate::db::tracks::Track;
use crate::services::challenges::{
    ChallengeDetails, CreateChallengeForm, CreatedChallenge, TrackDayResult, UserChallengeView,
};
use crate::services::Outcome;
use crate::AppState;

/// GET /api/challenges/search query
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub search: String,
    pub category_id: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// POST /api/challenges/:id/track request
#[derive(Debug, Deserialize)]
pub struct TrackDayRequest {
    pub date_iso: String,
    pub done: bool,
}

/// GET /api/challenges/:id/tracks query
#[derive(Debug, Deserialize)]
pub struct MonthTracksQuery {
    pub date_iso: String,
}

/// GET /api/challenges
pub async fn user_challenges(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> ApiResult<Outcome<Vec<UserChallengeView>>> {
    Ok(state.challenges.user_all(user_id).await?)
}

/// POST /api/challenges
pub async fn create_challenge(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Json(form): Json<CreateChallengeForm>,
) -> ApiResult<Outcome<CreatedChallenge>> {
    Ok(state.challenges.user_create(user_id, form).await?)
}

/// GET /api/challenges/search
pub async fn search_challenges(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Outcome<Vec<ChallengeInfo>>> {
    Ok(state
        .challenges
        .public_search(&query.search, query.category_id, query.limit, query.offset)
        .await?)
}

/// GET /api/challenges/definitions/:id
///
/// Identity is optional; without it `is_member` is false.
pub async fn challenge_info(
    State(state): State<AppState>,
    caller: Option<UserId>,
    Path(challenge_id): Path<i64>,
) -> ApiResult<Outcome<ChallengeDetails>> {
    let user_id = caller.map(|UserId(id)| id);
    Ok(state.challenges.info(user_id, challenge_id).await?)
}

/// DELETE /api/challenges/:id
pub async fn remove_challenge(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<i64>,
) -> ApiResult<Outcome<()>> {
    Ok(state.challenges.remove(user_id, id).await?)
}

/// POST /api/challenges/:id/track
pub async fn track_day(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<i64>,
    Json(request): Json<TrackDayRequest>,
) -> ApiResult<Outcome<TrackDayResult>> {
    let date = to_day(parse_iso(&request.date_iso)?);
    Ok(state
        .challenges
        .track_day(user_id, id, date, request.done)
        .await?)
}

/// GET /api/challenges/:id/tracks?date_iso=
pub async fn month_tracks(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<i64>,
    Query(query): Query<MonthTracksQuery>,
) -> ApiResult<Outcome<Vec<Track>>> {
    let date = to_day(parse_iso(&query.date_iso)?);
    Ok(state.challenges.month_tracks(user_id, id, date).await?)
}

pub fn challenge_routes() -> Router<AppState> {
    Router::new()
        .route("/api/challenges", get(user_challenges).post(create_challenge))
        .route("/api/challenges/search", get(search_challenges))
        .route("/api/challenges/definitions/:id", get(challenge_info))
        .route("/api/challenges/:id", delete(remove_challenge))
        .route("/api/challenges/:id/track", post(track_day))
        .route("/api/challenges/:id/tracks", get(month_tracks))
}
