//! User endpoints

use axum::{
    extract::{Path, State},
    routing::get,
    Router,
};

use super::error::ApiResult;
use super::identity::UserId;
use crate::services::users::UserInfo;
use crate::services::Outcome;
use crate::AppState;

/// GET /api/users/me
pub async fn my_info(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> ApiResult<Outcome<UserInfo>> {
    Ok(state.users.my_info(user_id).await?)
}

/// GET /api/users/:id
pub async fn user_info(
    State(state): State<AppState>,
    _caller: UserId,
    Path(user_id): Path<i64>,
) -> ApiResult<Outcome<UserInfo>> {
    Ok(state.users.info(user_id).await?)
}

/// POST /api/users/me
pub async fn create_me(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> ApiResult<Outcome<()>> {
    Ok(state.users.create_if_not_exists(user_id).await?)
}

/// DELETE /api/users/me
pub async fn remove_me(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> ApiResult<Outcome<()>> {
    Ok(state.users.remove(user_id).await?)
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/api/users/me", get(my_info).post(create_me).delete(remove_me))
        .route("/api/users/:id", get(user_info))
}
