//! Category endpoints

use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;

use super::error::ApiResult;
use super::identity::UserId;
use crate::db::categories::Category;
use crate::services::Outcome;
use crate::AppState;

/// PUT /api/categories/:id request
#[derive(Debug, Deserialize)]
pub struct UpdateCategoryRequest {
    pub name: String,
}

/// GET /api/categories
pub async fn list_categories(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> ApiResult<Outcome<Vec<Category>>> {
    Ok(state.categories.list(user_id).await?)
}

/// PUT /api/categories/:id
pub async fn update_category(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<i64>,
    Json(request): Json<UpdateCategoryRequest>,
) -> ApiResult<Outcome<()>> {
    Ok(state.categories.update(user_id, id, &request.name).await?)
}

/// DELETE /api/categories/:id
pub async fn remove_category(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<i64>,
) -> ApiResult<Outcome<()>> {
    Ok(state.categories.remove(user_id, id).await?)
}

pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/api/categories", get(list_categories))
        .route("/api/categories/:id", put(update_category).delete(remove_category))
}
