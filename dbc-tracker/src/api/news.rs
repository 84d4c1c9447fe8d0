//! News endpoints

use axum::{
    extract::{Query, State},
    routing::get,
    Router,
};
use serde::Deserialize;

use super::error::ApiResult;
use crate::db::news::NewsCard;
use crate::services::Outcome;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct NewsQuery {
    #[serde(default = "first_page")]
    pub page: i64,
}

fn first_page() -> i64 {
    1
}

/// GET /api/news?page=
pub async fn get_news(
    State(state): State<AppState>,
    Query(query): Query<NewsQuery>,
) -> ApiResult<Outcome<Vec<NewsCard>>> {
    Ok(state.news.get_news(query.page).await?)
}

pub fn news_routes() -> Router<AppState> {
    Router::new().route("/api/news", get(get_news))
}
