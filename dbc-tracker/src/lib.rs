//! dbc-tracker library - daily challenge tracking service
//!
//! Users join challenges and mark days done or missed. Every change
//! recomputes the challenge's streak and score chain; a daily sweep settles
//! days older than the grace window into the user's aggregate score.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use sqlx::SqlitePool;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use dbc_common::Clock;

pub mod api;
pub mod db;
pub mod error;
pub mod jobs;
pub mod recurrence;
pub mod scoring;
pub mod services;

pub use error::{Error, Result};

use services::{CategoriesService, ChallengesService, NewsService, TrackProcessor, UsersService};

/// Application state shared across HTTP handlers and jobs
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Streak/score engine
    pub processor: Arc<TrackProcessor>,
    pub users: UsersService,
    pub categories: CategoriesService,
    pub challenges: ChallengesService,
    pub news: NewsService,
}

impl AppState {
    /// Wire every service over one pool and clock
    pub fn new(db: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        let processor = Arc::new(TrackProcessor::new(db.clone(), clock));
        Self {
            users: UsersService::new(db.clone(), Arc::clone(&processor)),
            categories: CategoriesService::new(db.clone()),
            challenges: ChallengesService::new(db.clone(), Arc::clone(&processor)),
            news: NewsService::new(db.clone()),
            processor,
            db,
        }
    }
}

/// Build application router
///
/// `/health` needs no identity; every `/api` route except the ping, the news
/// feed, the public search and challenge info requires `x-user-id`.
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::status_routes())
        .merge(api::user_routes())
        .merge(api::category_routes())
        .merge(api::challenge_routes())
        .merge(api::news_routes())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
