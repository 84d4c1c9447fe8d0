//! Liveness ping

use axum::{routing::get, Router};

use crate::services::Outcome;
use crate::AppState;

/// GET /api/status/ping
pub async fn ping() -> Outcome<&'static str> {
    Outcome::Success("pong")
}

pub fn status_routes() -> Router<AppState> {
    Router::new().route("/api/status/ping", get(ping))
}
