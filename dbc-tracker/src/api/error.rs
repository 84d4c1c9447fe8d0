//! HTTP error and reply mapping
//!
//! Every body carries a `status` code string. Business outcomes come from
//! [`Outcome`]; failures before the use-case (bad header, bad date) and
//! persistence failures come from [`ApiError`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::services::Outcome;

/// Body message of every 500 reply; details stay in the log
pub const INTERNAL_MESSAGE: &str = "internal server error";

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request rejected before reaching a use-case (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Persistence or engine failure (500)
    #[error(transparent)]
    Internal(#[from] crate::Error),
}

impl From<dbc_common::Error> for ApiError {
    fn from(err: dbc_common::Error) -> Self {
        match err {
            dbc_common::Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(crate::Error::Common(other)),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            ApiError::Internal(err) => {
                error!(error = %err, root = %err.root(), steps = ?err.steps(), "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "server_error",
                    INTERNAL_MESSAGE.to_string(),
                )
            }
        };

        (status, Json(json!({ "status": code, "message": message }))).into_response()
    }
}

impl<T: Serialize> IntoResponse for Outcome<T> {
    fn into_response(self) -> Response {
        let code = self.status();
        let (status, message) = match self {
            Outcome::Success(data) => {
                return (StatusCode::OK, Json(json!({ "status": code, "data": data })))
                    .into_response();
            }
            Outcome::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            Outcome::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Outcome::AlreadyExists(msg) => (StatusCode::CONFLICT, msg),
            Outcome::UserError(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
        };

        (status, Json(json!({ "status": code, "message": message }))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
