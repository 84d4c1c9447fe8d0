//! Caller identity
//!
//! The upstream gateway authenticates the caller and forwards its id in the
//! `x-user-id` header. The value is trusted as-is.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use super::error::ApiError;

/// Header carrying the caller's user id
pub const USER_ID_HEADER: &str = "x-user-id";

/// Caller's user id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserId(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| ApiError::BadRequest(format!("missing {} header", USER_ID_HEADER)))?;

        value
            .to_str()
            .ok()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .map(UserId)
            .ok_or_else(|| ApiError::BadRequest(format!("invalid {} header", USER_ID_HEADER)))
    }
}
