//! HTTP API handlers for dbc-tracker
//!
//! Handlers stay thin: extract identity and input, call one use-case, and let
//! [`Outcome`](crate::services::Outcome) / [`ApiError`] pick the status.

pub mod categories;
pub mod challenges;
pub mod error;
pub mod health;
pub mod identity;
pub mod news;
pub mod status;
pub mod users;

pub use categories::category_routes;
pub use challenges::challenge_routes;
pub use error::{ApiError, ApiResult};
pub use health::health_routes;
pub use identity::{UserId, USER_ID_HEADER};
pub use news::news_routes;
pub use status::status_routes;
pub use users::user_routes;
