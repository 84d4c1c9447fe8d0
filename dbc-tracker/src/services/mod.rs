//! Business services
//!
//! [`TrackProcessor`] is the streak/score engine. The other services are thin
//! use-cases over the repositories. A use-case returns `Err` only for
//! persistence failures; business rejections are an [`Outcome`] variant.

pub mod categories;
pub mod challenge_locks;
pub mod challenges;
pub mod news;
pub mod track_processor;
pub mod users;

pub use categories::CategoriesService;
pub use challenge_locks::{ChallengeGuard, ChallengeLocks};
pub use challenges::ChallengesService;
pub use news::NewsService;
pub use track_processor::{
    SettlementSummary, SweepFailure, SweepReport, TrackOutcome, TrackProcessor,
};
pub use users::UsersService;

/// Business result of a use-case
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Success(T),
    /// Request data rejected
    Validation(String),
    /// Target absent or not owned by the caller
    NotFound(String),
    /// Target with the same identity already exists
    AlreadyExists(String),
    /// Request is well-formed but not allowed for this target
    UserError(String),
}

impl<T> Outcome<T> {
    /// Status code reported to clients
    pub fn status(&self) -> &'static str {
        match self {
            Outcome::Success(_) => "success",
            Outcome::Validation(_) => "validation_error",
            Outcome::NotFound(_) => "not_found",
            Outcome::AlreadyExists(_) => "already_exists",
            Outcome::UserError(_) => "user_error",
        }
    }
}
