//! Error types for dbc-tracker
//!
//! Business rejections (bad recurrence data, a date that is not an occurrence)
//! are distinct variants so the API layer can report them as typed statuses.
//! Persistence failures are wrapped with the name of the step that failed via
//! [`StepContext::step`].

use chrono::NaiveDate;
use thiserror::Error;

/// Main error type for dbc-tracker
#[derive(Error, Debug)]
pub enum Error {
    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Recurrence rule data cannot produce an occurrence within its search bound
    #[error("Malformed recurrence rule: {0}")]
    MalformedRule(String),

    /// Requested date is not an occurrence of the challenge's recurrence rule
    #[error("Incorrect date for period: {0}")]
    InvalidDateForPeriod(NaiveDate),

    /// Error raised by a named processing step
    #[error("{step}: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: Box<Error>,
    },

    /// A scheduled job failed
    #[error("Job '{name}' failed: {source}")]
    Job {
        name: String,
        #[source]
        source: Box<Error>,
    },

    /// dbc-common error
    #[error(transparent)]
    Common(#[from] dbc_common::Error),
}

impl Error {
    /// Innermost error beneath any step wrappers
    pub fn root(&self) -> &Error {
        let mut current = self;
        while let Error::Step { source, .. } = current {
            current = source;
        }
        current
    }

    /// Names of the wrapping steps, outermost first
    pub fn steps(&self) -> Vec<&'static str> {
        let mut steps = Vec::new();
        let mut current = self;
        while let Error::Step { step, source } = current {
            steps.push(*step);
            current = source;
        }
        steps
    }
}

/// Convenience Result type using dbc-tracker Error
pub type Result<T> = std::result::Result<T, Error>;

/// Attach the failing step's name to an error
pub trait StepContext<T> {
    fn step(self, step: &'static str) -> Result<T>;
}

impl<T, E> StepContext<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn step(self, step: &'static str) -> Result<T> {
        self.map_err(|e| Error::Step {
            step,
            source: Box::new(e.into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_wrapping_keeps_root() {
        let result: std::result::Result<(), Error> =
            Err(Error::MalformedRule("empty weekday set".to_string()));
        let wrapped = result.step("step_back_n").step("settle_challenge").unwrap_err();

        assert!(matches!(wrapped.root(), Error::MalformedRule(_)));
        assert_eq!(wrapped.steps(), vec!["settle_challenge", "step_back_n"]);
        assert_eq!(
            wrapped.to_string(),
            "settle_challenge: step_back_n: Malformed recurrence rule: empty weekday set"
        );
    }

    #[test]
    fn test_root_of_unwrapped_error_is_itself() {
        let date = NaiveDate::from_ymd_opt(2023, 10, 24).unwrap();
        let error = Error::InvalidDateForPeriod(date);
        assert!(matches!(error.root(), Error::InvalidDateForPeriod(d) if *d == date));
        assert!(error.steps().is_empty());
        assert_eq!(error.to_string(), "Incorrect date for period: 2023-10-24");
    }
}
