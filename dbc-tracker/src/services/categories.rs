//! Category use-cases

use sqlx::SqlitePool;

use crate::db::categories::{self, Category};
use crate::error::{Error, Result, StepContext};
use crate::services::Outcome;

#[derive(Clone)]
pub struct CategoriesService {
    pool: SqlitePool,
}

/// Whether the error is a UNIQUE constraint violation
pub(crate) fn is_unique_violation(error: &Error) -> bool {
    match error.root() {
        Error::Database(sqlx::Error::Database(db)) => db.is_unique_violation(),
        _ => false,
    }
}

impl CategoriesService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Categories of the user that hold at least one challenge
    pub async fn list(&self, user_id: i64) -> Result<Outcome<Vec<Category>>> {
        let list = categories::fetch_not_empty_by_user(&self.pool, user_id)
            .await
            .step("fetch_categories")?;
        Ok(Outcome::Success(list))
    }

    pub async fn update(&self, user_id: i64, category_id: i64, name: &str) -> Result<Outcome<()>> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(Outcome::Validation("category name is empty".to_string()));
        }

        match categories::update(&self.pool, user_id, category_id, name)
            .await
            .step("update_category")
        {
            Ok(true) => Ok(Outcome::Success(())),
            Ok(false) => Ok(Outcome::NotFound(format!("category {}", category_id))),
            Err(e) if is_unique_violation(&e) => {
                Ok(Outcome::AlreadyExists(format!("category '{}'", name)))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn remove(&self, user_id: i64, category_id: i64) -> Result<Outcome<()>> {
        if categories::remove(&self.pool, user_id, category_id)
            .await
            .step("remove_category")?
        {
            Ok(Outcome::Success(()))
        } else {
            Ok(Outcome::NotFound(format!("category {}", category_id)))
        }
    }
}
