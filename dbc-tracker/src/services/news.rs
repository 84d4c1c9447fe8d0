//! News use-cases

use sqlx::SqlitePool;

use crate::db::news::{self, NewsCard};
use crate::error::{Result, StepContext};
use crate::services::Outcome;

/// Cards per page
pub const NEWS_PAGE_SIZE: i64 = 10;

#[derive(Clone)]
pub struct NewsService {
    pool: SqlitePool,
}

impl NewsService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// One-based page of news cards
    pub async fn get_news(&self, page: i64) -> Result<Outcome<Vec<NewsCard>>> {
        if page <= 0 {
            return Ok(Outcome::Validation(format!("page must be positive, got {}", page)));
        }

        let offset = (page - 1) * NEWS_PAGE_SIZE;
        let cards = news::fetch_page(&self.pool, NEWS_PAGE_SIZE, offset)
            .await
            .step("fetch_news")?;

        if cards.is_empty() {
            return Ok(Outcome::NotFound(format!("news page {}", page)));
        }
        Ok(Outcome::Success(cards))
    }
}
