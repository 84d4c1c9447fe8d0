//! News card persistence

use serde::Serialize;
use sqlx::{Executor, Row, Sqlite};

use crate::error::Result;

/// Default image size tag
pub const DEFAULT_KIND: &str = "150x150";

/// Persisted news card
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewsCard {
    pub id: i64,
    pub title: String,
    pub image: String,
    pub kind: String,
}

/// Cards `offset..offset + limit`, newest first
pub async fn fetch_page<'e, E>(executor: E, limit: i64, offset: i64) -> Result<Vec<NewsCard>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        r#"
        SELECT id, title, image, kind FROM news
        WHERE deleted_at IS NULL
        ORDER BY id DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(executor)
    .await?;

    let mut cards = Vec::with_capacity(rows.len());
    for row in rows {
        cards.push(NewsCard {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            image: row.try_get("image")?,
            kind: row.try_get("kind")?,
        });
    }
    Ok(cards)
}

/// Insert a card; `kind` defaults to [`DEFAULT_KIND`]
pub async fn insert<'e, E>(executor: E, title: &str, image: &str, kind: Option<&str>) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("INSERT INTO news (title, image, kind) VALUES (?, ?, ?)")
        .bind(title)
        .bind(image)
        .bind(kind.unwrap_or(DEFAULT_KIND))
        .execute(executor)
        .await?;

    Ok(result.last_insert_rowid())
}
