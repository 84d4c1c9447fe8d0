//! Category persistence

use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};

use crate::error::Result;

/// Persisted category
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
}

fn category_from_row(row: &SqliteRow) -> sqlx::Result<Category> {
    Ok(Category {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
    })
}

/// The user's categories that hold at least one live challenge membership
pub async fn fetch_not_empty_by_user<'e, E>(executor: E, user_id: i64) -> Result<Vec<Category>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        r#"
        SELECT DISTINCT cat.id, cat.user_id, cat.name
        FROM categories cat
        JOIN challenges c ON c.category_id = cat.id AND c.deleted_at IS NULL
        JOIN user_challenges uc ON uc.challenge_id = c.id AND uc.deleted_at IS NULL
        WHERE cat.user_id = ? AND uc.user_id = ? AND cat.deleted_at IS NULL
        ORDER BY cat.name ASC
        "#,
    )
    .bind(user_id)
    .bind(user_id)
    .fetch_all(executor)
    .await?;

    rows.iter()
        .map(|row| category_from_row(row).map_err(Into::into))
        .collect()
}

/// Live category by id
pub async fn fetch_by_id<'e, E>(executor: E, category_id: i64) -> Result<Option<Category>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        "SELECT id, user_id, name FROM categories WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(category_id)
    .fetch_optional(executor)
    .await?;

    Ok(row.as_ref().map(category_from_row).transpose()?)
}

/// Live category of `user_id` called `name`
pub async fn fetch_by_name<'e, E>(executor: E, user_id: i64, name: &str) -> Result<Option<Category>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        "SELECT id, user_id, name FROM categories WHERE user_id = ? AND name = ? AND deleted_at IS NULL",
    )
    .bind(user_id)
    .bind(name)
    .fetch_optional(executor)
    .await?;

    Ok(row.as_ref().map(category_from_row).transpose()?)
}

/// Create a category, reviving a soft-deleted one with the same name
pub async fn insert<'e, E>(executor: E, user_id: i64, name: &str) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO categories (user_id, name) VALUES (?, ?)
        ON CONFLICT(user_id, name) DO UPDATE SET
            deleted_at = NULL,
            updated_at = CURRENT_TIMESTAMP
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(name)
    .fetch_one(executor)
    .await?;

    Ok(id)
}

/// Rename a category owned by `user_id`; returns whether a row changed
pub async fn update<'e, E>(executor: E, user_id: i64, category_id: i64, name: &str) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE categories SET name = ?, updated_at = CURRENT_TIMESTAMP
        WHERE id = ? AND user_id = ? AND deleted_at IS NULL
        "#,
    )
    .bind(name)
    .bind(category_id)
    .bind(user_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Soft-delete a category owned by `user_id`; returns whether a row changed
pub async fn remove<'e, E>(executor: E, user_id: i64, category_id: i64) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE categories SET deleted_at = CURRENT_TIMESTAMP, updated_at = CURRENT_TIMESTAMP
        WHERE id = ? AND user_id = ? AND deleted_at IS NULL
        "#,
    )
    .bind(category_id)
    .bind(user_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}
