//! User persistence
//!
//! User ids come from the upstream gateway; rows are created lazily on first
//! contact. The aggregate `score` is only ever changed by [`add_score`].

use serde::Serialize;
use sqlx::{Executor, Row, Sqlite};

use crate::error::Result;

/// Persisted user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    /// Settled aggregate score
    pub score: i64,
}

/// Live user by id
pub async fn fetch_by_id<'e, E>(executor: E, user_id: i64) -> Result<Option<User>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query("SELECT id, score FROM users WHERE id = ? AND deleted_at IS NULL")
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

    match row {
        Some(row) => Ok(Some(User {
            id: row.try_get("id")?,
            score: row.try_get("score")?,
        })),
        None => Ok(None),
    }
}

/// Whether a live user exists
pub async fn exists<'e, E>(executor: E, user_id: i64) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT 1 FROM users WHERE id = ? AND deleted_at IS NULL")
            .bind(user_id)
            .fetch_optional(executor)
            .await?;

    Ok(row.is_some())
}

/// Create the user row unless it already exists
///
/// A soft-deleted user is revived. Returns `true` when a row was inserted.
pub async fn insert_if_not_exists<'e, E>(executor: E, user_id: i64) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO users (id, score) VALUES (?, 0)
        ON CONFLICT(id) DO UPDATE SET
            deleted_at = NULL,
            updated_at = CURRENT_TIMESTAMP
        WHERE users.deleted_at IS NOT NULL
        "#,
    )
    .bind(user_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Soft-delete a user; returns whether a row changed
pub async fn remove<'e, E>(executor: E, user_id: i64) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE users SET deleted_at = CURRENT_TIMESTAMP, updated_at = CURRENT_TIMESTAMP WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(user_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Atomically add `delta` to the user's aggregate score
pub async fn add_score<'e, E>(executor: E, user_id: i64, delta: i64) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("UPDATE users SET score = score + ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
        .bind(delta)
        .bind(user_id)
        .execute(executor)
        .await?;

    Ok(())
}
