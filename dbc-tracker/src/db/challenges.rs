//! Challenge persistence
//!
//! Two tables: `challenges` holds the definition (name, auto-track flag,
//! recurrence rule), `user_challenges` holds one user's membership in it and
//! owns the tracks.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, QueryBuilder, Row, Sqlite};

use crate::error::Result;
use crate::recurrence::RecurrenceRule;

pub const VISIBILITY_PRIVATE: &str = "private";
pub const VISIBILITY_PUBLIC: &str = "public";

const USER_CHALLENGE_SELECT: &str = r#"
    SELECT uc.id, uc.user_id, uc.challenge_id, uc.last_series,
           date(uc.created_at) AS created_day,
           c.name, c.description, c.image, c.category_id, c.is_auto_track,
           c.period_type, c.period_data
    FROM user_challenges uc
    JOIN challenges c ON c.id = uc.challenge_id
"#;

const DEFINITION_COLUMNS: &str = "id, owner_id, category_id, name, description, image, \
     is_auto_track, visibility, period_type, period_data";

/// A user's membership in a challenge, joined with its definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserChallenge {
    pub id: i64,
    pub user_id: i64,
    pub challenge_id: i64,
    /// Streak persisted by the last settlement
    pub last_series: i64,
    /// Day the membership was created; backfill starts after it
    pub created_day: NaiveDate,
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub category_id: Option<i64>,
    pub is_auto_track: bool,
    pub period_type: String,
    pub period_data: String,
}

impl UserChallenge {
    /// Recurrence rule stored on the definition
    pub fn rule(&self) -> Result<RecurrenceRule> {
        RecurrenceRule::from_columns(&self.period_type, &self.period_data)
    }
}

fn user_challenge_from_row(row: &SqliteRow) -> sqlx::Result<UserChallenge> {
    Ok(UserChallenge {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        challenge_id: row.try_get("challenge_id")?,
        last_series: row.try_get("last_series")?,
        created_day: row.try_get("created_day")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        image: row.try_get("image")?,
        category_id: row.try_get("category_id")?,
        is_auto_track: row.try_get("is_auto_track")?,
        period_type: row.try_get("period_type")?,
        period_data: row.try_get("period_data")?,
    })
}

/// Challenge definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChallengeInfo {
    pub id: i64,
    pub owner_id: i64,
    pub category_id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub is_auto_track: bool,
    pub visibility: String,
    pub period_type: String,
    pub period_data: String,
}

fn definition_from_row(row: &SqliteRow) -> sqlx::Result<ChallengeInfo> {
    Ok(ChallengeInfo {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        category_id: row.try_get("category_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        image: row.try_get("image")?,
        is_auto_track: row.try_get("is_auto_track")?,
        visibility: row.try_get("visibility")?,
        period_type: row.try_get("period_type")?,
        period_data: row.try_get("period_data")?,
    })
}

/// Definition to be inserted
#[derive(Debug, Clone)]
pub struct NewChallenge {
    pub owner_id: i64,
    pub category_id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub is_auto_track: bool,
    pub visibility: String,
    pub rule: RecurrenceRule,
}

// ============================================================================
// Memberships
// ============================================================================

/// Live membership by id
pub async fn fetch_by_id<'e, E>(executor: E, user_challenge_id: i64) -> Result<Option<UserChallenge>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "{} WHERE uc.id = ? AND uc.deleted_at IS NULL AND c.deleted_at IS NULL",
        USER_CHALLENGE_SELECT
    );
    let row = sqlx::query(&sql)
        .bind(user_challenge_id)
        .fetch_optional(executor)
        .await?;

    Ok(row.as_ref().map(user_challenge_from_row).transpose()?)
}

/// Every live membership of a user, newest first
pub async fn fetch_all_for_user<'e, E>(executor: E, user_id: i64) -> Result<Vec<UserChallenge>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "{} WHERE uc.user_id = ? AND uc.deleted_at IS NULL AND c.deleted_at IS NULL ORDER BY uc.id DESC",
        USER_CHALLENGE_SELECT
    );
    let rows = sqlx::query(&sql).bind(user_id).fetch_all(executor).await?;

    rows.iter()
        .map(|row| user_challenge_from_row(row).map_err(Into::into))
        .collect()
}

/// One page of live memberships across all users, by id
pub async fn fetch_page<'e, E>(executor: E, limit: i64, offset: i64) -> Result<Vec<UserChallenge>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "{} WHERE uc.deleted_at IS NULL AND c.deleted_at IS NULL ORDER BY uc.id ASC LIMIT ? OFFSET ?",
        USER_CHALLENGE_SELECT
    );
    let rows = sqlx::query(&sql)
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await?;

    rows.iter()
        .map(|row| user_challenge_from_row(row).map_err(Into::into))
        .collect()
}

/// Live membership of `user_id` whose challenge is called `name`
pub async fn fetch_by_name<'e, E>(
    executor: E,
    user_id: i64,
    name: &str,
) -> Result<Option<UserChallenge>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "{} WHERE uc.user_id = ? AND c.name = ? AND uc.deleted_at IS NULL AND c.deleted_at IS NULL LIMIT 1",
        USER_CHALLENGE_SELECT
    );
    let row = sqlx::query(&sql)
        .bind(user_id)
        .bind(name)
        .fetch_optional(executor)
        .await?;

    Ok(row.as_ref().map(user_challenge_from_row).transpose()?)
}

/// Whether `user_challenge_id` is a live membership of `user_id`
pub async fn exists_for_user<'e, E>(executor: E, user_id: i64, user_challenge_id: i64) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT 1 FROM user_challenges WHERE id = ? AND user_id = ? AND deleted_at IS NULL",
    )
    .bind(user_challenge_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await?;

    Ok(row.is_some())
}

/// Join `user_id` to a challenge definition
pub async fn insert<'e, E>(
    executor: E,
    user_id: i64,
    challenge_id: i64,
    created_at: NaiveDateTime,
) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO user_challenges (user_id, challenge_id, last_series, created_at, updated_at)
        VALUES (?, ?, 0, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(challenge_id)
    .bind(created_at)
    .bind(created_at)
    .execute(executor)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Persist the streak computed by settlement
pub async fn update_last_series<'e, E>(
    executor: E,
    user_challenge_id: i64,
    last_series: i64,
) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "UPDATE user_challenges SET last_series = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
    )
    .bind(last_series)
    .bind(user_challenge_id)
    .execute(executor)
    .await?;

    Ok(())
}

/// Soft-delete a membership owned by `user_id`; returns whether a row changed
pub async fn remove<'e, E>(executor: E, user_id: i64, user_challenge_id: i64) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE user_challenges
        SET deleted_at = CURRENT_TIMESTAMP, updated_at = CURRENT_TIMESTAMP
        WHERE id = ? AND user_id = ? AND deleted_at IS NULL
        "#,
    )
    .bind(user_challenge_id)
    .bind(user_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

// ============================================================================
// Definitions
// ============================================================================

/// Insert a challenge definition
pub async fn insert_definition<'e, E>(executor: E, challenge: &NewChallenge) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO challenges (
            owner_id, category_id, name, description, image,
            is_auto_track, visibility, period_type, period_data
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(challenge.owner_id)
    .bind(challenge.category_id)
    .bind(&challenge.name)
    .bind(&challenge.description)
    .bind(&challenge.image)
    .bind(challenge.is_auto_track)
    .bind(&challenge.visibility)
    .bind(challenge.rule.period_type())
    .bind(challenge.rule.period_data())
    .execute(executor)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Live definition by id
pub async fn fetch_definition<'e, E>(executor: E, challenge_id: i64) -> Result<Option<ChallengeInfo>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {} FROM challenges WHERE id = ? AND deleted_at IS NULL",
        DEFINITION_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(challenge_id)
        .fetch_optional(executor)
        .await?;

    Ok(row.as_ref().map(definition_from_row).transpose()?)
}

/// Public definitions whose name contains `search`, optionally within a category
pub async fn search_public<'e, E>(
    executor: E,
    search: &str,
    category_id: Option<i64>,
    limit: i64,
    offset: i64,
) -> Result<Vec<ChallengeInfo>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {} FROM challenges WHERE deleted_at IS NULL AND visibility = ",
        DEFINITION_COLUMNS
    ));
    builder.push_bind(VISIBILITY_PUBLIC);

    if !search.is_empty() {
        builder
            .push(" AND instr(lower(name), lower(")
            .push_bind(search.to_string())
            .push(")) > 0");
    }
    if let Some(category_id) = category_id {
        builder.push(" AND category_id = ").push_bind(category_id);
    }

    builder
        .push(" ORDER BY id DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows = builder.build().fetch_all(executor).await?;
    rows.iter()
        .map(|row| definition_from_row(row).map_err(Into::into))
        .collect()
}

/// Whether `user_id` holds a live membership in definition `challenge_id`
pub async fn is_member<'e, E>(executor: E, user_id: i64, challenge_id: i64) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT 1 FROM user_challenges WHERE challenge_id = ? AND user_id = ? AND deleted_at IS NULL LIMIT 1",
    )
    .bind(challenge_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await?;

    Ok(row.is_some())
}
