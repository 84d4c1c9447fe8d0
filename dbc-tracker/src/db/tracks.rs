//! Track persistence
//!
//! One row per (user challenge, day). Dates are stored as `YYYY-MM-DD` text so
//! lexical order is calendar order.

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, QueryBuilder, Row, Sqlite, SqliteConnection};

use crate::error::Result;
use crate::scoring::ScorePoint;

/// Rows per multi-row INSERT; 8 binds each stays far below SQLite's variable limit
const UPSERT_CHUNK: usize = 500;

const TRACK_COLUMNS: &str =
    "id, user_challenge_id, user_id, date, done, last_series, score, score_daily, processed";

/// Persisted track
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Track {
    pub id: i64,
    pub user_challenge_id: i64,
    pub user_id: i64,
    pub date: NaiveDate,
    pub done: bool,
    /// Streak at this day
    pub last_series: i64,
    pub score: i64,
    /// Delta contributed to the user's aggregate score
    pub score_daily: i64,
    /// Already folded into the user's aggregate score
    pub processed: bool,
}

impl Track {
    pub fn point(&self) -> ScorePoint {
        ScorePoint {
            score: self.score,
            streak: self.last_series,
            delta: self.score_daily,
        }
    }
}

/// Track to be written by [`upsert_bulk`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTrack {
    pub user_challenge_id: i64,
    pub user_id: i64,
    pub date: NaiveDate,
    pub done: bool,
    pub point: ScorePoint,
}

fn track_from_row(row: &SqliteRow) -> sqlx::Result<Track> {
    Ok(Track {
        id: row.try_get("id")?,
        user_challenge_id: row.try_get("user_challenge_id")?,
        user_id: row.try_get("user_id")?,
        date: row.try_get("date")?,
        done: row.try_get("done")?,
        last_series: row.try_get("last_series")?,
        score: row.try_get("score")?,
        score_daily: row.try_get("score_daily")?,
        processed: row.try_get("processed")?,
    })
}

fn collect(rows: Vec<SqliteRow>) -> Result<Vec<Track>> {
    rows.iter()
        .map(|row| track_from_row(row).map_err(Into::into))
        .collect()
}

/// Latest track strictly before `date`
pub async fn fetch_last_before<'e, E>(
    executor: E,
    user_challenge_id: i64,
    date: NaiveDate,
) -> Result<Option<Track>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {} FROM tracks WHERE user_challenge_id = ? AND date < ? ORDER BY date DESC LIMIT 1",
        TRACK_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(user_challenge_id)
        .bind(date)
        .fetch_optional(executor)
        .await?;

    Ok(row.as_ref().map(track_from_row).transpose()?)
}

/// Newest track of a challenge
pub async fn fetch_last<'e, E>(executor: E, user_challenge_id: i64) -> Result<Option<Track>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {} FROM tracks WHERE user_challenge_id = ? ORDER BY date DESC LIMIT 1",
        TRACK_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(user_challenge_id)
        .fetch_optional(executor)
        .await?;

    Ok(row.as_ref().map(track_from_row).transpose()?)
}

/// Tracks on the given dates, ascending; dates without a row are omitted
pub async fn fetch_by_dates<'e, E>(
    executor: E,
    user_challenge_id: i64,
    dates: &[NaiveDate],
) -> Result<Vec<Track>>
where
    E: Executor<'e, Database = Sqlite>,
{
    if dates.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {} FROM tracks WHERE user_challenge_id = ",
        TRACK_COLUMNS
    ));
    builder.push_bind(user_challenge_id);
    builder.push(" AND date IN (");
    let mut separated = builder.separated(", ");
    for date in dates {
        separated.push_bind(*date);
    }
    separated.push_unseparated(") ORDER BY date ASC");

    let rows = builder.build().fetch_all(executor).await?;
    collect(rows)
}

/// Tracks strictly after `date`, ascending
pub async fn fetch_after<'e, E>(
    executor: E,
    user_challenge_id: i64,
    date: NaiveDate,
) -> Result<Vec<Track>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {} FROM tracks WHERE user_challenge_id = ? AND date > ? ORDER BY date ASC",
        TRACK_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(user_challenge_id)
        .bind(date)
        .fetch_all(executor)
        .await?;

    collect(rows)
}

/// Tracks with `from <= date <= to`, ascending
pub async fn fetch_between<'e, E>(
    executor: E,
    user_challenge_id: i64,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<Track>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {} FROM tracks WHERE user_challenge_id = ? AND date >= ? AND date <= ? ORDER BY date ASC",
        TRACK_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(user_challenge_id)
        .bind(from)
        .bind(to)
        .fetch_all(executor)
        .await?;

    collect(rows)
}

/// Unprocessed tracks strictly before `date`, ascending
pub async fn fetch_unprocessed_before<'e, E>(
    executor: E,
    user_challenge_id: i64,
    date: NaiveDate,
) -> Result<Vec<Track>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {} FROM tracks WHERE user_challenge_id = ? AND processed = 0 AND date < ? ORDER BY date ASC",
        TRACK_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(user_challenge_id)
        .bind(date)
        .fetch_all(executor)
        .await?;

    collect(rows)
}

/// Insert or overwrite tracks keyed by (user challenge, date)
///
/// `processed` is left untouched on conflict. Call inside a transaction so a
/// multi-chunk write is all-or-nothing.
pub async fn upsert_bulk(conn: &mut SqliteConnection, tracks: &[NewTrack]) -> Result<u64> {
    let mut affected = 0;

    for chunk in tracks.chunks(UPSERT_CHUNK) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO tracks (user_challenge_id, user_id, date, done, last_series, score, score_daily, processed) ",
        );
        builder.push_values(chunk, |mut row, track| {
            row.push_bind(track.user_challenge_id)
                .push_bind(track.user_id)
                .push_bind(track.date)
                .push_bind(track.done)
                .push_bind(track.point.streak)
                .push_bind(track.point.score)
                .push_bind(track.point.delta)
                .push_bind(false);
        });
        builder.push(
            " ON CONFLICT(user_challenge_id, date) DO UPDATE SET \
             done = excluded.done, \
             last_series = excluded.last_series, \
             score = excluded.score, \
             score_daily = excluded.score_daily, \
             updated_at = CURRENT_TIMESTAMP",
        );

        let result = builder.build().execute(&mut *conn).await?;
        affected += result.rows_affected();
    }

    Ok(affected)
}

/// Flag tracks as settled
pub async fn mark_processed<'e, E>(executor: E, ids: &[i64]) -> Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    if ids.is_empty() {
        return Ok(0);
    }

    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("UPDATE tracks SET processed = 1, updated_at = CURRENT_TIMESTAMP WHERE id IN (");
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");

    let result = builder.build().execute(executor).await?;
    Ok(result.rows_affected())
}
