//! Track recompute and settlement engine
//!
//! Owns every write to `tracks`, and the only writes to `users.score` and
//! `user_challenges.last_series`. Both entry points that rewrite a challenge's
//! tracks ([`TrackProcessor::make_track`] and
//! [`TrackProcessor::settle_challenge`]) hold that challenge's lock for their
//! whole read-recompute-write sequence.
//!
//! # Grace window
//!
//! Recent occurrences stay open for edits for a few occurrences before they
//! are settled into the user's aggregate score: three for manually tracked
//! challenges, one for auto-tracked ones. Until then their deltas are only
//! reported through [`TrackProcessor::calculate_daily_score`].

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use dbc_common::time::{next_day, prev_day};
use dbc_common::Clock;

use crate::db::challenges::{self, UserChallenge};
use crate::db::{tracks, users};
use crate::db::tracks::{NewTrack, Track};
use crate::error::{Error, Result, StepContext};
use crate::recurrence::{is_occurrence, missing_occurrences, step_back_n, RecurrenceRule};
use crate::scoring::{chain, ScorePoint};
use crate::services::challenge_locks::ChallengeLocks;

/// Occurrences kept open before settlement, manually tracked challenges
pub const MANUAL_GRACE: usize = 3;

/// Occurrences kept open before settlement, auto-tracked challenges
pub const AUTO_GRACE: usize = 1;

/// Page size of the settlement sweep
pub const SWEEP_PAGE_SIZE: i64 = 1000;

/// Grace window for a challenge
pub fn grace_for(is_auto_track: bool) -> usize {
    if is_auto_track {
        AUTO_GRACE
    } else {
        MANUAL_GRACE
    }
}

/// Result of a track-day request that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    /// Tracks were recomputed and written
    Applied,
    /// Requested day is after today; nothing written
    FutureDate,
    /// No live challenge with that id; nothing written
    ChallengeNotFound,
    /// Requested day is before the grace window and may already be folded
    /// into the user's score; nothing written
    Settled,
}

/// What one settlement of one challenge did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettlementSummary {
    pub user_challenge_id: i64,
    /// Tracks on or after this day stay open
    pub settle_before: NaiveDate,
    /// Absent occurrences filled with the default
    pub backfilled: usize,
    /// Tracks marked processed
    pub settled: usize,
    /// Sum added to the user's score
    pub delta: i64,
    /// Streak persisted on the challenge
    pub last_series: i64,
}

/// Failure of one challenge during a sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepFailure {
    pub user_challenge_id: i64,
    pub error: String,
}

/// Outcome of settling every challenge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub settled: usize,
    pub total_delta: i64,
    pub failures: Vec<SweepFailure>,
}

impl SweepReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Unsettled contribution of an auto-tracked challenge
///
/// The newest track's delta, or `+1` when nothing is open yet: the day is
/// presumed done.
pub fn auto_tail_delta(tail: &[Track]) -> i64 {
    tail.last().map(|track| track.score_daily).unwrap_or(1)
}

/// Unsettled contribution of a manually tracked challenge
///
/// Trailing misses after the newest done day are not counted yet; everything
/// from that done day backwards is.
pub fn confirmed_tail_delta(tail: &[Track]) -> i64 {
    let mut confirmed = false;
    let mut sum = 0;
    for track in tail.iter().rev() {
        if track.done {
            confirmed = true;
        }
        if confirmed {
            sum += track.score_daily;
        }
    }
    sum
}

/// Streak/score engine over the track store
pub struct TrackProcessor {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
    locks: ChallengeLocks,
}

impl TrackProcessor {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            clock,
            locks: ChallengeLocks::new(),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Set `date` to `done` and recompute every track from the previous
    /// recorded day through today
    ///
    /// Days in that window without a row are written as missed. Only days
    /// inside the grace window can change.
    pub async fn make_track(
        &self,
        user_challenge_id: i64,
        date: NaiveDate,
        done: bool,
    ) -> Result<TrackOutcome> {
        let today = self.clock.today();
        if date > today {
            debug!(user_challenge_id, %date, %today, "Rejected track for future date");
            return Ok(TrackOutcome::FutureDate);
        }

        let _guard = self.locks.acquire(user_challenge_id).await;

        let Some(challenge) = challenges::fetch_by_id(&self.pool, user_challenge_id)
            .await
            .step("fetch_challenge")?
        else {
            return Ok(TrackOutcome::ChallengeNotFound);
        };
        let rule = challenge.rule().step("load_rule")?;

        if !is_occurrence(date, &rule).step("is_occurrence")? {
            return Err(Error::InvalidDateForPeriod(date));
        }

        let settle_before = step_back_n(next_day(today), &rule, grace_for(challenge.is_auto_track))
            .step("step_back_n")?;
        if date < settle_before {
            debug!(user_challenge_id, %date, %settle_before, "Rejected track for settled date");
            return Ok(TrackOutcome::Settled);
        }

        let anchor = tracks::fetch_last_before(&self.pool, user_challenge_id, date)
            .await
            .step("fetch_anchor")?;
        let since = anchor.as_ref().map(|t| t.date).unwrap_or_else(|| prev_day(date));

        let window = missing_occurrences(since, next_day(today), &rule).step("window")?;
        let existing = tracks::fetch_by_dates(&self.pool, user_challenge_id, &window)
            .await
            .step("fetch_window")?;

        let mut done_by_date: HashMap<NaiveDate, bool> =
            existing.iter().map(|t| (t.date, t.done)).collect();
        done_by_date.insert(date, done);

        let flags: Vec<bool> = window
            .iter()
            .map(|day| done_by_date.get(day).copied().unwrap_or(false))
            .collect();
        let seed = anchor.as_ref().map(Track::point).unwrap_or_default();
        let points = chain(seed, flags.iter().copied());
        let rows = build_rows(&challenge, &window, &flags, points);

        self.write_tracks(&rows).await.step("upsert_tracks")?;

        debug!(
            user_challenge_id,
            %date,
            done,
            recomputed = rows.len(),
            "Track applied"
        );
        Ok(TrackOutcome::Applied)
    }

    /// Fold every track before the grace window into the user's score
    ///
    /// Absent occurrences before the window are first filled with the
    /// challenge default (done for auto-tracked, missed otherwise). Running it
    /// again on the same day changes nothing.
    pub async fn settle_challenge(&self, challenge: &UserChallenge) -> Result<SettlementSummary> {
        let _guard = self.locks.acquire(challenge.id).await;

        let rule = challenge.rule().step("load_rule")?;
        let tomorrow = next_day(self.clock.today());
        let settle_before = step_back_n(tomorrow, &rule, grace_for(challenge.is_auto_track))
            .step("step_back_n")?;

        let backfilled = self
            .fill_absent(challenge, &rule, settle_before)
            .await
            .step("backfill")?;

        let open = tracks::fetch_unprocessed_before(&self.pool, challenge.id, settle_before)
            .await
            .step("fetch_unprocessed")?;
        let delta: i64 = open.iter().map(|t| t.score_daily).sum();
        let ids: Vec<i64> = open.iter().map(|t| t.id).collect();

        let last_series = tracks::fetch_last_before(&self.pool, challenge.id, settle_before)
            .await
            .step("fetch_last_settled")?
            .map(|t| t.last_series)
            .unwrap_or(0);

        let mut tx = self.pool.begin().await.step("begin")?;
        users::add_score(&mut *tx, challenge.user_id, delta)
            .await
            .step("add_score")?;
        tracks::mark_processed(&mut *tx, &ids)
            .await
            .step("mark_processed")?;
        challenges::update_last_series(&mut *tx, challenge.id, last_series)
            .await
            .step("update_last_series")?;
        tx.commit().await.step("commit")?;

        debug!(
            user_challenge_id = challenge.id,
            %settle_before,
            backfilled,
            settled = ids.len(),
            delta,
            last_series,
            "Challenge settled"
        );

        Ok(SettlementSummary {
            user_challenge_id: challenge.id,
            settle_before,
            backfilled,
            settled: ids.len(),
            delta,
            last_series,
        })
    }

    /// Settle every live challenge, page by page
    ///
    /// A failing challenge is recorded in the report and the sweep moves on.
    /// Only a failure to read a page aborts.
    pub async fn settle_all_challenges(&self) -> Result<SweepReport> {
        let mut report = SweepReport::default();
        let mut offset = 0;

        loop {
            let page = challenges::fetch_page(&self.pool, SWEEP_PAGE_SIZE, offset)
                .await
                .step("fetch_page")?;
            let page_len = page.len() as i64;

            for challenge in &page {
                match self.settle_challenge(challenge).await {
                    Ok(summary) => {
                        report.settled += 1;
                        report.total_delta += summary.delta;
                    }
                    Err(e) => {
                        warn!(user_challenge_id = challenge.id, error = %e, "Settlement failed");
                        report.failures.push(SweepFailure {
                            user_challenge_id: challenge.id,
                            error: e.to_string(),
                        });
                    }
                }
            }

            if page_len < SWEEP_PAGE_SIZE {
                break;
            }
            offset += page_len;
        }

        info!(
            settled = report.settled,
            failed = report.failures.len(),
            total_delta = report.total_delta,
            "Settlement sweep finished"
        );
        Ok(report)
    }

    /// Sum of the deltas not yet folded into the user's score
    pub async fn calculate_daily_score(&self, user_id: i64) -> Result<i64> {
        let tomorrow = next_day(self.clock.today());
        let list = challenges::fetch_all_for_user(&self.pool, user_id)
            .await
            .step("fetch_challenges")?;

        let mut score = 0;
        for challenge in &list {
            let rule = challenge.rule().step("load_rule")?;
            let from = step_back_n(tomorrow, &rule, grace_for(challenge.is_auto_track) + 1)
                .step("step_back_n")?;
            let tail = tracks::fetch_after(&self.pool, challenge.id, from)
                .await
                .step("fetch_tail")?;

            score += if challenge.is_auto_track {
                auto_tail_delta(&tail)
            } else {
                confirmed_tail_delta(&tail)
            };
        }

        Ok(score)
    }

    /// Fill absent occurrences before `to_date` with the challenge default
    async fn fill_absent(
        &self,
        challenge: &UserChallenge,
        rule: &RecurrenceRule,
        to_date: NaiveDate,
    ) -> Result<usize> {
        let anchor = tracks::fetch_last_before(&self.pool, challenge.id, to_date)
            .await
            .step("fetch_anchor")?;
        let since = anchor
            .as_ref()
            .map(|t| t.date)
            .unwrap_or_else(|| prev_day(challenge.created_day));

        let window = missing_occurrences(since, to_date, rule).step("window")?;
        if window.is_empty() {
            return Ok(0);
        }

        let seed = anchor.as_ref().map(Track::point).unwrap_or_default();
        let flags = vec![challenge.is_auto_track; window.len()];
        let points = chain(seed, flags.iter().copied());
        let rows = build_rows(challenge, &window, &flags, points);

        self.write_tracks(&rows).await.step("upsert_tracks")?;
        Ok(rows.len())
    }

    async fn write_tracks(&self, rows: &[NewTrack]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        tracks::upsert_bulk(&mut *tx, rows).await?;
        tx.commit().await?;
        Ok(())
    }
}

fn build_rows(
    challenge: &UserChallenge,
    window: &[NaiveDate],
    flags: &[bool],
    points: Vec<ScorePoint>,
) -> Vec<NewTrack> {
    window
        .iter()
        .zip(flags)
        .zip(points)
        .map(|((date, done), point)| NewTrack {
            user_challenge_id: challenge.id,
            user_id: challenge.user_id,
            date: *date,
            done: *done,
            point,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(day: u32, done: bool, delta: i64) -> Track {
        Track {
            id: day as i64,
            user_challenge_id: 1,
            user_id: 1,
            date: NaiveDate::from_ymd_opt(2023, 10, day).unwrap(),
            done,
            last_series: 0,
            score: 0,
            score_daily: delta,
            processed: false,
        }
    }

    #[test]
    fn test_grace_for() {
        assert_eq!(grace_for(true), 1);
        assert_eq!(grace_for(false), 3);
    }

    #[test]
    fn test_auto_tail_empty_presumes_done() {
        assert_eq!(auto_tail_delta(&[]), 1);
    }

    #[test]
    fn test_auto_tail_uses_newest_delta() {
        let tail = [track(24, true, 1), track(25, false, -4)];
        assert_eq!(auto_tail_delta(&tail), -4);
    }

    #[test]
    fn test_confirmed_tail_skips_trailing_misses() {
        // miss, miss, hit, miss: the trailing miss is not confirmed yet
        let tail = [
            track(23, false, -2),
            track(24, false, 0),
            track(25, true, 1),
            track(26, false, -1),
        ];
        assert_eq!(confirmed_tail_delta(&tail), -1);
    }

    #[test]
    fn test_confirmed_tail_all_misses_is_zero() {
        let tail = [track(24, false, -3), track(25, false, 0)];
        assert_eq!(confirmed_tail_delta(&tail), 0);
        assert_eq!(confirmed_tail_delta(&[]), 0);
    }
}
