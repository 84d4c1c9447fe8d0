//! Streak/score calculator
//!
//! One step of the chain that turns a sequence of done/missed occurrences into
//! cumulative score, streak and per-day delta.

use serde::Serialize;

/// Fraction of the score kept on a miss before the reset
const DECAY_FACTOR: f64 = 0.2;

/// Score state after one occurrence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScorePoint {
    /// Cumulative score
    pub score: i64,
    /// Consecutive done occurrences
    pub streak: i64,
    /// Change this occurrence contributes to the user's aggregate score
    pub delta: i64,
}

/// Next point in the chain
///
/// A hit extends score and streak by one and contributes `+1`. A miss resets
/// both to zero, but its delta is the decay `floor(prev_score * 0.2) - prev_score`
/// rather than `-prev_score`: the aggregate loses 80% while the per-challenge
/// score starts over.
pub fn next_point(prev_score: i64, prev_streak: i64, done: bool) -> ScorePoint {
    if done {
        return ScorePoint {
            score: prev_score + 1,
            streak: prev_streak + 1,
            delta: 1,
        };
    }

    let decayed = (prev_score as f64 * DECAY_FACTOR).floor() as i64;
    ScorePoint {
        score: 0,
        streak: 0,
        delta: decayed - prev_score,
    }
}

/// Fold a run of done flags starting from `seed`, returning every point
pub fn chain(seed: ScorePoint, done_flags: impl IntoIterator<Item = bool>) -> Vec<ScorePoint> {
    let mut prev = seed;
    done_flags
        .into_iter()
        .map(|done| {
            prev = next_point(prev.score, prev.streak, done);
            prev
        })
        .collect()
}
