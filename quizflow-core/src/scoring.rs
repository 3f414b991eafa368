//! Fast-answer scoring policy and leaderboard ranking
//!
//! A correct answer earns points according to how quickly it arrived after
//! the question opened:
//!
//! | Elapsed (s)     | Points |
//! |-----------------|--------|
//! | `<= 3`          | 1000   |
//! | `3 < t <= 6`    | 800    |
//! | `6 < t <= 10`   | 500    |
//! | `> 10`          | 0      |
//!
//! Incorrect answers always score 0. Late answers score 0 even when correct;
//! that is a timeout boundary, not an error.
//!
//! The elapsed time must come from a trusted clock. [`crate::live::LiveSession`]
//! measures it against the server-side question start, so a client cannot
//! under-report its latency.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::types::{StudentAnswer, StudentRanking};

/// One threshold in the score table: answers arriving within
/// `max_elapsed_secs` earn `points`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreTier {
    pub max_elapsed_secs: f64,
    pub points: u32,
}

/// Default fast-answer thresholds.
pub const DEFAULT_TIERS: [ScoreTier; 3] = [
    ScoreTier {
        max_elapsed_secs: 3.0,
        points: 1000,
    },
    ScoreTier {
        max_elapsed_secs: 6.0,
        points: 800,
    },
    ScoreTier {
        max_elapsed_secs: 10.0,
        points: 500,
    },
];

/// Ordered table of point tiers.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreTable {
    tiers: Vec<ScoreTier>,
}

impl Default for ScoreTable {
    fn default() -> Self {
        Self {
            tiers: DEFAULT_TIERS.to_vec(),
        }
    }
}

impl ScoreTable {
    /// Build a table from tiers ordered by strictly increasing elapsed bound.
    pub fn new(tiers: Vec<ScoreTier>) -> Result<Self> {
        if tiers.is_empty() {
            return Err(Error::Config("score table needs at least one tier".to_string()));
        }
        for tier in &tiers {
            if !tier.max_elapsed_secs.is_finite() || tier.max_elapsed_secs < 0.0 {
                return Err(Error::Config(format!(
                    "score tier bound must be a non-negative number, got {}",
                    tier.max_elapsed_secs
                )));
            }
        }
        if tiers
            .windows(2)
            .any(|w| w[0].max_elapsed_secs >= w[1].max_elapsed_secs)
        {
            return Err(Error::Config(
                "score tiers must be ordered by increasing max_elapsed_secs".to_string(),
            ));
        }
        Ok(Self { tiers })
    }

    pub fn tiers(&self) -> &[ScoreTier] {
        &self.tiers
    }

    /// The time budget: answers later than this score nothing.
    pub fn time_budget_secs(&self) -> f64 {
        self.tiers.last().map_or(0.0, |t| t.max_elapsed_secs)
    }

    /// Points for an answer given its correctness and elapsed seconds.
    ///
    /// Negative elapsed (clock skew) is treated as 0; NaN scores nothing.
    pub fn score(&self, is_correct: bool, elapsed_secs: f64) -> u32 {
        if !is_correct || elapsed_secs.is_nan() {
            return 0;
        }
        let elapsed = elapsed_secs.max(0.0);
        self.tiers
            .iter()
            .find(|tier| elapsed <= tier.max_elapsed_secs)
            .map_or(0, |tier| tier.points)
    }
}

/// Points for an answer under the default table.
pub fn score(is_correct: bool, elapsed_secs: f64) -> u32 {
    ScoreTable::default().score(is_correct, elapsed_secs)
}

struct Standing {
    student_id: String,
    student_name: String,
    total_points: u32,
    total_marks: u32,
    /// When the student last gained points
    last_scored_at: Option<DateTime<Utc>>,
}

/// Build the fast-answer leaderboard from every recorded answer.
///
/// Students are ordered by cumulative points, highest first. Ties go to the
/// student who reached their total earlier (time of their last
/// point-earning submission; an unknown time sorts last), then by name, then
/// by id, so the order never depends on input order.
pub fn rank_students(answers: &[StudentAnswer]) -> Vec<StudentRanking> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut standings: Vec<Standing> = Vec::new();

    for answer in answers {
        let slot = *index.entry(answer.student_id.as_str()).or_insert_with(|| {
            standings.push(Standing {
                student_id: answer.student_id.clone(),
                student_name: answer.student_name.clone(),
                total_points: 0,
                total_marks: 0,
                last_scored_at: None,
            });
            standings.len() - 1
        });
        let standing = &mut standings[slot];

        let points = answer.points.unwrap_or(0);
        standing.total_points = standing.total_points.saturating_add(points);
        if answer.correct {
            standing.total_marks += 1;
        }
        if points > 0 {
            standing.last_scored_at = match (standing.last_scored_at, answer.submission_timestamp) {
                (Some(prev), Some(ts)) => Some(prev.max(ts)),
                (None, ts) => ts,
                (prev, None) => prev,
            };
        }
    }

    standings.sort_by(|a, b| {
        b.total_points
            .cmp(&a.total_points)
            .then_with(|| match (a.last_scored_at, b.last_scored_at) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            })
            .then_with(|| a.student_name.cmp(&b.student_name))
            .then_with(|| a.student_id.cmp(&b.student_id))
    });

    standings
        .into_iter()
        .enumerate()
        .map(|(i, s)| StudentRanking {
            student_id: s.student_id,
            student_name: s.student_name,
            total_points: s.total_points,
            total_marks: s.total_marks,
            rank: i + 1,
        })
        .collect()
}
