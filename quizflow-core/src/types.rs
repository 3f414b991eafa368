//! Core domain types for quizflow
//!
//! These are immutable value records produced by the persistence layer (or a
//! JSON snapshot of it) and consumed read-only by the analytics engine.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Quiz** | A titled, ordered list of multiple-choice questions |
//! | **Answer** | One student's selection for one question |
//! | **Result** | One student's completed quiz: final score plus every answer |
//! | **Fast-answer** | Quiz variant awarding points for correctness and speed |
//! | **Room code** | Short code students type to join a launched quiz |
//!
//! JSON field names are camelCase so that snapshots exported by the web
//! client load without translation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{Error, Result};

// ============================================
// Quiz definition
// ============================================

/// Quiz variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuizType {
    /// Students work through the questions at their own pace.
    #[default]
    Traditional,
    /// Teacher-paced; points depend on correctness and response latency.
    #[serde(alias = "classnode")]
    FastAnswer,
}

impl QuizType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuizType::Traditional => "traditional",
            QuizType::FastAnswer => "fast-answer",
        }
    }
}

impl std::str::FromStr for QuizType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "traditional" => Ok(QuizType::Traditional),
            "fast-answer" | "classnode" => Ok(QuizType::FastAnswer),
            _ => Err(format!("unknown quiz type: {}", s)),
        }
    }
}

/// A single multiple-choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    /// Unique identifier
    pub id: String,
    /// Question prompt
    pub text: String,
    /// Answer choices, in display order
    pub options: Vec<String>,
    /// Zero-based index into `options`
    pub correct_option: usize,
}

impl QuizQuestion {
    /// Returns true if `option` addresses one of this question's choices.
    pub fn has_option(&self, option: usize) -> bool {
        option < self.options.len()
    }
}

/// A quiz as authored by a teacher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Seconds allowed per question
    pub time_per_question: u32,
    /// Questions in presentation order (fixed at creation)
    pub questions: Vec<QuizQuestion>,
    #[serde(default)]
    pub quiz_type: Option<QuizType>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_by: Option<String>,
    /// Join code while the quiz is launched
    #[serde(default)]
    pub room_code: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

impl Quiz {
    /// Quiz variant, defaulting to traditional when unspecified.
    pub fn kind(&self) -> QuizType {
        self.quiz_type.unwrap_or_default()
    }

    /// Look up a question by id.
    pub fn question(&self, id: &str) -> Option<&QuizQuestion> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Check the structural invariants of the quiz definition.
    ///
    /// A quiz without questions is degenerate but valid.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Error::InvalidQuiz {
            quiz_id: self.id.clone(),
            message,
        };

        if self.time_per_question == 0 {
            return Err(invalid("timePerQuestion must be positive".to_string()));
        }

        let mut seen = HashSet::new();
        for (i, question) in self.questions.iter().enumerate() {
            if !seen.insert(question.id.as_str()) {
                return Err(invalid(format!("duplicate question id {}", question.id)));
            }
            if question.options.len() < 2 {
                return Err(invalid(format!(
                    "question {} has {} option(s), need at least 2",
                    i + 1,
                    question.options.len()
                )));
            }
            if !question.has_option(question.correct_option) {
                return Err(invalid(format!(
                    "question {} marks option {} correct but has {} options",
                    i + 1,
                    question.correct_option,
                    question.options.len()
                )));
            }
        }

        Ok(())
    }
}

// ============================================
// Answers and results
// ============================================

/// Serde adapter mapping `None` to the `-1` "no answer" sentinel used by the
/// store and the web client.
pub mod selected_option {
    use serde::{Deserialize, Deserializer, Serializer};

    pub const NO_ANSWER: i64 = -1;

    pub fn serialize<S>(value: &Option<usize>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(index) => serializer.serialize_u64(*index as u64),
            None => serializer.serialize_i64(NO_ANSWER),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = i64::deserialize(deserializer)?;
        Ok(to_index(raw))
    }

    /// Convert a raw stored value into an option index.
    pub fn to_index(raw: i64) -> Option<usize> {
        usize::try_from(raw).ok()
    }

    /// Convert an option index into its stored value.
    pub fn to_raw(index: Option<usize>) -> i64 {
        index.map_or(NO_ANSWER, |i| i as i64)
    }
}

/// One student's answer to one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAnswer {
    pub student_id: String,
    pub student_name: String,
    pub quiz_id: String,
    pub question_id: String,
    /// Selected option index, `None` when the student timed out
    #[serde(with = "selected_option")]
    pub selected_option: Option<usize>,
    /// Seconds spent on the question
    pub time_spent: f64,
    /// Whether `selected_option` matched the correct option when recorded
    pub correct: bool,
    /// Points awarded in fast-answer mode
    #[serde(default)]
    pub points: Option<u32>,
    #[serde(default)]
    pub submission_timestamp: Option<DateTime<Utc>>,
}

/// One student's completed quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    pub student_id: String,
    pub student_name: String,
    pub quiz_id: String,
    /// Number of correct answers
    pub score: u32,
    pub total_questions: u32,
    /// Every answer the student recorded, in submission order
    pub answers: Vec<StudentAnswer>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl QuizResult {
    /// Score as an unrounded percentage (0 when the quiz had no questions).
    pub fn percentage(&self) -> f64 {
        if self.total_questions == 0 {
            0.0
        } else {
            f64::from(self.score) / f64::from(self.total_questions) * 100.0
        }
    }

    /// Sum of time spent across all recorded answers.
    pub fn total_time(&self) -> f64 {
        self.answers.iter().map(|a| a.time_spent).sum()
    }

    /// The student's first recorded answer to `question_id`.
    pub fn answer_for(&self, question_id: &str) -> Option<&StudentAnswer> {
        self.answers.iter().find(|a| a.question_id == question_id)
    }
}

// ============================================
// Live sessions
// ============================================

/// Lifecycle of a launched quiz.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionState {
    #[default]
    Created,
    /// Students may join, questions not yet shown
    PreLaunch,
    Active,
    Completed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Created => "created",
            SessionState::PreLaunch => "pre-launch",
            SessionState::Active => "active",
            SessionState::Completed => "completed",
        }
    }
}

/// Leaderboard row for fast-answer quizzes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRanking {
    pub student_id: String,
    pub student_name: String,
    /// Cumulative fast-answer points
    pub total_points: u32,
    /// Number of correct answers
    pub total_marks: u32,
    /// 1-based leaderboard position
    pub rank: usize,
}
