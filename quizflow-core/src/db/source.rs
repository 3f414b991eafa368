//! Where report inputs come from.
//!
//! Reports only need a quiz and its results. [`QuizSource`] abstracts over
//! the local SQLite store and a JSON [`Snapshot`] exported from the hosted
//! backend, so the same report code runs against either.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::Database;
use crate::error::{Error, Result};
use crate::types::{Quiz, QuizResult};

/// Read access to quizzes and their results.
pub trait QuizSource {
    /// A quiz by id; [`Error::QuizNotFound`] when absent.
    fn fetch_quiz(&self, quiz_id: &str) -> Result<Quiz>;

    /// Results for one quiz, in submission order.
    fn fetch_results(&self, quiz_id: &str) -> Result<Vec<QuizResult>>;

    /// Every quiz and every result.
    fn fetch_all(&self) -> Result<(Vec<Quiz>, Vec<QuizResult>)>;
}

impl QuizSource for Database {
    fn fetch_quiz(&self, quiz_id: &str) -> Result<Quiz> {
        self.get_quiz(quiz_id)?
            .ok_or_else(|| Error::QuizNotFound(quiz_id.to_string()))
    }

    fn fetch_results(&self, quiz_id: &str) -> Result<Vec<QuizResult>> {
        self.get_results(quiz_id)
    }

    fn fetch_all(&self) -> Result<(Vec<Quiz>, Vec<QuizResult>)> {
        Ok((self.list_quizzes()?, self.list_results()?))
    }
}

/// Counts from a snapshot import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub quizzes: usize,
    pub results: usize,
}

/// JSON document of quizzes and results:
///
/// ```json
/// { "quizzes": [ ... ], "results": [ ... ] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub quizzes: Vec<Quiz>,
    #[serde(default)]
    pub results: Vec<QuizResult>,
}

impl Snapshot {
    /// Parse and validate a snapshot document.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Snapshot = serde_json::from_str(json)?;
        for quiz in &snapshot.quizzes {
            quiz.validate()?;
        }
        Ok(snapshot)
    }

    /// Read a snapshot file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let snapshot = Self::from_json(&json)?;
        tracing::info!(
            path = %path.display(),
            quizzes = snapshot.quizzes.len(),
            results = snapshot.results.len(),
            "Loaded snapshot"
        );
        Ok(snapshot)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Dump everything stored in `db`.
    pub fn export_from(db: &Database) -> Result<Self> {
        let (quizzes, results) = db.fetch_all()?;
        Ok(Self { quizzes, results })
    }

    /// Store every quiz and result in one transaction. Existing quizzes are
    /// replaced and resubmitted results overwrite earlier ones; on error the
    /// database is left as it was.
    pub fn import_into(&self, db: &Database) -> Result<ImportStats> {
        db.import(&self.quizzes, &self.results)?;

        let stats = ImportStats {
            quizzes: self.quizzes.len(),
            results: self.results.len(),
        };
        tracing::info!(quizzes = stats.quizzes, results = stats.results, "Imported snapshot");
        Ok(stats)
    }
}

impl QuizSource for Snapshot {
    fn fetch_quiz(&self, quiz_id: &str) -> Result<Quiz> {
        self.quizzes
            .iter()
            .find(|q| q.id == quiz_id)
            .cloned()
            .ok_or_else(|| Error::QuizNotFound(quiz_id.to_string()))
    }

    fn fetch_results(&self, quiz_id: &str) -> Result<Vec<QuizResult>> {
        Ok(self
            .results
            .iter()
            .filter(|r| r.quiz_id == quiz_id)
            .cloned()
            .collect())
    }

    fn fetch_all(&self) -> Result<(Vec<Quiz>, Vec<QuizResult>)> {
        Ok((self.quizzes.clone(), self.results.clone()))
    }
}
