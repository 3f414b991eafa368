//! # quizflow-core
//!
//! Core library for quizflow - classroom quizzes with live fast-answer
//! sessions and post-hoc analytics.
//!
//! This library provides:
//! - Domain types for quizzes, answers and results
//! - The analytics engine (difficulty, discrimination, time analytics,
//!   detailed and multi-quiz reports, CSV rendering)
//! - The fast-answer scoring policy and leaderboard
//! - Live sessions and a change feed for dashboards
//! - Database storage layer with SQLite, plus JSON snapshots
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Example
//!
//! ```rust,no_run
//! use quizflow_core::{analytics, Config, Database, QuizSource};
//!
//! let _config = Config::load().expect("failed to load config");
//!
//! let db = Database::open(&Config::database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//!
//! let quiz = db.fetch_quiz("quiz-1").expect("quiz");
//! let results = db.fetch_results(&quiz.id).expect("results");
//! let report = analytics::generate_detailed_report(&quiz, &results);
//! print!("{}", analytics::generate_detailed_csv(&report));
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::{generate_room_code, Database, QuizSource, Snapshot};
pub use error::{Error, Result};
pub use live::{LiveSession, QuestionPhase, SessionError};
pub use scoring::{rank_students, score, ScoreTable, ScoreTier};
pub use types::*;

// Public modules
pub mod analytics;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod live;
pub mod logging;
pub mod scoring;
pub mod types;
