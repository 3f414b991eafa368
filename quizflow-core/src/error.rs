//! Error types for quizflow-core

use thiserror::Error;

use crate::live::SessionError;

/// Main error type for the quizflow-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Quiz not found
    #[error("quiz not found: {0}")]
    QuizNotFound(String),

    /// Quiz definition violates the data model
    #[error("invalid quiz {quiz_id}: {message}")]
    InvalidQuiz { quiz_id: String, message: String },

    /// No unused room code found for a launch
    #[error("no free room code after {attempts} attempts")]
    RoomCodesExhausted { attempts: usize },

    /// Live session rejected an operation
    #[error("session error: {0}")]
    Session(#[from] SessionError),
}

/// Result type alias for quizflow-core
pub type Result<T> = std::result::Result<T, Error>;
