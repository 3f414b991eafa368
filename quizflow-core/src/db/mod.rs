//! Database layer for quizflow
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - Repository pattern for queries
//! - A [`QuizSource`] abstraction shared with JSON snapshots

pub mod repo;
pub mod schema;
pub mod source;

pub use repo::Database;
pub use source::{ImportStats, QuizSource, Snapshot};

/// Length of a room code.
pub const ROOM_CODE_LEN: usize = 6;

const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Random join code of uppercase letters and digits (e.g., `K7Q2ZD`).
pub fn generate_room_code() -> String {
    uuid::Uuid::new_v4()
        .as_bytes()
        .iter()
        .take(ROOM_CODE_LEN)
        .map(|b| ROOM_CODE_ALPHABET[usize::from(*b) % ROOM_CODE_ALPHABET.len()] as char)
        .collect()
}
