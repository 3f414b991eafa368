//! Live quiz sessions
//!
//! A [`LiveSession`] is the explicit context for one launched quiz: it owns
//! the question lifecycle, stamps answers against the server-side question
//! start, and produces the leaderboard and the results that analytics
//! consume. Nothing here is global; callers hold one session per room.
//!
//! The [`feed`] module carries change events between a session and the
//! dashboards that watch it.

pub mod feed;
mod session;

pub use feed::{Batch, ChangeEvent, ChangeFeed, LiveAnalytics};
pub use session::{LiveSession, QuestionPhase, SessionError};
