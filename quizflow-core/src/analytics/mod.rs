//! Analytics module for quizflow
//!
//! Pure functions that turn a quiz definition plus its completed results
//! into derived statistics and reports:
//! - Per-question option distribution, difficulty and discrimination
//! - Quiz-level averages and time analytics
//! - Detailed per-student report
//! - Multi-quiz comparison
//! - CSV rendering of the reports
//!
//! Every function here is total: degenerate input (no results, no
//! questions, a question nobody answered) yields zeroed fields, never a
//! panic or `NaN`. Identical input always yields identical output.

pub mod csv;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod multi;
pub mod question;
pub mod quiz;
pub mod report;

pub use csv::{
    escape_field, generate_detailed_csv, generate_detailed_csv_with, generate_multi_quiz_csv,
    generate_multi_quiz_csv_at, CsvOptions,
};
pub use multi::{
    compute_multi_quiz_analytics, MultiQuizAnalytics, OverallStats, QuizBreakdown,
    StudentPerformance,
};
pub use question::{compute_question_analytics, OptionStats, QuestionAnalytics};
pub use quiz::{compute_quiz_analytics, QuestionTimeStats, QuizAnalytics, TimeAnalytics};
pub use report::{
    generate_detailed_report, generate_detailed_report_at, DetailedQuizReport, QuestionResponse,
    StudentReport,
};

/// Round half up, matching how every figure in the reports is rounded
/// (`2.5 -> 3`, `-16.5 -> -16`).
pub fn round_half_up(value: f64) -> i64 {
    if value.is_finite() {
        (value + 0.5).floor() as i64
    } else {
        0
    }
}

/// `part / whole * 100`, rounded; 0 when `whole` is 0.
pub fn percent_of(part: usize, whole: usize) -> i64 {
    if whole == 0 {
        0
    } else {
        round_half_up(part as f64 / whole as f64 * 100.0)
    }
}

/// Rounded arithmetic mean; 0 for an empty sequence.
pub fn rounded_mean(values: impl IntoIterator<Item = f64>) -> i64 {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0
    } else {
        round_half_up(sum / count as f64)
    }
}
