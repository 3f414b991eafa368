//! Formatting helpers shared by the CSV renderer and the CLI.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};

/// Calendar date format used when none (or an invalid one) is configured.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Letter label for a zero-based option index (`0 -> "A"`, `25 -> "Z"`,
/// `26 -> "AA"`).
pub fn option_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Seconds rendered as minutes with two decimals (e.g., `90.0 -> "1.50"`).
pub fn format_minutes(secs: f64) -> String {
    format!("{:.2}", secs / 60.0)
}

/// Whether chrono can render `date_format` without error.
pub fn is_valid_date_format(date_format: &str) -> bool {
    StrftimeItems::new(date_format).all(|item| !matches!(item, Item::Error))
}

/// Render a timestamp as a calendar date using a chrono format string.
///
/// An invalid format renders with [`DEFAULT_DATE_FORMAT`] instead.
pub fn format_date(ts: DateTime<Utc>, date_format: &str) -> String {
    if is_valid_date_format(date_format) {
        ts.format(date_format).to_string()
    } else {
        ts.format(DEFAULT_DATE_FORMAT).to_string()
    }
}

/// Human-friendly seconds for terminal output (e.g., "1m 05s").
pub fn format_seconds(secs: f64) -> String {
    let total = secs.max(0.0).round() as i64;
    if total < 60 {
        format!("{}s", total)
    } else {
        format!("{}m {:02}s", total / 60, total % 60)
    }
}
