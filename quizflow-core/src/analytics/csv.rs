//! CSV rendering of quiz reports.
//!
//! Layout is fixed: the same input always produces the same rows in the
//! same order, apart from the `Generated:` timestamp line. Free text (quiz
//! titles, question and option text, student names) is always wrapped in
//! double quotes with embedded quotes doubled, so commas, quotes and line
//! breaks in user content never shift columns.

use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt::Write as _;

use super::multi::compute_multi_quiz_analytics;
use super::report::DetailedQuizReport;
use super::round_half_up;
use crate::format::{
    format_date, format_minutes, is_valid_date_format, option_letter, DEFAULT_DATE_FORMAT,
};
use crate::types::{Quiz, QuizResult};

const UNKNOWN_QUIZ: &str = "Unknown Quiz";

/// Rendering options.
#[derive(Debug, Clone)]
pub struct CsvOptions {
    /// chrono format string for completion dates; an invalid one renders
    /// as [`DEFAULT_DATE_FORMAT`]
    pub date_format: String,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

impl CsvOptions {
    fn warn_if_invalid(&self) {
        if !is_valid_date_format(&self.date_format) {
            tracing::warn!(
                date_format = %self.date_format,
                fallback = DEFAULT_DATE_FORMAT,
                "Invalid date format, using fallback"
            );
        }
    }
}

/// Quote a free-text field (`a "b", c` -> `"a ""b"", c"`).
pub fn escape_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn generated_line(at: DateTime<Utc>) -> String {
    format!("Generated: {}", at.to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// Render a detailed report with default options.
pub fn generate_detailed_csv(report: &DetailedQuizReport) -> String {
    generate_detailed_csv_with(report, &CsvOptions::default())
}

/// Render a detailed report.
pub fn generate_detailed_csv_with(report: &DetailedQuizReport, options: &CsvOptions) -> String {
    let summary = &report.summary;
    let mut csv = String::new();

    options.warn_if_invalid();
    if let Err(err) = write_detailed(&mut csv, report, options) {
        tracing::error!(quiz_id = %summary.quiz_id, %err, "Failed to render detailed CSV");
    }

    tracing::debug!(
        quiz_id = %summary.quiz_id,
        students = report.student_responses.len(),
        bytes = csv.len(),
        "Rendered detailed CSV"
    );
    csv
}

fn write_detailed(
    csv: &mut String,
    report: &DetailedQuizReport,
    options: &CsvOptions,
) -> std::fmt::Result {
    let summary = &report.summary;

    // Summary
    writeln!(csv, "DETAILED QUIZ ANALYTICS REPORT")?;
    writeln!(csv, "{}", escape_field(&format!("Quiz: {}", summary.quiz_title)))?;
    writeln!(csv, "{}", generated_line(report.generated_at))?;
    writeln!(csv, "Total Students: {}", summary.total_students)?;
    writeln!(csv, "Average Score: {}%", summary.average_score)?;
    writeln!(csv, "Total Questions: {}", summary.total_questions)?;
    writeln!(csv, "Completion Rate: {}%", summary.completion_rate)?;
    writeln!(csv)?;

    // Per-question option breakdown
    writeln!(csv, "QUESTION-WISE ANALYSIS WITH OPTION SELECTION")?;
    writeln!(csv, "============================================")?;
    writeln!(csv)?;
    for (i, question) in summary.questions.iter().enumerate() {
        writeln!(
            csv,
            "{}",
            escape_field(&format!("QUESTION {}: {}", i + 1, question.question_text))
        )?;
        writeln!(csv, "Difficulty Score: {}%", question.difficulty_score)?;
        writeln!(csv, "Discrimination Index: {}", question.discrimination_index)?;
        writeln!(csv, "Total Responses: {}", question.total_responses)?;
        writeln!(csv, "No Answer (timed out): {}", question.unanswered)?;
        writeln!(csv, "Correct Answer: Option {}", option_letter(question.correct_option))?;
        writeln!(csv)?;
        writeln!(csv, "Option Selection Breakdown:")?;
        writeln!(csv, "Option,Option Text,Students Selected,Percentage,Is Correct")?;
        for option in &question.option_distribution {
            writeln!(
                csv,
                "{},{},{},{}%,{}",
                option_letter(option.option_index),
                escape_field(&option.option_text),
                option.count,
                option.percentage,
                if option.is_correct { "Yes" } else { "No" }
            )?;
        }
        writeln!(csv)?;
    }

    // One row per student, one column pair per question
    writeln!(csv, "STUDENT RESPONSES WITH QUESTION-WISE ANSWERS")?;
    writeln!(csv, "==========================================")?;
    write!(
        csv,
        "Student Name,Total Score,Percentage,Completion Date,Total Time (minutes)"
    )?;
    for i in 1..=summary.questions.len() {
        write!(csv, ",Q{} Selected Option,Q{} Result", i, i)?;
    }
    writeln!(csv)?;

    for student in &report.student_responses {
        write!(
            csv,
            "{},{}/{},{}%,{},{}",
            escape_field(&student.student_name),
            student.score,
            summary.total_questions,
            student.percentage,
            escape_field(&format_date(student.completed_at, &options.date_format)),
            format_minutes(student.time_spent)
        )?;
        for question in &summary.questions {
            match DetailedQuizReport::response(student, &question.question_id) {
                Some(response) => {
                    let selected = response
                        .selected_option
                        .map_or_else(|| "No Answer".to_string(), option_letter);
                    let verdict = if response.is_correct { "Correct" } else { "Incorrect" };
                    write!(csv, ",{},{}", selected, verdict)?;
                }
                None => write!(csv, ",No Answer,No Response")?,
            }
        }
        writeln!(csv)?;
    }
    writeln!(csv)?;

    // Option counts side by side, sized to the widest question
    let widest = summary
        .questions
        .iter()
        .map(|q| q.option_distribution.len())
        .max()
        .unwrap_or(0);

    writeln!(csv, "OPTION SELECTION SUMMARY")?;
    writeln!(csv, "=======================")?;
    write!(csv, "Question")?;
    for i in 0..widest {
        write!(csv, ",Option {} Count", option_letter(i))?;
    }
    writeln!(csv, ",Correct Option,Most Selected Option")?;

    for (i, question) in summary.questions.iter().enumerate() {
        let counts: Vec<usize> = (0..widest)
            .map(|idx| {
                question
                    .option_distribution
                    .get(idx)
                    .map_or(0, |option| option.count)
            })
            .collect();

        // First option with the highest count; N/A when nothing was selected
        let top = counts.iter().copied().max().unwrap_or(0);
        let most_selected = if top == 0 {
            "N/A".to_string()
        } else {
            counts
                .iter()
                .position(|&c| c == top)
                .map_or_else(|| "N/A".to_string(), option_letter)
        };

        write!(csv, "{}", escape_field(&format!("Q{}", i + 1)))?;
        for count in &counts {
            write!(csv, ",{}", count)?;
        }
        writeln!(
            csv,
            ",{},{}",
            option_letter(question.correct_option),
            most_selected
        )?;
    }
    writeln!(csv)?;

    // Time analysis
    let time = &summary.time_analytics;
    writeln!(csv, "TIME ANALYSIS")?;
    writeln!(csv, "=============")?;
    writeln!(
        csv,
        "Average Time Per Question (seconds): {}",
        time.average_time_per_question
    )?;
    writeln!(
        csv,
        "Question,Average Time (seconds),Min Time (seconds),Max Time (seconds)"
    )?;
    for (i, entry) in time.question_time_breakdown.iter().enumerate() {
        writeln!(
            csv,
            "{},{},{},{}",
            escape_field(&format!("Q{}", i + 1)),
            entry.average_time,
            entry.min_time,
            entry.max_time
        )?;
    }

    Ok(())
}

/// Render the multi-quiz comparison, stamped with the current time.
pub fn generate_multi_quiz_csv(quizzes: &[Quiz], results: &[QuizResult]) -> String {
    generate_multi_quiz_csv_at(quizzes, results, Utc::now(), &CsvOptions::default())
}

/// Render the multi-quiz comparison with an explicit generation time.
///
/// Results without a completion time are dated `generated_at`.
pub fn generate_multi_quiz_csv_at(
    quizzes: &[Quiz],
    results: &[QuizResult],
    generated_at: DateTime<Utc>,
    options: &CsvOptions,
) -> String {
    let mut csv = String::new();
    options.warn_if_invalid();
    if let Err(err) = write_multi(&mut csv, quizzes, results, generated_at, options) {
        tracing::error!(%err, "Failed to render multi-quiz CSV");
    }

    tracing::debug!(
        quizzes = quizzes.len(),
        results = results.len(),
        bytes = csv.len(),
        "Rendered multi-quiz CSV"
    );
    csv
}

fn write_multi(
    csv: &mut String,
    quizzes: &[Quiz],
    results: &[QuizResult],
    generated_at: DateTime<Utc>,
    options: &CsvOptions,
) -> std::fmt::Result {
    let analytics = compute_multi_quiz_analytics(quizzes, results);
    let overall = &analytics.overall_stats;

    writeln!(csv, "COMPREHENSIVE QUIZ ANALYTICS REPORT")?;
    writeln!(csv, "{}", generated_line(generated_at))?;
    writeln!(csv, "Total Quizzes: {}", overall.total_quizzes)?;
    writeln!(csv, "Total Students: {}", overall.total_students)?;
    writeln!(csv, "Total Quiz Completions: {}", overall.total_completions)?;
    writeln!(csv, "Overall Average Score: {}%", overall.average_score)?;
    writeln!(csv)?;

    writeln!(csv, "QUIZ BREAKDOWN")?;
    writeln!(
        csv,
        "Quiz Title,Completions,Average Score (%),Average Time (seconds)"
    )?;
    for quiz in &analytics.quiz_breakdown {
        writeln!(
            csv,
            "{},{},{},{}",
            escape_field(&quiz.quiz_title),
            quiz.completions,
            quiz.average_score,
            quiz.average_time
        )?;
    }
    writeln!(csv)?;

    // Stable sort: equal averages keep first-seen order
    let mut students: Vec<_> = analytics.student_performance.iter().collect();
    students.sort_by(|a, b| b.overall_average.cmp(&a.overall_average));

    writeln!(csv, "STUDENT PERFORMANCE OVERVIEW")?;
    writeln!(
        csv,
        "Student Name,Quizzes Completed,Overall Average (%),Best Score (%),Worst Score (%)"
    )?;
    for student in students {
        writeln!(
            csv,
            "{},{},{},{},{}",
            escape_field(&student.student_name),
            student.quizzes_completed,
            student.overall_average,
            student.best_score,
            student.worst_score
        )?;
    }
    writeln!(csv)?;

    let mut ordered: Vec<&QuizResult> = results.iter().collect();
    ordered.sort_by(|a, b| b.percentage().total_cmp(&a.percentage()));

    writeln!(csv, "DETAILED QUIZ RESULTS")?;
    writeln!(
        csv,
        "Student Name,Quiz Title,Score,Percentage (%),Total Questions,Completion Date"
    )?;
    for result in ordered {
        let title = quizzes
            .iter()
            .find(|q| q.id == result.quiz_id)
            .map_or(UNKNOWN_QUIZ, |q| q.title.as_str());
        let completed = result.completed_at.unwrap_or(generated_at);
        writeln!(
            csv,
            "{},{},{},{},{},{}",
            escape_field(&result.student_name),
            escape_field(title),
            result.score,
            round_half_up(result.percentage()),
            result.total_questions,
            escape_field(&format_date(completed, &options.date_format))
        )?;
    }

    Ok(())
}
