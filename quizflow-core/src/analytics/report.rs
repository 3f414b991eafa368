//! Detailed per-student quiz report.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::quiz::{compute_quiz_analytics, QuizAnalytics};
use super::round_half_up;
use crate::types::{Quiz, QuizResult};

/// One answer as it appears in a student's report row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResponse {
    pub question_id: String,
    pub selected_option: Option<usize>,
    pub is_correct: bool,
    pub time_spent: f64,
}

/// One student's row in the detailed report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentReport {
    pub student_id: String,
    pub student_name: String,
    pub score: u32,
    /// Rounded percentage score
    pub percentage: i64,
    /// Result completion time, or the report time when unknown
    pub completed_at: DateTime<Utc>,
    /// Sum of per-question time, in seconds
    pub time_spent: f64,
    /// The student's own answers; unanswered questions have no entry
    pub question_responses: Vec<QuestionResponse>,
}

/// Quiz summary plus a row per student.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedQuizReport {
    pub summary: QuizAnalytics,
    pub student_responses: Vec<StudentReport>,
    pub generated_at: DateTime<Utc>,
}

impl DetailedQuizReport {
    /// The response a student gave to a question, if any.
    pub fn response<'a>(
        student: &'a StudentReport,
        question_id: &str,
    ) -> Option<&'a QuestionResponse> {
        student
            .question_responses
            .iter()
            .find(|r| r.question_id == question_id)
    }
}

/// Build the detailed report, stamped with the current time.
pub fn generate_detailed_report(quiz: &Quiz, results: &[QuizResult]) -> DetailedQuizReport {
    generate_detailed_report_at(quiz, results, Utc::now())
}

/// Build the detailed report with an explicit generation time.
///
/// For fixed inputs and `generated_at` the output is identical on every call.
pub fn generate_detailed_report_at(
    quiz: &Quiz,
    results: &[QuizResult],
    generated_at: DateTime<Utc>,
) -> DetailedQuizReport {
    let summary = compute_quiz_analytics(quiz, results);

    let student_responses = results
        .iter()
        .map(|result| StudentReport {
            student_id: result.student_id.clone(),
            student_name: result.student_name.clone(),
            score: result.score,
            percentage: round_half_up(result.percentage()),
            completed_at: result.completed_at.unwrap_or(generated_at),
            time_spent: result.total_time(),
            question_responses: result
                .answers
                .iter()
                .map(|a| QuestionResponse {
                    question_id: a.question_id.clone(),
                    selected_option: a.selected_option,
                    is_correct: a.correct,
                    time_spent: a.time_spent,
                })
                .collect(),
        })
        .collect();

    DetailedQuizReport {
        summary,
        student_responses,
        generated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::fixtures::{answer, quiz_with, result};
    use chrono::TimeZone;

    #[test]
    fn test_student_rows() {
        let quiz = quiz_with(&[("q1", 2, 0), ("q2", 2, 1)]);
        let mut finished = result(
            "s1",
            vec![
                answer("s1", "q1", Some(0), true, 12.5),
                answer("s1", "q2", Some(0), false, 7.5),
            ],
            1,
        );
        let done_at = Utc.with_ymd_and_hms(2024, 5, 2, 10, 0, 0).unwrap();
        finished.completed_at = Some(done_at);
        let partial = result("s2", vec![answer("s2", "q2", Some(1), true, 3.0)], 1);

        let at = Utc.with_ymd_and_hms(2024, 5, 3, 8, 0, 0).unwrap();
        let report = generate_detailed_report_at(&quiz, &[finished, partial], at);

        assert_eq!(report.generated_at, at);
        assert_eq!(report.student_responses.len(), 2);

        let s1 = &report.student_responses[0];
        assert_eq!(s1.percentage, 50);
        assert_eq!(s1.time_spent, 20.0);
        assert_eq!(s1.completed_at, done_at);
        assert_eq!(s1.question_responses.len(), 2);

        let s2 = &report.student_responses[1];
        assert_eq!(s2.completed_at, at);
        assert!(DetailedQuizReport::response(s2, "q1").is_none());
        assert!(DetailedQuizReport::response(s2, "q2").unwrap().is_correct);
    }

    #[test]
    fn test_report_deterministic_for_fixed_time() {
        let quiz = quiz_with(&[("q1", 2, 0)]);
        let results = vec![result("s1", vec![answer("s1", "q1", Some(0), true, 1.0)], 1)];
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            generate_detailed_report_at(&quiz, &results, at),
            generate_detailed_report_at(&quiz, &results, at)
        );
    }
}
