//! Quiz-level statistics and time analytics.

use serde::Serialize;

use super::question::{compute_question_analytics, QuestionAnalytics};
use super::{percent_of, rounded_mean};
use crate::types::{Quiz, QuizResult};

/// Time spent on one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionTimeStats {
    pub question_id: String,
    /// Mean seconds, rounded
    pub average_time: i64,
    pub min_time: f64,
    pub max_time: f64,
}

/// Time analytics across all answers of a quiz.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeAnalytics {
    /// Mean seconds per answer over every recorded answer, rounded
    pub average_time_per_question: i64,
    /// One entry per quiz question, in quiz order
    pub question_time_breakdown: Vec<QuestionTimeStats>,
}

/// Aggregate statistics for one quiz.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAnalytics {
    pub quiz_id: String,
    pub quiz_title: String,
    pub total_students: usize,
    pub total_questions: usize,
    /// Mean of per-student percentage scores, rounded
    pub average_score: i64,
    pub questions: Vec<QuestionAnalytics>,
    /// Share of results that recorded an answer for every question
    pub completion_rate: i64,
    pub time_analytics: TimeAnalytics,
}

/// Compute the aggregate analytics of `quiz` over `results`.
pub fn compute_quiz_analytics(quiz: &Quiz, results: &[QuizResult]) -> QuizAnalytics {
    let average_score = rounded_mean(results.iter().map(QuizResult::percentage));
    let questions = compute_question_analytics(quiz, results);

    let completed = results
        .iter()
        .filter(|r| quiz.questions.iter().all(|q| r.answer_for(&q.id).is_some()))
        .count();

    tracing::debug!(
        quiz_id = %quiz.id,
        students = results.len(),
        questions = quiz.questions.len(),
        average_score,
        "Computed quiz analytics"
    );

    QuizAnalytics {
        quiz_id: quiz.id.clone(),
        quiz_title: quiz.title.clone(),
        total_students: results.len(),
        total_questions: quiz.questions.len(),
        average_score,
        questions,
        completion_rate: percent_of(completed, results.len()),
        time_analytics: compute_time_analytics(quiz, results),
    }
}

fn compute_time_analytics(quiz: &Quiz, results: &[QuizResult]) -> TimeAnalytics {
    let all_answers = || results.iter().flat_map(|r| r.answers.iter());

    let average_time_per_question = rounded_mean(all_answers().map(|a| a.time_spent));

    let question_time_breakdown = quiz
        .questions
        .iter()
        .map(|question| {
            let times: Vec<f64> = all_answers()
                .filter(|a| a.question_id == question.id)
                .map(|a| a.time_spent)
                .filter(|t| t.is_finite())
                .collect();

            let (min_time, max_time) = if times.is_empty() {
                (0.0, 0.0)
            } else {
                times.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &t| {
                    (lo.min(t), hi.max(t))
                })
            };

            QuestionTimeStats {
                question_id: question.id.clone(),
                average_time: rounded_mean(times.iter().copied()),
                min_time,
                max_time,
            }
        })
        .collect();

    TimeAnalytics {
        average_time_per_question,
        question_time_breakdown,
    }
}
