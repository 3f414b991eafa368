//! Cross-quiz comparison: overall totals, per-quiz breakdown and
//! per-student performance.

use serde::Serialize;
use std::collections::{HashMap, HashSet};

use super::{round_half_up, rounded_mean};
use crate::types::{Quiz, QuizResult};

/// Totals across every quiz and result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallStats {
    pub total_quizzes: usize,
    /// Distinct student ids
    pub total_students: usize,
    pub total_completions: usize,
    pub average_score: i64,
}

/// One quiz's line in the comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizBreakdown {
    pub quiz_id: String,
    pub quiz_title: String,
    pub completions: usize,
    pub average_score: i64,
    /// Mean total seconds per completion, rounded
    pub average_time: i64,
}

/// One student's performance across quizzes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPerformance {
    pub student_id: String,
    pub student_name: String,
    pub quizzes_completed: usize,
    pub overall_average: i64,
    pub best_score: i64,
    pub worst_score: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiQuizAnalytics {
    pub overall_stats: OverallStats,
    /// In the order of the supplied quizzes
    pub quiz_breakdown: Vec<QuizBreakdown>,
    /// In order of each student's first result
    pub student_performance: Vec<StudentPerformance>,
}

/// Compare `quizzes` over `results`. Results for quizzes not in the list
/// still count toward overall and per-student figures.
pub fn compute_multi_quiz_analytics(quizzes: &[Quiz], results: &[QuizResult]) -> MultiQuizAnalytics {
    let distinct_students: HashSet<&str> = results.iter().map(|r| r.student_id.as_str()).collect();

    let overall_stats = OverallStats {
        total_quizzes: quizzes.len(),
        total_students: distinct_students.len(),
        total_completions: results.len(),
        average_score: rounded_mean(results.iter().map(QuizResult::percentage)),
    };

    let quiz_breakdown = quizzes
        .iter()
        .map(|quiz| {
            let quiz_results: Vec<&QuizResult> =
                results.iter().filter(|r| r.quiz_id == quiz.id).collect();
            QuizBreakdown {
                quiz_id: quiz.id.clone(),
                quiz_title: quiz.title.clone(),
                completions: quiz_results.len(),
                average_score: rounded_mean(quiz_results.iter().map(|r| r.percentage())),
                average_time: rounded_mean(quiz_results.iter().map(|r| r.total_time())),
            }
        })
        .collect();

    MultiQuizAnalytics {
        overall_stats,
        quiz_breakdown,
        student_performance: student_performance(results),
    }
}

fn student_performance(results: &[QuizResult]) -> Vec<StudentPerformance> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut scores: Vec<(&QuizResult, Vec<f64>)> = Vec::new();

    for result in results {
        match index.get(result.student_id.as_str()).copied() {
            Some(slot) => scores[slot].1.push(result.percentage()),
            None => {
                index.insert(result.student_id.as_str(), scores.len());
                scores.push((result, vec![result.percentage()]));
            }
        }
    }

    scores
        .into_iter()
        .map(|(first, percentages)| {
            let best = percentages.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let worst = percentages.iter().copied().fold(f64::INFINITY, f64::min);
            StudentPerformance {
                student_id: first.student_id.clone(),
                student_name: first.student_name.clone(),
                quizzes_completed: percentages.len(),
                overall_average: rounded_mean(percentages.iter().copied()),
                best_score: round_half_up(best),
                worst_score: round_half_up(worst),
            }
        })
        .collect()
}
