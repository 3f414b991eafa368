//! Per-question statistics.
//!
//! ## Difficulty polarity
//!
//! `difficulty_score` is the percentage of respondents who answered
//! correctly, so a *higher* score means an *easier* question. Classical test
//! theory calls this "facility"; the name is kept for compatibility with
//! existing reports. Do not invert it.
//!
//! ## Discrimination
//!
//! Students are ranked by overall percentage score (highest first, stable
//! for ties). The top and bottom groups are the first and last
//! `ceil(n / 3)` students; with very few students the groups overlap. The
//! index is the difference between the two groups' correct rates on this
//! question, in percent, and is negative when weaker students did better.
//!
//! ## Malformed answers
//!
//! An answer whose selection is outside the question's options is skipped
//! for that question only; the other questions are unaffected. Answers to
//! question ids the quiz does not define never match any question.
//!
//! ## Timeouts
//!
//! An answer with no selection is a collected response: it counts toward
//! `total_responses` and the difficulty denominator but selects no option,
//! so the option percentages of a question with timeouts sum below 100.

use serde::Serialize;

use super::{percent_of, round_half_up};
use crate::types::{Quiz, QuizQuestion, QuizResult, StudentAnswer};

/// Selection count for one option.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionStats {
    pub option_index: usize,
    pub option_text: String,
    pub count: usize,
    /// Share of `total_responses`, rounded
    pub percentage: i64,
    pub is_correct: bool,
}

/// Aggregate view of one question over all results.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionAnalytics {
    pub question_id: String,
    pub question_text: String,
    pub correct_option: usize,
    /// Collected answers, timeouts included
    pub total_responses: usize,
    /// Collected answers with no selection (timeouts)
    pub unanswered: usize,
    pub option_distribution: Vec<OptionStats>,
    /// Percentage of respondents correct; higher = easier
    pub difficulty_score: i64,
    /// Top-third correct rate minus bottom-third correct rate, in percent
    pub discrimination_index: i64,
}

/// Whether `answer` can be tallied against `question`.
pub(crate) fn is_tallyable(question: &QuizQuestion, answer: &StudentAnswer) -> bool {
    match answer.selected_option {
        Some(option) => question.has_option(option),
        None => true,
    }
}

/// Compute analytics for every question of `quiz`, in quiz order.
pub fn compute_question_analytics(quiz: &Quiz, results: &[QuizResult]) -> Vec<QuestionAnalytics> {
    log_unknown_questions(quiz, results);

    // Rank once; every question reuses the same ordering
    let ranked = rank_by_percentage(results);

    quiz.questions
        .iter()
        .map(|question| analyze_question(question, results, &ranked))
        .collect()
}

fn analyze_question(
    question: &QuizQuestion,
    results: &[QuizResult],
    ranked: &[&QuizResult],
) -> QuestionAnalytics {
    let mut counts = vec![0usize; question.options.len()];
    let mut unanswered = 0usize;
    let mut correct = 0usize;
    let mut skipped = 0usize;

    let collected = results
        .iter()
        .flat_map(|r| r.answers.iter())
        .filter(|a| a.question_id == question.id);

    for answer in collected {
        match answer.selected_option {
            Some(option) if question.has_option(option) => {
                counts[option] += 1;
                if answer.correct {
                    correct += 1;
                }
            }
            Some(_) => skipped += 1,
            None => {
                unanswered += 1;
                if answer.correct {
                    correct += 1;
                }
            }
        }
    }

    if skipped > 0 {
        tracing::warn!(
            question_id = %question.id,
            skipped,
            options = question.options.len(),
            "Skipping answers with out-of-range selections"
        );
    }

    let total_responses = counts.iter().sum::<usize>() + unanswered;

    let option_distribution = question
        .options
        .iter()
        .enumerate()
        .map(|(i, text)| OptionStats {
            option_index: i,
            option_text: text.clone(),
            count: counts[i],
            percentage: percent_of(counts[i], total_responses),
            is_correct: i == question.correct_option,
        })
        .collect();

    QuestionAnalytics {
        question_id: question.id.clone(),
        question_text: question.text.clone(),
        correct_option: question.correct_option,
        total_responses,
        unanswered,
        option_distribution,
        difficulty_score: percent_of(correct, total_responses),
        discrimination_index: discrimination_index(question, ranked),
    }
}

/// Results ordered by overall percentage, highest first. Stable for ties.
pub(crate) fn rank_by_percentage(results: &[QuizResult]) -> Vec<&QuizResult> {
    let mut ranked: Vec<&QuizResult> = results.iter().collect();
    ranked.sort_by(|a, b| b.percentage().total_cmp(&a.percentage()));
    ranked
}

fn discrimination_index(question: &QuizQuestion, ranked: &[&QuizResult]) -> i64 {
    let group = ranked.len().div_ceil(3);
    if group == 0 {
        return 0;
    }

    let top = &ranked[..group];
    let bottom = &ranked[ranked.len() - group..];

    let correct_rate = |members: &[&QuizResult]| {
        let hits = members
            .iter()
            .filter(|r| answered_correctly(question, r))
            .count();
        hits as f64 / members.len() as f64
    };

    round_half_up((correct_rate(top) - correct_rate(bottom)) * 100.0)
}

/// A student with no tallyable answer to the question counts as incorrect.
fn answered_correctly(question: &QuizQuestion, result: &QuizResult) -> bool {
    result
        .answer_for(&question.id)
        .filter(|a| is_tallyable(question, a))
        .is_some_and(|a| a.correct)
}

fn log_unknown_questions(quiz: &Quiz, results: &[QuizResult]) {
    let unknown = results
        .iter()
        .flat_map(|r| r.answers.iter())
        .filter(|a| quiz.question(&a.question_id).is_none())
        .count();
    if unknown > 0 {
        tracing::debug!(
            quiz_id = %quiz.id,
            unknown,
            "Ignoring answers to questions not in quiz"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::fixtures::{answer, quiz_with, result};

    #[test]
    fn test_option_distribution_and_difficulty() {
        let quiz = quiz_with(&[("q1", 4, 1)]);
        let results = vec![
            result("s1", vec![answer("s1", "q1", Some(1), true, 5.0)], 1),
            result("s2", vec![answer("s2", "q1", Some(1), true, 5.0)], 1),
            result("s3", vec![answer("s3", "q1", Some(0), false, 5.0)], 1),
        ];

        let stats = compute_question_analytics(&quiz, &results);
        assert_eq!(stats.len(), 1);
        let q = &stats[0];
        assert_eq!(q.total_responses, 3);
        assert_eq!(q.difficulty_score, 67);

        let counts: Vec<_> = q.option_distribution.iter().map(|o| o.count).collect();
        assert_eq!(counts, vec![1, 2, 0, 0]);
        let percentages: Vec<_> = q.option_distribution.iter().map(|o| o.percentage).collect();
        assert_eq!(percentages, vec![33, 67, 0, 0]);

        let sum: i64 = percentages.iter().sum();
        assert!((99..=101).contains(&sum));
        assert_eq!(q.option_distribution.iter().filter(|o| o.is_correct).count(), 1);
    }

    #[test]
    fn test_zero_responses_are_all_zero() {
        let quiz = quiz_with(&[("q1", 3, 0), ("q2", 2, 1)]);
        let results = vec![result("s1", vec![answer("s1", "q1", Some(0), true, 2.0)], 1)];

        let stats = compute_question_analytics(&quiz, &results);
        let q2 = &stats[1];
        assert_eq!(q2.total_responses, 0);
        assert_eq!(q2.difficulty_score, 0);
        assert_eq!(q2.discrimination_index, 0);
        assert!(q2.option_distribution.iter().all(|o| o.count == 0 && o.percentage == 0));
    }

    #[test]
    fn test_no_results_at_all() {
        let quiz = quiz_with(&[("q1", 2, 0)]);
        let stats = compute_question_analytics(&quiz, &[]);
        assert_eq!(stats[0].total_responses, 0);
        assert_eq!(stats[0].discrimination_index, 0);
    }

    fn sign_fixture(top_correct: bool) -> (Quiz, Vec<QuizResult>) {
        // q1 is under test; q2..q4 set overall scores 3,3,2,1,0,0 out of 4
        let quiz = quiz_with(&[("q1", 2, 0), ("q2", 2, 0), ("q3", 2, 0), ("q4", 2, 0)]);
        let layout: [(&str, usize, bool); 6] = [
            ("s1", 3, top_correct),
            ("s2", 3, top_correct),
            ("s3", 2, false),
            ("s4", 1, false),
            ("s5", 0, !top_correct),
            ("s6", 0, !top_correct),
        ];
        let results = layout
            .iter()
            .map(|&(id, fillers, on_q1)| {
                let mut answers = vec![answer(id, "q1", Some(if on_q1 { 0 } else { 1 }), on_q1, 3.0)];
                for (i, qid) in ["q2", "q3", "q4"].iter().enumerate() {
                    let ok = i < fillers;
                    answers.push(answer(id, qid, Some(if ok { 0 } else { 1 }), ok, 3.0));
                }
                let score = answers.iter().filter(|a| a.correct).count() as u32;
                result(id, answers, score)
            })
            .collect();
        (quiz, results)
    }

    #[test]
    fn test_discrimination_sign() {
        let (quiz, results) = sign_fixture(true);
        let stats = compute_question_analytics(&quiz, &results);
        assert_eq!(stats[0].discrimination_index, 100);

        let (quiz, results) = sign_fixture(false);
        let stats = compute_question_analytics(&quiz, &results);
        assert_eq!(stats[0].discrimination_index, -100);
    }

    #[test]
    fn test_discrimination_missing_answer_counts_incorrect() {
        let quiz = quiz_with(&[("q1", 2, 0), ("q2", 2, 0)]);
        let results = vec![
            result(
                "s1",
                vec![
                    answer("s1", "q1", Some(0), true, 1.0),
                    answer("s1", "q2", Some(0), true, 1.0),
                ],
                2,
            ),
            result("s2", vec![answer("s2", "q1", Some(0), true, 1.0)], 1),
            result("s3", vec![], 0),
        ];
        let stats = compute_question_analytics(&quiz, &results);
        // top = [s1], bottom = [s3]
        assert_eq!(stats[0].discrimination_index, 100);
        assert_eq!(stats[1].discrimination_index, 100);
    }

    #[test]
    fn test_malformed_answers_are_skipped_per_question() {
        let quiz = quiz_with(&[("q1", 2, 0), ("q2", 3, 2)]);
        let results = vec![
            result(
                "s1",
                vec![
                    answer("s1", "q1", Some(7), false, 1.0),
                    answer("s1", "q2", Some(2), true, 1.0),
                    answer("s1", "ghost", Some(0), true, 1.0),
                ],
                1,
            ),
            result(
                "s2",
                vec![
                    answer("s2", "q1", Some(0), true, 1.0),
                    answer("s2", "q2", Some(0), false, 1.0),
                ],
                1,
            ),
        ];
        let stats = compute_question_analytics(&quiz, &results);

        assert_eq!(stats[0].total_responses, 1);
        assert_eq!(stats[0].difficulty_score, 100);
        assert_eq!(stats[1].total_responses, 2);
        assert_eq!(stats[1].difficulty_score, 50);
    }

    #[test]
    fn test_unanswered_tracked_separately() {
        let quiz = quiz_with(&[("q1", 2, 0)]);
        let results = vec![
            result("s1", vec![answer("s1", "q1", Some(0), true, 4.0)], 1),
            result("s2", vec![answer("s2", "q1", None, false, 30.0)], 0),
        ];
        let stats = compute_question_analytics(&quiz, &results);
        assert_eq!(stats[0].total_responses, 2);
        assert_eq!(stats[0].unanswered, 1);
        assert_eq!(stats[0].difficulty_score, 50);
        assert_eq!(stats[0].option_distribution[0].count, 1);
        assert_eq!(stats[0].option_distribution[0].percentage, 50);
        assert_eq!(stats[0].option_distribution[1].percentage, 0);
        // top = [s1] correct, bottom = [s2] timed out
        assert_eq!(stats[0].discrimination_index, 100);
    }

    #[test]
    fn test_timeouts_only_question() {
        let quiz = quiz_with(&[("q1", 3, 2)]);
        let results = vec![
            result("s1", vec![answer("s1", "q1", None, false, 30.0)], 0),
            result("s2", vec![answer("s2", "q1", None, false, 30.0)], 0),
        ];
        let stats = compute_question_analytics(&quiz, &results);
        assert_eq!((stats[0].total_responses, stats[0].unanswered), (2, 2));
        assert_eq!(stats[0].difficulty_score, 0);
        assert!(stats[0].option_distribution.iter().all(|o| o.count == 0 && o.percentage == 0));
    }
}
