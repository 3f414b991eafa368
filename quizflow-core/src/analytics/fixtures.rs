//! Builders for analytics unit tests.

use crate::types::{Quiz, QuizQuestion, QuizResult, StudentAnswer};

/// Quiz `quiz-1` with questions given as `(id, option_count, correct_option)`.
pub fn quiz_with(questions: &[(&str, usize, usize)]) -> Quiz {
    Quiz {
        id: "quiz-1".to_string(),
        title: "Fractions".to_string(),
        description: String::new(),
        time_per_question: 30,
        questions: questions
            .iter()
            .map(|&(id, options, correct)| QuizQuestion {
                id: id.to_string(),
                text: format!("Question {}", id),
                options: (0..options).map(|i| format!("Choice {}", i)).collect(),
                correct_option: correct,
            })
            .collect(),
        quiz_type: None,
        created_at: None,
        created_by: None,
        room_code: None,
        is_active: true,
    }
}

pub fn answer(
    student: &str,
    question: &str,
    selected: Option<usize>,
    correct: bool,
    time_spent: f64,
) -> StudentAnswer {
    StudentAnswer {
        student_id: student.to_string(),
        student_name: format!("Student {}", student),
        quiz_id: "quiz-1".to_string(),
        question_id: question.to_string(),
        selected_option: selected,
        time_spent,
        correct,
        points: None,
        submission_timestamp: None,
    }
}

/// Result for `quiz-1`; `total_questions` is the larger of 2 and the answer count.
pub fn result(student: &str, answers: Vec<StudentAnswer>, score: u32) -> QuizResult {
    let total = answers.len().max(2) as u32;
    QuizResult {
        student_id: student.to_string(),
        student_name: format!("Student {}", student),
        quiz_id: "quiz-1".to_string(),
        score,
        total_questions: total,
        answers,
        completed_at: None,
    }
}
