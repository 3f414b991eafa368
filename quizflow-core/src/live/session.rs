use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::error::Result;
use crate::scoring::{rank_students, ScoreTable};
use crate::types::{Quiz, QuizQuestion, QuizResult, QuizType, SessionState, StudentAnswer, StudentRanking};

/// Reasons a live session rejects an operation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("session is not active (currently {})", .0.as_str())]
    NotActive(SessionState),

    #[error("question {0} is closed")]
    QuestionClosed(String),

    #[error("student {student_id} already answered question {question_id}")]
    DuplicateAnswer {
        student_id: String,
        question_id: String,
    },

    #[error("question {question_id} has no option {option}")]
    UnknownOption { question_id: String, option: usize },

    #[error("cannot {action} a {} session", .state.as_str())]
    InvalidTransition {
        action: &'static str,
        state: SessionState,
    },
}

/// Lifecycle of the question currently on screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QuestionPhase {
    #[default]
    Idle,
    /// Accepting answers since `started_at` (server clock)
    Active { started_at: DateTime<Utc> },
    Closed,
}

#[derive(Debug, Clone)]
struct Participant {
    id: String,
    name: String,
}

/// One launched quiz.
///
/// `Created -> PreLaunch -> Active -> Completed`. While active, exactly one
/// question is current; it is `Active` until the host advances or, in
/// traditional mode, until its time budget runs out.
#[derive(Debug, Clone)]
pub struct LiveSession {
    quiz: Quiz,
    scoring: ScoreTable,
    state: SessionState,
    current: Option<usize>,
    phase: QuestionPhase,
    /// In join order
    participants: Vec<Participant>,
    answers: Vec<StudentAnswer>,
    completed_at: Option<DateTime<Utc>>,
}

impl LiveSession {
    /// Create a session for a validated quiz.
    pub fn new(quiz: Quiz, scoring: ScoreTable) -> Result<Self> {
        quiz.validate()?;
        Ok(Self {
            quiz,
            scoring,
            state: SessionState::Created,
            current: None,
            phase: QuestionPhase::Idle,
            participants: Vec::new(),
            answers: Vec::new(),
            completed_at: None,
        })
    }

    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn phase(&self) -> QuestionPhase {
        self.phase
    }

    /// Every accepted answer, in arrival order.
    pub fn answers(&self) -> &[StudentAnswer] {
        &self.answers
    }

    /// The question on screen, if any.
    pub fn current_question(&self) -> Option<&QuizQuestion> {
        self.current.and_then(|i| self.quiz.questions.get(i))
    }

    /// Zero-based position of the current question.
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    /// Open the waiting room.
    pub fn launch(&mut self) -> std::result::Result<(), SessionError> {
        self.transition("launch", SessionState::Created, SessionState::PreLaunch)
    }

    /// Register a student. Joining twice is a no-op.
    pub fn join(&mut self, student_id: &str, student_name: &str) -> std::result::Result<(), SessionError> {
        if matches!(self.state, SessionState::Created | SessionState::Completed) {
            return Err(SessionError::InvalidTransition {
                action: "join",
                state: self.state,
            });
        }
        self.register(student_id, student_name);
        Ok(())
    }

    /// Show the first question. A quiz without questions completes at once.
    pub fn start(&mut self, now: DateTime<Utc>) -> std::result::Result<(), SessionError> {
        self.transition("start", SessionState::PreLaunch, SessionState::Active)?;
        if self.quiz.questions.is_empty() {
            self.complete(now);
        } else {
            self.open_question(0, now);
        }
        Ok(())
    }

    /// Stop accepting answers for the current question without advancing.
    pub fn close_question(&mut self) -> std::result::Result<(), SessionError> {
        self.ensure_active()?;
        self.phase = QuestionPhase::Closed;
        Ok(())
    }

    /// Close the current question and open the next one, completing the
    /// session after the last. Returns the newly opened question.
    pub fn next_question(&mut self, now: DateTime<Utc>) -> std::result::Result<Option<&QuizQuestion>, SessionError> {
        self.ensure_active()?;
        self.phase = QuestionPhase::Closed;

        let next = self.current.map_or(0, |i| i + 1);
        if next < self.quiz.questions.len() {
            self.open_question(next, now);
            Ok(self.current_question())
        } else {
            self.complete(now);
            Ok(None)
        }
    }

    /// Advance the clock. In traditional mode the current question closes
    /// once its time budget has passed; fast-answer questions stay open
    /// until the host advances. Returns whether the question was closed.
    pub fn tick(&mut self, now: DateTime<Utc>) -> bool {
        if self.state != SessionState::Active || self.quiz.kind() != QuizType::Traditional {
            return false;
        }
        match self.phase {
            QuestionPhase::Active { started_at } if self.over_budget(started_at, now) => {
                self.phase = QuestionPhase::Closed;
                tracing::debug!(quiz_id = %self.quiz.id, question = ?self.current, "Question timed out");
                true
            }
            _ => false,
        }
    }

    /// Seconds since the current question opened, by the server clock.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Option<f64> {
        match self.phase {
            QuestionPhase::Active { started_at } => Some(elapsed_secs(started_at, now)),
            _ => None,
        }
    }

    /// Record a student's answer to the current question.
    ///
    /// `received_at` is when the server received the answer; elapsed time is
    /// measured from the server-side question start, so nothing the client
    /// reports about its own latency is used. `None` records an explicit
    /// timeout.
    pub fn submit(
        &mut self,
        student_id: &str,
        student_name: &str,
        selected_option: Option<usize>,
        received_at: DateTime<Utc>,
    ) -> std::result::Result<StudentAnswer, SessionError> {
        self.ensure_active()?;
        self.tick(received_at);

        let (index, started_at) = match (self.current, self.phase) {
            (Some(index), QuestionPhase::Active { started_at }) => (index, started_at),
            _ => {
                let id = self.current_question().map(|q| q.id.clone()).unwrap_or_default();
                return Err(SessionError::QuestionClosed(id));
            }
        };
        let question = &self.quiz.questions[index];

        if let Some(option) = selected_option {
            if !question.has_option(option) {
                return Err(SessionError::UnknownOption {
                    question_id: question.id.clone(),
                    option,
                });
            }
        }

        if self
            .answers
            .iter()
            .any(|a| a.student_id == student_id && a.question_id == question.id)
        {
            return Err(SessionError::DuplicateAnswer {
                student_id: student_id.to_string(),
                question_id: question.id.clone(),
            });
        }

        let elapsed = elapsed_secs(started_at, received_at);
        let correct = selected_option == Some(question.correct_option);
        let points = match self.quiz.kind() {
            QuizType::FastAnswer => Some(self.scoring.score(correct, elapsed)),
            QuizType::Traditional => None,
        };

        let answer = StudentAnswer {
            student_id: student_id.to_string(),
            student_name: student_name.to_string(),
            quiz_id: self.quiz.id.clone(),
            question_id: question.id.clone(),
            selected_option,
            time_spent: elapsed.min(f64::from(self.quiz.time_per_question)),
            correct,
            points,
            submission_timestamp: Some(received_at),
        };

        tracing::debug!(
            quiz_id = %answer.quiz_id,
            question_id = %answer.question_id,
            student_id = %answer.student_id,
            elapsed,
            correct,
            points = ?points,
            "Answer accepted"
        );

        self.register(student_id, student_name);
        self.answers.push(answer.clone());
        Ok(answer)
    }

    /// Fast-answer leaderboard over the answers so far.
    pub fn rankings(&self) -> Vec<StudentRanking> {
        rank_students(&self.answers)
    }

    /// One result per participant, in join order.
    pub fn results(&self) -> Vec<QuizResult> {
        let total_questions = u32::try_from(self.quiz.questions.len()).unwrap_or(u32::MAX);
        self.participants
            .iter()
            .map(|p| {
                let answers: Vec<StudentAnswer> = self
                    .answers
                    .iter()
                    .filter(|a| a.student_id == p.id)
                    .cloned()
                    .collect();
                let score = answers.iter().filter(|a| a.correct).count();
                QuizResult {
                    student_id: p.id.clone(),
                    student_name: p.name.clone(),
                    quiz_id: self.quiz.id.clone(),
                    score: u32::try_from(score).unwrap_or(u32::MAX),
                    total_questions,
                    answers,
                    completed_at: self.completed_at,
                }
            })
            .collect()
    }

    fn transition(
        &mut self,
        action: &'static str,
        from: SessionState,
        to: SessionState,
    ) -> std::result::Result<(), SessionError> {
        if self.state != from {
            return Err(SessionError::InvalidTransition {
                action,
                state: self.state,
            });
        }
        tracing::info!(quiz_id = %self.quiz.id, from = from.as_str(), to = to.as_str(), "Session state changed");
        self.state = to;
        Ok(())
    }

    fn ensure_active(&self) -> std::result::Result<(), SessionError> {
        if self.state == SessionState::Active {
            Ok(())
        } else {
            Err(SessionError::NotActive(self.state))
        }
    }

    fn open_question(&mut self, index: usize, now: DateTime<Utc>) {
        self.current = Some(index);
        self.phase = QuestionPhase::Active { started_at: now };
    }

    fn complete(&mut self, now: DateTime<Utc>) {
        tracing::info!(quiz_id = %self.quiz.id, answers = self.answers.len(), "Session completed");
        self.state = SessionState::Completed;
        self.phase = QuestionPhase::Closed;
        self.completed_at = Some(now);
    }

    fn register(&mut self, student_id: &str, student_name: &str) {
        if !self.participants.iter().any(|p| p.id == student_id) {
            self.participants.push(Participant {
                id: student_id.to_string(),
                name: student_name.to_string(),
            });
        }
    }

    fn over_budget(&self, started_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        elapsed_secs(started_at, now) > f64::from(self.quiz.time_per_question)
    }
}

/// Seconds between two instants, clamped at zero for clock skew.
fn elapsed_secs(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    ((to - from).num_milliseconds() as f64 / 1000.0).max(0.0)
}
