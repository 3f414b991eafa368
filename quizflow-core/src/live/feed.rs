//! Change feed and live dashboard analytics
//!
//! [`ChangeFeed`] fans out row-change events to every subscriber of a quiz,
//! one `tokio::sync::broadcast` channel per quiz id. [`LiveAnalytics`]
//! follows a quiz's channel and recomputes the full analytics from its
//! accumulated snapshot after each batch of events. It never patches
//! figures incrementally, so the live view always equals what the report
//! would say for the same data.
//!
//! A receiver that falls more than the channel capacity behind loses
//! events. [`LiveAnalytics::next_batch`] then answers [`Batch::Lagged`]
//! until the caller re-seeds it from storage with
//! [`LiveAnalytics::replace_results`].

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tokio::sync::broadcast;

use crate::analytics::{compute_quiz_analytics, QuizAnalytics};
use crate::scoring::rank_students;
use crate::types::{Quiz, QuizResult, SessionState, StudentAnswer, StudentRanking};

/// Default per-quiz channel capacity.
pub const DEFAULT_CAPACITY: usize = 256;

/// Outcome of [`LiveAnalytics::next_batch`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Batch<'a> {
    /// Every event since the last seed was applied
    Applied(&'a QuizAnalytics),
    /// Events were dropped since the last seed; the snapshot is incomplete
    /// until [`LiveAnalytics::replace_results`] is called
    Lagged(u64),
}

impl<'a> Batch<'a> {
    /// The analytics, if the snapshot is complete.
    pub fn applied(self) -> Option<&'a QuizAnalytics> {
        match self {
            Batch::Applied(analytics) => Some(analytics),
            Batch::Lagged(_) => None,
        }
    }
}

/// A change to a quiz's stored data.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    AnswerSubmitted(StudentAnswer),
    ResultSubmitted(QuizResult),
    SessionChanged { quiz_id: String, state: SessionState },
}

impl ChangeEvent {
    /// The quiz this event belongs to.
    pub fn quiz_id(&self) -> &str {
        match self {
            ChangeEvent::AnswerSubmitted(answer) => &answer.quiz_id,
            ChangeEvent::ResultSubmitted(result) => &result.quiz_id,
            ChangeEvent::SessionChanged { quiz_id, .. } => quiz_id,
        }
    }
}

/// Publish/subscribe hub keyed by quiz id.
pub struct ChangeFeed {
    channels: Mutex<HashMap<String, broadcast::Sender<ChangeEvent>>>,
    capacity: usize,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChangeFeed {
    /// Create a feed whose per-quiz channels buffer `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to every event published for `quiz_id` from now on.
    pub fn subscribe(&self, quiz_id: &str) -> broadcast::Receiver<ChangeEvent> {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        channels
            .entry(quiz_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Deliver an event to the quiz's subscribers.
    ///
    /// Returns how many subscribers received it; 0 when nobody is listening.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        let channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = channels.get(event.quiz_id()) else {
            tracing::trace!(quiz_id = %event.quiz_id(), "No subscribers for change event");
            return 0;
        };
        sender.send(event).unwrap_or(0)
    }

    /// Drop the quiz's channel. Subscribers see the stream end once they
    /// have drained buffered events.
    pub fn close(&self, quiz_id: &str) {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        if channels.remove(quiz_id).is_some() {
            tracing::debug!(quiz_id, "Closed change feed channel");
        }
    }

    /// Number of live subscribers for a quiz.
    pub fn subscriber_count(&self, quiz_id: &str) -> usize {
        let channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        channels.get(quiz_id).map_or(0, |s| s.receiver_count())
    }
}

/// Live analytics for one quiz, rebuilt from scratch after every batch.
///
/// Submitted results are authoritative. Students still answering contribute
/// a provisional result built from their answers so far.
pub struct LiveAnalytics {
    quiz: Quiz,
    results: Vec<QuizResult>,
    answers: Vec<StudentAnswer>,
    session_state: SessionState,
    version: u64,
    cache: Option<((String, u64), QuizAnalytics)>,
    recomputations: usize,
    missed: u64,
}

impl LiveAnalytics {
    pub fn new(quiz: Quiz) -> Self {
        Self {
            quiz,
            results: Vec::new(),
            answers: Vec::new(),
            session_state: SessionState::default(),
            version: 0,
            cache: None,
            recomputations: 0,
            missed: 0,
        }
    }

    /// Seed from stored results, e.g. when (re)joining a running quiz.
    pub fn with_results(quiz: Quiz, results: Vec<QuizResult>) -> Self {
        let mut live = Self::new(quiz);
        live.replace_results(results);
        live
    }

    /// Bumped on every write.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn session_state(&self) -> SessionState {
        self.session_state
    }

    /// How many times analytics were recomputed rather than served from cache.
    pub fn recomputations(&self) -> usize {
        self.recomputations
    }

    /// Events dropped by the feed since the last seed.
    pub fn missed_events(&self) -> u64 {
        self.missed
    }

    /// Whether events were lost since the last seed.
    pub fn is_stale(&self) -> bool {
        self.missed > 0
    }

    /// Replace the snapshot wholesale, e.g. after the feed lagged.
    pub fn replace_results(&mut self, results: Vec<QuizResult>) {
        self.results = results
            .into_iter()
            .filter(|r| r.quiz_id == self.quiz.id)
            .collect();
        self.answers.clear();
        self.missed = 0;
        self.invalidate();
    }

    /// Apply a batch of events. Events for other quizzes are ignored.
    /// Returns whether anything changed.
    pub fn apply<I>(&mut self, events: I) -> bool
    where
        I: IntoIterator<Item = ChangeEvent>,
    {
        let mut changed = false;
        for event in events {
            if event.quiz_id() != self.quiz.id {
                continue;
            }
            changed |= match event {
                ChangeEvent::AnswerSubmitted(answer) => self.record_answer(answer),
                ChangeEvent::ResultSubmitted(result) => {
                    // A resubmission replaces the student's earlier result
                    self.results.retain(|r| r.student_id != result.student_id);
                    self.results.push(result);
                    true
                }
                ChangeEvent::SessionChanged { state, .. } => {
                    let changed = self.session_state != state;
                    self.session_state = state;
                    changed
                }
            };
        }
        if changed {
            self.invalidate();
        }
        changed
    }

    /// Current analytics, recomputed only when the snapshot changed.
    pub fn analytics(&mut self) -> &QuizAnalytics {
        let key = (self.quiz.id.clone(), self.version);
        if self.cache.as_ref().is_some_and(|(cached, _)| *cached != key) {
            self.cache = None;
        }

        let (quiz, results, answers) = (&self.quiz, &self.results, &self.answers);
        let recomputations = &mut self.recomputations;
        &self
            .cache
            .get_or_insert_with(|| {
                *recomputations += 1;
                let snapshot = merged_results(quiz, results, answers);
                (key, compute_quiz_analytics(quiz, &snapshot))
            })
            .1
    }

    /// Submitted results plus provisional ones for students still answering.
    pub fn results(&self) -> Vec<QuizResult> {
        merged_results(&self.quiz, &self.results, &self.answers)
    }

    /// Leaderboard over every answer seen.
    pub fn rankings(&self) -> Vec<StudentRanking> {
        let answers: Vec<StudentAnswer> = self
            .results()
            .into_iter()
            .flat_map(|r| r.answers)
            .collect();
        rank_students(&answers)
    }

    /// Wait for the next batch of events on `rx` and apply it.
    ///
    /// Returns [`Batch::Applied`] with fresh analytics, or
    /// [`Batch::Lagged`] while events have been lost since the last seed.
    /// Returns `None` once the channel is closed.
    pub async fn next_batch(
        &mut self,
        rx: &mut broadcast::Receiver<ChangeEvent>,
    ) -> Option<Batch<'_>> {
        use broadcast::error::{RecvError, TryRecvError};

        let mut batch = Vec::new();
        loop {
            match rx.recv().await {
                Ok(event) => {
                    batch.push(event);
                    break;
                }
                Err(RecvError::Lagged(skipped)) => self.record_lag(skipped),
                Err(RecvError::Closed) => return None,
            }
        }
        // Drain whatever else is already queued into the same batch
        loop {
            match rx.try_recv() {
                Ok(event) => batch.push(event),
                Err(TryRecvError::Lagged(skipped)) => self.record_lag(skipped),
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }

        tracing::debug!(quiz_id = %self.quiz.id, events = batch.len(), "Applying change batch");
        self.apply(batch);

        if self.is_stale() {
            Some(Batch::Lagged(self.missed))
        } else {
            Some(Batch::Applied(self.analytics()))
        }
    }

    fn record_lag(&mut self, skipped: u64) {
        self.missed += skipped;
        tracing::warn!(
            quiz_id = %self.quiz.id,
            skipped,
            missed = self.missed,
            "Change feed lagged, snapshot needs re-seeding"
        );
    }

    fn record_answer(&mut self, answer: StudentAnswer) -> bool {
        let duplicate = self
            .answers
            .iter()
            .any(|a| a.student_id == answer.student_id && a.question_id == answer.question_id);
        if duplicate {
            tracing::debug!(
                student_id = %answer.student_id,
                question_id = %answer.question_id,
                "Ignoring duplicate answer event"
            );
            return false;
        }
        self.answers.push(answer);
        true
    }

    fn invalidate(&mut self) {
        self.version += 1;
        self.cache = None;
    }
}

fn merged_results(quiz: &Quiz, results: &[QuizResult], answers: &[StudentAnswer]) -> Vec<QuizResult> {
    let mut merged = results.to_vec();
    let total_questions = u32::try_from(quiz.questions.len()).unwrap_or(u32::MAX);

    for answer in answers {
        if results.iter().any(|r| r.student_id == answer.student_id) {
            continue;
        }
        match merged.iter_mut().find(|r| r.student_id == answer.student_id) {
            Some(provisional) => {
                if answer.correct {
                    provisional.score += 1;
                }
                provisional.answers.push(answer.clone());
            }
            None => merged.push(QuizResult {
                student_id: answer.student_id.clone(),
                student_name: answer.student_name.clone(),
                quiz_id: quiz.id.clone(),
                score: u32::from(answer.correct),
                total_questions,
                answers: vec![answer.clone()],
                completed_at: None,
            }),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QuizQuestion;

    fn quiz() -> Quiz {
        Quiz {
            id: "quiz-1".to_string(),
            title: "Capitals".to_string(),
            description: String::new(),
            time_per_question: 20,
            questions: vec![
                QuizQuestion {
                    id: "q1".to_string(),
                    text: "Capital of France?".to_string(),
                    options: vec!["Paris".into(), "Rome".into()],
                    correct_option: 0,
                },
                QuizQuestion {
                    id: "q2".to_string(),
                    text: "Capital of Italy?".to_string(),
                    options: vec!["Paris".into(), "Rome".into()],
                    correct_option: 1,
                },
            ],
            quiz_type: None,
            created_at: None,
            created_by: None,
            room_code: None,
            is_active: true,
        }
    }

    fn answer(student: &str, question: &str, option: usize, correct: bool) -> StudentAnswer {
        StudentAnswer {
            student_id: student.to_string(),
            student_name: student.to_uppercase(),
            quiz_id: "quiz-1".to_string(),
            question_id: question.to_string(),
            selected_option: Some(option),
            time_spent: 5.0,
            correct,
            points: None,
            submission_timestamp: None,
        }
    }

    fn result(student: &str, answers: Vec<StudentAnswer>) -> QuizResult {
        let score = answers.iter().filter(|a| a.correct).count() as u32;
        QuizResult {
            student_id: student.to_string(),
            student_name: student.to_uppercase(),
            quiz_id: "quiz-1".to_string(),
            score,
            total_questions: 2,
            answers,
            completed_at: None,
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let feed = ChangeFeed::default();
        assert_eq!(feed.publish(ChangeEvent::AnswerSubmitted(answer("s1", "q1", 0, true))), 0);
    }

    #[tokio::test]
    async fn test_events_are_keyed_by_quiz() {
        let feed = ChangeFeed::default();
        let mut quiz_one = feed.subscribe("quiz-1");
        let mut quiz_two = feed.subscribe("quiz-2");
        assert_eq!(feed.subscriber_count("quiz-1"), 1);

        let event = ChangeEvent::AnswerSubmitted(answer("s1", "q1", 0, true));
        assert_eq!(feed.publish(event.clone()), 1);

        assert_eq!(quiz_one.recv().await.unwrap(), event);
        assert!(matches!(
            quiz_two.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_close_ends_stream() {
        let feed = ChangeFeed::default();
        let mut rx = feed.subscribe("quiz-1");
        let mut live = LiveAnalytics::new(quiz());

        feed.publish(ChangeEvent::SessionChanged {
            quiz_id: "quiz-1".to_string(),
            state: SessionState::Active,
        });
        feed.close("quiz-1");

        assert!(matches!(live.next_batch(&mut rx).await, Some(Batch::Applied(_))));
        assert_eq!(live.session_state(), SessionState::Active);
        assert!(live.next_batch(&mut rx).await.is_none());
    }

    #[tokio::test]
    async fn test_next_batch_recomputes_once_per_batch() {
        let feed = ChangeFeed::default();
        let mut rx = feed.subscribe("quiz-1");
        let mut live = LiveAnalytics::new(quiz());

        feed.publish(ChangeEvent::AnswerSubmitted(answer("s1", "q1", 0, true)));
        feed.publish(ChangeEvent::AnswerSubmitted(answer("s2", "q1", 1, false)));

        let analytics = live.next_batch(&mut rx).await.unwrap().applied().unwrap();
        assert_eq!(analytics.total_students, 2);
        assert_eq!(analytics.questions[0].total_responses, 2);
        assert_eq!(live.recomputations(), 1);

        feed.publish(ChangeEvent::ResultSubmitted(result(
            "s1",
            vec![answer("s1", "q1", 0, true), answer("s1", "q2", 1, true)],
        )));
        let analytics = live.next_batch(&mut rx).await.unwrap().applied().unwrap();
        // s1 submitted 2/2, s2 is still provisional at 0/2
        assert_eq!(analytics.average_score, 50);
        assert_eq!(live.recomputations(), 2);
    }

    #[tokio::test]
    async fn test_lagged_feed_is_reported_until_reseeded() {
        let feed = ChangeFeed::new(1);
        let mut rx = feed.subscribe("quiz-1");
        let mut live = LiveAnalytics::new(quiz());

        let submitted: Vec<QuizResult> = ["s1", "s2", "s3"]
            .iter()
            .map(|id| result(id, vec![answer(id, "q1", 0, true)]))
            .collect();
        for r in &submitted {
            feed.publish(ChangeEvent::ResultSubmitted(r.clone()));
        }

        assert_eq!(live.next_batch(&mut rx).await, Some(Batch::Lagged(2)));
        assert!(live.is_stale());
        assert_eq!(live.missed_events(), 2);

        // Later events still apply but the snapshot stays incomplete
        feed.publish(ChangeEvent::AnswerSubmitted(answer("s4", "q1", 1, false)));
        assert_eq!(live.next_batch(&mut rx).await, Some(Batch::Lagged(2)));

        live.replace_results(submitted);
        assert!(!live.is_stale());
        assert_eq!(live.analytics().total_students, 3);

        feed.publish(ChangeEvent::AnswerSubmitted(answer("s4", "q1", 1, false)));
        let analytics = live.next_batch(&mut rx).await.unwrap().applied().unwrap();
        assert_eq!(analytics.total_students, 4);
    }

    #[test]
    fn test_cache_invalidated_on_write() {
        let mut live = LiveAnalytics::new(quiz());
        assert_eq!(live.analytics().total_students, 0);
        assert_eq!(live.analytics().total_students, 0);
        assert_eq!(live.recomputations(), 1);

        let before = live.version();
        assert!(live.apply(vec![ChangeEvent::ResultSubmitted(result(
            "s1",
            vec![answer("s1", "q1", 0, true)]
        ))]));
        assert!(live.version() > before);
        assert_eq!(live.analytics().total_students, 1);
        assert_eq!(live.recomputations(), 2);
    }

    #[test]
    fn test_apply_ignores_duplicates_and_other_quizzes() {
        let mut live = LiveAnalytics::new(quiz());
        assert!(live.apply(vec![ChangeEvent::AnswerSubmitted(answer("s1", "q1", 0, true))]));
        let version = live.version();

        let mut foreign = answer("s2", "q1", 0, true);
        foreign.quiz_id = "quiz-2".to_string();
        assert!(!live.apply(vec![
            ChangeEvent::AnswerSubmitted(answer("s1", "q1", 1, false)),
            ChangeEvent::AnswerSubmitted(foreign),
        ]));
        assert_eq!(live.version(), version);
        assert_eq!(live.results().len(), 1);
    }

    #[test]
    fn test_live_matches_batch_analytics() {
        let final_results = vec![
            result("s1", vec![answer("s1", "q1", 0, true), answer("s1", "q2", 1, true)]),
            result("s2", vec![answer("s2", "q1", 1, false), answer("s2", "q2", 1, true)]),
        ];

        let mut live = LiveAnalytics::new(quiz());
        live.apply(final_results.iter().cloned().map(ChangeEvent::ResultSubmitted));

        assert_eq!(
            live.analytics().clone(),
            compute_quiz_analytics(&quiz(), &final_results)
        );
    }

    #[test]
    fn test_result_replaces_provisional_answers() {
        let mut live = LiveAnalytics::new(quiz());
        live.apply(vec![
            ChangeEvent::AnswerSubmitted(answer("s1", "q1", 0, true)),
            ChangeEvent::AnswerSubmitted(answer("s1", "q2", 0, false)),
        ]);
        assert_eq!(live.results()[0].score, 1);
        assert_eq!(live.results()[0].answers.len(), 2);

        live.apply(vec![ChangeEvent::ResultSubmitted(result(
            "s1",
            vec![answer("s1", "q1", 0, true)],
        ))]);
        let results = live.results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].answers.len(), 1);
        assert_eq!(live.rankings()[0].total_marks, 1);
    }
}
