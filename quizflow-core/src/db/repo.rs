//! Database repository layer
//!
//! Provides query and insert operations for quizzes, results and live answers.

use crate::error::{Error, Result};
use crate::live::SessionError;
use crate::types::*;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Random codes tried before `launch_quiz` gives up
const ROOM_CODE_ATTEMPTS: usize = 16;

/// Database handle (single connection behind a mutex)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        tracing::debug!(path = %path.display(), "Opened database");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn();
        super::schema::run_migrations(&conn)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ============================================
    // Quiz operations
    // ============================================

    /// Insert or replace a quiz together with its questions.
    ///
    /// The quiz is validated first; question order is stored as given.
    pub fn upsert_quiz(&self, quiz: &Quiz) -> Result<()> {
        quiz.validate()?;

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        Self::write_quiz(&tx, quiz)?;
        tx.commit()?;

        tracing::debug!(quiz_id = %quiz.id, questions = quiz.questions.len(), "Stored quiz");
        Ok(())
    }

    /// Store quizzes and results in one transaction: either all of them
    /// are written or none are.
    pub fn import(&self, quizzes: &[Quiz], results: &[QuizResult]) -> Result<()> {
        for quiz in quizzes {
            quiz.validate()?;
        }

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for quiz in quizzes {
            Self::write_quiz(&tx, quiz)?;
        }
        for result in results {
            Self::write_result(&tx, result)?;
        }
        tx.commit()?;

        tracing::debug!(quizzes = quizzes.len(), results = results.len(), "Stored import");
        Ok(())
    }

    fn write_quiz(conn: &Connection, quiz: &Quiz) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO quizzes (id, title, description, time_per_question, quiz_type,
                                 created_at, created_by, room_code, is_active)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                time_per_question = excluded.time_per_question,
                quiz_type = excluded.quiz_type,
                created_at = excluded.created_at,
                created_by = excluded.created_by,
                room_code = excluded.room_code,
                is_active = excluded.is_active
            "#,
            params![
                quiz.id,
                quiz.title,
                quiz.description,
                quiz.time_per_question,
                quiz.quiz_type.map(|t| t.as_str()),
                quiz.created_at.map(|t| t.to_rfc3339()),
                quiz.created_by,
                quiz.room_code,
                quiz.is_active,
            ],
        )?;

        conn.execute("DELETE FROM quiz_questions WHERE quiz_id = ?", [&quiz.id])?;
        for (position, question) in quiz.questions.iter().enumerate() {
            conn.execute(
                r#"
                INSERT INTO quiz_questions (quiz_id, id, position, text, options, correct_option)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    quiz.id,
                    question.id,
                    position as i64,
                    question.text,
                    serde_json::to_string(&question.options)?,
                    question.correct_option as i64,
                ],
            )?;
        }

        Ok(())
    }

    /// Get a quiz by ID
    pub fn get_quiz(&self, id: &str) -> Result<Option<Quiz>> {
        let conn = self.conn();
        let quiz = conn
            .query_row("SELECT * FROM quizzes WHERE id = ?", [id], Self::row_to_quiz)
            .optional()?;
        quiz.map(|q| Self::with_questions(&conn, q)).transpose()
    }

    /// Get the quiz currently using a room code (case-insensitive)
    pub fn get_quiz_by_room_code(&self, room_code: &str) -> Result<Option<Quiz>> {
        let conn = self.conn();
        let quiz = conn
            .query_row(
                "SELECT * FROM quizzes WHERE room_code = ?",
                [room_code.trim().to_uppercase()],
                Self::row_to_quiz,
            )
            .optional()?;
        quiz.map(|q| Self::with_questions(&conn, q)).transpose()
    }

    /// List every quiz, newest first
    pub fn list_quizzes(&self) -> Result<Vec<Quiz>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT * FROM quizzes ORDER BY created_at IS NULL, created_at DESC, id ASC",
        )?;
        let quizzes = stmt
            .query_map([], Self::row_to_quiz)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        quizzes
            .into_iter()
            .map(|q| Self::with_questions(&conn, q))
            .collect()
    }

    /// Delete a quiz with its questions, results and answers.
    ///
    /// Returns false when no such quiz existed.
    pub fn delete_quiz(&self, id: &str) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM student_answers WHERE quiz_id = ?", [id])?;
        tx.execute("DELETE FROM quiz_results WHERE quiz_id = ?", [id])?;
        let deleted = tx.execute("DELETE FROM quizzes WHERE id = ?", [id])?;
        tx.commit()?;

        if deleted > 0 {
            tracing::info!(quiz_id = id, "Deleted quiz");
        }
        Ok(deleted > 0)
    }

    /// Launch (with a room code) or stop a quiz
    pub fn set_quiz_active(&self, id: &str, room_code: Option<&str>) -> Result<()> {
        let conn = self.conn();
        let updated = conn.execute(
            "UPDATE quizzes SET room_code = ?1, is_active = ?2 WHERE id = ?3",
            params![room_code, room_code.is_some(), id],
        )?;
        if updated == 0 {
            return Err(Error::QuizNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Launch a quiz under a fresh room code not used by any other quiz.
    pub fn launch_quiz(&self, id: &str) -> Result<String> {
        self.launch_quiz_with(id, super::generate_room_code)
    }

    fn launch_quiz_with(&self, id: &str, mut next_code: impl FnMut() -> String) -> Result<String> {
        for _ in 0..ROOM_CODE_ATTEMPTS {
            let code = next_code();
            let taken = self
                .get_quiz_by_room_code(&code)?
                .is_some_and(|quiz| quiz.id != id);
            if !taken {
                self.set_quiz_active(id, Some(&code))?;
                tracing::info!(quiz_id = id, room_code = %code, "Launched quiz");
                return Ok(code);
            }
        }
        Err(Error::RoomCodesExhausted {
            attempts: ROOM_CODE_ATTEMPTS,
        })
    }

    fn with_questions(conn: &Connection, mut quiz: Quiz) -> Result<Quiz> {
        let mut stmt = conn.prepare(
            "SELECT * FROM quiz_questions WHERE quiz_id = ? ORDER BY position ASC",
        )?;
        quiz.questions = stmt
            .query_map([&quiz.id], Self::row_to_question)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(quiz)
    }

    fn row_to_quiz(row: &Row) -> rusqlite::Result<Quiz> {
        let quiz_type: Option<String> = row.get("quiz_type")?;
        let created_at: Option<String> = row.get("created_at")?;

        Ok(Quiz {
            id: row.get("id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            time_per_question: row.get("time_per_question")?,
            questions: Vec::new(),
            quiz_type: quiz_type.and_then(|s| s.parse().ok()),
            created_at: parse_timestamp(created_at),
            created_by: row.get("created_by")?,
            room_code: row.get("room_code")?,
            is_active: row.get("is_active")?,
        })
    }

    fn row_to_question(row: &Row) -> rusqlite::Result<QuizQuestion> {
        let options: String = row.get("options")?;
        let correct_option: i64 = row.get("correct_option")?;

        Ok(QuizQuestion {
            id: row.get("id")?,
            text: row.get("text")?,
            options: serde_json::from_str(&options)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?,
            correct_option: usize::try_from(correct_option).unwrap_or(usize::MAX),
        })
    }

    // ============================================
    // Result operations
    // ============================================

    /// Insert a result; a student's resubmission replaces their earlier one.
    pub fn insert_result(&self, result: &QuizResult) -> Result<()> {
        Self::write_result(&self.conn(), result)
    }

    fn write_result(conn: &Connection, result: &QuizResult) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO quiz_results (quiz_id, student_id, student_name, score,
                                      total_questions, answers, completed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(quiz_id, student_id) DO UPDATE SET
                student_name = excluded.student_name,
                score = excluded.score,
                total_questions = excluded.total_questions,
                answers = excluded.answers,
                completed_at = excluded.completed_at
            "#,
            params![
                result.quiz_id,
                result.student_id,
                result.student_name,
                result.score,
                result.total_questions,
                serde_json::to_string(&result.answers)?,
                result.completed_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    /// Results for one quiz, in submission order
    pub fn get_results(&self, quiz_id: &str) -> Result<Vec<QuizResult>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT * FROM quiz_results WHERE quiz_id = ? ORDER BY id ASC")?;
        let results = stmt
            .query_map([quiz_id], Self::row_to_result)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(results)
    }

    /// Every stored result, in submission order
    pub fn list_results(&self) -> Result<Vec<QuizResult>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT * FROM quiz_results ORDER BY id ASC")?;
        let results = stmt
            .query_map([], Self::row_to_result)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(results)
    }

    fn row_to_result(row: &Row) -> rusqlite::Result<QuizResult> {
        let answers: String = row.get("answers")?;
        let completed_at: Option<String> = row.get("completed_at")?;

        Ok(QuizResult {
            student_id: row.get("student_id")?,
            student_name: row.get("student_name")?,
            quiz_id: row.get("quiz_id")?,
            score: row.get("score")?,
            total_questions: row.get("total_questions")?,
            answers: serde_json::from_str(&answers)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?,
            completed_at: parse_timestamp(completed_at),
        })
    }

    // ============================================
    // Live answer operations
    // ============================================

    /// Append a live answer. A second answer from the same student to the
    /// same question is rejected with [`SessionError::DuplicateAnswer`].
    pub fn insert_answer(&self, answer: &StudentAnswer) -> Result<i64> {
        let conn = self.conn();
        let inserted = conn.execute(
            r#"
            INSERT INTO student_answers (quiz_id, question_id, student_id, student_name,
                                         selected_option, time_spent, is_correct, points,
                                         submission_timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                answer.quiz_id,
                answer.question_id,
                answer.student_id,
                answer.student_name,
                selected_option::to_raw(answer.selected_option),
                answer.time_spent,
                answer.correct,
                answer.points,
                answer.submission_timestamp.map(|t| t.to_rfc3339()),
            ],
        );

        match inserted {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                Err(Error::Session(SessionError::DuplicateAnswer {
                    student_id: answer.student_id.clone(),
                    question_id: answer.question_id.clone(),
                }))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Live answers for a quiz, in arrival order
    pub fn get_quiz_answers(&self, quiz_id: &str) -> Result<Vec<StudentAnswer>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT * FROM student_answers WHERE quiz_id = ? ORDER BY id ASC")?;
        let answers = stmt
            .query_map([quiz_id], Self::row_to_answer)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(answers)
    }

    fn row_to_answer(row: &Row) -> rusqlite::Result<StudentAnswer> {
        let selected: i64 = row.get("selected_option")?;
        let submitted: Option<String> = row.get("submission_timestamp")?;

        Ok(StudentAnswer {
            student_id: row.get("student_id")?,
            student_name: row.get("student_name")?,
            quiz_id: row.get("quiz_id")?,
            question_id: row.get("question_id")?,
            selected_option: selected_option::to_index(selected),
            time_spent: row.get("time_spent")?,
            correct: row.get("is_correct")?,
            points: row.get("points")?,
            submission_timestamp: parse_timestamp(submitted),
        })
    }
}

fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn setup_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    fn sample_quiz(id: &str) -> Quiz {
        Quiz {
            id: id.to_string(),
            title: "Planets".to_string(),
            description: "Inner solar system".to_string(),
            time_per_question: 30,
            questions: vec![
                QuizQuestion {
                    id: "q2".to_string(),
                    text: "Largest planet?".to_string(),
                    options: vec!["Jupiter".into(), "Mars".into()],
                    correct_option: 0,
                },
                QuizQuestion {
                    id: "q1".to_string(),
                    text: "Red planet, \"the\" one?".to_string(),
                    options: vec!["Venus".into(), "Mars".into(), "Earth".into()],
                    correct_option: 1,
                },
            ],
            quiz_type: Some(QuizType::FastAnswer),
            created_at: Some(Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).unwrap()),
            created_by: Some("teacher-1".to_string()),
            room_code: None,
            is_active: false,
        }
    }

    fn sample_answer(student: &str, question: &str, selected: Option<usize>) -> StudentAnswer {
        StudentAnswer {
            student_id: student.to_string(),
            student_name: format!("Student {}", student),
            quiz_id: "quiz-1".to_string(),
            question_id: question.to_string(),
            selected_option: selected,
            time_spent: 4.5,
            correct: selected == Some(1),
            points: Some(800),
            submission_timestamp: Some(Utc.with_ymd_and_hms(2024, 4, 1, 12, 5, 0).unwrap()),
        }
    }

    fn sample_result(student: &str, score: u32) -> QuizResult {
        QuizResult {
            student_id: student.to_string(),
            student_name: format!("Student {}", student),
            quiz_id: "quiz-1".to_string(),
            score,
            total_questions: 2,
            answers: vec![sample_answer(student, "q1", Some(1)), sample_answer(student, "q2", None)],
            completed_at: Some(Utc.with_ymd_and_hms(2024, 4, 1, 12, 10, 0).unwrap()),
        }
    }

    #[test]
    fn test_quiz_roundtrip_keeps_question_order() {
        let db = setup_db();
        let quiz = sample_quiz("quiz-1");
        db.upsert_quiz(&quiz).unwrap();

        let loaded = db.get_quiz("quiz-1").unwrap().unwrap();
        assert_eq!(loaded, quiz);
        assert_eq!(loaded.questions[0].id, "q2");
        assert!(db.get_quiz("missing").unwrap().is_none());
    }

    #[test]
    fn test_upsert_replaces_questions() {
        let db = setup_db();
        let mut quiz = sample_quiz("quiz-1");
        db.upsert_quiz(&quiz).unwrap();

        quiz.title = "Planets II".to_string();
        quiz.questions.truncate(1);
        db.upsert_quiz(&quiz).unwrap();

        let loaded = db.get_quiz("quiz-1").unwrap().unwrap();
        assert_eq!(loaded.title, "Planets II");
        assert_eq!(loaded.questions.len(), 1);
    }

    #[test]
    fn test_upsert_rejects_invalid_quiz() {
        let db = setup_db();
        let mut quiz = sample_quiz("quiz-1");
        quiz.questions[0].correct_option = 5;
        assert!(matches!(db.upsert_quiz(&quiz), Err(Error::InvalidQuiz { .. })));
        assert!(db.list_quizzes().unwrap().is_empty());
    }

    #[test]
    fn test_room_code_lookup() {
        let db = setup_db();
        db.upsert_quiz(&sample_quiz("quiz-1")).unwrap();
        db.set_quiz_active("quiz-1", Some("AB12CD")).unwrap();

        let found = db.get_quiz_by_room_code(" ab12cd ").unwrap().unwrap();
        assert_eq!(found.id, "quiz-1");
        assert!(found.is_active);

        db.set_quiz_active("quiz-1", None).unwrap();
        assert!(db.get_quiz_by_room_code("AB12CD").unwrap().is_none());
        assert!(matches!(
            db.set_quiz_active("missing", None),
            Err(Error::QuizNotFound(_))
        ));
    }

    #[test]
    fn test_launch_quiz_assigns_room_code() {
        let db = setup_db();
        db.upsert_quiz(&sample_quiz("quiz-1")).unwrap();

        let code = db.launch_quiz("quiz-1").unwrap();
        assert_eq!(code.len(), super::super::ROOM_CODE_LEN);
        assert_eq!(db.get_quiz_by_room_code(&code).unwrap().unwrap().id, "quiz-1");
        assert!(db.launch_quiz("missing").is_err());
    }

    #[test]
    fn test_launch_quiz_gives_up_when_codes_collide() {
        let db = setup_db();
        db.upsert_quiz(&sample_quiz("quiz-1")).unwrap();
        db.upsert_quiz(&sample_quiz("quiz-2")).unwrap();
        db.set_quiz_active("quiz-1", Some("TAKEN1")).unwrap();

        let mut tries = 0;
        let err = db
            .launch_quiz_with("quiz-2", || {
                tries += 1;
                "TAKEN1".to_string()
            })
            .unwrap_err();
        assert!(matches!(err, Error::RoomCodesExhausted { attempts } if attempts == tries));
        assert!(!db.get_quiz("quiz-2").unwrap().unwrap().is_active);

        // Relaunching keeps a code the quiz already holds
        assert_eq!(
            db.launch_quiz_with("quiz-1", || "TAKEN1".to_string()).unwrap(),
            "TAKEN1"
        );
    }

    #[test]
    fn test_list_quizzes_newest_first() {
        let db = setup_db();
        let older = sample_quiz("older");
        let mut newer = sample_quiz("newer");
        newer.created_at = Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
        let mut undated = sample_quiz("undated");
        undated.created_at = None;

        db.upsert_quiz(&undated).unwrap();
        db.upsert_quiz(&older).unwrap();
        db.upsert_quiz(&newer).unwrap();

        let ids: Vec<String> = db.list_quizzes().unwrap().into_iter().map(|q| q.id).collect();
        assert_eq!(ids, vec!["newer", "older", "undated"]);
    }

    #[test]
    fn test_results_roundtrip_and_resubmission() {
        let db = setup_db();
        db.insert_result(&sample_result("s1", 1)).unwrap();
        db.insert_result(&sample_result("s2", 0)).unwrap();
        db.insert_result(&sample_result("s1", 2)).unwrap();

        let results = db.get_results("quiz-1").unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].student_id, "s1");
        assert_eq!(results[0].score, 2);
        assert_eq!(results[0].answers[1].selected_option, None);
        assert_eq!(results[1], sample_result("s2", 0));

        assert_eq!(db.list_results().unwrap().len(), 2);
        assert!(db.get_results("other").unwrap().is_empty());
    }

    #[test]
    fn test_answers_and_duplicates() {
        let db = setup_db();
        db.insert_answer(&sample_answer("s1", "q1", Some(1))).unwrap();
        db.insert_answer(&sample_answer("s2", "q1", None)).unwrap();

        let err = db.insert_answer(&sample_answer("s1", "q1", Some(0))).unwrap_err();
        assert!(matches!(
            err,
            Error::Session(SessionError::DuplicateAnswer { .. })
        ));

        let answers = db.get_quiz_answers("quiz-1").unwrap();
        assert_eq!(answers.len(), 2);
        assert_eq!(answers[0], sample_answer("s1", "q1", Some(1)));
        assert_eq!(answers[1].selected_option, None);
    }

    #[test]
    fn test_answer_constraint_failures_are_not_duplicates() {
        let db = setup_db();
        // SQLite binds NaN as NULL, which fails the NOT NULL column
        let mut answer = sample_answer("s1", "q1", Some(1));
        answer.time_spent = f64::NAN;

        let err = db.insert_answer(&answer).unwrap_err();
        assert!(matches!(err, Error::Database(_)), "got {err:?}");
        assert!(db.get_quiz_answers("quiz-1").unwrap().is_empty());
    }

    #[test]
    fn test_import_is_all_or_nothing() {
        let db = setup_db();
        db.upsert_quiz(&sample_quiz("quiz-1")).unwrap();

        let mut retitled = sample_quiz("quiz-1");
        retitled.title = "Outer planets".to_string();
        let mut bad = sample_quiz("quiz-2");
        bad.questions[1].options.truncate(1);

        db.import(&[retitled.clone()], &[sample_result("s1", 1)]).unwrap();
        assert_eq!(db.get_quiz("quiz-1").unwrap().unwrap().title, "Outer planets");

        let mut renamed = retitled;
        renamed.title = "Dwarf planets".to_string();
        assert!(matches!(
            db.import(&[renamed, bad], &[sample_result("s2", 0)]),
            Err(Error::InvalidQuiz { .. })
        ));
        assert_eq!(db.get_quiz("quiz-1").unwrap().unwrap().title, "Outer planets");
        assert_eq!(db.list_results().unwrap().len(), 1);
    }

    #[test]
    fn test_delete_quiz_removes_dependents() {
        let db = setup_db();
        db.upsert_quiz(&sample_quiz("quiz-1")).unwrap();
        db.insert_result(&sample_result("s1", 1)).unwrap();
        db.insert_answer(&sample_answer("s1", "q1", Some(1))).unwrap();

        assert!(db.delete_quiz("quiz-1").unwrap());
        assert!(!db.delete_quiz("quiz-1").unwrap());
        assert!(db.get_quiz("quiz-1").unwrap().is_none());
        assert!(db.get_results("quiz-1").unwrap().is_empty());
        assert!(db.get_quiz_answers("quiz-1").unwrap().is_empty());
    }

    #[test]
    fn test_open_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("quizflow.db");
        let db = Database::open(&path).unwrap();
        db.migrate().unwrap();
        assert!(path.exists());
    }
}
