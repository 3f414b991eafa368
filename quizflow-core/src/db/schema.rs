//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: Quizzes, questions, results, live answers
    r#"
    CREATE TABLE IF NOT EXISTS quizzes (
        id                TEXT PRIMARY KEY,
        title             TEXT NOT NULL,
        description       TEXT NOT NULL DEFAULT '',
        time_per_question INTEGER NOT NULL CHECK (time_per_question > 0),
        quiz_type         TEXT,
        created_at        DATETIME,
        created_by        TEXT,
        room_code         TEXT,
        is_active         INTEGER NOT NULL DEFAULT 0
    );

    -- Question order is fixed at creation and carried by `position`
    CREATE TABLE IF NOT EXISTS quiz_questions (
        quiz_id        TEXT NOT NULL REFERENCES quizzes(id) ON DELETE CASCADE,
        id             TEXT NOT NULL,
        position       INTEGER NOT NULL,
        text           TEXT NOT NULL,
        options        JSON NOT NULL,
        correct_option INTEGER NOT NULL,
        PRIMARY KEY (quiz_id, id)
    );

    -- No foreign key on quiz_id: imported results may outlive their quiz
    CREATE TABLE IF NOT EXISTS quiz_results (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        quiz_id         TEXT NOT NULL,
        student_id      TEXT NOT NULL,
        student_name    TEXT NOT NULL,
        score           INTEGER NOT NULL,
        total_questions INTEGER NOT NULL,
        answers         JSON NOT NULL,
        completed_at    DATETIME,
        UNIQUE (quiz_id, student_id)
    );

    -- selected_option is -1 for a timeout
    CREATE TABLE IF NOT EXISTS student_answers (
        id                   INTEGER PRIMARY KEY AUTOINCREMENT,
        quiz_id              TEXT NOT NULL,
        question_id          TEXT NOT NULL,
        student_id           TEXT NOT NULL,
        student_name         TEXT NOT NULL,
        selected_option      INTEGER NOT NULL,
        time_spent           REAL NOT NULL,
        is_correct           INTEGER NOT NULL,
        points               INTEGER,
        submission_timestamp DATETIME
    );
    "#,
    // Version 2: Lookup indexes, one answer per student per question
    r#"
    CREATE INDEX IF NOT EXISTS idx_quiz_questions_position ON quiz_questions(quiz_id, position);
    CREATE INDEX IF NOT EXISTS idx_quiz_results_quiz ON quiz_results(quiz_id);
    CREATE UNIQUE INDEX IF NOT EXISTS idx_quizzes_room_code ON quizzes(room_code) WHERE room_code IS NOT NULL;
    CREATE UNIQUE INDEX IF NOT EXISTS idx_student_answers_unique
        ON student_answers(quiz_id, question_id, student_id);
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version = get_schema_version(conn)?;

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.pragma_update(None, "user_version", version)?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_tables_created() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        for table in ["quizzes", "quiz_questions", "quiz_results", "student_answers"] {
            let exists: i32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?",
                    [table],
                    |r| r.get(0),
                )
                .unwrap();
            assert_eq!(exists, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_questions_cascade_with_quiz() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        run_migrations(&conn).unwrap();

        let fk_list: Vec<String> = conn
            .prepare("PRAGMA foreign_key_list(quiz_questions)")
            .unwrap()
            .query_map([], |row| row.get::<_, String>(2))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();
        assert_eq!(fk_list, vec!["quizzes".to_string()]);
    }

    #[test]
    fn test_duplicate_answer_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let insert = "INSERT INTO student_answers
            (quiz_id, question_id, student_id, student_name, selected_option, time_spent, is_correct)
            VALUES ('quiz-1', 'q1', 's1', 'Ada', 0, 1.0, 1)";
        conn.execute(insert, []).unwrap();
        assert!(conn.execute(insert, []).is_err());
    }
}
