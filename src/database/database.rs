use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio_rusqlite::Connection;
use tracing::info;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] tokio_rusqlite::Error),
    #[error("Database connection error: {0}")]
    Connection(String),
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL CHECK (role IN ('admin', 'teacher', 'student')),
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS programs (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        description TEXT,
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS courses (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        code TEXT NOT NULL UNIQUE,
        credit_hours INTEGER,
        program_id INTEGER REFERENCES programs(id) ON DELETE SET NULL,
        created_by INTEGER REFERENCES users(id) ON DELETE SET NULL,
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS course_teachers (
        course_id INTEGER NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        PRIMARY KEY (course_id, user_id)
    );
    CREATE TABLE IF NOT EXISTS course_students (
        course_id INTEGER NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        PRIMARY KEY (course_id, user_id)
    );
    CREATE TABLE IF NOT EXISTS quizzes (
        id INTEGER PRIMARY KEY,
        title TEXT NOT NULL,
        total_marks INTEGER,
        course_id INTEGER NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
        created_by INTEGER REFERENCES users(id) ON DELETE SET NULL,
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS assignments (
        id INTEGER PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT,
        total_marks INTEGER,
        due_date TEXT,
        course_id INTEGER NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
        created_by INTEGER REFERENCES users(id) ON DELETE SET NULL,
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS questions (
        id INTEGER PRIMARY KEY,
        question_text TEXT NOT NULL,
        question_type TEXT,
        marks INTEGER,
        quiz_id INTEGER REFERENCES quizzes(id) ON DELETE CASCADE,
        assignment_id INTEGER REFERENCES assignments(id) ON DELETE CASCADE,
        created_by INTEGER REFERENCES users(id) ON DELETE SET NULL,
        created_at TEXT NOT NULL,
        CHECK (quiz_id IS NULL OR assignment_id IS NULL)
    );
    CREATE TABLE IF NOT EXISTS question_options (
        id INTEGER PRIMARY KEY,
        question_id INTEGER NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
        option_text TEXT NOT NULL,
        is_correct INTEGER NOT NULL DEFAULT 0,
        order_index INTEGER NOT NULL DEFAULT 0
    );
    CREATE TABLE IF NOT EXISTS student_answers (
        id INTEGER PRIMARY KEY,
        question_id INTEGER NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
        student_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        selected_option_id INTEGER REFERENCES question_options(id) ON DELETE SET NULL,
        answer_text TEXT,
        quiz_id INTEGER REFERENCES quizzes(id) ON DELETE SET NULL,
        assignment_id INTEGER REFERENCES assignments(id) ON DELETE SET NULL,
        marks_awarded REAL,
        evaluated_by_ai INTEGER NOT NULL DEFAULT 0,
        evaluated_by_teacher INTEGER NOT NULL DEFAULT 0,
        feedback TEXT,
        attempt_number INTEGER NOT NULL DEFAULT 1,
        submitted_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_questions_quiz ON questions(quiz_id);
    CREATE INDEX IF NOT EXISTS idx_questions_assignment ON questions(assignment_id);
    CREATE INDEX IF NOT EXISTS idx_options_question ON question_options(question_id);
    CREATE INDEX IF NOT EXISTS idx_answers_question ON student_answers(question_id);
    CREATE INDEX IF NOT EXISTS idx_answers_student ON student_answers(student_id);
";

/// Handle to the LMS SQLite store. Cheap to clone; every clone talks to the
/// same background connection thread.
#[derive(Clone)]
pub struct Database {
    pub(crate) conn: Arc<Connection>,
}

impl Database {
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, DatabaseError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if path != Path::new(":memory:") {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DatabaseError::Connection(e.to_string()))?;
            }
        }

        let conn = Connection::open(path)
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        let db = Self {
            conn: Arc::new(conn),
        };
        db.initialize().await?;
        Ok(db)
    }

    pub async fn in_memory() -> Result<Self, DatabaseError> {
        Self::new(":memory:").await
    }

    async fn initialize(&self) -> Result<(), DatabaseError> {
        self.conn
            .call(|conn| {
                conn.execute_batch("PRAGMA foreign_keys = ON;")?;
                conn.execute_batch(SCHEMA)?;
                Ok(())
            })
            .await?;

        info!("Database initialized successfully");
        Ok(())
    }
}

pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Splits a partial-update field into a "was given" flag and the new value,
/// bound as `CASE WHEN ?set THEN ?value ELSE col END`.
pub(crate) fn patch<T>(field: Option<Option<T>>) -> (bool, Option<T>) {
    match field {
        Some(value) => (true, value),
        None => (false, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn schema_is_idempotent() {
        let db = Database::in_memory().await.unwrap();
        db.initialize().await.unwrap();

        let fk_enabled: i64 = db
            .conn
            .call(|conn| Ok(conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?))
            .await
            .unwrap();
        assert_eq!(fk_enabled, 1);
    }
}
