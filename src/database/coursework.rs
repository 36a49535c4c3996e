use rusqlite::{params, OptionalExtension};

use super::database::{now_timestamp, patch, Database, DatabaseError};
use super::models::{Assignment, AssignmentChanges, Question, Quiz, QuizChanges};

const QUIZ_COLUMNS: &str = "id, title, total_marks, course_id, created_by, created_at";
const ASSIGNMENT_COLUMNS: &str =
    "id, title, description, total_marks, due_date, course_id, created_by, created_at";
pub(crate) const QUESTION_COLUMNS: &str =
    "id, question_text, question_type, marks, quiz_id, assignment_id, created_by, created_at";

impl Database {
    pub async fn create_quiz(
        &self,
        title: String,
        total_marks: Option<i64>,
        course_id: i64,
        created_by: Option<i64>,
    ) -> Result<i64, DatabaseError> {
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO quizzes (title, total_marks, course_id, created_by, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![title, total_marks, course_id, created_by, now_timestamp()],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn list_quizzes(&self, course_id: Option<i64>) -> Result<Vec<Quiz>, DatabaseError> {
        let quizzes = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM quizzes WHERE (?1 IS NULL OR course_id = ?1) ORDER BY id",
                    QUIZ_COLUMNS
                ))?;
                let rows = stmt.query_map([course_id], Quiz::from_row)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await?;
        Ok(quizzes)
    }

    pub async fn get_quiz(&self, id: i64) -> Result<Option<Quiz>, DatabaseError> {
        let quiz = self
            .conn
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        &format!("SELECT {} FROM quizzes WHERE id = ?1", QUIZ_COLUMNS),
                        [id],
                        Quiz::from_row,
                    )
                    .optional()?)
            })
            .await?;
        Ok(quiz)
    }

    pub async fn update_quiz(
        &self,
        id: i64,
        changes: QuizChanges,
    ) -> Result<Option<Quiz>, DatabaseError> {
        let quiz = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let (set_marks, total_marks) = patch(changes.total_marks);
                let (set_creator, created_by) = patch(changes.created_by);
                let updated = tx.execute(
                    "UPDATE quizzes SET
                        title = COALESCE(?2, title),
                        total_marks = CASE WHEN ?3 THEN ?4 ELSE total_marks END,
                        course_id = COALESCE(?5, course_id),
                        created_by = CASE WHEN ?6 THEN ?7 ELSE created_by END
                     WHERE id = ?1",
                    params![
                        id,
                        changes.title,
                        set_marks,
                        total_marks,
                        changes.course_id,
                        set_creator,
                        created_by
                    ],
                )?;
                if updated == 0 {
                    return Ok(None);
                }
                let quiz = tx.query_row(
                    &format!("SELECT {} FROM quizzes WHERE id = ?1", QUIZ_COLUMNS),
                    [id],
                    Quiz::from_row,
                )?;
                tx.commit()?;
                Ok(Some(quiz))
            })
            .await?;
        Ok(quiz)
    }

    pub async fn delete_quiz(&self, id: i64) -> Result<bool, DatabaseError> {
        let removed = self
            .conn
            .call(move |conn| Ok(conn.execute("DELETE FROM quizzes WHERE id = ?1", [id])?))
            .await?;
        Ok(removed > 0)
    }

    pub async fn list_questions_for_quiz(&self, quiz_id: i64) -> Result<Vec<Question>, DatabaseError> {
        self.questions_where("quiz_id", quiz_id).await
    }

    pub async fn create_assignment(
        &self,
        title: String,
        description: Option<String>,
        total_marks: Option<i64>,
        due_date: Option<String>,
        course_id: i64,
        created_by: Option<i64>,
    ) -> Result<i64, DatabaseError> {
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO assignments
                        (title, description, total_marks, due_date, course_id, created_by, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        title,
                        description,
                        total_marks,
                        due_date,
                        course_id,
                        created_by,
                        now_timestamp()
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn list_assignments(
        &self,
        course_id: Option<i64>,
    ) -> Result<Vec<Assignment>, DatabaseError> {
        let assignments = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM assignments WHERE (?1 IS NULL OR course_id = ?1) ORDER BY id",
                    ASSIGNMENT_COLUMNS
                ))?;
                let rows = stmt.query_map([course_id], Assignment::from_row)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await?;
        Ok(assignments)
    }

    pub async fn get_assignment(&self, id: i64) -> Result<Option<Assignment>, DatabaseError> {
        let assignment = self
            .conn
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        &format!("SELECT {} FROM assignments WHERE id = ?1", ASSIGNMENT_COLUMNS),
                        [id],
                        Assignment::from_row,
                    )
                    .optional()?)
            })
            .await?;
        Ok(assignment)
    }

    pub async fn update_assignment(
        &self,
        id: i64,
        changes: AssignmentChanges,
    ) -> Result<Option<Assignment>, DatabaseError> {
        let assignment = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let (set_description, description) = patch(changes.description);
                let (set_marks, total_marks) = patch(changes.total_marks);
                let (set_due, due_date) = patch(changes.due_date);
                let (set_creator, created_by) = patch(changes.created_by);
                let updated = tx.execute(
                    "UPDATE assignments SET
                        title = COALESCE(?2, title),
                        description = CASE WHEN ?3 THEN ?4 ELSE description END,
                        total_marks = CASE WHEN ?5 THEN ?6 ELSE total_marks END,
                        due_date = CASE WHEN ?7 THEN ?8 ELSE due_date END,
                        course_id = COALESCE(?9, course_id),
                        created_by = CASE WHEN ?10 THEN ?11 ELSE created_by END
                     WHERE id = ?1",
                    params![
                        id,
                        changes.title,
                        set_description,
                        description,
                        set_marks,
                        total_marks,
                        set_due,
                        due_date,
                        changes.course_id,
                        set_creator,
                        created_by
                    ],
                )?;
                if updated == 0 {
                    return Ok(None);
                }
                let assignment = tx.query_row(
                    &format!("SELECT {} FROM assignments WHERE id = ?1", ASSIGNMENT_COLUMNS),
                    [id],
                    Assignment::from_row,
                )?;
                tx.commit()?;
                Ok(Some(assignment))
            })
            .await?;
        Ok(assignment)
    }

    pub async fn delete_assignment(&self, id: i64) -> Result<bool, DatabaseError> {
        let removed = self
            .conn
            .call(move |conn| Ok(conn.execute("DELETE FROM assignments WHERE id = ?1", [id])?))
            .await?;
        Ok(removed > 0)
    }

    pub async fn list_questions_for_assignment(
        &self,
        assignment_id: i64,
    ) -> Result<Vec<Question>, DatabaseError> {
        self.questions_where("assignment_id", assignment_id).await
    }

    async fn questions_where(
        &self,
        column: &'static str,
        id: i64,
    ) -> Result<Vec<Question>, DatabaseError> {
        let questions = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM questions WHERE {} = ?1 ORDER BY id",
                    QUESTION_COLUMNS, column
                ))?;
                let rows = stmt.query_map([id], Question::from_row)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await?;
        Ok(questions)
    }
}
