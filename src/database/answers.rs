use rusqlite::{params, OptionalExtension};

use super::database::{now_timestamp, patch, Database, DatabaseError};
use super::models::{AnswerChanges, NewStudentAnswer, StudentAnswer};

const ANSWER_COLUMNS: &str = "id, question_id, student_id, selected_option_id, answer_text, \
     quiz_id, assignment_id, marks_awarded, evaluated_by_ai, evaluated_by_teacher, feedback, \
     attempt_number, submitted_at";

impl Database {
    pub async fn create_answer(&self, answer: NewStudentAnswer) -> Result<i64, DatabaseError> {
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO student_answers
                        (question_id, student_id, selected_option_id, answer_text, quiz_id,
                         assignment_id, marks_awarded, evaluated_by_ai, attempt_number,
                         submitted_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    params![
                        answer.question_id,
                        answer.student_id,
                        answer.selected_option_id,
                        answer.answer_text,
                        answer.quiz_id,
                        answer.assignment_id,
                        answer.marks_awarded,
                        answer.evaluated_by_ai,
                        answer.attempt_number,
                        now_timestamp()
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn list_answers(&self) -> Result<Vec<StudentAnswer>, DatabaseError> {
        self.answers_where(None).await
    }

    pub async fn list_answers_for_student(
        &self,
        student_id: i64,
    ) -> Result<Vec<StudentAnswer>, DatabaseError> {
        self.answers_where(Some(("student_id", student_id))).await
    }

    pub async fn list_answers_for_question(
        &self,
        question_id: i64,
    ) -> Result<Vec<StudentAnswer>, DatabaseError> {
        self.answers_where(Some(("question_id", question_id))).await
    }

    async fn answers_where(
        &self,
        condition: Option<(&'static str, i64)>,
    ) -> Result<Vec<StudentAnswer>, DatabaseError> {
        let answers = self
            .conn
            .call(move |conn| {
                let (clause, value) = match condition {
                    Some((column, value)) => (format!("WHERE {} = ?1", column), Some(value)),
                    None => (String::new(), None),
                };
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM student_answers {} ORDER BY id",
                    ANSWER_COLUMNS, clause
                ))?;
                let rows = match value {
                    Some(value) => stmt
                        .query_map([value], StudentAnswer::from_row)?
                        .collect::<Result<Vec<_>, _>>()?,
                    None => stmt
                        .query_map([], StudentAnswer::from_row)?
                        .collect::<Result<Vec<_>, _>>()?,
                };
                Ok(rows)
            })
            .await?;
        Ok(answers)
    }

    pub async fn get_answer(&self, id: i64) -> Result<Option<StudentAnswer>, DatabaseError> {
        let answer = self
            .conn
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        &format!("SELECT {} FROM student_answers WHERE id = ?1", ANSWER_COLUMNS),
                        [id],
                        StudentAnswer::from_row,
                    )
                    .optional()?)
            })
            .await?;
        Ok(answer)
    }

    /// Teacher evaluation: marks, the teacher flag and feedback.
    pub async fn update_answer(
        &self,
        id: i64,
        changes: AnswerChanges,
    ) -> Result<Option<StudentAnswer>, DatabaseError> {
        let answer = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let (set_marks, marks_awarded) = patch(changes.marks_awarded);
                let (set_feedback, feedback) = patch(changes.feedback);
                let updated = tx.execute(
                    "UPDATE student_answers SET
                        marks_awarded = CASE WHEN ?2 THEN ?3 ELSE marks_awarded END,
                        evaluated_by_teacher = COALESCE(?4, evaluated_by_teacher),
                        feedback = CASE WHEN ?5 THEN ?6 ELSE feedback END
                     WHERE id = ?1",
                    params![
                        id,
                        set_marks,
                        marks_awarded,
                        changes.evaluated_by_teacher,
                        set_feedback,
                        feedback
                    ],
                )?;
                if updated == 0 {
                    return Ok(None);
                }
                let answer = tx.query_row(
                    &format!("SELECT {} FROM student_answers WHERE id = ?1", ANSWER_COLUMNS),
                    [id],
                    StudentAnswer::from_row,
                )?;
                tx.commit()?;
                Ok(Some(answer))
            })
            .await?;
        Ok(answer)
    }

    pub async fn delete_answer(&self, id: i64) -> Result<bool, DatabaseError> {
        let removed = self
            .conn
            .call(move |conn| {
                Ok(conn.execute("DELETE FROM student_answers WHERE id = ?1", [id])?)
            })
            .await?;
        Ok(removed > 0)
    }
}
