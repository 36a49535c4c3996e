use rusqlite::{params, OptionalExtension, Transaction};
use std::collections::BTreeMap;

use super::coursework::QUESTION_COLUMNS;
use super::database::{now_timestamp, patch, Database, DatabaseError};
use super::models::{
    NewOption, NewQuestion, NewQuizWithQuestions, OptionChanges, Question, QuestionChanges,
    QuestionDetail, QuestionFilter, QuestionOption, QuestionSummary,
};

const OPTION_COLUMNS: &str = "id, question_id, option_text, is_correct, order_index";

fn insert_question(tx: &Transaction<'_>, question: &NewQuestion) -> rusqlite::Result<i64> {
    tx.execute(
        "INSERT INTO questions
            (question_text, question_type, marks, quiz_id, assignment_id, created_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            question.question_text,
            question.question_type,
            question.marks,
            question.quiz_id,
            question.assignment_id,
            question.created_by,
            now_timestamp()
        ],
    )?;
    let question_id = tx.last_insert_rowid();

    let mut stmt = tx.prepare(
        "INSERT INTO question_options (question_id, option_text, is_correct, order_index)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    for option in &question.options {
        stmt.execute(params![
            question_id,
            option.option_text,
            option.is_correct,
            option.order_index
        ])?;
    }
    Ok(question_id)
}

impl Database {
    /// Inserts the question and its MCQ options atomically.
    pub async fn create_question_with_options(
        &self,
        question: NewQuestion,
    ) -> Result<i64, DatabaseError> {
        let id = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let id = insert_question(&tx, &question)?;
                tx.commit()?;
                Ok(id)
            })
            .await?;
        Ok(id)
    }

    pub async fn list_questions(
        &self,
        filter: QuestionFilter,
    ) -> Result<Vec<QuestionSummary>, DatabaseError> {
        let questions = self
            .conn
            .call(move |conn| {
                let mut sql = format!(
                    "SELECT {},
                        (SELECT COUNT(*) FROM question_options o WHERE o.question_id = q.id) AS options_count,
                        (SELECT COUNT(*) FROM student_answers a WHERE a.question_id = q.id) AS answers_count
                     FROM questions q WHERE 1 = 1",
                    QUESTION_COLUMNS
                );
                let mut values: Vec<rusqlite::types::Value> = Vec::new();

                if let Some(quiz_id) = filter.quiz_id {
                    sql.push_str(" AND quiz_id = ?");
                    values.push(quiz_id.into());
                }
                if let Some(assignment_id) = filter.assignment_id {
                    sql.push_str(" AND assignment_id = ?");
                    values.push(assignment_id.into());
                }
                if let Some(created_by) = filter.created_by {
                    sql.push_str(" AND created_by = ?");
                    values.push(created_by.into());
                }
                if let Some(question_type) = filter.question_type {
                    sql.push_str(" AND lower(question_type) = lower(?)");
                    values.push(question_type.into());
                }
                if let Some(contains) = filter.contains {
                    sql.push_str(" AND question_text LIKE '%' || ? || '%'");
                    values.push(contains.into());
                }
                if let Some(min_marks) = filter.min_marks {
                    sql.push_str(" AND marks >= ?");
                    values.push(min_marks.into());
                }
                if let Some(max_marks) = filter.max_marks {
                    sql.push_str(" AND marks <= ?");
                    values.push(max_marks.into());
                }
                sql.push_str(" ORDER BY q.id");

                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(rusqlite::params_from_iter(values), |row| {
                    Ok(QuestionSummary {
                        question: Question::from_row(row)?,
                        options_count: row.get("options_count")?,
                        student_answers_count: row.get("answers_count")?,
                    })
                })?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await?;
        Ok(questions)
    }

    /// Case-insensitive keyword search over question text.
    pub async fn search_questions(
        &self,
        keyword: String,
        question_type: Option<String>,
        min_marks: Option<i64>,
        max_marks: Option<i64>,
    ) -> Result<Vec<Question>, DatabaseError> {
        let summaries = self
            .list_questions(QuestionFilter {
                contains: Some(keyword),
                question_type,
                min_marks,
                max_marks,
                ..Default::default()
            })
            .await?;
        Ok(summaries.into_iter().map(|s| s.question).collect())
    }

    /// Question counts keyed by type; untyped questions are reported as `unspecified`.
    pub async fn count_questions_by_type(&self) -> Result<BTreeMap<String, i64>, DatabaseError> {
        let counts = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT question_type, COUNT(id) FROM questions GROUP BY question_type",
                )?;
                let rows = stmt.query_map([], |row| {
                    let question_type: Option<String> = row.get(0)?;
                    let count: i64 = row.get(1)?;
                    Ok((question_type, count))
                })?;

                let mut counts = BTreeMap::new();
                for row in rows {
                    let (question_type, count) = row?;
                    let key = question_type
                        .filter(|t| !t.is_empty())
                        .unwrap_or_else(|| "unspecified".to_string());
                    *counts.entry(key).or_insert(0) += count;
                }
                Ok(counts)
            })
            .await?;
        Ok(counts)
    }

    pub async fn get_question(&self, id: i64) -> Result<Option<Question>, DatabaseError> {
        let question = self
            .conn
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        &format!("SELECT {} FROM questions WHERE id = ?1", QUESTION_COLUMNS),
                        [id],
                        Question::from_row,
                    )
                    .optional()?)
            })
            .await?;
        Ok(question)
    }

    pub async fn get_question_detail(&self, id: i64) -> Result<Option<QuestionDetail>, DatabaseError> {
        let Some(question) = self.get_question(id).await? else {
            return Ok(None);
        };
        let options = self.list_options_for_question(id).await?;
        let student_answers_count = self
            .conn
            .call(move |conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM student_answers WHERE question_id = ?1",
                    [id],
                    |row| row.get(0),
                )?)
            })
            .await?;

        Ok(Some(QuestionDetail {
            question,
            options,
            student_answers_count,
        }))
    }

    pub async fn update_question(
        &self,
        id: i64,
        changes: QuestionChanges,
    ) -> Result<Option<Question>, DatabaseError> {
        let question = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let (set_type, question_type) = patch(changes.question_type);
                let (set_marks, marks) = patch(changes.marks);
                let (set_quiz, quiz_id) = patch(changes.quiz_id);
                let (set_assignment, assignment_id) = patch(changes.assignment_id);
                let updated = tx.execute(
                    "UPDATE questions SET
                        question_text = COALESCE(?2, question_text),
                        question_type = CASE WHEN ?3 THEN ?4 ELSE question_type END,
                        marks = CASE WHEN ?5 THEN ?6 ELSE marks END,
                        quiz_id = CASE WHEN ?7 THEN ?8 ELSE quiz_id END,
                        assignment_id = CASE WHEN ?9 THEN ?10 ELSE assignment_id END
                     WHERE id = ?1",
                    params![
                        id,
                        changes.question_text,
                        set_type,
                        question_type,
                        set_marks,
                        marks,
                        set_quiz,
                        quiz_id,
                        set_assignment,
                        assignment_id
                    ],
                )?;
                if updated == 0 {
                    return Ok(None);
                }
                let question = tx.query_row(
                    &format!("SELECT {} FROM questions WHERE id = ?1", QUESTION_COLUMNS),
                    [id],
                    Question::from_row,
                )?;
                tx.commit()?;
                Ok(Some(question))
            })
            .await?;
        Ok(question)
    }

    pub async fn delete_question(&self, id: i64) -> Result<bool, DatabaseError> {
        let removed = self
            .conn
            .call(move |conn| Ok(conn.execute("DELETE FROM questions WHERE id = ?1", [id])?))
            .await?;
        Ok(removed > 0)
    }

    pub async fn create_option(
        &self,
        question_id: i64,
        option: NewOption,
    ) -> Result<i64, DatabaseError> {
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO question_options (question_id, option_text, is_correct, order_index)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        question_id,
                        option.option_text,
                        option.is_correct,
                        option.order_index
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn list_options(&self) -> Result<Vec<QuestionOption>, DatabaseError> {
        let options = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM question_options ORDER BY question_id, order_index, id",
                    OPTION_COLUMNS
                ))?;
                let rows = stmt.query_map([], QuestionOption::from_row)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await?;
        Ok(options)
    }

    pub async fn list_options_for_question(
        &self,
        question_id: i64,
    ) -> Result<Vec<QuestionOption>, DatabaseError> {
        let options = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM question_options WHERE question_id = ?1 ORDER BY order_index, id",
                    OPTION_COLUMNS
                ))?;
                let rows = stmt.query_map([question_id], QuestionOption::from_row)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await?;
        Ok(options)
    }

    pub async fn get_option(&self, id: i64) -> Result<Option<QuestionOption>, DatabaseError> {
        let option = self
            .conn
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        &format!("SELECT {} FROM question_options WHERE id = ?1", OPTION_COLUMNS),
                        [id],
                        QuestionOption::from_row,
                    )
                    .optional()?)
            })
            .await?;
        Ok(option)
    }

    pub async fn update_option(
        &self,
        id: i64,
        changes: OptionChanges,
    ) -> Result<Option<QuestionOption>, DatabaseError> {
        let option = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let updated = tx.execute(
                    "UPDATE question_options SET
                        option_text = COALESCE(?2, option_text),
                        is_correct = COALESCE(?3, is_correct),
                        order_index = COALESCE(?4, order_index)
                     WHERE id = ?1",
                    params![id, changes.option_text, changes.is_correct, changes.order_index],
                )?;
                if updated == 0 {
                    return Ok(None);
                }
                let option = tx.query_row(
                    &format!("SELECT {} FROM question_options WHERE id = ?1", OPTION_COLUMNS),
                    [id],
                    QuestionOption::from_row,
                )?;
                tx.commit()?;
                Ok(Some(option))
            })
            .await?;
        Ok(option)
    }

    pub async fn delete_option(&self, id: i64) -> Result<bool, DatabaseError> {
        let removed = self
            .conn
            .call(move |conn| {
                Ok(conn.execute("DELETE FROM question_options WHERE id = ?1", [id])?)
            })
            .await?;
        Ok(removed > 0)
    }

    /// Stores a generated quiz with all of its questions and options, or nothing.
    pub async fn persist_generated_quiz(
        &self,
        quiz: NewQuizWithQuestions,
    ) -> Result<(i64, Vec<i64>), DatabaseError> {
        let ids = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO quizzes (title, total_marks, course_id, created_by, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        quiz.title,
                        quiz.total_marks,
                        quiz.course_id,
                        quiz.created_by,
                        now_timestamp()
                    ],
                )?;
                let quiz_id = tx.last_insert_rowid();

                let mut question_ids = Vec::with_capacity(quiz.questions.len());
                for mut question in quiz.questions {
                    question.quiz_id = Some(quiz_id);
                    question.assignment_id = None;
                    question_ids.push(insert_question(&tx, &question)?);
                }
                tx.commit()?;
                Ok((quiz_id, question_ids))
            })
            .await?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mcq(text: &str, marks: i64, options: &[(&str, bool)]) -> NewQuestion {
        NewQuestion {
            question_text: text.to_string(),
            question_type: "mcq".to_string(),
            marks: Some(marks),
            quiz_id: None,
            assignment_id: None,
            created_by: None,
            options: options
                .iter()
                .enumerate()
                .map(|(i, (text, correct))| NewOption {
                    option_text: text.to_string(),
                    is_correct: *correct,
                    order_index: i as i64,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn question_with_options_keeps_order() {
        let db = Database::in_memory().await.unwrap();
        let id = db
            .create_question_with_options(mcq(
                "Which gate outputs 1 only when all inputs are 1?",
                2,
                &[("OR", false), ("AND", true), ("NOT", false)],
            ))
            .await
            .unwrap();

        let detail = db.get_question_detail(id).await.unwrap().unwrap();
        let texts: Vec<_> = detail.options.iter().map(|o| o.option_text.as_str()).collect();
        assert_eq!(texts, vec!["OR", "AND", "NOT"]);
        assert!(detail.options[1].is_correct);
        assert_eq!(detail.student_answers_count, 0);
    }

    #[tokio::test]
    async fn deleting_question_cascades_to_options() {
        let db = Database::in_memory().await.unwrap();
        let id = db
            .create_question_with_options(mcq("Q", 1, &[("a", true), ("b", false)]))
            .await
            .unwrap();
        assert_eq!(db.list_options().await.unwrap().len(), 2);

        assert!(db.delete_question(id).await.unwrap());
        assert!(db.list_options().await.unwrap().is_empty());
        assert!(!db.delete_question(id).await.unwrap());
    }

    #[tokio::test]
    async fn question_cannot_belong_to_quiz_and_assignment() {
        let db = Database::in_memory().await.unwrap();
        let course = db
            .create_course("Logic".into(), "CS101".into(), None, None, None)
            .await
            .unwrap();
        let quiz = db.create_quiz("Q1".into(), None, course, None).await.unwrap();
        let assignment = db
            .create_assignment("A1".into(), None, None, None, course, None)
            .await
            .unwrap();

        let mut question = mcq("both", 1, &[]);
        question.quiz_id = Some(quiz);
        question.assignment_id = Some(assignment);
        assert!(db.create_question_with_options(question).await.is_err());
    }

    #[tokio::test]
    async fn question_moves_between_parents() {
        let db = Database::in_memory().await.unwrap();
        let course = db
            .create_course("Logic".into(), "CS101".into(), None, None, None)
            .await
            .unwrap();
        let quiz = db.create_quiz("Q1".into(), None, course, None).await.unwrap();
        let assignment = db
            .create_assignment("A1".into(), None, None, None, course, None)
            .await
            .unwrap();
        let mut question = mcq("Simplify A + AB", 3, &[]);
        question.quiz_id = Some(quiz);
        let id = db.create_question_with_options(question).await.unwrap();

        let moved = db
            .update_question(
                id,
                QuestionChanges {
                    quiz_id: Some(None),
                    assignment_id: Some(Some(assignment)),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(moved.quiz_id, None);
        assert_eq!(moved.assignment_id, Some(assignment));
        assert_eq!(moved.marks, Some(3));
        assert_eq!(moved.question_text, "Simplify A + AB");
    }

    #[tokio::test]
    async fn filters_search_and_counts() {
        let db = Database::in_memory().await.unwrap();
        db.create_question_with_options(mcq("What is a NAND gate?", 2, &[("x", true)]))
            .await
            .unwrap();
        db.create_question_with_options(mcq("Define a flip-flop", 5, &[]))
            .await
            .unwrap();
        db.create_question_with_options(NewQuestion {
            question_type: "text".to_string(),
            ..mcq("Explain nand universality", 10, &[])
        })
        .await
        .unwrap();

        let hits = db
            .search_questions("NAND".into(), None, None, None)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);

        let typed = db
            .search_questions("nand".into(), Some("MCQ".into()), None, Some(3))
            .await
            .unwrap();
        assert_eq!(typed.len(), 1);

        let heavy = db
            .list_questions(QuestionFilter {
                min_marks: Some(5),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(heavy.len(), 2);
        assert_eq!(heavy[0].options_count, 0);

        let counts = db.count_questions_by_type().await.unwrap();
        assert_eq!(counts.get("mcq"), Some(&2));
        assert_eq!(counts.get("text"), Some(&1));
    }

    #[tokio::test]
    async fn persist_generated_quiz_is_atomic() {
        let db = Database::in_memory().await.unwrap();
        let result = db
            .persist_generated_quiz(NewQuizWithQuestions {
                title: "Logic gates".into(),
                total_marks: Some(2),
                course_id: 99,
                created_by: None,
                questions: vec![mcq("Q", 2, &[("a", true)])],
            })
            .await;
        assert!(result.is_err());
        assert!(db.list_questions(QuestionFilter::default()).await.unwrap().is_empty());

        let course = db
            .create_course("Logic".into(), "CS101".into(), None, None, None)
            .await
            .unwrap();
        let (quiz_id, question_ids) = db
            .persist_generated_quiz(NewQuizWithQuestions {
                title: "Logic gates".into(),
                total_marks: Some(2),
                course_id: course,
                created_by: None,
                questions: vec![mcq("Q1", 1, &[("a", true)]), mcq("Q2", 1, &[("b", true)])],
            })
            .await
            .unwrap();
        assert_eq!(question_ids.len(), 2);
        assert_eq!(db.list_questions_for_quiz(quiz_id).await.unwrap().len(), 2);
    }
}
