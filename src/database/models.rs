use rusqlite::Row;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Teacher,
    Student,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Teacher => "teacher",
            UserRole::Student => "student",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "teacher" => Ok(UserRole::Teacher),
            "student" => Ok(UserRole::Student),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`) in partial updates.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Account row. The password hash never leaves the database layer.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub created_at: Option<String>,
}

impl User {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let role: String = row.get("role")?;
        let role = role.parse::<UserRole>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                e.into(),
            )
        })?;
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            email: row.get("email")?,
            role,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<UserRole>,
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<UserRole>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Program {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: Option<String>,
}

impl Program {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgramChanges {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Course {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub credit_hours: Option<i64>,
    pub program_id: Option<i64>,
    pub created_by: Option<i64>,
    pub created_at: Option<String>,
}

impl Course {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            code: row.get("code")?,
            credit_hours: row.get("credit_hours")?,
            program_id: row.get("program_id")?,
            created_by: row.get("created_by")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CourseChanges {
    pub name: Option<String>,
    pub code: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub credit_hours: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub program_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub created_by: Option<Option<i64>>,
}

/// Which join table an enrolment goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseMembership {
    Teacher,
    Student,
}

impl CourseMembership {
    pub(crate) fn table(&self) -> &'static str {
        match self {
            CourseMembership::Teacher => "course_teachers",
            CourseMembership::Student => "course_students",
        }
    }

    pub fn required_role(&self) -> UserRole {
        match self {
            CourseMembership::Teacher => UserRole::Teacher,
            CourseMembership::Student => UserRole::Student,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Quiz {
    pub id: i64,
    pub title: String,
    pub total_marks: Option<i64>,
    pub course_id: i64,
    pub created_by: Option<i64>,
    pub created_at: Option<String>,
}

impl Quiz {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            total_marks: row.get("total_marks")?,
            course_id: row.get("course_id")?,
            created_by: row.get("created_by")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuizChanges {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub total_marks: Option<Option<i64>>,
    pub course_id: Option<i64>,
    #[serde(default, deserialize_with = "nullable")]
    pub created_by: Option<Option<i64>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Assignment {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub total_marks: Option<i64>,
    pub due_date: Option<String>,
    pub course_id: i64,
    pub created_by: Option<i64>,
    pub created_at: Option<String>,
}

impl Assignment {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            total_marks: row.get("total_marks")?,
            due_date: row.get("due_date")?,
            course_id: row.get("course_id")?,
            created_by: row.get("created_by")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssignmentChanges {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub total_marks: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub due_date: Option<Option<String>>,
    pub course_id: Option<i64>,
    #[serde(default, deserialize_with = "nullable")]
    pub created_by: Option<Option<i64>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Question {
    pub id: i64,
    pub question_text: String,
    pub question_type: Option<String>,
    pub marks: Option<i64>,
    pub quiz_id: Option<i64>,
    pub assignment_id: Option<i64>,
    pub created_by: Option<i64>,
    pub created_at: Option<String>,
}

impl Question {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            question_text: row.get("question_text")?,
            question_type: row.get("question_type")?,
            marks: row.get("marks")?,
            quiz_id: row.get("quiz_id")?,
            assignment_id: row.get("assignment_id")?,
            created_by: row.get("created_by")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// A question row together with its relation counts, as listed by `/questions`.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionSummary {
    #[serde(flatten)]
    pub question: Question,
    pub options_count: i64,
    pub student_answers_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionDetail {
    #[serde(flatten)]
    pub question: Question,
    pub options: Vec<QuestionOption>,
    pub student_answers_count: i64,
}

#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub question_text: String,
    pub question_type: String,
    pub marks: Option<i64>,
    pub quiz_id: Option<i64>,
    pub assignment_id: Option<i64>,
    pub created_by: Option<i64>,
    pub options: Vec<NewOption>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestionChanges {
    pub question_text: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub question_type: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub marks: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub quiz_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub assignment_id: Option<Option<i64>>,
}

#[derive(Debug, Clone, Default)]
pub struct QuestionFilter {
    pub quiz_id: Option<i64>,
    pub assignment_id: Option<i64>,
    pub created_by: Option<i64>,
    pub question_type: Option<String>,
    pub contains: Option<String>,
    pub min_marks: Option<i64>,
    pub max_marks: Option<i64>,
}

/// A quiz and its questions, written in one transaction.
#[derive(Debug, Clone)]
pub struct NewQuizWithQuestions {
    pub title: String,
    pub total_marks: Option<i64>,
    pub course_id: i64,
    pub created_by: Option<i64>,
    pub questions: Vec<NewQuestion>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionOption {
    pub id: i64,
    pub question_id: i64,
    pub option_text: String,
    pub is_correct: bool,
    pub order_index: i64,
}

impl QuestionOption {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            question_id: row.get("question_id")?,
            option_text: row.get("option_text")?,
            is_correct: row.get("is_correct")?,
            order_index: row.get("order_index")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewOption {
    pub option_text: String,
    pub is_correct: bool,
    pub order_index: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OptionChanges {
    pub option_text: Option<String>,
    pub is_correct: Option<bool>,
    pub order_index: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentAnswer {
    pub id: i64,
    pub question_id: i64,
    pub student_id: i64,
    pub selected_option_id: Option<i64>,
    pub answer_text: Option<String>,
    pub quiz_id: Option<i64>,
    pub assignment_id: Option<i64>,
    pub marks_awarded: Option<f64>,
    pub evaluated_by_ai: bool,
    pub evaluated_by_teacher: bool,
    pub feedback: Option<String>,
    pub attempt_number: i64,
    pub submitted_at: Option<String>,
}

impl StudentAnswer {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            question_id: row.get("question_id")?,
            student_id: row.get("student_id")?,
            selected_option_id: row.get("selected_option_id")?,
            answer_text: row.get("answer_text")?,
            quiz_id: row.get("quiz_id")?,
            assignment_id: row.get("assignment_id")?,
            marks_awarded: row.get("marks_awarded")?,
            evaluated_by_ai: row.get("evaluated_by_ai")?,
            evaluated_by_teacher: row.get("evaluated_by_teacher")?,
            feedback: row.get("feedback")?,
            attempt_number: row.get("attempt_number")?,
            submitted_at: row.get("submitted_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewStudentAnswer {
    pub question_id: i64,
    pub student_id: i64,
    pub selected_option_id: Option<i64>,
    pub answer_text: Option<String>,
    pub quiz_id: Option<i64>,
    pub assignment_id: Option<i64>,
    pub marks_awarded: Option<f64>,
    /// Set when `marks_awarded` came from option auto-grading.
    pub evaluated_by_ai: bool,
    pub attempt_number: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnswerChanges {
    #[serde(default, deserialize_with = "nullable")]
    pub marks_awarded: Option<Option<f64>>,
    pub evaluated_by_teacher: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub feedback: Option<Option<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parsing_is_case_insensitive() {
        assert_eq!("Teacher".parse::<UserRole>().unwrap(), UserRole::Teacher);
        assert_eq!(" student ".parse::<UserRole>().unwrap(), UserRole::Student);
        assert!("janitor".parse::<UserRole>().is_err());
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&UserRole::Admin).unwrap();
        assert_eq!(json, "\"admin\"");
    }

    #[test]
    fn changes_tell_absent_from_null() {
        let changes: QuestionChanges =
            serde_json::from_str(r#"{"quiz_id": null, "assignment_id": 2}"#).unwrap();
        assert_eq!(changes.quiz_id, Some(None));
        assert_eq!(changes.assignment_id, Some(Some(2)));
        assert_eq!(changes.marks, None);
        assert_eq!(changes.question_text, None);
    }
}
