use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;
use tracing::debug;

use super::error::{required_id, ApiError, ApiResult, DbResultExt, IdPath};
use super::{created, message, AppState, Created, Message};
use crate::database::models::{AnswerChanges, NewStudentAnswer, Question, StudentAnswer};

#[derive(Debug, Default, Deserialize)]
pub struct AnswerPayload {
    pub question_id: Option<i64>,
    pub student_id: Option<i64>,
    pub selected_option_id: Option<i64>,
    pub answer_text: Option<String>,
    pub quiz_id: Option<i64>,
    pub assignment_id: Option<i64>,
    pub attempt_number: Option<i64>,
}

/// Marks for a multiple-choice pick: full question marks when the option is
/// correct, zero otherwise. Unmarked questions stay ungraded. Only
/// auto-graded rows carry `evaluated_by_ai`.
async fn grade_selection(
    state: &AppState,
    question: &Question,
    option_id: i64,
) -> ApiResult<Option<f64>> {
    let option = state.db.get_option(option_id).await.on_read()?;
    let option = match option {
        Some(option) if option.question_id == question.id => option,
        _ => {
            return Err(ApiError::BadRequest(format!(
                "Option {} does not belong to question {}.",
                option_id, question.id
            )))
        }
    };

    let marks = if option.is_correct {
        question.marks.map(|m| m as f64)
    } else {
        Some(0.0)
    };
    debug!(
        "Auto-graded question {} option {}: {:?}",
        question.id, option_id, marks
    );
    Ok(marks)
}

pub async fn list_answers(State(state): State<AppState>) -> ApiResult<Json<Vec<StudentAnswer>>> {
    Ok(Json(state.db.list_answers().await.on_read()?))
}

pub async fn create_answer(
    State(state): State<AppState>,
    payload: Result<Json<AnswerPayload>, JsonRejection>,
) -> ApiResult<Created> {
    let Json(payload) = payload?;
    let question_id = required_id(payload.question_id, "question_id")?;
    let student_id = required_id(payload.student_id, "student_id")?;

    let question = state
        .db
        .get_question(question_id)
        .await
        .on_read()?
        .ok_or_else(|| ApiError::not_found("Question", question_id))?;
    if state.db.get_user(student_id).await.on_read()?.is_none() {
        return Err(ApiError::not_found("User", student_id));
    }

    let marks_awarded = match payload.selected_option_id {
        Some(option_id) => grade_selection(&state, &question, option_id).await?,
        None => None,
    };

    let id = state
        .db
        .create_answer(NewStudentAnswer {
            question_id,
            student_id,
            selected_option_id: payload.selected_option_id,
            answer_text: payload.answer_text,
            quiz_id: payload.quiz_id.or(question.quiz_id),
            assignment_id: payload.assignment_id.or(question.assignment_id),
            marks_awarded,
            evaluated_by_ai: marks_awarded.is_some(),
            attempt_number: payload.attempt_number.unwrap_or(1),
        })
        .await
        .on_write("submitting the answer")?;
    Ok(created("Student answer submitted successfully", id))
}

pub async fn get_answer(
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
) -> ApiResult<Json<StudentAnswer>> {
    state
        .db
        .get_answer(id)
        .await
        .on_read()?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Answer", id))
}

pub async fn update_answer(
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
    payload: Result<Json<AnswerChanges>, JsonRejection>,
) -> ApiResult<Message> {
    let Json(changes) = payload?;
    state
        .db
        .update_answer(id, changes)
        .await
        .on_write("updating the answer")?
        .ok_or_else(|| ApiError::not_found("Answer", id))?;
    Ok(message("Student answer updated successfully"))
}

pub async fn delete_answer(
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
) -> ApiResult<Message> {
    if !state.db.delete_answer(id).await.on_write("deleting the answer")? {
        return Err(ApiError::not_found("Answer", id));
    }
    Ok(message("Student answer deleted successfully"))
}

pub async fn list_student_answers(
    State(state): State<AppState>,
    IdPath(student_id): IdPath<i64>,
) -> ApiResult<Json<Vec<StudentAnswer>>> {
    if state.db.get_user(student_id).await.on_read()?.is_none() {
        return Err(ApiError::not_found("User", student_id));
    }
    Ok(Json(
        state
            .db
            .list_answers_for_student(student_id)
            .await
            .on_read()?,
    ))
}

pub async fn list_question_answers(
    State(state): State<AppState>,
    IdPath(question_id): IdPath<i64>,
) -> ApiResult<Json<Vec<StudentAnswer>>> {
    if state.db.get_question(question_id).await.on_read()?.is_none() {
        return Err(ApiError::not_found("Question", question_id));
    }
    Ok(Json(
        state
            .db
            .list_answers_for_question(question_id)
            .await
            .on_read()?,
    ))
}
