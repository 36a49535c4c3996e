use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    Json,
};
use serde::Deserialize;

use super::error::{required, required_id, ApiError, ApiResult, DbResultExt, IdPath};
use super::{created, ensure_course, message, AppState, Created, Message};
use crate::database::models::{Assignment, AssignmentChanges, Question, Quiz, QuizChanges};

#[derive(Debug, Default, Deserialize)]
pub struct CourseFilter {
    pub course_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QuizPayload {
    pub title: Option<String>,
    pub total_marks: Option<i64>,
    pub course_id: Option<i64>,
    pub created_by: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AssignmentPayload {
    pub title: Option<String>,
    pub description: Option<String>,
    pub total_marks: Option<i64>,
    pub due_date: Option<String>,
    pub course_id: Option<i64>,
    pub created_by: Option<i64>,
}

pub async fn list_quizzes(
    State(state): State<AppState>,
    query: Result<Query<CourseFilter>, QueryRejection>,
) -> ApiResult<Json<Vec<Quiz>>> {
    let Query(query) = query?;
    Ok(Json(state.db.list_quizzes(query.course_id).await.on_read()?))
}

pub async fn create_quiz(
    State(state): State<AppState>,
    payload: Result<Json<QuizPayload>, JsonRejection>,
) -> ApiResult<Created> {
    let Json(payload) = payload?;
    let title = required(payload.title, "title")?;
    let course_id = required_id(payload.course_id, "course_id")?;
    ensure_course(&state, course_id).await?;

    let id = state
        .db
        .create_quiz(title, payload.total_marks, course_id, payload.created_by)
        .await
        .on_write("creating the quiz")?;
    Ok(created("Quiz created successfully", id))
}

pub async fn get_quiz(
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
) -> ApiResult<Json<Quiz>> {
    state
        .db
        .get_quiz(id)
        .await
        .on_read()?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Quiz", id))
}

pub async fn update_quiz(
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
    payload: Result<Json<QuizChanges>, JsonRejection>,
) -> ApiResult<Message> {
    let Json(changes) = payload?;
    state
        .db
        .update_quiz(id, changes)
        .await
        .on_write("updating the quiz")?
        .ok_or_else(|| ApiError::not_found("Quiz", id))?;
    Ok(message("Quiz updated successfully"))
}

pub async fn delete_quiz(
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
) -> ApiResult<Message> {
    if !state.db.delete_quiz(id).await.on_write("deleting the quiz")? {
        return Err(ApiError::not_found("Quiz", id));
    }
    Ok(message("Quiz deleted successfully"))
}

pub async fn list_quiz_questions(
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
) -> ApiResult<Json<Vec<Question>>> {
    if state.db.get_quiz(id).await.on_read()?.is_none() {
        return Err(ApiError::not_found("Quiz", id));
    }
    Ok(Json(state.db.list_questions_for_quiz(id).await.on_read()?))
}

pub async fn list_assignments(
    State(state): State<AppState>,
    query: Result<Query<CourseFilter>, QueryRejection>,
) -> ApiResult<Json<Vec<Assignment>>> {
    let Query(query) = query?;
    Ok(Json(state.db.list_assignments(query.course_id).await.on_read()?))
}

pub async fn create_assignment(
    State(state): State<AppState>,
    payload: Result<Json<AssignmentPayload>, JsonRejection>,
) -> ApiResult<Created> {
    let Json(payload) = payload?;
    let title = required(payload.title, "title")?;
    let course_id = required_id(payload.course_id, "course_id")?;
    ensure_course(&state, course_id).await?;

    let id = state
        .db
        .create_assignment(
            title,
            payload.description,
            payload.total_marks,
            payload.due_date,
            course_id,
            payload.created_by,
        )
        .await
        .on_write("creating the assignment")?;
    Ok(created("Assignment created successfully", id))
}

pub async fn get_assignment(
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
) -> ApiResult<Json<Assignment>> {
    state
        .db
        .get_assignment(id)
        .await
        .on_read()?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Assignment", id))
}

pub async fn update_assignment(
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
    payload: Result<Json<AssignmentChanges>, JsonRejection>,
) -> ApiResult<Message> {
    let Json(changes) = payload?;
    state
        .db
        .update_assignment(id, changes)
        .await
        .on_write("updating the assignment")?
        .ok_or_else(|| ApiError::not_found("Assignment", id))?;
    Ok(message("Assignment updated successfully"))
}

pub async fn delete_assignment(
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
) -> ApiResult<Message> {
    if !state.db.delete_assignment(id).await.on_write("deleting the assignment")? {
        return Err(ApiError::not_found("Assignment", id));
    }
    Ok(message("Assignment deleted successfully"))
}

pub async fn list_assignment_questions(
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
) -> ApiResult<Json<Vec<Question>>> {
    if state.db.get_assignment(id).await.on_read()?.is_none() {
        return Err(ApiError::not_found("Assignment", id));
    }
    Ok(Json(state.db.list_questions_for_assignment(id).await.on_read()?))
}
