use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    Json,
};
use serde::Deserialize;
use std::collections::BTreeMap;

use super::error::{required, ApiError, ApiResult, DbResultExt, IdPath};
use super::{created, message, AppState, Created, Message};
use crate::database::models::{
    NewOption, NewQuestion, Question, QuestionChanges, QuestionDetail, QuestionFilter,
    QuestionSummary,
};

const DEFAULT_QUESTION_TYPE: &str = "text";

#[derive(Debug, Default, Deserialize)]
pub struct OptionInput {
    pub option_text: Option<String>,
    pub is_correct: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QuestionPayload {
    pub question_text: Option<String>,
    pub question_type: Option<String>,
    pub marks: Option<i64>,
    pub quiz_id: Option<i64>,
    pub assignment_id: Option<i64>,
    pub created_by: Option<i64>,
    pub options: Option<Vec<OptionInput>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QuestionQuery {
    pub quiz_id: Option<i64>,
    pub assignment_id: Option<i64>,
    pub created_by: Option<i64>,
    #[serde(rename = "type")]
    pub question_type: Option<String>,
    pub contains: Option<String>,
    pub min_marks: Option<i64>,
    pub max_marks: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    #[serde(rename = "type")]
    pub question_type: Option<String>,
    pub min_marks: Option<i64>,
    pub max_marks: Option<i64>,
}

fn single_parent(quiz_id: Option<i64>, assignment_id: Option<i64>) -> ApiResult<()> {
    if quiz_id.is_some() && assignment_id.is_some() {
        return Err(ApiError::BadRequest(
            "A question can belong to a quiz or an assignment, not both.".to_string(),
        ));
    }
    Ok(())
}

async fn ensure_parents(
    state: &AppState,
    quiz_id: Option<i64>,
    assignment_id: Option<i64>,
) -> ApiResult<()> {
    if let Some(quiz_id) = quiz_id {
        if state.db.get_quiz(quiz_id).await.on_read()?.is_none() {
            return Err(ApiError::not_found("Quiz", quiz_id));
        }
    }
    if let Some(assignment_id) = assignment_id {
        if state.db.get_assignment(assignment_id).await.on_read()?.is_none() {
            return Err(ApiError::not_found("Assignment", assignment_id));
        }
    }
    Ok(())
}

pub async fn list_questions(
    State(state): State<AppState>,
    query: Result<Query<QuestionQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<QuestionSummary>>> {
    let Query(query) = query?;
    let questions = state
        .db
        .list_questions(QuestionFilter {
            quiz_id: query.quiz_id,
            assignment_id: query.assignment_id,
            created_by: query.created_by,
            question_type: query.question_type,
            contains: query.contains,
            min_marks: query.min_marks,
            max_marks: query.max_marks,
        })
        .await
        .on_read()?;
    Ok(Json(questions))
}

pub async fn create_question(
    State(state): State<AppState>,
    payload: Result<Json<QuestionPayload>, JsonRejection>,
) -> ApiResult<Created> {
    let Json(payload) = payload?;
    let question_text = required(payload.question_text, "question_text")?;
    single_parent(payload.quiz_id, payload.assignment_id)?;

    let options = payload
        .options
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(i, option)| {
            Ok(NewOption {
                option_text: required(option.option_text, &format!("options[{}].option_text", i))?,
                is_correct: option.is_correct.unwrap_or(false),
                order_index: i as i64,
            })
        })
        .collect::<ApiResult<Vec<_>>>()?;

    ensure_parents(&state, payload.quiz_id, payload.assignment_id).await?;

    let id = state
        .db
        .create_question_with_options(NewQuestion {
            question_text,
            question_type: payload
                .question_type
                .unwrap_or_else(|| DEFAULT_QUESTION_TYPE.to_string()),
            marks: payload.marks,
            quiz_id: payload.quiz_id,
            assignment_id: payload.assignment_id,
            created_by: payload.created_by,
            options,
        })
        .await
        .on_write("creating the question")?;
    Ok(created("Question created successfully", id))
}

pub async fn get_question(
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
) -> ApiResult<Json<QuestionDetail>> {
    state
        .db
        .get_question_detail(id)
        .await
        .on_read()?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Question", id))
}

pub async fn update_question(
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
    payload: Result<Json<QuestionChanges>, JsonRejection>,
) -> ApiResult<Message> {
    let Json(changes) = payload?;
    let existing = state
        .db
        .get_question(id)
        .await
        .on_read()?
        .ok_or_else(|| ApiError::not_found("Question", id))?;

    single_parent(
        changes.quiz_id.unwrap_or(existing.quiz_id),
        changes.assignment_id.unwrap_or(existing.assignment_id),
    )?;
    ensure_parents(&state, changes.quiz_id.flatten(), changes.assignment_id.flatten()).await?;

    state
        .db
        .update_question(id, changes)
        .await
        .on_write("updating the question")?
        .ok_or_else(|| ApiError::not_found("Question", id))?;
    Ok(message("Question updated successfully"))
}

pub async fn delete_question(
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
) -> ApiResult<Message> {
    if !state.db.delete_question(id).await.on_write("deleting the question")? {
        return Err(ApiError::not_found("Question", id));
    }
    Ok(message("Question deleted successfully"))
}

pub async fn search_questions(
    State(state): State<AppState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Question>>> {
    let Query(query) = query?;
    let keyword = query
        .q
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing search query 'q'.".to_string()))?;

    let questions = state
        .db
        .search_questions(keyword, query.question_type, query.min_marks, query.max_marks)
        .await
        .on_read()?;
    Ok(Json(questions))
}

pub async fn count_questions(
    State(state): State<AppState>,
) -> ApiResult<Json<BTreeMap<String, i64>>> {
    Ok(Json(state.db.count_questions_by_type().await.on_read()?))
}
