use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;

use super::error::{required, required_id, ApiError, ApiResult, DbResultExt, IdPath};
use super::{created, message, AppState, Created, Message};
use crate::database::models::{NewOption, OptionChanges, QuestionOption};

#[derive(Debug, Default, Deserialize)]
pub struct OptionPayload {
    pub question_id: Option<i64>,
    pub option_text: Option<String>,
    pub is_correct: Option<bool>,
    pub order_index: Option<i64>,
}

async fn ensure_question(state: &AppState, question_id: i64) -> ApiResult<()> {
    match state.db.get_question(question_id).await.on_read()? {
        Some(_) => Ok(()),
        None => Err(ApiError::not_found("Question", question_id)),
    }
}

pub async fn list_options(State(state): State<AppState>) -> ApiResult<Json<Vec<QuestionOption>>> {
    Ok(Json(state.db.list_options().await.on_read()?))
}

pub async fn create_option(
    State(state): State<AppState>,
    payload: Result<Json<OptionPayload>, JsonRejection>,
) -> ApiResult<Created> {
    let Json(payload) = payload?;
    let question_id = required_id(payload.question_id, "question_id")?;
    let option_text = required(payload.option_text, "option_text")?;
    ensure_question(&state, question_id).await?;

    // Appended after the existing options unless placed explicitly.
    let order_index = match payload.order_index {
        Some(index) => index,
        None => state
            .db
            .list_options_for_question(question_id)
            .await
            .on_read()?
            .len() as i64,
    };

    let id = state
        .db
        .create_option(
            question_id,
            NewOption {
                option_text,
                is_correct: payload.is_correct.unwrap_or(false),
                order_index,
            },
        )
        .await
        .on_write("creating the option")?;
    Ok(created("Option created successfully", id))
}

pub async fn get_option(
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
) -> ApiResult<Json<QuestionOption>> {
    state
        .db
        .get_option(id)
        .await
        .on_read()?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Option", id))
}

pub async fn update_option(
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
    payload: Result<Json<OptionChanges>, JsonRejection>,
) -> ApiResult<Message> {
    let Json(changes) = payload?;
    state
        .db
        .update_option(id, changes)
        .await
        .on_write("updating the option")?
        .ok_or_else(|| ApiError::not_found("Option", id))?;
    Ok(message("Option updated successfully"))
}

pub async fn delete_option(
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
) -> ApiResult<Message> {
    if !state.db.delete_option(id).await.on_write("deleting the option")? {
        return Err(ApiError::not_found("Option", id));
    }
    Ok(message("Option deleted successfully"))
}

pub async fn list_question_options(
    State(state): State<AppState>,
    IdPath(question_id): IdPath<i64>,
) -> ApiResult<Json<Vec<QuestionOption>>> {
    ensure_question(&state, question_id).await?;
    Ok(Json(
        state
            .db
            .list_options_for_question(question_id)
            .await
            .on_read()?,
    ))
}
