use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;

use super::error::{required, ApiError, ApiResult, DbResultExt, IdPath};
use super::{created, message, AppState, Created, Message};
use crate::database::models::{Course, Program, ProgramChanges};

#[derive(Debug, Default, Deserialize)]
pub struct ProgramPayload {
    pub name: Option<String>,
    pub description: Option<String>,
}

pub async fn list_programs(State(state): State<AppState>) -> ApiResult<Json<Vec<Program>>> {
    Ok(Json(state.db.list_programs().await.on_read()?))
}

pub async fn create_program(
    State(state): State<AppState>,
    payload: Result<Json<ProgramPayload>, JsonRejection>,
) -> ApiResult<Created> {
    let Json(payload) = payload?;
    let name = required(payload.name, "name")?;
    let id = state
        .db
        .create_program(name, payload.description)
        .await
        .on_write("creating the program")?;
    Ok(created("Program created successfully", id))
}

pub async fn get_program(
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
) -> ApiResult<Json<Program>> {
    state
        .db
        .get_program(id)
        .await
        .on_read()?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Program", id))
}

pub async fn update_program(
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
    payload: Result<Json<ProgramChanges>, JsonRejection>,
) -> ApiResult<Message> {
    let Json(changes) = payload?;
    state
        .db
        .update_program(id, changes)
        .await
        .on_write("updating the program")?
        .ok_or_else(|| ApiError::not_found("Program", id))?;
    Ok(message("Program updated successfully"))
}

pub async fn delete_program(
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
) -> ApiResult<Message> {
    if !state.db.delete_program(id).await.on_write("deleting the program")? {
        return Err(ApiError::not_found("Program", id));
    }
    Ok(message("Program deleted successfully"))
}

pub async fn list_program_courses(
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
) -> ApiResult<Json<Vec<Course>>> {
    if state.db.get_program(id).await.on_read()?.is_none() {
        return Err(ApiError::not_found("Program", id));
    }
    Ok(Json(state.db.list_courses_for_program(id).await.on_read()?))
}
