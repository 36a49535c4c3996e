use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    Json,
};
use serde::Deserialize;

use super::error::{required, ApiError, ApiResult, DbResultExt, IdPath};
use super::{created, message, AppState, Created, Message};
use crate::database::models::{NewUser, User, UserFilter, UserRole, UserUpdate};
use crate::database::users::hash_password;

#[derive(Debug, Default, Deserialize)]
pub struct UserPayload {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub role: Option<String>,
    pub name: Option<String>,
}

fn parse_role(role: &str) -> ApiResult<UserRole> {
    role.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid role '{}'. Use admin, teacher or student.", role)))
}

fn check_email(email: &str) -> ApiResult<()> {
    if validator::validate_email(email) {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!("Invalid email '{}'.", email)))
    }
}

pub async fn list_users(
    State(state): State<AppState>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<User>>> {
    let Query(query) = query?;
    // Empty filters are ignored.
    let role = query
        .role
        .as_deref()
        .filter(|r| !r.trim().is_empty())
        .map(parse_role)
        .transpose()?;
    let name = query.name.filter(|n| !n.trim().is_empty());
    let users = state
        .db
        .list_users(UserFilter { role, name })
        .await
        .on_read()?;
    Ok(Json(users))
}

pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<UserPayload>, JsonRejection>,
) -> ApiResult<Created> {
    let Json(payload) = payload?;
    let name = required(payload.name, "name")?;
    let email = required(payload.email, "email")?;
    let password = required(payload.password, "password")?;
    let role = parse_role(&required(payload.role, "role")?)?;
    check_email(&email)?;

    let id = state
        .db
        .create_user(NewUser {
            name,
            email,
            password_hash: hash_password(&password),
            role,
        })
        .await
        .on_write("creating the user")?;
    Ok(created("User created successfully", id))
}

pub async fn get_user(
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
) -> ApiResult<Json<User>> {
    state
        .db
        .get_user(id)
        .await
        .on_read()?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("User", id))
}

pub async fn update_user(
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
    payload: Result<Json<UserPayload>, JsonRejection>,
) -> ApiResult<Message> {
    let Json(payload) = payload?;
    if let Some(email) = &payload.email {
        check_email(email)?;
    }
    let changes = UserUpdate {
        name: payload.name,
        email: payload.email,
        password_hash: payload.password.as_deref().map(hash_password),
        role: payload.role.as_deref().map(parse_role).transpose()?,
    };

    state
        .db
        .update_user(id, changes)
        .await
        .on_write("updating the user")?
        .ok_or_else(|| ApiError::not_found("User", id))?;
    Ok(message("User updated successfully"))
}

pub async fn delete_user(
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
) -> ApiResult<Message> {
    if !state.db.delete_user(id).await.on_write("deleting the user")? {
        return Err(ApiError::not_found("User", id));
    }
    Ok(message("User deleted successfully"))
}
