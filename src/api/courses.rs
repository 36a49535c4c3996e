use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    Json,
};
use serde::Deserialize;

use super::error::{required, required_id, ApiError, ApiResult, DbResultExt, IdPath};
use super::{created, ensure_course, message, AppState, Created, Message};
use crate::database::models::{Course, CourseChanges, CourseMembership, User};

#[derive(Debug, Default, Deserialize)]
pub struct CoursePayload {
    pub name: Option<String>,
    pub code: Option<String>,
    pub credit_hours: Option<i64>,
    pub program_id: Option<i64>,
    pub created_by: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CourseQuery {
    pub program_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MemberPayload {
    pub user_id: Option<i64>,
}

pub async fn list_courses(
    State(state): State<AppState>,
    query: Result<Query<CourseQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Course>>> {
    let Query(query) = query?;
    Ok(Json(state.db.list_courses(query.program_id).await.on_read()?))
}

pub async fn create_course(
    State(state): State<AppState>,
    payload: Result<Json<CoursePayload>, JsonRejection>,
) -> ApiResult<Created> {
    let Json(payload) = payload?;
    let name = required(payload.name, "name")?;
    let code = required(payload.code, "code")?;
    if let Some(program_id) = payload.program_id {
        if state.db.get_program(program_id).await.on_read()?.is_none() {
            return Err(ApiError::not_found("Program", program_id));
        }
    }

    let id = state
        .db
        .create_course(
            name,
            code,
            payload.credit_hours,
            payload.program_id,
            payload.created_by,
        )
        .await
        .on_write("creating the course")?;
    Ok(created("Course created successfully", id))
}

pub async fn get_course(
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
) -> ApiResult<Json<Course>> {
    state
        .db
        .get_course(id)
        .await
        .on_read()?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Course", id))
}

pub async fn update_course(
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
    payload: Result<Json<CourseChanges>, JsonRejection>,
) -> ApiResult<Message> {
    let Json(changes) = payload?;
    state
        .db
        .update_course(id, changes)
        .await
        .on_write("updating the course")?
        .ok_or_else(|| ApiError::not_found("Course", id))?;
    Ok(message("Course updated successfully"))
}

pub async fn delete_course(
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
) -> ApiResult<Message> {
    if !state.db.delete_course(id).await.on_write("deleting the course")? {
        return Err(ApiError::not_found("Course", id));
    }
    Ok(message("Course deleted successfully"))
}

fn member_label(membership: CourseMembership) -> &'static str {
    match membership {
        CourseMembership::Teacher => "Teacher",
        CourseMembership::Student => "Student",
    }
}

async fn list_members(
    state: AppState,
    membership: CourseMembership,
    course_id: i64,
) -> ApiResult<Json<Vec<User>>> {
    ensure_course(&state, course_id).await?;
    let members = state
        .db
        .list_course_members(membership, course_id)
        .await
        .on_read()?;
    Ok(Json(members))
}

async fn add_member(
    state: AppState,
    membership: CourseMembership,
    course_id: i64,
    payload: MemberPayload,
) -> ApiResult<Created> {
    let user_id = required_id(payload.user_id, "user_id")?;
    ensure_course(&state, course_id).await?;

    let user = state
        .db
        .get_user(user_id)
        .await
        .on_read()?
        .ok_or_else(|| ApiError::not_found("User", user_id))?;
    let role = membership.required_role();
    if user.role != role {
        return Err(ApiError::BadRequest(format!(
            "User {} is a {}, not a {}.",
            user_id, user.role, role
        )));
    }

    state
        .db
        .add_course_member(membership, course_id, user_id)
        .await
        .on_write("adding the course member")?;
    Ok(created(
        &format!("{} added to course successfully", member_label(membership)),
        user_id,
    ))
}

async fn remove_member(
    state: AppState,
    membership: CourseMembership,
    course_id: i64,
    user_id: i64,
) -> ApiResult<Message> {
    let removed = state
        .db
        .remove_course_member(membership, course_id, user_id)
        .await
        .on_write("removing the course member")?;
    if !removed {
        return Err(ApiError::NotFound(format!(
            "User {} is not enrolled in course {} as a {}",
            user_id,
            course_id,
            membership.required_role()
        )));
    }
    Ok(message(&format!(
        "{} removed from course successfully",
        member_label(membership)
    )))
}

pub async fn list_course_teachers(
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
) -> ApiResult<Json<Vec<User>>> {
    list_members(state, CourseMembership::Teacher, id).await
}

pub async fn add_course_teacher(
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
    payload: Result<Json<MemberPayload>, JsonRejection>,
) -> ApiResult<Created> {
    let Json(payload) = payload?;
    add_member(state, CourseMembership::Teacher, id, payload).await
}

pub async fn remove_course_teacher(
    State(state): State<AppState>,
    IdPath((id, user_id)): IdPath<(i64, i64)>,
) -> ApiResult<Message> {
    remove_member(state, CourseMembership::Teacher, id, user_id).await
}

pub async fn list_course_students(
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
) -> ApiResult<Json<Vec<User>>> {
    list_members(state, CourseMembership::Student, id).await
}

pub async fn add_course_student(
    State(state): State<AppState>,
    IdPath(id): IdPath<i64>,
    payload: Result<Json<MemberPayload>, JsonRejection>,
) -> ApiResult<Created> {
    let Json(payload) = payload?;
    add_member(state, CourseMembership::Student, id, payload).await
}

pub async fn remove_course_student(
    State(state): State<AppState>,
    IdPath((id, user_id)): IdPath<(i64, i64)>,
) -> ApiResult<Message> {
    remove_member(state, CourseMembership::Student, id, user_id).await
}
