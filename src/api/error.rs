use axum::{
    async_trait,
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequestParts, Path,
    },
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::database::DatabaseError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Internal(String),
    #[error("{0}")]
    Upstream(String),
    #[error("{0}")]
    Unavailable(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn missing(field: &str) -> Self {
        ApiError::BadRequest(format!("Missing required field '{}'.", field))
    }

    pub fn not_found(entity: &str, id: i64) -> Self {
        ApiError::NotFound(format!("{} {} not found", entity, id))
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(format!("Invalid query string: {}", rejection.body_text()))
    }
}

/// An id that does not parse names no resource, so it is a 404.
impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::NotFound(format!("Invalid resource id: {}", rejection.body_text()))
    }
}

/// `Path` whose rejection goes through `ApiError`.
pub struct IdPath<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for IdPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(IdPath(value))
    }
}

/// Maps storage failures onto the response contract: any failed write is a
/// conflict, any failed read is an internal error.
pub trait DbResultExt<T> {
    fn on_write(self, action: &str) -> ApiResult<T>;
    fn on_read(self) -> ApiResult<T>;
}

impl<T> DbResultExt<T> for Result<T, DatabaseError> {
    fn on_write(self, action: &str) -> ApiResult<T> {
        self.map_err(|e| {
            error!("Database error while {}: {}", action, e);
            ApiError::Conflict(format!("Database conflict occurred while {}.", action))
        })
    }

    fn on_read(self) -> ApiResult<T> {
        self.map_err(|e| {
            error!("Database read failed: {}", e);
            ApiError::Internal("Database error".to_string())
        })
    }
}

/// A required string field; blank counts as missing.
pub fn required(value: Option<String>, field: &str) -> ApiResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ApiError::missing(field)),
    }
}

pub fn required_id(value: Option<i64>, field: &str) -> ApiResult<i64> {
    value.ok_or_else(|| ApiError::missing(field))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_status_codes() {
        assert_eq!(ApiError::missing("name").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::not_found("User", 3).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Upstream("x".into()).status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            ApiError::Unavailable("x".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn blank_required_fields_are_missing() {
        assert!(required(Some("  ".into()), "name").is_err());
        assert!(required(None, "name").is_err());
        assert_eq!(required(Some("Ada".into()), "name").unwrap(), "Ada");
        assert!(required_id(None, "course_id").is_err());
    }
}
