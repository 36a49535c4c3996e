use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};
use validator::Validate;

use super::error::{required, ApiError, ApiResult, DbResultExt};
use super::{ensure_course, AppState};
use crate::llm::quiz::{quiz_record, GenerationMode, QuizRequest};

#[derive(Debug, Default, Deserialize)]
pub struct GeneratePayload {
    pub topic: Option<String>,
    pub num_questions: Option<u32>,
    pub total_marks: Option<u32>,
    /// When set, the generated quiz is stored under this course.
    pub course_id: Option<i64>,
    pub created_by: Option<i64>,
    #[serde(default)]
    pub mode: GenerationMode,
}

/// `POST /quizzes/generate`: retrieve context from the corpus, ask the model
/// for a multiple-choice quiz and optionally persist it.
pub async fn generate_quiz(
    State(state): State<AppState>,
    payload: Result<Json<GeneratePayload>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(payload) = payload?;
    let request = QuizRequest {
        topic: required(payload.topic, "topic")?.trim().to_string(),
        num_questions: payload
            .num_questions
            .ok_or_else(|| ApiError::missing("num_questions"))?,
        total_marks: payload
            .total_marks
            .ok_or_else(|| ApiError::missing("total_marks"))?,
    };
    request
        .validate()
        .map_err(|e| ApiError::BadRequest(format!("Invalid quiz request: {}", e)))?;

    if let Some(course_id) = payload.course_id {
        ensure_course(&state, course_id).await?;
    }

    let generator = state.quiz_generator().await?;
    let generated = generator
        .generate(&request, payload.mode)
        .await
        .map_err(|e| {
            error!("Quiz generation failed: {:#}", e);
            ApiError::Upstream(format!("Quiz generation failed: {}", e))
        })?;

    let Some(course_id) = payload.course_id else {
        return Ok(Json(generated).into_response());
    };

    let record = quiz_record(
        &generated.quiz,
        request.total_marks,
        course_id,
        payload.created_by,
    );
    let (quiz_id, question_ids) = state
        .db
        .persist_generated_quiz(record)
        .await
        .on_write("saving the generated quiz")?;
    info!(
        "Stored generated quiz {} with {} questions in course {}",
        quiz_id,
        question_ids.len(),
        course_id
    );

    let body = json!({
        "message": "Quiz generated successfully",
        "id": quiz_id,
        "question_ids": question_ids,
        "quiz": generated.quiz,
        "cost": generated.cost,
        "mode": generated.mode,
        "source_pages": generated.source_pages,
    });
    Ok((StatusCode::CREATED, Json(body)).into_response())
}
