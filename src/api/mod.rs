use axum::{
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::RagConfig;
use crate::database::Database;
use crate::llm::QuizGenerator;
use crate::providers::traits::CompletionProvider;

pub mod answers;
pub mod courses;
pub mod coursework;
pub mod error;
pub mod options;
pub mod programs;
pub mod questions;
pub mod quiz_gen;
pub mod users;

use error::DbResultExt;
pub use error::{ApiError, ApiResult};

pub type Created = (StatusCode, Json<Value>);
pub type Message = Json<Value>;

pub(crate) fn created(message: &str, id: i64) -> Created {
    (StatusCode::CREATED, Json(json!({ "message": message, "id": id })))
}

pub(crate) fn message(message: &str) -> Message {
    Json(json!({ "message": message }))
}

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    provider: Option<Arc<dyn CompletionProvider>>,
    rag: Arc<RagConfig>,
    quiz_generator: Arc<RwLock<Option<Arc<QuizGenerator>>>>,
}

impl AppState {
    pub fn new(
        db: Database,
        provider: Option<Arc<dyn CompletionProvider>>,
        rag: RagConfig,
    ) -> Self {
        Self {
            db,
            provider,
            rag: Arc::new(rag),
            quiz_generator: Arc::new(RwLock::new(None)),
        }
    }

    /// The corpus is indexed on first use and shared afterwards.
    pub async fn quiz_generator(&self) -> ApiResult<Arc<QuizGenerator>> {
        if let Some(generator) = self.quiz_generator.read().await.as_ref() {
            return Ok(generator.clone());
        }

        let mut slot = self.quiz_generator.write().await;
        if let Some(generator) = slot.as_ref() {
            return Ok(generator.clone());
        }

        let provider = self.provider.clone().ok_or_else(|| {
            ApiError::Unavailable(
                "Quiz generation is not configured: OPENAI_API_KEY is not set.".to_string(),
            )
        })?;
        if self.rag.corpus_path.is_none() {
            return Err(ApiError::Unavailable(
                "Quiz generation is not configured: RAG_CORPUS_PATH is not set.".to_string(),
            ));
        }

        info!("Building quiz index");
        let generator = QuizGenerator::from_config(provider, &self.rag)
            .await
            .map_err(|e| {
                error!("Failed to build quiz index: {:#}", e);
                ApiError::Upstream(format!("Failed to build quiz index: {}", e))
            })?;
        let generator = Arc::new(generator);
        *slot = Some(generator.clone());
        Ok(generator)
    }
}

pub(crate) async fn ensure_course(state: &AppState, course_id: i64) -> ApiResult<()> {
    match state.db.get_course(course_id).await.on_read()? {
        Some(_) => Ok(()),
        None => Err(ApiError::not_found("Course", course_id)),
    }
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "Server is running and healthy" }))
}

/// Create and configure the API router
pub fn create_api(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_check))
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/:id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route(
            "/programs",
            get(programs::list_programs).post(programs::create_program),
        )
        .route(
            "/programs/:id",
            get(programs::get_program)
                .put(programs::update_program)
                .delete(programs::delete_program),
        )
        .route("/programs/:id/courses", get(programs::list_program_courses))
        .route("/courses", get(courses::list_courses).post(courses::create_course))
        .route(
            "/courses/:id",
            get(courses::get_course)
                .put(courses::update_course)
                .delete(courses::delete_course),
        )
        .route(
            "/courses/:id/teachers",
            get(courses::list_course_teachers).post(courses::add_course_teacher),
        )
        .route(
            "/courses/:id/teachers/:user_id",
            delete(courses::remove_course_teacher),
        )
        .route(
            "/courses/:id/students",
            get(courses::list_course_students).post(courses::add_course_student),
        )
        .route(
            "/courses/:id/students/:user_id",
            delete(courses::remove_course_student),
        )
        .route(
            "/quizzes",
            get(coursework::list_quizzes).post(coursework::create_quiz),
        )
        .route("/quizzes/generate", post(quiz_gen::generate_quiz))
        .route(
            "/quizzes/:id",
            get(coursework::get_quiz)
                .put(coursework::update_quiz)
                .delete(coursework::delete_quiz),
        )
        .route("/quizzes/:id/questions", get(coursework::list_quiz_questions))
        .route(
            "/assignments",
            get(coursework::list_assignments).post(coursework::create_assignment),
        )
        .route(
            "/assignments/:id",
            get(coursework::get_assignment)
                .put(coursework::update_assignment)
                .delete(coursework::delete_assignment),
        )
        .route(
            "/assignments/:id/questions",
            get(coursework::list_assignment_questions),
        )
        .route(
            "/questions",
            get(questions::list_questions).post(questions::create_question),
        )
        .route("/questions/search", get(questions::search_questions))
        .route("/questions/count", get(questions::count_questions))
        .route(
            "/questions/:id",
            get(questions::get_question)
                .put(questions::update_question)
                .delete(questions::delete_question),
        )
        .route(
            "/question_options",
            get(options::list_options).post(options::create_option),
        )
        .route(
            "/question_options/:id",
            get(options::get_option)
                .put(options::update_option)
                .delete(options::delete_option),
        )
        .route(
            "/question_options/question/:question_id",
            get(options::list_question_options),
        )
        .route(
            "/student_answers",
            get(answers::list_answers).post(answers::create_answer),
        )
        .route(
            "/student_answers/:id",
            get(answers::get_answer)
                .put(answers::update_answer)
                .delete(answers::delete_answer),
        )
        .route(
            "/student_answers/student/:student_id",
            get(answers::list_student_answers),
        )
        .route(
            "/student_answers/question/:question_id",
            get(answers::list_question_answers),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
