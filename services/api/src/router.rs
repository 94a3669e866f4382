//! Axum Router Configuration
//!
//! Complete HTTP routing for the application: the REST API, the conversation
//! WebSocket endpoint, and OpenAPI documentation.

use crate::{
    handlers,
    models::{
        AddWordsPayload, AddWordsResponse, CompleteTaskPayload, CompleteTaskResponse,
        ConversationSession, CreateTaskPayload, ErrorResponse, Question, Task, TaskType,
        UpdateLevelPayload, UserInLevel,
    },
    state::AppState,
    ws::ws_handler,
};

use axum::{
    Router,
    routing::{get, post, put},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::create_task,
        handlers::complete_task,
        handlers::add_words,
        handlers::update_level,
        handlers::get_progress,
    ),
    components(
        schemas(
            Task, TaskType, UserInLevel, ConversationSession, Question,
            CreateTaskPayload, CompleteTaskPayload, CompleteTaskResponse,
            AddWordsPayload, AddWordsResponse, UpdateLevelPayload, ErrorResponse
        )
    ),
    tags(
        (name = "Lingua API", description = "Task lifecycle, level progression, and live conversation practice")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Group all routes that require AppState into their own router.
    let api_router = Router::new()
        .route("/tasks", post(handlers::create_task))
        .route("/tasks/{id}/complete", post(handlers::complete_task))
        .route("/tasks/{id}/words", post(handlers::add_words))
        .route("/levels", put(handlers::update_level))
        .route("/progress/{topic}", get(handlers::get_progress))
        .route("/ws", get(ws_handler))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
