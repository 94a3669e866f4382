//! Axum Handlers for the REST API
//!
//! Request handling for the task lifecycle, word assignment, and level
//! progression endpoints. `utoipa` doc comments generate the OpenAPI
//! documentation.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use crate::{
    db::StoreError,
    models::{
        AddWordsPayload, AddWordsResponse, CompleteTaskPayload, CompleteTaskResponse,
        CreateTaskPayload, ErrorResponse, Task, UpdateLevelPayload, UserInLevel,
    },
    state::AppState,
};

pub enum ApiError {
    Unauthorized(String),
    BadRequest(String),
    NotFound(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(message) => {
                (StatusCode::UNAUTHORIZED, Json(ErrorResponse { message })).into_response()
            }
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

impl ApiError {
    /// Maps storage errors, keeping NotFound distinct from storage failure.
    fn from_store(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ApiError::NotFound(format!("{what} not found")),
            other => ApiError::InternalServerError(other.into()),
        }
    }
}

/// Extracts the caller identity; requests without a credential are rejected
/// before any core logic runs.
fn require_user(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("x-user-id header is required".to_string()))
}

/// Create a task for one rung of the skill ladder, or return the open one.
#[utoipa::path(
    post,
    path = "/tasks",
    request_body = CreateTaskPayload,
    responses(
        (status = 201, description = "Task created (or existing open task returned)", body = Task),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 401, description = "Missing credential", body = ErrorResponse),
        (status = 404, description = "Unknown user or topic", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("x-user-id" = String, Header, description = "The ID of the learner")
    )
)]
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateTaskPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = require_user(&headers)?;
    if payload.level < 1 {
        return Err(ApiError::BadRequest("level must be positive".to_string()));
    }
    if payload.topic.trim().is_empty() {
        return Err(ApiError::BadRequest("topic is required".to_string()));
    }

    let task = state
        .db
        .create_task(user_id, &payload.topic, payload.level, payload.task_type)
        .await
        .map_err(ApiError::from_store)?;

    Ok((StatusCode::CREATED, Json(task)))
}

/// Complete a task with its score and duration.
#[utoipa::path(
    post,
    path = "/tasks/{id}/complete",
    request_body = CompleteTaskPayload,
    responses(
        (status = 200, description = "Task completed; levelAdvanced reports the progression outcome", body = CompleteTaskResponse),
        (status = 401, description = "Missing credential", body = ErrorResponse),
        (status = 404, description = "Task not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Task ID"),
        ("x-user-id" = String, Header, description = "The ID of the learner")
    )
)]
pub async fn complete_task(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<CompleteTaskPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let _user_id = require_user(&headers)?;

    let outcome = state
        .db
        .complete_task(id, payload.score, payload.duration_seconds)
        .await
        .map_err(ApiError::from_store)?;

    Ok((
        StatusCode::OK,
        Json(CompleteTaskResponse {
            completed: true,
            level_advanced: outcome.level_advanced,
        }),
    ))
}

/// Attach vocabulary items to a task.
#[utoipa::path(
    post,
    path = "/tasks/{id}/words",
    request_body = AddWordsPayload,
    responses(
        (status = 200, description = "Linkage outcome; re-adding existing pairs is a no-op", body = AddWordsResponse),
        (status = 401, description = "Missing credential", body = ErrorResponse),
        (status = 404, description = "Task not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Task ID"),
        ("x-user-id" = String, Header, description = "The ID of the learner")
    )
)]
pub async fn add_words(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddWordsPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let _user_id = require_user(&headers)?;

    let outcome = state
        .db
        .add_words(id, &payload.word_ids)
        .await
        .map_err(ApiError::from_store)?;

    Ok((
        StatusCode::OK,
        Json(AddWordsResponse {
            added: outcome.added,
            failed_ids: outcome.failed_ids,
        }),
    ))
}

/// Upsert the learner's progress row for a topic level.
#[utoipa::path(
    put,
    path = "/levels",
    request_body = UpdateLevelPayload,
    responses(
        (status = 200, description = "Progress row upserted", body = UserInLevel),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 401, description = "Missing credential", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("x-user-id" = String, Header, description = "The ID of the learner")
    )
)]
pub async fn update_level(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<UpdateLevelPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = require_user(&headers)?;
    if payload.current_level < 1 {
        return Err(ApiError::BadRequest("currentLevel must be positive".to_string()));
    }

    let row = state
        .db
        .upsert_level(
            user_id,
            &payload.topic_name,
            payload.current_level,
            payload.earned_score,
            payload.is_completed,
        )
        .await
        .map_err(ApiError::from_store)?;

    Ok((StatusCode::OK, Json(row)))
}

/// Get the learner's current open level for a topic.
#[utoipa::path(
    get,
    path = "/progress/{topic}",
    responses(
        (status = 200, description = "The open progress row", body = UserInLevel),
        (status = 401, description = "Missing credential", body = ErrorResponse),
        (status = 404, description = "Unknown topic, or no progress for it", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("topic" = String, Path, description = "Topic name or slug"),
        ("x-user-id" = String, Header, description = "The ID of the learner")
    )
)]
pub async fn get_progress(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(topic): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = require_user(&headers)?;
    let topic_name = state
        .db
        .resolve_topic(&topic)
        .await
        .map_err(ApiError::from_store)?;

    let row = state
        .db
        .current_progress(user_id, &topic_name)
        .await
        .map_err(ApiError::from_store)?
        .ok_or_else(|| ApiError::NotFound(format!("No progress for topic '{topic_name}'")))?;

    Ok((StatusCode::OK, Json(row)))
}
