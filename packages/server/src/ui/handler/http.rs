//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    infrastructure::dto::http::{CreateSessionResponse, ErrorResponse, SessionSnapshotDto},
    ui::state::AppState,
    usecase::GetSessionError,
};

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Create a new session
pub async fn create_session(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), ApiError> {
    match state.create_session_usecase.execute().await {
        // Domain Model から DTO への変換
        Ok(session) => Ok((StatusCode::CREATED, Json(session.into()))),
        Err(e) => Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

/// Get the live snapshot of a session by code
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<SessionSnapshotDto>, ApiError> {
    match state.get_session_usecase.execute(code).await {
        Ok(session) => Ok(Json(session.into())),
        Err(e @ GetSessionError::NotFound(_)) => Err(api_error(StatusCode::NOT_FOUND, e.to_string())),
        Err(e @ GetSessionError::Persistence(_)) => {
            tracing::error!("Failed to load session: {}", e);
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}
