//! HTTP API response DTOs.

use serde::{Deserialize, Serialize};

/// Response body of `POST /api/session`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub id: String,
    pub code: String,
    /// Path of the editor page for this session.
    pub url: String,
}

/// Response body of `GET /api/session/{code}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshotDto {
    pub id: String,
    pub session_code: String,
    pub code: String,
    pub language: String,
    pub connected_users: usize,
    /// RFC 3339 (UTC)
    pub created_at: String,
}

/// Error body shared by all endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
