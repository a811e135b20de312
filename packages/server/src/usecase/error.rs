//! UseCase 層のエラー定義

use thiserror::Error;

use crate::{domain::RepositoryError, infrastructure::registry::RegistryError};

/// セッション作成のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CreateSessionError {
    #[error("Could not allocate a unique session code after {attempts} attempts")]
    CodeCollision { attempts: usize },

    #[error("Failed to persist session: {0}")]
    Persistence(RepositoryError),
}

impl From<RegistryError> for CreateSessionError {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::CodeCollision { attempts } => Self::CodeCollision { attempts },
            RegistryError::Persistence(e) => Self::Persistence(e),
            RegistryError::NotFound(code) => Self::Persistence(RepositoryError::NotFound(code)),
        }
    }
}

/// セッション取得のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GetSessionError {
    #[error("Session not found")]
    NotFound(String),

    #[error("Failed to load session: {0}")]
    Persistence(RepositoryError),
}

impl From<RegistryError> for GetSessionError {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::NotFound(code) => Self::NotFound(code),
            RegistryError::Persistence(e) => Self::Persistence(e),
            RegistryError::CodeCollision { attempts } => Self::Persistence(
                RepositoryError::Storage(format!("code collision after {attempts} attempts")),
            ),
        }
    }
}

/// セッション参加のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinSessionError {
    #[error("Session not found")]
    NotFound(String),

    #[error("Connection is closed")]
    Closed,

    #[error("Failed to load session: {0}")]
    Persistence(RepositoryError),
}

impl From<RegistryError> for JoinSessionError {
    fn from(error: RegistryError) -> Self {
        match GetSessionError::from(error) {
            GetSessionError::NotFound(code) => Self::NotFound(code),
            GetSessionError::Persistence(e) => Self::Persistence(e),
        }
    }
}

/// 入室中のルームに対するイベント（code_change / language_change / execute_code）のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomEventError {
    #[error("Session not found")]
    SessionNotFound(String),

    /// The session exists but this connection has not joined it.
    #[error("Not joined to session '{0}'")]
    NotInSession(String),

    /// Membership was lost (eviction or disconnect) before the event was applied.
    #[error("Connection is no longer a member of the session")]
    NotMember,

    #[error("Failed to load session: {0}")]
    Persistence(RepositoryError),
}

impl From<RegistryError> for RoomEventError {
    fn from(error: RegistryError) -> Self {
        match GetSessionError::from(error) {
            GetSessionError::NotFound(code) => Self::SessionNotFound(code),
            GetSessionError::Persistence(e) => Self::Persistence(e),
        }
    }
}
