//! SQLite Session Store 実装
//!
//! rusqlite を使った SessionStore の永続化実装。
//! 接続は 1 本を Mutex で共有し、クエリは `spawn_blocking` 上で実行します。
//! セッションコードの一意性は `UNIQUE` 制約で保証します。

use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};

use crate::domain::{
    LanguageTag, RepositoryError, Session, SessionCode, SessionId, SessionStore, Timestamp,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS interview_sessions (
    id              TEXT PRIMARY KEY,
    session_code    TEXT NOT NULL UNIQUE,
    code            TEXT NOT NULL DEFAULT '',
    language        TEXT NOT NULL DEFAULT 'javascript',
    created_at      INTEGER NOT NULL,
    connected_users INTEGER NOT NULL DEFAULT 0
);
";

impl From<rusqlite::Error> for RepositoryError {
    fn from(e: rusqlite::Error) -> Self {
        RepositoryError::Storage(e.to_string())
    }
}

/// SQLite Session Store 実装
pub struct SqliteSessionStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSessionStore {
    /// Open (or create) a database file and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, RepositoryError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, RepositoryError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, RepositoryError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, RepositoryError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| RepositoryError::Storage("connection mutex poisoned".to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| RepositoryError::Storage(e.to_string()))?
    }

    async fn update_column(
        &self,
        code: &SessionCode,
        sql: &'static str,
        value: rusqlite::types::Value,
    ) -> Result<(), RepositoryError> {
        let code = code.clone();
        self.with_conn(move |conn| {
            let changed = conn.execute(sql, params![value, code.as_str()])?;
            if changed == 0 {
                return Err(RepositoryError::NotFound(code.into_string()));
            }
            Ok(())
        })
        .await
    }
}

fn row_to_session(
    id: String,
    session_code: String,
    code: String,
    language: String,
    created_at: i64,
    connected_users: i64,
) -> Result<Session, RepositoryError> {
    let session_code = SessionCode::new(session_code)
        .map_err(|e| RepositoryError::Storage(format!("corrupt row {id}: {e}")))?;
    Ok(Session {
        id: SessionId::from_stored(id),
        code: session_code,
        document: code,
        language: LanguageTag::new(language).unwrap_or_default(),
        created_at: Timestamp::new(created_at),
        participant_count: usize::try_from(connected_users).unwrap_or(0),
    })
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn create_session(&self, session: &Session) -> Result<(), RepositoryError> {
        let session = session.clone();
        self.with_conn(move |conn| {
            let result = conn.execute(
                "INSERT INTO interview_sessions
                     (id, session_code, code, language, created_at, connected_users)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    session.id.as_str(),
                    session.code.as_str(),
                    session.document,
                    session.language.as_str(),
                    session.created_at.value(),
                    session.participant_count as i64,
                ],
            );
            match result {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == ErrorCode::ConstraintViolation =>
                {
                    Err(RepositoryError::Conflict(session.code.into_string()))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn get_by_code(&self, code: &SessionCode) -> Result<Session, RepositoryError> {
        let code = code.clone();
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT id, session_code, code, language, created_at, connected_users
                     FROM interview_sessions WHERE session_code = ?1",
                    params![code.as_str()],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, i64>(4)?,
                            row.get::<_, i64>(5)?,
                        ))
                    },
                )
                .optional()?;
            match row {
                Some((id, session_code, text, language, created_at, users)) => {
                    row_to_session(id, session_code, text, language, created_at, users)
                }
                None => Err(RepositoryError::NotFound(code.into_string())),
            }
        })
        .await
    }

    async fn update_text(&self, code: &SessionCode, text: &str) -> Result<(), RepositoryError> {
        self.update_column(
            code,
            "UPDATE interview_sessions SET code = ?1 WHERE session_code = ?2",
            rusqlite::types::Value::Text(text.to_string()),
        )
        .await
    }

    async fn update_language(
        &self,
        code: &SessionCode,
        language: &LanguageTag,
    ) -> Result<(), RepositoryError> {
        self.update_column(
            code,
            "UPDATE interview_sessions SET language = ?1 WHERE session_code = ?2",
            rusqlite::types::Value::Text(language.as_str().to_string()),
        )
        .await
    }

    async fn update_participant_count(
        &self,
        code: &SessionCode,
        count: usize,
    ) -> Result<(), RepositoryError> {
        self.update_column(
            code,
            "UPDATE interview_sessions SET connected_users = ?1 WHERE session_code = ?2",
            rusqlite::types::Value::Integer(count as i64),
        )
        .await
    }
}
