//! Session Registry
//!
//! セッションコードからライブ状態への、プロセス内で権威を持つマップ。
//!
//! ## 設計ノート
//!
//! - セッションごとに非同期 Mutex を持ち、[`RoomLease`] を保持している間が
//!   そのルームのクリティカルセクション（変更とブロードキャストを同じ区間で行う）
//! - 無関係なセッション同士は、マップ参照の短い区間以外で待ち合わせない
//! - Session Store は [`PersistenceWorker`] 経由で追従する遅延ミラー
//! - エントリはプロセス終了まで常駐する

pub mod persistence;

use std::{collections::HashMap, sync::Arc};

use pairpad_shared::time::Clock;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard, mpsc};

use crate::domain::{
    CodeGenerator, ConnectionId, LanguageTag, LiveSession, RepositoryError, Session, SessionCode,
    SessionId, SessionStore, Timestamp,
};

pub use persistence::{PersistCommand, PersistenceFailure, PersistenceWorker};

/// Attempts at finding an unused short code before giving up.
pub const CODE_RETRY_BUDGET: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Session '{0}' not found")]
    NotFound(String),

    #[error("Could not allocate a unique session code after {attempts} attempts")]
    CodeCollision { attempts: usize },

    #[error("Persistence failure: {0}")]
    Persistence(RepositoryError),
}

type Entry = Arc<Mutex<LiveSession>>;

pub struct SessionRegistry {
    store: Arc<dyn SessionStore>,
    codes: Arc<dyn CodeGenerator>,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<SessionCode, Entry>>,
    persistence: PersistenceWorker,
}

impl SessionRegistry {
    /// Create a registry whose persistence failures are only logged.
    ///
    /// Must be called inside a Tokio runtime: the persistence worker is spawned here.
    pub fn new(
        store: Arc<dyn SessionStore>,
        codes: Arc<dyn CodeGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::build(store, codes, clock, None)
    }

    /// Like [`SessionRegistry::new`], additionally forwarding persistence failures.
    pub fn with_failure_reporter(
        store: Arc<dyn SessionStore>,
        codes: Arc<dyn CodeGenerator>,
        clock: Arc<dyn Clock>,
        failures: mpsc::UnboundedSender<PersistenceFailure>,
    ) -> Self {
        Self::build(store, codes, clock, Some(failures))
    }

    fn build(
        store: Arc<dyn SessionStore>,
        codes: Arc<dyn CodeGenerator>,
        clock: Arc<dyn Clock>,
        failures: Option<mpsc::UnboundedSender<PersistenceFailure>>,
    ) -> Self {
        let persistence = PersistenceWorker::spawn(Arc::clone(&store), failures);
        Self {
            store,
            codes,
            clock,
            entries: Mutex::new(HashMap::new()),
            persistence,
        }
    }

    /// Allocate and persist a new session.
    ///
    /// `code_hint` is tried first; on a storage conflict fresh codes are generated until
    /// [`CODE_RETRY_BUDGET`] attempts have been spent.
    pub async fn create(&self, code_hint: Option<SessionCode>) -> Result<Session, RegistryError> {
        let mut candidate = code_hint.unwrap_or_else(|| self.codes.generate());
        for attempt in 1..=CODE_RETRY_BUDGET {
            let session = Session::new(
                SessionId::generate(),
                candidate.clone(),
                Timestamp::new(self.clock.now_millis()),
            );
            match self.store.create_session(&session).await {
                Ok(()) => {
                    self.entries.lock().await.insert(
                        session.code.clone(),
                        Arc::new(Mutex::new(LiveSession::from_session(session.clone()))),
                    );
                    tracing::info!("Session '{}' created ({})", session.code, session.id.as_str());
                    return Ok(session);
                }
                Err(RepositoryError::Conflict(code)) => {
                    tracing::warn!(
                        "Session code '{}' already taken (attempt {}/{})",
                        code,
                        attempt,
                        CODE_RETRY_BUDGET
                    );
                    candidate = self.codes.generate();
                }
                Err(e) => return Err(RegistryError::Persistence(e)),
            }
        }
        Err(RegistryError::CodeCollision {
            attempts: CODE_RETRY_BUDGET,
        })
    }

    /// Snapshot of the live entry, loading it from the store if needed.
    pub async fn hydrate(&self, code: &SessionCode) -> Result<Session, RegistryError> {
        Ok(self.enter(code).await?.snapshot())
    }

    /// Enter the session's critical section, hydrating the entry if needed.
    pub async fn enter(&self, code: &SessionCode) -> Result<RoomLease, RegistryError> {
        let existing = self.entries.lock().await.get(code).cloned();
        let entry = match existing {
            Some(entry) => entry,
            None => self.load(code).await?,
        };
        Ok(RoomLease {
            session: entry.lock_owned().await,
            persistence: self.persistence.clone(),
        })
    }

    async fn load(&self, code: &SessionCode) -> Result<Entry, RegistryError> {
        let stored = match self.store.get_by_code(code).await {
            Ok(session) => session,
            Err(RepositoryError::NotFound(_)) => {
                return Err(RegistryError::NotFound(code.as_str().to_string()));
            }
            Err(e) => return Err(RegistryError::Persistence(e)),
        };
        let stale_count = stored.participant_count;

        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get(code) {
            return Ok(Arc::clone(entry));
        }
        let entry = Arc::new(Mutex::new(LiveSession::from_session(stored)));
        entries.insert(code.clone(), Arc::clone(&entry));
        drop(entries);

        tracing::info!("Session '{}' hydrated from store", code);
        if stale_count != 0 {
            // Nobody is connected to a freshly hydrated session.
            self.persistence.enqueue(PersistCommand::ParticipantCount {
                code: code.clone(),
                count: 0,
            });
        }
        Ok(entry)
    }

    pub async fn mutate_document(
        &self,
        code: &SessionCode,
        text: String,
    ) -> Result<(), RegistryError> {
        self.enter(code).await?.set_document(text);
        Ok(())
    }

    pub async fn mutate_language(
        &self,
        code: &SessionCode,
        language: LanguageTag,
    ) -> Result<(), RegistryError> {
        self.enter(code).await?.set_language(language);
        Ok(())
    }

    pub async fn add_member(
        &self,
        code: &SessionCode,
        handle: ConnectionId,
    ) -> Result<usize, RegistryError> {
        Ok(self.enter(code).await?.add_member(handle))
    }

    pub async fn remove_member(
        &self,
        code: &SessionCode,
        handle: &ConnectionId,
    ) -> Result<usize, RegistryError> {
        Ok(self.enter(code).await?.remove_member(handle))
    }

    /// Wait for every queued durable write to be applied.
    pub async fn flush(&self) {
        self.persistence.flush().await;
    }

    /// Number of sessions with a live entry.
    pub async fn live_count(&self) -> usize {
        self.entries.lock().await.len()
    }
}

/// Exclusive access to one live session.
///
/// Every mutation updates memory first and then queues the durable write.
pub struct RoomLease {
    session: OwnedMutexGuard<LiveSession>,
    persistence: PersistenceWorker,
}

impl RoomLease {
    pub fn code(&self) -> &SessionCode {
        self.session.code()
    }

    pub fn document(&self) -> &str {
        self.session.document()
    }

    pub fn language(&self) -> &LanguageTag {
        self.session.language()
    }

    pub fn has_member(&self, handle: &ConnectionId) -> bool {
        self.session.has_member(handle)
    }

    pub fn member_count(&self) -> usize {
        self.session.member_count()
    }

    pub fn snapshot(&self) -> Session {
        self.session.snapshot()
    }

    pub fn set_document(&mut self, text: String) {
        self.session.set_document(text.clone());
        self.persistence.enqueue(PersistCommand::Text {
            code: self.session.code().clone(),
            text,
        });
    }

    pub fn set_language(&mut self, language: LanguageTag) {
        self.session.set_language(language.clone());
        self.persistence.enqueue(PersistCommand::Language {
            code: self.session.code().clone(),
            language,
        });
    }

    /// Add a member; the count is persisted when it changes.
    pub fn add_member(&mut self, handle: ConnectionId) -> usize {
        let before = self.session.member_count();
        let after = self.session.add_member(handle);
        if after != before {
            self.persist_count(after);
        }
        after
    }

    /// Remove a member if present; the count is persisted when it changes.
    pub fn remove_member(&mut self, handle: &ConnectionId) -> usize {
        let before = self.session.member_count();
        let after = self.session.remove_member(handle);
        if after != before {
            self.persist_count(after);
        }
        after
    }

    fn persist_count(&self, count: usize) {
        self.persistence.enqueue(PersistCommand::ParticipantCount {
            code: self.session.code().clone(),
            count,
        });
    }
}
