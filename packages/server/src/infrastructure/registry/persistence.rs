//! Session Store への非同期書き込み
//!
//! 変更は単一のワーカータスクにキューイングされ、FIFO 順で Store に適用されます。
//! 同じセッションへの後の書き込みが前の書き込みに追い越されることはありません。
//! 失敗はログに記録され、報告チャンネルがあればそこにも流れます。メモリ上の値は巻き戻しません。
//!
//! キューが保持するのは「どのスロット（セッション × 項目）に未適用の値があるか」だけで、
//! 値そのものはスロットごとに最新の 1 件だけを保持します。Store が詰まっても、
//! 未適用のドキュメントはセッションごとに最大 1 つです。

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tokio::sync::{mpsc, oneshot};

use crate::domain::{LanguageTag, RepositoryError, SessionCode, SessionStore};

/// A write against the Session Store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistCommand {
    Text { code: SessionCode, text: String },
    Language { code: SessionCode, language: LanguageTag },
    ParticipantCount { code: SessionCode, count: usize },
}

impl PersistCommand {
    fn slot(&self) -> Slot {
        match self {
            Self::Text { code, .. } => (code.clone(), Field::Text),
            Self::Language { code, .. } => (code.clone(), Field::Language),
            Self::ParticipantCount { code, .. } => (code.clone(), Field::ParticipantCount),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Field {
    Text,
    Language,
    ParticipantCount,
}

type Slot = (SessionCode, Field);

/// Newest not-yet-applied value per slot.
type Pending = Arc<Mutex<HashMap<Slot, PersistCommand>>>;

#[derive(Debug)]
enum Job {
    Write(Slot),
    /// Resolves once every job queued before it has been applied.
    Flush(oneshot::Sender<()>),
}

/// A durable write that did not make it to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceFailure {
    pub code: SessionCode,
    pub operation: &'static str,
    pub error: RepositoryError,
}

/// Handle to the persistence worker task. Cheap to clone.
#[derive(Clone)]
pub struct PersistenceWorker {
    sender: mpsc::UnboundedSender<Job>,
    pending: Pending,
}

impl PersistenceWorker {
    /// Spawn the worker on the current Tokio runtime.
    pub fn spawn(
        store: Arc<dyn SessionStore>,
        failures: Option<mpsc::UnboundedSender<PersistenceFailure>>,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let pending = Pending::default();
        tokio::spawn(run(store, receiver, pending.clone(), failures));
        Self { sender, pending }
    }

    /// Queue a write without waiting for it.
    ///
    /// If the same slot already has a queued value, that value is replaced and the
    /// queue position is kept.
    pub fn enqueue(&self, command: PersistCommand) {
        let slot = command.slot();
        let replaced = lock(&self.pending).insert(slot.clone(), command);
        if replaced.is_some() {
            tracing::trace!("Coalesced pending {:?} write for session '{}'", slot.1, slot.0);
            return;
        }
        self.send(Job::Write(slot));
    }

    /// Wait until every write queued so far has been applied (or has failed).
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        self.send(Job::Flush(done));
        let _ = wait.await;
    }

    fn send(&self, job: Job) {
        if let Err(e) = self.sender.send(job) {
            tracing::error!("Persistence worker is gone, dropping write: {:?}", e.0);
        }
    }
}

fn lock(pending: &Pending) -> std::sync::MutexGuard<'_, HashMap<Slot, PersistCommand>> {
    pending
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn run(
    store: Arc<dyn SessionStore>,
    mut receiver: mpsc::UnboundedReceiver<Job>,
    pending: Pending,
    failures: Option<mpsc::UnboundedSender<PersistenceFailure>>,
) {
    while let Some(job) = receiver.recv().await {
        let slot = match job {
            Job::Write(slot) => slot,
            Job::Flush(done) => {
                let _ = done.send(());
                continue;
            }
        };
        let Some(command) = lock(&pending).remove(&slot) else {
            continue;
        };

        let (code, operation, result) = match command {
            PersistCommand::Text { code, text } => {
                let result = store.update_text(&code, &text).await;
                (code, "update_text", result)
            }
            PersistCommand::Language { code, language } => {
                let result = store.update_language(&code, &language).await;
                (code, "update_language", result)
            }
            PersistCommand::ParticipantCount { code, count } => {
                let result = store.update_participant_count(&code, count).await;
                (code, "update_participant_count", result)
            }
        };

        match result {
            Ok(()) => tracing::debug!("Persisted {} for session '{}'", operation, code),
            Err(error) => {
                tracing::error!(
                    "Failed to persist {} for session '{}': {}",
                    operation,
                    code,
                    error
                );
                if let Some(failures) = &failures {
                    let _ = failures.send(PersistenceFailure {
                        code,
                        operation,
                        error,
                    });
                }
            }
        }
    }
    tracing::debug!("Persistence worker stopped");
}
