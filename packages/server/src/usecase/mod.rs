//! UseCase layer
//!
//! アプリケーションのビジネスロジックを実装します。
//! 各ユースケースは Domain 層の trait と Infrastructure 層の共有状態を組み合わせて動作し、
//! プロトコルのイベントは [`EventDispatcher`] が振り分けます。

pub mod connect_participant;
pub mod create_session;
pub mod dispatcher;
pub mod error;
pub mod get_session;
pub mod join_session;
pub mod leave_session;
pub mod request_execution;
mod room;
pub mod update_code;
pub mod update_language;

#[cfg(test)]
pub(crate) mod test_support;

pub use connect_participant::ConnectParticipantUseCase;
pub use create_session::CreateSessionUseCase;
pub use dispatcher::EventDispatcher;
pub use error::{CreateSessionError, GetSessionError, JoinSessionError, RoomEventError};
pub use get_session::GetSessionUseCase;
pub use join_session::JoinSessionUseCase;
pub use leave_session::LeaveSessionUseCase;
pub use request_execution::RequestExecutionUseCase;
pub use update_code::UpdateCodeUseCase;
pub use update_language::UpdateLanguageUseCase;
