//! Server execution logic.

use std::{future::Future, sync::Arc};

use axum::{
    Router,
    routing::{get, post},
};
use pairpad_shared::time::SystemClock;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::ConnectionSettings,
    domain::{RandomCodeGenerator, SessionStore},
    infrastructure::{
        connection::ConnectionManager, message_pusher::WebSocketMessagePusher,
        registry::SessionRegistry,
    },
    usecase::{CreateSessionUseCase, EventDispatcher, GetSessionUseCase},
};

use super::{
    handler::{create_session, get_session, health_check, websocket_handler},
    signal::shutdown_signal,
    state::AppState,
};

/// Collaborative session server
///
/// # Example
///
/// ```ignore
/// let server = Server::with_store(Arc::new(InMemorySessionStore::new()), ConnectionSettings::default());
/// server.run("127.0.0.1".to_string(), 5000).await?;
/// ```
pub struct Server {
    /// CreateSessionUseCase（セッション作成のユースケース）
    create_session_usecase: Arc<CreateSessionUseCase>,
    /// GetSessionUseCase（セッション取得のユースケース）
    get_session_usecase: Arc<GetSessionUseCase>,
    /// EventDispatcher（WebSocket プロトコルの状態機械）
    dispatcher: Arc<EventDispatcher>,
    connection_settings: ConnectionSettings,
}

impl Server {
    pub fn new(
        create_session_usecase: Arc<CreateSessionUseCase>,
        get_session_usecase: Arc<GetSessionUseCase>,
        dispatcher: Arc<EventDispatcher>,
        connection_settings: ConnectionSettings,
    ) -> Self {
        Self {
            create_session_usecase,
            get_session_usecase,
            dispatcher,
            connection_settings,
        }
    }

    /// Wire the registry, broadcaster and use cases on top of `store`.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn with_store(store: Arc<dyn SessionStore>, connection_settings: ConnectionSettings) -> Self {
        // Initialize dependencies in order:
        // 1. Registry (spawns the persistence worker)
        // 2. MessagePusher and ConnectionManager
        // 3. UseCases
        let clock = Arc::new(SystemClock);
        let registry = Arc::new(SessionRegistry::new(
            store,
            Arc::new(RandomCodeGenerator),
            clock.clone(),
        ));
        let message_pusher = Arc::new(WebSocketMessagePusher::default());
        let connections = Arc::new(ConnectionManager::new(clock));

        Self::new(
            Arc::new(CreateSessionUseCase::new(registry.clone())),
            Arc::new(GetSessionUseCase::new(registry.clone())),
            Arc::new(EventDispatcher::new(registry, message_pusher, connections)),
            connection_settings,
        )
    }

    /// Build the axum router.
    pub fn router(self) -> Router {
        let app_state = Arc::new(AppState {
            create_session_usecase: self.create_session_usecase,
            get_session_usecase: self.get_session_usecase,
            dispatcher: self.dispatcher,
            connection_settings: self.connection_settings,
        });

        Router::new()
            // WebSocket エンドポイント
            .route("/ws", get(websocket_handler))
            // HTTP エンドポイント
            .route("/health", get(health_check))
            .route("/api/session", post(create_session))
            .route("/api/session/{code}", get(get_session))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(app_state)
    }

    /// Bind to `host:port` and serve until Ctrl+C or SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr).await?;
        tracing::info!("Connect to: ws://{}/ws", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");
        self.serve(listener, shutdown_signal()).await?;
        Ok(())
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!("pairpad server listening on {}", listener.local_addr()?);
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;
        tracing::info!("Server shutdown complete");
        Ok(())
    }
}
