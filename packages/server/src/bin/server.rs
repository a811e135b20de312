//! Collaborative session server.
//!
//! Participants join a session by its short code over WebSocket and receive each other's
//! edits in real time. Sessions are persisted to SQLite (or kept in memory).
//!
//! Run with:
//! ```not_rust
//! cargo run --bin pairpad-server
//! cargo run --bin pairpad-server -- --host 0.0.0.0 --port 3000 --database /var/lib/pairpad.db
//! cargo run --bin pairpad-server -- --in-memory --log-level debug
//! ```

use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use pairpad_server::{
    config::{ConnectionSettings, ServerConfig, StoreConfig},
    domain::SessionStore,
    infrastructure::repository::{InMemorySessionStore, SqliteSessionStore},
    ui::Server,
};
use pairpad_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "pairpad-server")]
#[command(about = "Real-time collaborative editing session server", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, env = "HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, env = "PORT", default_value = "5000")]
    port: u16,

    /// SQLite database file
    #[arg(long, env = "PAIRPAD_DATABASE", default_value = "pairpad.db")]
    database: PathBuf,

    /// Keep sessions in memory only (overrides --database)
    #[arg(long)]
    in_memory: bool,

    /// Outbound queue capacity per connection
    #[arg(long, default_value = "256", value_parser = clap::value_parser!(u64).range(1..))]
    outbound_capacity: u64,

    /// Seconds between WebSocket pings
    #[arg(long, default_value = "25", value_parser = clap::value_parser!(u64).range(1..))]
    heartbeat_secs: u64,

    /// Seconds without any inbound frame before a connection is dropped
    #[arg(long, default_value = "60", value_parser = clap::value_parser!(u64).range(1..))]
    idle_timeout_secs: u64,

    /// Default log level when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
            store: if args.in_memory {
                StoreConfig::InMemory
            } else {
                StoreConfig::Sqlite(args.database)
            },
            connection: ConnectionSettings {
                outbound_capacity: usize::try_from(args.outbound_capacity).unwrap_or(usize::MAX),
                heartbeat_interval: Duration::from_secs(args.heartbeat_secs),
                idle_timeout: Duration::from_secs(args.idle_timeout_secs),
            },
        }
    }
}

fn open_store(config: &StoreConfig) -> Result<Arc<dyn SessionStore>, Box<dyn std::error::Error>> {
    match config {
        StoreConfig::InMemory => {
            tracing::warn!("Using the in-memory store; sessions are lost on restart");
            Ok(Arc::new(InMemorySessionStore::new()))
        }
        StoreConfig::Sqlite(path) => {
            tracing::info!("Opening SQLite store at {}", path.display());
            Ok(Arc::new(SqliteSessionStore::open(path)?))
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &args.log_level);

    let config = ServerConfig::from(args);
    let store = match open_store(&config.store) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("Failed to open session store: {}", e);
            std::process::exit(1);
        }
    };

    let server = Server::with_store(store, config.connection);
    if let Err(e) = server.run(config.host, config.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
