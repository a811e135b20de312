//! Session Store 実装
//!
//! - `inmemory`: HashMap を使った実装
//! - `sqlite`: rusqlite を使った永続化実装

pub mod inmemory;
pub mod sqlite;

pub use inmemory::InMemorySessionStore;
pub use sqlite::SqliteSessionStore;
