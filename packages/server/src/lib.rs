//! pairpad server library.
//!
//! Real-time collaborative editing sessions over WebSocket: participants join a
//! session by its short code and receive each other's document and language changes,
//! while the session state is persisted in the background.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

pub mod config;
