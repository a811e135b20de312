//! Utilities shared by the Pairpad binaries: logging setup and the clock abstraction.

pub mod logger;
pub mod time;
