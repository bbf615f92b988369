//! State management with actor pattern
//!
//! StateManager owns the SQLite TaskStore and processes messages via
//! channels, so the connection never crosses threads.

mod manager;
mod messages;

pub use manager::StateManager;
pub use messages::{StateCommand, StateError, StateResponse};
