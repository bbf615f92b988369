//! Per-conversation session state with actor pattern
//!
//! SessionManager owns message batches, their debounce timers, conversation
//! state tags and one-shot text handlers. Nothing here is persisted.

mod manager;
mod messages;
mod types;

pub use manager::SessionManager;
pub use messages::{SessionCommand, SessionError, SessionResponse};
pub use types::{
    AccumulatedMessage, AnalysisInput, BatchId, BatchReady, BatchSnapshot, ConversationId, ConversationState, OneShotContext,
    OneShotHandler, RawRef, UserId, one_shot,
};
