//! Session manager messages
//!
//! Commands and responses for the actor pattern.

use std::fmt;
use thiserror::Error;
use tokio::sync::oneshot;

use super::types::{
    AccumulatedMessage, AnalysisInput, BatchId, BatchSnapshot, ConversationId, ConversationState, OneShotHandler,
    RawRef, UserId,
};

/// Errors from session operations
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Channel error")]
    ChannelError,
}

/// Response from session operations
pub type SessionResponse<T> = Result<T, SessionError>;

/// Commands sent to the SessionManager actor
pub enum SessionCommand {
    AddMessage {
        conversation: ConversationId,
        message: AccumulatedMessage,
        user_id: Option<UserId>,
        reply: oneshot::Sender<()>,
    },
    GetMessages {
        conversation: ConversationId,
        reply: oneshot::Sender<Option<Vec<AccumulatedMessage>>>,
    },
    GetBatch {
        conversation: ConversationId,
        reply: oneshot::Sender<Option<BatchSnapshot>>,
    },
    SetAnalyzedTasks {
        conversation: ConversationId,
        batch_id: BatchId,
        descriptions: Vec<String>,
        reply: oneshot::Sender<bool>,
    },
    GetAnalyzedTasks {
        conversation: ConversationId,
        reply: oneshot::Sender<Option<Vec<String>>>,
    },
    SetStatusMessage {
        conversation: ConversationId,
        raw_ref: RawRef,
        reply: oneshot::Sender<bool>,
    },
    Clear {
        conversation: ConversationId,
        reply: oneshot::Sender<()>,
    },

    // Conversation state
    SetState {
        conversation: ConversationId,
        state: ConversationState,
        reply: oneshot::Sender<()>,
    },
    GetState {
        conversation: ConversationId,
        reply: oneshot::Sender<ConversationState>,
    },
    ClearState {
        conversation: ConversationId,
        reply: oneshot::Sender<()>,
    },

    // One-shot handlers
    RegisterOneShot {
        user: UserId,
        handler: OneShotHandler,
        reply: oneshot::Sender<()>,
    },
    TakeOneShot {
        user: UserId,
        reply: oneshot::Sender<Option<OneShotHandler>>,
    },

    // Debounce
    ProcessNow {
        conversation: ConversationId,
        reply: oneshot::Sender<bool>,
    },
    TimerFired {
        conversation: ConversationId,
        generation: u64,
    },
    TakeForAnalysis {
        conversation: ConversationId,
        reply: oneshot::Sender<Option<AnalysisInput>>,
    },

    // Shutdown
    Shutdown,
}

impl fmt::Debug for SessionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionCommand::AddMessage { .. } => "AddMessage",
            SessionCommand::GetMessages { .. } => "GetMessages",
            SessionCommand::GetBatch { .. } => "GetBatch",
            SessionCommand::SetAnalyzedTasks { .. } => "SetAnalyzedTasks",
            SessionCommand::GetAnalyzedTasks { .. } => "GetAnalyzedTasks",
            SessionCommand::SetStatusMessage { .. } => "SetStatusMessage",
            SessionCommand::Clear { .. } => "Clear",
            SessionCommand::SetState { .. } => "SetState",
            SessionCommand::GetState { .. } => "GetState",
            SessionCommand::ClearState { .. } => "ClearState",
            SessionCommand::RegisterOneShot { .. } => "RegisterOneShot",
            SessionCommand::TakeOneShot { .. } => "TakeOneShot",
            SessionCommand::ProcessNow { .. } => "ProcessNow",
            SessionCommand::TimerFired { .. } => "TimerFired",
            SessionCommand::TakeForAnalysis { .. } => "TakeForAnalysis",
            SessionCommand::Shutdown => "Shutdown",
        };
        f.write_str(name)
    }
}
