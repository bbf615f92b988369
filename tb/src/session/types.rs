//! Session data types

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;

/// Chat id the session state is keyed by
pub type ConversationId = i64;

/// Owner of tasks and projects
pub type UserId = u64;

/// Identity of one pending batch; a batch created after `clear` gets a new one
pub type BatchId = u64;

/// Opaque handle back to a transport message
///
/// For Telegram this is `"<chat_id>:<message_id>"`; the core never looks inside.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RawRef(pub String);

impl RawRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RawRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One buffered chat message
#[derive(Debug, Clone, PartialEq)]
pub struct AccumulatedMessage {
    pub text: String,
    pub received_at: DateTime<Utc>,
    pub raw_ref: RawRef,
}

/// Conversation-level state tag
///
/// `AwaitingProjectName` covers two sub-flows told apart by the batch:
/// with analyzed tasks it names the project for them, without it just
/// creates a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    #[default]
    Idle,
    Accumulating,
    AwaitingProjectName,
}

/// Emitted when a batch has been quiet for the debounce period or was forced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchReady {
    pub conversation: ConversationId,
    pub user_id: Option<UserId>,
}

/// Read-only view of a pending batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSnapshot {
    pub batch_id: BatchId,
    pub messages: Vec<AccumulatedMessage>,
    pub last_message_at: DateTime<Utc>,
    pub analyzed_tasks: Option<Vec<String>>,
    pub status_message_ref: Option<RawRef>,
    pub owner_user_id: Option<UserId>,
    /// A debounce timer is outstanding
    pub timer_pending: bool,
    /// An extraction is running for this batch
    pub analyzing: bool,
}

/// Texts handed to extraction, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisInput {
    pub conversation: ConversationId,
    /// Batch the texts were taken from
    pub batch_id: BatchId,
    pub texts: Vec<String>,
    pub owner_user_id: Option<UserId>,
}

/// What a one-shot handler is told about the message that triggered it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneShotContext {
    pub conversation: ConversationId,
    pub user: UserId,
    pub raw_ref: RawRef,
}

/// Single-use callback for a user's next free-text message
pub type OneShotHandler = Box<dyn FnOnce(OneShotContext, String) -> BoxFuture<'static, eyre::Result<()>> + Send>;

/// Box an async closure as a [`OneShotHandler`]
pub fn one_shot<F, Fut>(f: F) -> OneShotHandler
where
    F: FnOnce(OneShotContext, String) -> Fut + Send + 'static,
    Fut: Future<Output = eyre::Result<()>> + Send + 'static,
{
    Box::new(move |ctx: OneShotContext, text: String| -> BoxFuture<'static, eyre::Result<()>> {
        Box::pin(f(ctx, text))
    })
}
