//! SessionManager - actor that owns per-conversation session state
//!
//! One tokio task owns every pending batch, conversation state and one-shot
//! handler; the cloneable [`SessionManager`] handle talks to it over a
//! channel. Debounce timers are separate tasks that report back to the actor
//! with the generation they were started for, so a timer that lost a race
//! with a newer message or a `clear` is recognized and ignored.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::messages::{SessionCommand, SessionError, SessionResponse};
use super::types::{
    AccumulatedMessage, AnalysisInput, BatchId, BatchReady, BatchSnapshot, ConversationId, ConversationState, OneShotContext,
    OneShotHandler, RawRef, UserId,
};

struct DebounceTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

struct PendingBatch {
    id: BatchId,
    messages: Vec<AccumulatedMessage>,
    last_message_at: DateTime<Utc>,
    debounce: Option<DebounceTimer>,
    generation: u64,
    analyzed_tasks: Option<Vec<String>>,
    status_message_ref: Option<RawRef>,
    owner_user_id: Option<UserId>,
    analyzing: bool,
    refire_pending: bool,
}

impl PendingBatch {
    fn new(id: BatchId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            messages: Vec::new(),
            last_message_at: now,
            debounce: None,
            generation: 0,
            analyzed_tasks: None,
            status_message_ref: None,
            owner_user_id: None,
            analyzing: false,
            refire_pending: false,
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.debounce.take() {
            debug!(generation = timer.generation, "cancel_timer: aborting debounce timer");
            timer.handle.abort();
        }
    }

    fn snapshot(&self) -> BatchSnapshot {
        BatchSnapshot {
            batch_id: self.id,
            messages: self.messages.clone(),
            last_message_at: self.last_message_at,
            analyzed_tasks: self.analyzed_tasks.clone(),
            status_message_ref: self.status_message_ref.clone(),
            owner_user_id: self.owner_user_id,
            timer_pending: self.debounce.is_some(),
            analyzing: self.analyzing,
        }
    }
}

/// State owned by the actor task
struct SessionStore {
    batches: HashMap<ConversationId, PendingBatch>,
    states: HashMap<ConversationId, ConversationState>,
    one_shots: HashMap<UserId, OneShotHandler>,
    last_batch_id: BatchId,
    debounce: Duration,
    ready_tx: mpsc::UnboundedSender<BatchReady>,
    self_tx: mpsc::WeakSender<SessionCommand>,
}

impl SessionStore {
    fn add_message(&mut self, conversation: ConversationId, message: AccumulatedMessage, user_id: Option<UserId>) {
        let received_at = message.received_at;
        let last_batch_id = &mut self.last_batch_id;
        let batch = self.batches.entry(conversation).or_insert_with(|| {
            *last_batch_id += 1;
            PendingBatch::new(*last_batch_id, received_at)
        });
        batch.messages.push(message);
        batch.last_message_at = received_at;
        if batch.owner_user_id.is_none() {
            batch.owner_user_id = user_id;
        }

        batch.cancel_timer();
        batch.generation += 1;
        let generation = batch.generation;
        let handle = start_timer(self.self_tx.clone(), self.debounce, conversation, generation);
        batch.debounce = Some(DebounceTimer { generation, handle });
        debug!(%conversation, generation, count = batch.messages.len(), "add_message: timer restarted");

        let state = self.states.entry(conversation).or_default();
        if *state == ConversationState::Idle {
            *state = ConversationState::Accumulating;
        }
    }

    /// Emit `BatchReady`, or defer it while an extraction is running
    fn fire(&mut self, conversation: ConversationId) -> bool {
        let Some(batch) = self.batches.get_mut(&conversation) else {
            debug!(%conversation, "fire: no batch, suppressed");
            return false;
        };
        if batch.messages.is_empty() {
            debug!(%conversation, "fire: empty batch, suppressed");
            return false;
        }
        if batch.analyzing {
            debug!(%conversation, "fire: analysis in progress, deferred");
            batch.refire_pending = true;
            return true;
        }

        let event = BatchReady {
            conversation,
            user_id: batch.owner_user_id,
        };
        if self.ready_tx.send(event).is_err() {
            warn!(%conversation, "Batch ready event dropped, no consumer");
            return false;
        }
        info!(%conversation, messages = batch.messages.len(), "Batch ready");
        true
    }

    fn timer_fired(&mut self, conversation: ConversationId, generation: u64) {
        let current = self
            .batches
            .get(&conversation)
            .and_then(|batch| batch.debounce.as_ref())
            .map(|timer| timer.generation);
        if current != Some(generation) {
            debug!(%conversation, generation, ?current, "timer_fired: stale timer ignored");
            return;
        }
        if let Some(batch) = self.batches.get_mut(&conversation) {
            batch.debounce = None;
        }
        self.fire(conversation);
    }

    fn process_now(&mut self, conversation: ConversationId) -> bool {
        if let Some(batch) = self.batches.get_mut(&conversation) {
            batch.cancel_timer();
        }
        self.fire(conversation)
    }

    fn take_for_analysis(&mut self, conversation: ConversationId) -> Option<AnalysisInput> {
        let batch = self.batches.get_mut(&conversation)?;
        if batch.messages.is_empty() {
            return None;
        }
        if batch.analyzing {
            debug!(%conversation, "take_for_analysis: already analyzing");
            return None;
        }
        batch.analyzing = true;
        Some(AnalysisInput {
            conversation,
            batch_id: batch.id,
            texts: batch.messages.iter().map(|m| m.text.clone()).collect(),
            owner_user_id: batch.owner_user_id,
        })
    }

    fn set_analyzed_tasks(&mut self, conversation: ConversationId, batch_id: BatchId, descriptions: Vec<String>) -> bool {
        let Some(batch) = self.batches.get_mut(&conversation) else {
            debug!(%conversation, "set_analyzed_tasks: no batch, ignored");
            return false;
        };
        if batch.id != batch_id {
            debug!(%conversation, batch_id, current = batch.id, "set_analyzed_tasks: batch was replaced, ignored");
            return false;
        }
        batch.analyzed_tasks = Some(descriptions);
        batch.analyzing = false;
        if std::mem::take(&mut batch.refire_pending) {
            debug!(%conversation, "set_analyzed_tasks: re-emitting deferred batch");
            self.fire(conversation);
        }
        true
    }

    fn clear(&mut self, conversation: ConversationId) {
        if let Some(mut batch) = self.batches.remove(&conversation) {
            batch.cancel_timer();
        }
        self.states.remove(&conversation);
    }

    fn shutdown(&mut self) {
        for batch in self.batches.values_mut() {
            batch.cancel_timer();
        }
    }
}

fn start_timer(
    self_tx: mpsc::WeakSender<SessionCommand>,
    delay: Duration,
    conversation: ConversationId,
    generation: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if let Some(tx) = self_tx.upgrade() {
            let _ = tx.send(SessionCommand::TimerFired { conversation, generation }).await;
        }
    })
}

/// Handle to send commands to the session actor
#[derive(Clone)]
pub struct SessionManager {
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionManager {
    /// Spawn the session actor
    ///
    /// Returns the handle and the receiving end of the batch-ready channel;
    /// the caller owns the single consumer.
    pub fn spawn(debounce: Duration) -> (Self, mpsc::UnboundedReceiver<BatchReady>) {
        debug!(debounce_ms = debounce.as_millis() as u64, "spawn: called");
        let (tx, rx) = mpsc::channel(256);
        let (ready_tx, ready_rx) = mpsc::unbounded_channel();

        let store = SessionStore {
            batches: HashMap::new(),
            states: HashMap::new(),
            one_shots: HashMap::new(),
            last_batch_id: 0,
            debounce,
            ready_tx,
            self_tx: tx.downgrade(),
        };
        tokio::spawn(actor_loop(store, rx));

        info!("SessionManager spawned");
        (Self { tx }, ready_rx)
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> SessionCommand) -> SessionResponse<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(command(reply_tx))
            .await
            .map_err(|_| SessionError::ChannelError)?;
        reply_rx.await.map_err(|_| SessionError::ChannelError)
    }

    // === Batch operations ===

    /// Buffer a message and restart the conversation's debounce timer
    ///
    /// Never fails; a dead actor is logged.
    pub async fn add_message(
        &self,
        conversation: ConversationId,
        text: impl Into<String>,
        raw_ref: RawRef,
        user_id: Option<UserId>,
    ) {
        debug!(%conversation, ?user_id, %raw_ref, "add_message: called");
        let message = AccumulatedMessage {
            text: text.into(),
            received_at: Utc::now(),
            raw_ref,
        };
        let result = self
            .request(|reply| SessionCommand::AddMessage {
                conversation,
                message,
                user_id,
                reply,
            })
            .await;
        if let Err(e) = result {
            warn!(%conversation, error = %e, "Failed to buffer message");
        }
    }

    /// Buffered messages in arrival order
    pub async fn get_messages(&self, conversation: ConversationId) -> SessionResponse<Option<Vec<AccumulatedMessage>>> {
        debug!(%conversation, "get_messages: called");
        self.request(|reply| SessionCommand::GetMessages { conversation, reply })
            .await
    }

    /// Read-only view of the whole batch
    pub async fn get_batch(&self, conversation: ConversationId) -> SessionResponse<Option<BatchSnapshot>> {
        debug!(%conversation, "get_batch: called");
        self.request(|reply| SessionCommand::GetBatch { conversation, reply })
            .await
    }

    /// Store extraction output for batch `batch_id`
    ///
    /// Returns false when that batch is gone, including when it was cleared
    /// and a new one started since. Also ends the analysis mark set by
    /// [`Self::take_for_analysis`].
    pub async fn set_analyzed_tasks(
        &self,
        conversation: ConversationId,
        batch_id: BatchId,
        descriptions: Vec<String>,
    ) -> SessionResponse<bool> {
        debug!(%conversation, batch_id, count = descriptions.len(), "set_analyzed_tasks: called");
        self.request(|reply| SessionCommand::SetAnalyzedTasks {
            conversation,
            batch_id,
            descriptions,
            reply,
        })
        .await
    }

    pub async fn get_analyzed_tasks(&self, conversation: ConversationId) -> SessionResponse<Option<Vec<String>>> {
        debug!(%conversation, "get_analyzed_tasks: called");
        self.request(|reply| SessionCommand::GetAnalyzedTasks { conversation, reply })
            .await
    }

    /// Remember the progress message shown while analyzing
    pub async fn set_status_message(&self, conversation: ConversationId, raw_ref: RawRef) -> SessionResponse<bool> {
        debug!(%conversation, %raw_ref, "set_status_message: called");
        self.request(|reply| SessionCommand::SetStatusMessage {
            conversation,
            raw_ref,
            reply,
        })
        .await
    }

    /// Drop batch, timer and state for a conversation; idempotent
    pub async fn clear(&self, conversation: ConversationId) -> SessionResponse<()> {
        debug!(%conversation, "clear: called");
        self.request(|reply| SessionCommand::Clear { conversation, reply })
            .await
    }

    // === Conversation state ===

    pub async fn set_state(&self, conversation: ConversationId, state: ConversationState) -> SessionResponse<()> {
        debug!(%conversation, ?state, "set_state: called");
        self.request(|reply| SessionCommand::SetState {
            conversation,
            state,
            reply,
        })
        .await
    }

    /// Current state, `Idle` when none is recorded
    pub async fn get_state(&self, conversation: ConversationId) -> SessionResponse<ConversationState> {
        debug!(%conversation, "get_state: called");
        self.request(|reply| SessionCommand::GetState { conversation, reply })
            .await
    }

    pub async fn clear_state(&self, conversation: ConversationId) -> SessionResponse<()> {
        debug!(%conversation, "clear_state: called");
        self.request(|reply| SessionCommand::ClearState { conversation, reply })
            .await
    }

    // === One-shot handlers ===

    /// Register a handler for the user's next text; replaces any previous one
    pub async fn register_one_shot(&self, user: UserId, handler: OneShotHandler) -> SessionResponse<()> {
        debug!(%user, "register_one_shot: called");
        self.request(|reply| SessionCommand::RegisterOneShot { user, handler, reply })
            .await
    }

    /// Run and remove the user's handler; false when none was registered
    ///
    /// The handler is removed before it runs, so one it registers itself
    /// waits for the next message. Handler errors are logged, not returned.
    pub async fn consume_one_shot(&self, user: UserId, ctx: OneShotContext, text: &str) -> SessionResponse<bool> {
        debug!(%user, "consume_one_shot: called");
        let handler = self.request(|reply| SessionCommand::TakeOneShot { user, reply }).await?;
        let Some(handler) = handler else {
            return Ok(false);
        };
        if let Err(e) = handler(ctx, text.to_string()).await {
            warn!(%user, error = %e, "One-shot handler failed");
        }
        Ok(true)
    }

    // === Debounce ===

    /// Fire the batch immediately, cancelling its timer
    ///
    /// Returns false when there was nothing to process.
    pub async fn process_now(&self, conversation: ConversationId) -> SessionResponse<bool> {
        debug!(%conversation, "process_now: called");
        self.request(|reply| SessionCommand::ProcessNow { conversation, reply })
            .await
    }

    /// Texts to extract, marking the batch as being analyzed
    ///
    /// `None` when the batch is gone, empty, or already under analysis.
    pub async fn take_for_analysis(&self, conversation: ConversationId) -> SessionResponse<Option<AnalysisInput>> {
        debug!(%conversation, "take_for_analysis: called");
        self.request(|reply| SessionCommand::TakeForAnalysis { conversation, reply })
            .await
    }

    /// Stop the actor, cancelling every outstanding timer
    pub async fn shutdown(&self) -> SessionResponse<()> {
        debug!("shutdown: called");
        self.tx
            .send(SessionCommand::Shutdown)
            .await
            .map_err(|_| SessionError::ChannelError)
    }
}

async fn actor_loop(mut store: SessionStore, mut rx: mpsc::Receiver<SessionCommand>) {
    debug!("SessionManager actor started");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            SessionCommand::AddMessage {
                conversation,
                message,
                user_id,
                reply,
            } => {
                store.add_message(conversation, message, user_id);
                let _ = reply.send(());
            }

            SessionCommand::GetMessages { conversation, reply } => {
                let messages = store.batches.get(&conversation).map(|b| b.messages.clone());
                let _ = reply.send(messages);
            }

            SessionCommand::GetBatch { conversation, reply } => {
                let _ = reply.send(store.batches.get(&conversation).map(PendingBatch::snapshot));
            }

            SessionCommand::SetAnalyzedTasks {
                conversation,
                batch_id,
                descriptions,
                reply,
            } => {
                let _ = reply.send(store.set_analyzed_tasks(conversation, batch_id, descriptions));
            }

            SessionCommand::GetAnalyzedTasks { conversation, reply } => {
                let tasks = store
                    .batches
                    .get(&conversation)
                    .and_then(|b| b.analyzed_tasks.clone());
                let _ = reply.send(tasks);
            }

            SessionCommand::SetStatusMessage {
                conversation,
                raw_ref,
                reply,
            } => {
                let stored = match store.batches.get_mut(&conversation) {
                    Some(batch) => {
                        batch.status_message_ref = Some(raw_ref);
                        true
                    }
                    None => false,
                };
                let _ = reply.send(stored);
            }

            SessionCommand::Clear { conversation, reply } => {
                debug!(%conversation, "actor_loop: Clear command");
                store.clear(conversation);
                let _ = reply.send(());
            }

            SessionCommand::SetState {
                conversation,
                state,
                reply,
            } => {
                store.states.insert(conversation, state);
                let _ = reply.send(());
            }

            SessionCommand::GetState { conversation, reply } => {
                let state = store.states.get(&conversation).copied().unwrap_or_default();
                let _ = reply.send(state);
            }

            SessionCommand::ClearState { conversation, reply } => {
                store.states.remove(&conversation);
                let _ = reply.send(());
            }

            SessionCommand::RegisterOneShot { user, handler, reply } => {
                if store.one_shots.insert(user, handler).is_some() {
                    debug!(%user, "actor_loop: replaced existing one-shot handler");
                }
                let _ = reply.send(());
            }

            SessionCommand::TakeOneShot { user, reply } => {
                let _ = reply.send(store.one_shots.remove(&user));
            }

            SessionCommand::ProcessNow { conversation, reply } => {
                debug!(%conversation, "actor_loop: ProcessNow command");
                let _ = reply.send(store.process_now(conversation));
            }

            SessionCommand::TimerFired {
                conversation,
                generation,
            } => {
                debug!(%conversation, generation, "actor_loop: TimerFired command");
                store.timer_fired(conversation, generation);
            }

            SessionCommand::TakeForAnalysis { conversation, reply } => {
                let _ = reply.send(store.take_for_analysis(conversation));
            }

            SessionCommand::Shutdown => {
                debug!("actor_loop: Shutdown command");
                info!("SessionManager shutting down");
                store.shutdown();
                break;
            }
        }
    }

    debug!("SessionManager actor stopped");
}
