//! AssignmentFlow - batch to tasks to project
//!
//! Drives one conversation from buffered messages through extraction and
//! project selection to stored tasks. Holds no state of its own: everything
//! per conversation lives in the session actor, everything durable behind
//! the [`TaskGateway`].

use std::sync::Arc;

use taskstore::{NewTask, Task};
use tracing::{debug, info, warn};

use super::error::FlowError;
use super::gateway::TaskGateway;
use super::presenter::Presenter;
use crate::extract::TaskExtractor;
use crate::session::{
    BatchReady, ConversationId, ConversationState, OneShotContext, RawRef, SessionManager, SessionResponse, UserId,
};

/// A free-text message handed over by the chat transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundText {
    pub conversation: ConversationId,
    pub user: UserId,
    pub text: String,
    pub raw_ref: RawRef,
    pub is_forwarded: bool,
}

/// State a flow operation left the conversation in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowOutcome {
    /// Message buffered, batch still collecting
    Collecting,
    /// Tasks extracted, waiting for the user to pick a project
    AwaitingProjectChoice,
    /// Waiting for the user to type a project name
    AwaitingProjectName,
    /// Tasks stored
    Done { created: usize },
    /// Project created without pending tasks
    ProjectCreated,
    /// Session cleared without storing anything further
    Aborted,
    /// Input rejected, state unchanged
    Rejected,
    /// Consumed by a one-shot handler
    Handled,
    /// Nothing for the flow to do
    Ignored,
}

/// Task assignment flow over the session store, extractor and storage
pub struct AssignmentFlow {
    session: SessionManager,
    extractor: Arc<dyn TaskExtractor>,
    gateway: Arc<dyn TaskGateway>,
    presenter: Arc<dyn Presenter>,
    default_project: String,
    max_project_name_bytes: usize,
}

impl AssignmentFlow {
    pub fn new(
        session: SessionManager,
        extractor: Arc<dyn TaskExtractor>,
        gateway: Arc<dyn TaskGateway>,
        presenter: Arc<dyn Presenter>,
        default_project: impl Into<String>,
    ) -> Self {
        Self {
            session,
            extractor,
            gateway,
            presenter,
            default_project: default_project.into(),
            max_project_name_bytes: usize::MAX,
        }
    }

    /// Reject project names longer than `bytes` (UTF-8)
    pub fn with_max_project_name_bytes(mut self, bytes: usize) -> Self {
        self.max_project_name_bytes = bytes;
        self
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn gateway(&self) -> &Arc<dyn TaskGateway> {
        &self.gateway
    }

    /// Route a free-text message
    pub async fn inbound_text(&self, msg: InboundText) -> SessionResponse<FlowOutcome> {
        debug!(conversation = msg.conversation, user = msg.user, forwarded = msg.is_forwarded, "inbound_text: called");

        let ctx = OneShotContext {
            conversation: msg.conversation,
            user: msg.user,
            raw_ref: msg.raw_ref.clone(),
        };
        if self.session.consume_one_shot(msg.user, ctx, &msg.text).await? {
            return Ok(FlowOutcome::Handled);
        }

        if self.session.get_state(msg.conversation).await? == ConversationState::AwaitingProjectName {
            return self
                .new_project_name_submitted(msg.conversation, msg.user, &msg.text)
                .await;
        }

        if !msg.is_forwarded && msg.text.starts_with('/') {
            debug!(conversation = msg.conversation, "inbound_text: unhandled command ignored");
            return Ok(FlowOutcome::Ignored);
        }

        if msg.text.trim().is_empty() {
            return self
                .fail(msg.conversation, FlowError::InvalidInput("message has no text".to_string()))
                .await;
        }

        self.session
            .add_message(msg.conversation, msg.text, msg.raw_ref, Some(msg.user))
            .await;
        Ok(FlowOutcome::Collecting)
    }

    /// Extract tasks from a quiet batch and ask where they go
    pub async fn on_batch_ready(&self, event: BatchReady) -> SessionResponse<FlowOutcome> {
        debug!(conversation = event.conversation, user = ?event.user_id, "on_batch_ready: called");
        let conversation = event.conversation;

        let Some(input) = self.session.take_for_analysis(conversation).await? else {
            debug!(%conversation, "on_batch_ready: nothing to analyze");
            return Ok(FlowOutcome::Ignored);
        };

        let status = match self.presenter.present_progress(conversation, input.texts.len()).await {
            Ok(status) => status,
            Err(e) => {
                warn!(%conversation, error = %e, "Failed to present progress");
                None
            }
        };
        if let Some(raw_ref) = status.clone() {
            self.session.set_status_message(conversation, raw_ref).await?;
        }

        let extraction = self.extractor.extract_group(&input.texts).await;
        let tasks: Vec<String> = extraction
            .value
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        info!(%conversation, via = %extraction.via, messages = input.texts.len(), tasks = tasks.len(), "Batch analyzed");

        if !self
            .session
            .set_analyzed_tasks(conversation, input.batch_id, tasks.clone())
            .await?
        {
            debug!(%conversation, batch_id = input.batch_id, "on_batch_ready: batch cleared during analysis");
            return Ok(FlowOutcome::Aborted);
        }

        if tasks.is_empty() {
            return self.fail(conversation, FlowError::EmptyExtraction).await;
        }

        let projects = match input.owner_user_id.or(event.user_id) {
            Some(owner) => match self.gateway.list_projects(owner).await {
                Ok(projects) => projects,
                Err(e) => {
                    warn!(%conversation, error = %e, "Failed to list projects");
                    return self
                        .fail(conversation, FlowError::PersistenceFailure { created: 0, total: tasks.len() })
                        .await;
                }
            },
            None => Vec::new(),
        };

        if projects.is_empty() {
            self.session
                .set_state(conversation, ConversationState::AwaitingProjectName)
                .await?;
            let shown = self
                .presenter
                .present_new_project_prompt(conversation, Some(&tasks), status.as_ref())
                .await;
            log_presenter(conversation, "new project prompt", shown);
            return Ok(FlowOutcome::AwaitingProjectName);
        }

        let shown = self
            .presenter
            .present_project_choice(conversation, &tasks, &projects, status.as_ref())
            .await;
        log_presenter(conversation, "project choice", shown);
        Ok(FlowOutcome::AwaitingProjectChoice)
    }

    /// Store the analyzed tasks under an existing project
    pub async fn project_chosen(
        &self,
        conversation: ConversationId,
        user: UserId,
        project: &str,
    ) -> SessionResponse<FlowOutcome> {
        debug!(%conversation, %user, %project, "project_chosen: called");
        match self.pending_tasks(conversation).await? {
            Some(tasks) => self.commit(conversation, user, project, tasks).await,
            None => self.tasks_lost(conversation).await,
        }
    }

    /// Switch to asking for a new project name for the analyzed tasks
    pub async fn new_project_requested(&self, conversation: ConversationId) -> SessionResponse<FlowOutcome> {
        debug!(%conversation, "new_project_requested: called");
        let Some(tasks) = self.pending_tasks(conversation).await? else {
            return self.tasks_lost(conversation).await;
        };
        self.session
            .set_state(conversation, ConversationState::AwaitingProjectName)
            .await?;
        let shown = self
            .presenter
            .present_new_project_prompt(conversation, Some(&tasks), None)
            .await;
        log_presenter(conversation, "new project prompt", shown);
        Ok(FlowOutcome::AwaitingProjectName)
    }

    /// Ask for a project name outside task creation
    pub async fn project_name_requested(&self, conversation: ConversationId) -> SessionResponse<FlowOutcome> {
        debug!(%conversation, "project_name_requested: called");
        self.session
            .set_state(conversation, ConversationState::AwaitingProjectName)
            .await?;
        let shown = self.presenter.present_new_project_prompt(conversation, None, None).await;
        log_presenter(conversation, "new project prompt", shown);
        Ok(FlowOutcome::AwaitingProjectName)
    }

    /// Handle a typed project name while one is awaited
    pub async fn new_project_name_submitted(
        &self,
        conversation: ConversationId,
        user: UserId,
        name: &str,
    ) -> SessionResponse<FlowOutcome> {
        debug!(%conversation, %user, %name, "new_project_name_submitted: called");
        let name = name.trim();
        let pending = self.pending_tasks(conversation).await?;
        let total = pending.as_ref().map_or(0, Vec::len);
        let owner = self
            .session
            .get_batch(conversation)
            .await?
            .and_then(|b| b.owner_user_id)
            .unwrap_or(user);

        match self.insert_project(conversation, owner, name).await {
            Insert::Created => {}
            Insert::Rejected => return Ok(FlowOutcome::Rejected),
            Insert::Failed => {
                return self
                    .fail(conversation, FlowError::PersistenceFailure { created: 0, total })
                    .await;
            }
        }

        match pending {
            Some(tasks) => self.commit(conversation, user, name, tasks).await,
            None => {
                self.session.clear_state(conversation).await?;
                let shown = self.presenter.present_project_created(conversation, name).await;
                log_presenter(conversation, "project created", shown);
                Ok(FlowOutcome::ProjectCreated)
            }
        }
    }

    /// Create a project directly, without touching the conversation state
    pub async fn create_project(
        &self,
        conversation: ConversationId,
        user: UserId,
        name: &str,
    ) -> SessionResponse<FlowOutcome> {
        debug!(%conversation, %user, %name, "create_project: called");
        let name = name.trim();
        match self.insert_project(conversation, user, name).await {
            Insert::Created => {
                let shown = self.presenter.present_project_created(conversation, name).await;
                log_presenter(conversation, "project created", shown);
                Ok(FlowOutcome::ProjectCreated)
            }
            Insert::Rejected => Ok(FlowOutcome::Rejected),
            Insert::Failed => {
                self.report(conversation, FlowError::PersistenceFailure { created: 0, total: 0 })
                    .await;
                Ok(FlowOutcome::Aborted)
            }
        }
    }

    /// Drop the batch, analyzed tasks and state
    pub async fn cancel_requested(&self, conversation: ConversationId) -> SessionResponse<FlowOutcome> {
        debug!(%conversation, "cancel_requested: called");
        self.session.clear(conversation).await?;
        let shown = self.presenter.present_cancelled(conversation).await;
        log_presenter(conversation, "cancellation", shown);
        Ok(FlowOutcome::Aborted)
    }

    /// Store one task from one message in the default project
    pub async fn quick_add(&self, conversation: ConversationId, user: UserId, text: &str) -> FlowOutcome {
        debug!(%conversation, %user, "quick_add: called");
        if text.trim().is_empty() {
            self.report(conversation, FlowError::InvalidInput("nothing to add".to_string()))
                .await;
            return FlowOutcome::Rejected;
        }

        let extraction = self.extractor.extract_single(text).await;
        let description = extraction.value.trim().to_string();
        debug!(%conversation, via = %extraction.via, "quick_add: extracted");
        if description.is_empty() {
            self.report(conversation, FlowError::EmptyExtraction).await;
            return FlowOutcome::Aborted;
        }

        let new_task = NewTask::new(description, self.default_project.as_str(), user);
        match self.gateway.add_task(new_task.clone()).await {
            Ok(id) => {
                let task = stored(id, new_task);
                info!(%conversation, task_id = id, project = %task.project, "Task added");
                let shown = self.presenter.present_task_created(conversation, &task).await;
                log_presenter(conversation, "task created", shown);
                FlowOutcome::Done { created: 1 }
            }
            Err(e) => {
                warn!(%conversation, error = %e, "Failed to store task");
                self.report(conversation, FlowError::PersistenceFailure { created: 0, total: 1 })
                    .await;
                FlowOutcome::Aborted
            }
        }
    }

    async fn commit(
        &self,
        conversation: ConversationId,
        user: UserId,
        project: &str,
        tasks: Vec<String>,
    ) -> SessionResponse<FlowOutcome> {
        debug!(%conversation, %project, count = tasks.len(), "commit: called");
        let batch = self.session.get_batch(conversation).await?;
        let owner = batch.as_ref().and_then(|b| b.owner_user_id).unwrap_or(user);
        let status = batch.and_then(|b| b.status_message_ref);

        let total = tasks.len();
        let mut created = Vec::with_capacity(total);
        let mut failed = false;
        for description in tasks {
            let new_task = NewTask::new(description, project, owner);
            match self.gateway.add_task(new_task.clone()).await {
                Ok(id) => created.push(stored(id, new_task)),
                Err(e) => {
                    warn!(%conversation, created = created.len(), total, error = %e, "Failed to store task");
                    failed = true;
                    break;
                }
            }
        }

        self.session.clear(conversation).await?;

        if failed {
            self.report(conversation, FlowError::PersistenceFailure { created: created.len(), total })
                .await;
            return Ok(FlowOutcome::Aborted);
        }

        info!(%conversation, %project, created = created.len(), "Tasks committed");
        let shown = self
            .presenter
            .present_task_summary(conversation, project, &created, status.as_ref())
            .await;
        log_presenter(conversation, "task summary", shown);
        Ok(FlowOutcome::Done { created: created.len() })
    }

    async fn insert_project(&self, conversation: ConversationId, user: UserId, name: &str) -> Insert {
        if name.is_empty() {
            self.report(conversation, FlowError::InvalidInput("project name cannot be empty".to_string()))
                .await;
            return Insert::Rejected;
        }
        if name.len() > self.max_project_name_bytes {
            self.report(conversation, FlowError::InvalidInput("project name is too long".to_string()))
                .await;
            return Insert::Rejected;
        }

        let existing = match self.gateway.list_projects(user).await {
            Ok(projects) => projects,
            Err(e) => {
                warn!(%conversation, error = %e, "Failed to list projects");
                return Insert::Failed;
            }
        };
        if existing.iter().any(|p| p == name) {
            self.report(conversation, FlowError::DuplicateProject(name.to_string()))
                .await;
            return Insert::Rejected;
        }

        match self.gateway.add_project(name, user).await {
            Ok(true) => {
                info!(%conversation, project = %name, "Project created");
                Insert::Created
            }
            Ok(false) => {
                self.report(conversation, FlowError::DuplicateProject(name.to_string()))
                    .await;
                Insert::Rejected
            }
            Err(e) => {
                warn!(%conversation, project = %name, error = %e, "Failed to create project");
                Insert::Failed
            }
        }
    }

    async fn pending_tasks(&self, conversation: ConversationId) -> SessionResponse<Option<Vec<String>>> {
        Ok(self
            .session
            .get_analyzed_tasks(conversation)
            .await?
            .filter(|tasks| !tasks.is_empty()))
    }

    async fn tasks_lost(&self, conversation: ConversationId) -> SessionResponse<FlowOutcome> {
        self.fail(conversation, FlowError::TasksLost).await
    }

    /// Report `error`, clearing the session unless the user can retry
    async fn fail(&self, conversation: ConversationId, error: FlowError) -> SessionResponse<FlowOutcome> {
        let keep = error.keeps_session();
        if !keep {
            self.session.clear(conversation).await?;
        }
        self.report(conversation, error).await;
        Ok(if keep { FlowOutcome::Rejected } else { FlowOutcome::Aborted })
    }

    async fn report(&self, conversation: ConversationId, error: FlowError) {
        debug!(%conversation, %error, "report: called");
        let shown = self.presenter.present_error(conversation, &error).await;
        log_presenter(conversation, "error", shown);
    }
}

enum Insert {
    Created,
    Rejected,
    Failed,
}

fn stored(id: i64, task: NewTask) -> Task {
    Task {
        id,
        description: task.description,
        project: task.project,
        status: task.status,
        created_at: task.created_at,
        user_id: task.user_id,
    }
}

fn log_presenter(conversation: ConversationId, what: &str, result: eyre::Result<()>) {
    if let Err(e) = result {
        warn!(%conversation, error = %e, "Failed to present {}", what);
    }
}
