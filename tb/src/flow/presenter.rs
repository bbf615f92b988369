//! Output seam between the flow and a chat transport

use async_trait::async_trait;
use taskstore::Task;

use super::error::FlowError;
use crate::session::{ConversationId, RawRef};

/// Renders flow events to the user
///
/// Every method may fail; the flow logs the failure and carries on.
/// `status` is the progress message shown while extracting, if any, so the
/// transport can edit or delete it.
#[async_trait]
pub trait Presenter: Send + Sync {
    /// Show that a batch is being analyzed; returns a ref to the shown message
    async fn present_progress(&self, conversation: ConversationId, message_count: usize) -> eyre::Result<Option<RawRef>>;

    async fn present_project_choice(
        &self,
        conversation: ConversationId,
        tasks: &[String],
        projects: &[String],
        status: Option<&RawRef>,
    ) -> eyre::Result<()>;

    /// Ask for a project name; `tasks` is `None` when only a project is created
    async fn present_new_project_prompt(
        &self,
        conversation: ConversationId,
        tasks: Option<&[String]>,
        status: Option<&RawRef>,
    ) -> eyre::Result<()>;

    async fn present_task_summary(
        &self,
        conversation: ConversationId,
        project: &str,
        tasks: &[Task],
        status: Option<&RawRef>,
    ) -> eyre::Result<()>;

    async fn present_task_created(&self, conversation: ConversationId, task: &Task) -> eyre::Result<()>;

    async fn present_project_created(&self, conversation: ConversationId, name: &str) -> eyre::Result<()>;

    async fn present_cancelled(&self, conversation: ConversationId) -> eyre::Result<()>;

    async fn present_error(&self, conversation: ConversationId, error: &FlowError) -> eyre::Result<()>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// One recorded presenter call
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Presented {
        Progress(usize),
        ProjectChoice { tasks: Vec<String>, projects: Vec<String> },
        NewProjectPrompt { tasks: Option<Vec<String>> },
        TaskSummary { project: String, descriptions: Vec<String> },
        TaskCreated(String),
        ProjectCreated(String),
        Cancelled,
        Error(FlowError),
    }

    /// Presenter that records calls; optionally fails every call
    #[derive(Default)]
    pub struct RecordingPresenter {
        calls: Mutex<Vec<(ConversationId, Presented)>>,
        failing: bool,
    }

    impl RecordingPresenter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing() -> Self {
            Self {
                failing: true,
                ..Default::default()
            }
        }

        pub fn calls(&self) -> Vec<Presented> {
            self.calls.lock().unwrap().iter().map(|(_, p)| p.clone()).collect()
        }

        pub fn errors(&self) -> Vec<FlowError> {
            self.calls()
                .into_iter()
                .filter_map(|p| match p {
                    Presented::Error(e) => Some(e),
                    _ => None,
                })
                .collect()
        }

        fn record(&self, conversation: ConversationId, presented: Presented) -> eyre::Result<()> {
            self.calls.lock().unwrap().push((conversation, presented));
            if self.failing {
                eyre::bail!("chat unreachable");
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Presenter for RecordingPresenter {
        async fn present_progress(&self, conversation: ConversationId, message_count: usize) -> eyre::Result<Option<RawRef>> {
            self.record(conversation, Presented::Progress(message_count))?;
            Ok(Some(RawRef::new(format!("{}:status", conversation))))
        }

        async fn present_project_choice(
            &self,
            conversation: ConversationId,
            tasks: &[String],
            projects: &[String],
            _status: Option<&RawRef>,
        ) -> eyre::Result<()> {
            self.record(
                conversation,
                Presented::ProjectChoice {
                    tasks: tasks.to_vec(),
                    projects: projects.to_vec(),
                },
            )
        }

        async fn present_new_project_prompt(
            &self,
            conversation: ConversationId,
            tasks: Option<&[String]>,
            _status: Option<&RawRef>,
        ) -> eyre::Result<()> {
            self.record(
                conversation,
                Presented::NewProjectPrompt {
                    tasks: tasks.map(|t| t.to_vec()),
                },
            )
        }

        async fn present_task_summary(
            &self,
            conversation: ConversationId,
            project: &str,
            tasks: &[Task],
            _status: Option<&RawRef>,
        ) -> eyre::Result<()> {
            self.record(
                conversation,
                Presented::TaskSummary {
                    project: project.to_string(),
                    descriptions: tasks.iter().map(|t| t.description.clone()).collect(),
                },
            )
        }

        async fn present_task_created(&self, conversation: ConversationId, task: &Task) -> eyre::Result<()> {
            self.record(conversation, Presented::TaskCreated(task.description.clone()))
        }

        async fn present_project_created(&self, conversation: ConversationId, name: &str) -> eyre::Result<()> {
            self.record(conversation, Presented::ProjectCreated(name.to_string()))
        }

        async fn present_cancelled(&self, conversation: ConversationId) -> eyre::Result<()> {
            self.record(conversation, Presented::Cancelled)
        }

        async fn present_error(&self, conversation: ConversationId, error: &FlowError) -> eyre::Result<()> {
            self.record(conversation, Presented::Error(error.clone()))
        }
    }
}
