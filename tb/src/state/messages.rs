//! State manager messages
//!
//! Commands and responses for the actor pattern.

use taskstore::{NewTask, ProjectStats, Task, TaskFilter, TaskStatus};
use thiserror::Error;
use tokio::sync::oneshot;

/// Errors from state operations
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Channel error")]
    ChannelError,
}

/// Response from state operations
pub type StateResponse<T> = Result<T, StateError>;

/// Commands sent to the StateManager actor
#[derive(Debug)]
pub enum StateCommand {
    // Task operations
    AddTask {
        task: NewTask,
        reply: oneshot::Sender<StateResponse<i64>>,
    },
    GetTask {
        id: i64,
        user_id: u64,
        reply: oneshot::Sender<StateResponse<Option<Task>>>,
    },
    ListTasks {
        filter: TaskFilter,
        reply: oneshot::Sender<StateResponse<Vec<Task>>>,
    },
    UpdateTaskStatus {
        id: i64,
        status: TaskStatus,
        user_id: u64,
        reply: oneshot::Sender<StateResponse<bool>>,
    },
    DeleteTask {
        id: i64,
        user_id: u64,
        reply: oneshot::Sender<StateResponse<bool>>,
    },

    // Project operations
    ListProjects {
        user_id: u64,
        reply: oneshot::Sender<StateResponse<Vec<String>>>,
    },
    ProjectExists {
        name: String,
        user_id: u64,
        reply: oneshot::Sender<StateResponse<bool>>,
    },
    AddProject {
        name: String,
        user_id: u64,
        reply: oneshot::Sender<StateResponse<bool>>,
    },
    ClearProject {
        name: String,
        user_id: u64,
        reply: oneshot::Sender<StateResponse<usize>>,
    },
    DeleteProject {
        name: String,
        user_id: u64,
        reply: oneshot::Sender<StateResponse<bool>>,
    },
    ProjectStats {
        name: String,
        user_id: u64,
        reply: oneshot::Sender<StateResponse<ProjectStats>>,
    },

    // Shutdown
    Shutdown,
}
