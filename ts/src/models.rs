//! Record types stored by TaskStore

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, nobody has picked it up yet
    #[default]
    NotStarted,
    /// Being worked on
    InProgress,
    /// Finished
    Done,
}

impl TaskStatus {
    /// All statuses in display order
    pub const ALL: [TaskStatus; 3] = [TaskStatus::NotStarted, TaskStatus::InProgress, TaskStatus::Done];

    /// Column value used in the `tasks.status` column
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Done => "done",
        }
    }

    /// Whether the task still needs work
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Done)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "TaskStatus::from_str: called");
        match s {
            "not_started" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            other => Err(eyre::eyre!("Unknown task status: '{}'", other)),
        }
    }
}

/// A persisted task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub description: String,
    pub project: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub user_id: u64,
}

/// Insert payload for a task; the id is assigned by SQLite
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub description: String,
    pub project: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub user_id: u64,
}

impl NewTask {
    /// A `not_started` task stamped with the current time
    pub fn new(description: impl Into<String>, project: impl Into<String>, user_id: u64) -> Self {
        Self {
            description: description.into(),
            project: project.into(),
            status: TaskStatus::NotStarted,
            created_at: Utc::now(),
            user_id,
        }
    }
}

/// Query filter for [`crate::Store::list_tasks`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    pub user_id: u64,
    pub status: Option<TaskStatus>,
    pub project: Option<String>,
}

impl TaskFilter {
    /// Every task owned by `user_id`
    pub fn for_user(user_id: u64) -> Self {
        Self {
            user_id,
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }
}

/// Task counts per status for one project
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProjectStats {
    pub total: u64,
    pub not_started: u64,
    pub in_progress: u64,
    pub done: u64,
}

impl ProjectStats {
    /// Tasks that are not done yet
    pub fn active(&self) -> u64 {
        self.not_started + self.in_progress
    }
}
