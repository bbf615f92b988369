//! Persistence seam used by the flow and the chat UI

use async_trait::async_trait;
use taskstore::{NewTask, ProjectStats, Task, TaskFilter, TaskStatus};

use crate::session::UserId;
use crate::state::StateResponse;

/// Task and project CRUD, scoped per user
///
/// Implemented by [`crate::state::StateManager`] over SQLite.
#[async_trait]
pub trait TaskGateway: Send + Sync {
    async fn add_task(&self, task: NewTask) -> StateResponse<i64>;
    async fn get_task(&self, id: i64, user_id: UserId) -> StateResponse<Option<Task>>;
    async fn list_tasks(&self, user_id: UserId) -> StateResponse<Vec<Task>>;
    async fn list_tasks_filtered(&self, filter: TaskFilter) -> StateResponse<Vec<Task>>;
    async fn update_task_status(&self, id: i64, status: TaskStatus, user_id: UserId) -> StateResponse<bool>;
    async fn delete_task(&self, id: i64, user_id: UserId) -> StateResponse<bool>;

    /// Explicit projects plus project names used by tasks, sorted
    async fn list_projects(&self, user_id: UserId) -> StateResponse<Vec<String>>;
    async fn project_exists(&self, name: &str, user_id: UserId) -> StateResponse<bool>;

    /// False when the project already exists
    async fn add_project(&self, name: &str, user_id: UserId) -> StateResponse<bool>;
    async fn clear_project(&self, name: &str, user_id: UserId) -> StateResponse<usize>;
    async fn delete_project(&self, name: &str, user_id: UserId) -> StateResponse<bool>;
    async fn project_stats(&self, name: &str, user_id: UserId) -> StateResponse<ProjectStats>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use crate::state::StateError;
    use chrono::Utc;
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Inner {
        tasks: Vec<Task>,
        projects: BTreeSet<(String, UserId)>,
        add_calls: usize,
    }

    /// In-memory gateway; can be told to fail the nth `add_task`
    #[derive(Default)]
    pub struct MockGateway {
        inner: Mutex<Inner>,
        fail_on_add: Option<usize>,
        fail_add_project: bool,
    }

    impl MockGateway {
        pub fn new() -> Self {
            Self::default()
        }

        /// Fail the `nth` call to `add_task` (1-based) and every later one
        pub fn failing_on_add(nth: usize) -> Self {
            Self {
                fail_on_add: Some(nth),
                ..Default::default()
            }
        }

        pub fn failing_add_project() -> Self {
            Self {
                fail_add_project: true,
                ..Default::default()
            }
        }

        pub fn with_project(self, name: &str, user_id: UserId) -> Self {
            self.inner.lock().unwrap().projects.insert((name.to_string(), user_id));
            self
        }

        pub fn tasks(&self) -> Vec<Task> {
            self.inner.lock().unwrap().tasks.clone()
        }

        pub fn has_project(&self, name: &str, user_id: UserId) -> bool {
            self.inner.lock().unwrap().projects.contains(&(name.to_string(), user_id))
        }
    }

    #[async_trait]
    impl TaskGateway for MockGateway {
        async fn add_task(&self, task: NewTask) -> StateResponse<i64> {
            let mut inner = self.inner.lock().unwrap();
            inner.add_calls += 1;
            if self.fail_on_add.is_some_and(|nth| inner.add_calls >= nth) {
                return Err(StateError::StoreError("disk full".to_string()));
            }
            let id = inner.tasks.len() as i64 + 1;
            inner.tasks.push(Task {
                id,
                description: task.description,
                project: task.project,
                status: task.status,
                created_at: task.created_at,
                user_id: task.user_id,
            });
            Ok(id)
        }

        async fn get_task(&self, id: i64, user_id: UserId) -> StateResponse<Option<Task>> {
            let inner = self.inner.lock().unwrap();
            Ok(inner.tasks.iter().find(|t| t.id == id && t.user_id == user_id).cloned())
        }

        async fn list_tasks(&self, user_id: UserId) -> StateResponse<Vec<Task>> {
            self.list_tasks_filtered(TaskFilter::for_user(user_id)).await
        }

        async fn list_tasks_filtered(&self, filter: TaskFilter) -> StateResponse<Vec<Task>> {
            let inner = self.inner.lock().unwrap();
            Ok(inner
                .tasks
                .iter()
                .rev()
                .filter(|t| t.user_id == filter.user_id)
                .filter(|t| filter.status.is_none_or(|s| t.status == s))
                .filter(|t| filter.project.as_ref().is_none_or(|p| &t.project == p))
                .cloned()
                .collect())
        }

        async fn update_task_status(&self, id: i64, status: TaskStatus, user_id: UserId) -> StateResponse<bool> {
            let mut inner = self.inner.lock().unwrap();
            match inner.tasks.iter_mut().find(|t| t.id == id && t.user_id == user_id) {
                Some(task) => {
                    task.status = status;
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        async fn delete_task(&self, id: i64, user_id: UserId) -> StateResponse<bool> {
            let mut inner = self.inner.lock().unwrap();
            let before = inner.tasks.len();
            inner.tasks.retain(|t| !(t.id == id && t.user_id == user_id));
            Ok(inner.tasks.len() < before)
        }

        async fn list_projects(&self, user_id: UserId) -> StateResponse<Vec<String>> {
            let inner = self.inner.lock().unwrap();
            let mut names: BTreeSet<String> = inner
                .projects
                .iter()
                .filter(|(_, owner)| *owner == user_id)
                .map(|(name, _)| name.clone())
                .collect();
            names.extend(
                inner
                    .tasks
                    .iter()
                    .filter(|t| t.user_id == user_id)
                    .map(|t| t.project.clone()),
            );
            Ok(names.into_iter().collect())
        }

        async fn project_exists(&self, name: &str, user_id: UserId) -> StateResponse<bool> {
            Ok(self.has_project(name, user_id))
        }

        async fn add_project(&self, name: &str, user_id: UserId) -> StateResponse<bool> {
            if self.fail_add_project {
                return Err(StateError::StoreError("read-only database".to_string()));
            }
            let mut inner = self.inner.lock().unwrap();
            Ok(inner.projects.insert((name.to_string(), user_id)))
        }

        async fn clear_project(&self, name: &str, user_id: UserId) -> StateResponse<usize> {
            let mut inner = self.inner.lock().unwrap();
            let before = inner.tasks.len();
            inner.tasks.retain(|t| !(t.project == name && t.user_id == user_id));
            Ok(before - inner.tasks.len())
        }

        async fn delete_project(&self, name: &str, user_id: UserId) -> StateResponse<bool> {
            let removed_tasks = self.clear_project(name, user_id).await?;
            let mut inner = self.inner.lock().unwrap();
            let removed_row = inner.projects.remove(&(name.to_string(), user_id));
            Ok(removed_row || removed_tasks > 0)
        }

        async fn project_stats(&self, name: &str, user_id: UserId) -> StateResponse<ProjectStats> {
            let inner = self.inner.lock().unwrap();
            let mut stats = ProjectStats::default();
            for task in inner.tasks.iter().filter(|t| t.project == name && t.user_id == user_id) {
                stats.total += 1;
                match task.status {
                    TaskStatus::NotStarted => stats.not_started += 1,
                    TaskStatus::InProgress => stats.in_progress += 1,
                    TaskStatus::Done => stats.done += 1,
                }
            }
            Ok(stats)
        }
    }

    #[tokio::test]
    async fn test_mock_gateway_fails_on_nth_add() {
        let gateway = MockGateway::failing_on_add(2);
        assert!(gateway.add_task(NewTask::new("a", "P", 1)).await.is_ok());
        assert!(gateway.add_task(NewTask::new("b", "P", 1)).await.is_err());
        assert_eq!(gateway.tasks().len(), 1);
        assert!(Utc::now() >= gateway.tasks()[0].created_at);
    }
}
