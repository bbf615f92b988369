//! StateManager - actor that owns TaskStore
//!
//! Processes commands via channels for thread-safe access to persistent state.

use std::path::Path;

use async_trait::async_trait;
use taskstore::{NewTask, ProjectStats, Store, Task, TaskFilter, TaskStatus};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use super::messages::{StateCommand, StateError, StateResponse};
use crate::flow::TaskGateway;
use crate::session::UserId;

/// Handle to send commands to the StateManager
#[derive(Clone)]
pub struct StateManager {
    tx: mpsc::Sender<StateCommand>,
}

impl StateManager {
    /// Open the database and spawn the actor
    pub fn spawn(db_path: impl AsRef<Path>) -> eyre::Result<Self> {
        debug!(db_path = %db_path.as_ref().display(), "spawn: called");
        let store = Store::open(db_path.as_ref())?;
        Ok(Self::with_store(store))
    }

    /// Spawn the actor over an already opened store
    pub fn with_store(store: Store) -> Self {
        debug!("with_store: called");
        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(actor_loop(store, rx));
        info!("StateManager spawned");
        Self { tx }
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<StateResponse<T>>) -> StateCommand) -> StateResponse<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(command(reply_tx))
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    /// Shutdown the StateManager
    pub async fn shutdown(&self) -> StateResponse<()> {
        debug!("shutdown: called");
        self.tx
            .send(StateCommand::Shutdown)
            .await
            .map_err(|_| StateError::ChannelError)
    }
}

#[async_trait]
impl TaskGateway for StateManager {
    async fn add_task(&self, task: NewTask) -> StateResponse<i64> {
        debug!(project = %task.project, user_id = task.user_id, "add_task: called");
        self.request(|reply| StateCommand::AddTask { task, reply }).await
    }

    async fn get_task(&self, id: i64, user_id: UserId) -> StateResponse<Option<Task>> {
        debug!(%id, %user_id, "get_task: called");
        self.request(|reply| StateCommand::GetTask { id, user_id, reply })
            .await
    }

    async fn list_tasks(&self, user_id: UserId) -> StateResponse<Vec<Task>> {
        debug!(%user_id, "list_tasks: called");
        self.list_tasks_filtered(TaskFilter::for_user(user_id)).await
    }

    async fn list_tasks_filtered(&self, filter: TaskFilter) -> StateResponse<Vec<Task>> {
        debug!(?filter, "list_tasks_filtered: called");
        self.request(|reply| StateCommand::ListTasks { filter, reply }).await
    }

    async fn update_task_status(&self, id: i64, status: TaskStatus, user_id: UserId) -> StateResponse<bool> {
        debug!(%id, %status, %user_id, "update_task_status: called");
        self.request(|reply| StateCommand::UpdateTaskStatus {
            id,
            status,
            user_id,
            reply,
        })
        .await
    }

    async fn delete_task(&self, id: i64, user_id: UserId) -> StateResponse<bool> {
        debug!(%id, %user_id, "delete_task: called");
        self.request(|reply| StateCommand::DeleteTask { id, user_id, reply })
            .await
    }

    async fn list_projects(&self, user_id: UserId) -> StateResponse<Vec<String>> {
        debug!(%user_id, "list_projects: called");
        self.request(|reply| StateCommand::ListProjects { user_id, reply })
            .await
    }

    async fn project_exists(&self, name: &str, user_id: UserId) -> StateResponse<bool> {
        debug!(%name, %user_id, "project_exists: called");
        let name = name.to_string();
        self.request(|reply| StateCommand::ProjectExists { name, user_id, reply })
            .await
    }

    async fn add_project(&self, name: &str, user_id: UserId) -> StateResponse<bool> {
        debug!(%name, %user_id, "add_project: called");
        let name = name.to_string();
        self.request(|reply| StateCommand::AddProject { name, user_id, reply })
            .await
    }

    async fn clear_project(&self, name: &str, user_id: UserId) -> StateResponse<usize> {
        debug!(%name, %user_id, "clear_project: called");
        let name = name.to_string();
        self.request(|reply| StateCommand::ClearProject { name, user_id, reply })
            .await
    }

    async fn delete_project(&self, name: &str, user_id: UserId) -> StateResponse<bool> {
        debug!(%name, %user_id, "delete_project: called");
        let name = name.to_string();
        self.request(|reply| StateCommand::DeleteProject { name, user_id, reply })
            .await
    }

    async fn project_stats(&self, name: &str, user_id: UserId) -> StateResponse<ProjectStats> {
        debug!(%name, %user_id, "project_stats: called");
        let name = name.to_string();
        self.request(|reply| StateCommand::ProjectStats { name, user_id, reply })
            .await
    }
}

fn store_err(e: eyre::Report) -> StateError {
    StateError::StoreError(format!("{:#}", e))
}

async fn actor_loop(store: Store, mut rx: mpsc::Receiver<StateCommand>) {
    debug!("StateManager actor started");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            StateCommand::AddTask { task, reply } => {
                debug!(project = %task.project, "actor_loop: AddTask command");
                let _ = reply.send(store.add_task(&task).map_err(store_err));
            }

            StateCommand::GetTask { id, user_id, reply } => {
                debug!(%id, "actor_loop: GetTask command");
                let _ = reply.send(store.get_task(id, user_id).map_err(store_err));
            }

            StateCommand::ListTasks { filter, reply } => {
                debug!(?filter, "actor_loop: ListTasks command");
                let _ = reply.send(store.list_tasks(&filter).map_err(store_err));
            }

            StateCommand::UpdateTaskStatus {
                id,
                status,
                user_id,
                reply,
            } => {
                debug!(%id, %status, "actor_loop: UpdateTaskStatus command");
                let _ = reply.send(store.update_task_status(id, status, user_id).map_err(store_err));
            }

            StateCommand::DeleteTask { id, user_id, reply } => {
                debug!(%id, "actor_loop: DeleteTask command");
                let _ = reply.send(store.delete_task(id, user_id).map_err(store_err));
            }

            StateCommand::ListProjects { user_id, reply } => {
                debug!(%user_id, "actor_loop: ListProjects command");
                let _ = reply.send(store.list_projects(user_id).map_err(store_err));
            }

            StateCommand::ProjectExists { name, user_id, reply } => {
                debug!(%name, "actor_loop: ProjectExists command");
                let _ = reply.send(store.project_exists(&name, user_id).map_err(store_err));
            }

            StateCommand::AddProject { name, user_id, reply } => {
                debug!(%name, "actor_loop: AddProject command");
                let _ = reply.send(store.add_project(&name, user_id).map_err(store_err));
            }

            StateCommand::ClearProject { name, user_id, reply } => {
                debug!(%name, "actor_loop: ClearProject command");
                let _ = reply.send(store.clear_project(&name, user_id).map_err(store_err));
            }

            StateCommand::DeleteProject { name, user_id, reply } => {
                debug!(%name, "actor_loop: DeleteProject command");
                let _ = reply.send(store.delete_project(&name, user_id).map_err(store_err));
            }

            StateCommand::ProjectStats { name, user_id, reply } => {
                debug!(%name, "actor_loop: ProjectStats command");
                let _ = reply.send(store.project_stats(&name, user_id).map_err(store_err));
            }

            StateCommand::Shutdown => {
                debug!("actor_loop: Shutdown command");
                info!("StateManager shutting down");
                break;
            }
        }
    }

    debug!("StateManager actor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_state_manager_task_crud() {
        let temp = tempdir().unwrap();
        let manager = StateManager::spawn(temp.path().join("tasks.db")).unwrap();

        let id = manager
            .add_task(NewTask::new("Fix the header logo", "Website", 7))
            .await
            .unwrap();

        let task = manager.get_task(id, 7).await.unwrap().unwrap();
        assert_eq!(task.description, "Fix the header logo");
        assert_eq!(task.status, TaskStatus::NotStarted);

        assert!(manager.update_task_status(id, TaskStatus::Done, 7).await.unwrap());
        let done = manager
            .list_tasks_filtered(TaskFilter::for_user(7).with_status(TaskStatus::Done))
            .await
            .unwrap();
        assert_eq!(done.len(), 1);

        assert!(manager.delete_task(id, 7).await.unwrap());
        assert!(manager.list_tasks(7).await.unwrap().is_empty());

        manager.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_state_manager_projects() {
        let manager = StateManager::with_store(Store::open_in_memory().unwrap());

        assert!(manager.add_project("Website", 7).await.unwrap());
        assert!(!manager.add_project("Website", 7).await.unwrap());
        assert!(manager.project_exists("Website", 7).await.unwrap());

        manager.add_task(NewTask::new("One", "Website", 7)).await.unwrap();
        manager.add_task(NewTask::new("Two", "Mobile", 7)).await.unwrap();
        assert_eq!(manager.list_projects(7).await.unwrap(), vec!["Mobile", "Website"]);

        let stats = manager.project_stats("Website", 7).await.unwrap();
        assert_eq!(stats.total, 1);

        assert_eq!(manager.clear_project("Website", 7).await.unwrap(), 1);
        assert!(manager.delete_project("Website", 7).await.unwrap());
        assert_eq!(manager.list_projects(7).await.unwrap(), vec!["Mobile"]);
    }

    #[tokio::test]
    async fn test_state_manager_get_nonexistent() {
        let manager = StateManager::with_store(Store::open_in_memory().unwrap());

        assert!(manager.get_task(999, 7).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_state_manager_after_shutdown() {
        let manager = StateManager::with_store(Store::open_in_memory().unwrap());
        manager.shutdown().await.unwrap();
        tokio::task::yield_now().await;

        let result = manager.list_projects(7).await;
        assert!(matches!(result, Err(StateError::ChannelError)));
    }
}
