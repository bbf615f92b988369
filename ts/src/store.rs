//! Core Store implementation over a single SQLite connection

use chrono::{DateTime, Utc};
use eyre::{Context, Result};
use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::models::{NewTask, ProjectStats, Task, TaskFilter, TaskStatus};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    description TEXT NOT NULL,
    project TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    user_id INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS projects (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL,
    user_id INTEGER NOT NULL,
    UNIQUE (name, user_id)
);

CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project);
CREATE INDEX IF NOT EXISTS idx_tasks_user ON tasks(user_id);
"#;

const TASK_COLUMNS: &str = "id, description, project, status, created_at, user_id";

/// SQLite-backed store for tasks and projects
///
/// Not `Sync`: callers that share it across tasks wrap it in an actor
/// (see taskbot's `StateManager`).
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create a store at the given database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Store::open: called");
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let conn = Connection::open(path).context(format!("Failed to open database {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("Failed to enable WAL journal")?;

        let store = Self { conn };
        store.initialize()?;
        info!(path = %path.display(), "Opened task store");
        Ok(store)
    }

    /// Open a throwaway in-memory store
    pub fn open_in_memory() -> Result<Self> {
        debug!("Store::open_in_memory: called");
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let store = Self { conn };
        store.initialize()?;
        Ok(store)
    }

    fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA).context("Failed to create schema")
    }

    // === Tasks ===

    /// Insert a task and return its id
    pub fn add_task(&self, task: &NewTask) -> Result<i64> {
        debug!(project = %task.project, user_id = task.user_id, "add_task: called");
        self.conn
            .execute(
                "INSERT INTO tasks (description, project, status, created_at, user_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    task.description,
                    task.project,
                    task.status.as_str(),
                    task.created_at.to_rfc3339(),
                    sql_user(task.user_id),
                ],
            )
            .context("Failed to insert task")?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Fetch one task owned by `user_id`
    pub fn get_task(&self, id: i64, user_id: u64) -> Result<Option<Task>> {
        debug!(%id, %user_id, "get_task: called");
        let sql = format!("SELECT {} FROM tasks WHERE id = ?1 AND user_id = ?2", TASK_COLUMNS);
        self.conn
            .query_row(&sql, params![id, sql_user(user_id)], task_from_row)
            .optional()
            .context("Failed to load task")
    }

    /// Tasks matching the filter, newest first
    pub fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        debug!(?filter, "list_tasks: called");
        let mut sql = format!("SELECT {} FROM tasks WHERE user_id = ?1", TASK_COLUMNS);
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(sql_user(filter.user_id))];

        if let Some(status) = filter.status {
            args.push(Box::new(status.as_str()));
            sql.push_str(&format!(" AND status = ?{}", args.len()));
        }
        if let Some(project) = &filter.project {
            args.push(Box::new(project.clone()));
            sql.push_str(&format!(" AND project = ?{}", args.len()));
        }
        sql.push_str(" ORDER BY id DESC");

        let mut stmt = self.conn.prepare(&sql).context("Failed to prepare task query")?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(args.iter()), task_from_row)
            .context("Failed to query tasks")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read task rows")
    }

    /// Change a task's status; false when no such task exists for the user
    pub fn update_task_status(&self, id: i64, status: TaskStatus, user_id: u64) -> Result<bool> {
        debug!(%id, %status, %user_id, "update_task_status: called");
        let changed = self
            .conn
            .execute(
                "UPDATE tasks SET status = ?1 WHERE id = ?2 AND user_id = ?3",
                params![status.as_str(), id, sql_user(user_id)],
            )
            .context("Failed to update task status")?;
        Ok(changed > 0)
    }

    /// Delete a task; false when no such task exists for the user
    pub fn delete_task(&self, id: i64, user_id: u64) -> Result<bool> {
        debug!(%id, %user_id, "delete_task: called");
        let changed = self
            .conn
            .execute("DELETE FROM tasks WHERE id = ?1 AND user_id = ?2", params![id, sql_user(user_id)])
            .context("Failed to delete task")?;
        Ok(changed > 0)
    }

    // === Projects ===

    /// Sorted, de-duplicated project names: explicit rows plus names used by tasks
    pub fn list_projects(&self, user_id: u64) -> Result<Vec<String>> {
        debug!(%user_id, "list_projects: called");
        let mut names = BTreeSet::new();

        let mut stmt = self
            .conn
            .prepare("SELECT name FROM projects WHERE user_id = ?1")
            .context("Failed to prepare project query")?;
        for name in stmt.query_map(params![sql_user(user_id)], |row| row.get::<_, String>(0))? {
            names.insert(name?);
        }

        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT project FROM tasks WHERE user_id = ?1")
            .context("Failed to prepare task project query")?;
        for name in stmt.query_map(params![sql_user(user_id)], |row| row.get::<_, String>(0))? {
            names.insert(name?);
        }

        Ok(names.into_iter().collect())
    }

    /// Create a project row; false when the name is already taken for this user
    pub fn add_project(&self, name: &str, user_id: u64) -> Result<bool> {
        debug!(%name, %user_id, "add_project: called");
        let result = self.conn.execute(
            "INSERT INTO projects (name, created_at, user_id) VALUES (?1, ?2, ?3)",
            params![name, crate::now_rfc3339(), sql_user(user_id)],
        );
        match result {
            Ok(changed) => Ok(changed > 0),
            Err(rusqlite::Error::SqliteFailure(err, _)) if err.code == ErrorCode::ConstraintViolation => {
                debug!(%name, "add_project: duplicate project");
                Ok(false)
            }
            Err(e) => Err(e).context("Failed to insert project"),
        }
    }

    /// Whether an explicit project row exists
    pub fn project_exists(&self, name: &str, user_id: u64) -> Result<bool> {
        debug!(%name, %user_id, "project_exists: called");
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM projects WHERE name = ?1 AND user_id = ?2 LIMIT 1",
                params![name, sql_user(user_id)],
                |_| Ok(()),
            )
            .optional()
            .context("Failed to check project")?;
        Ok(found.is_some())
    }

    /// Delete every task of a project, keeping the project; returns the number removed
    pub fn clear_project(&self, name: &str, user_id: u64) -> Result<usize> {
        debug!(%name, %user_id, "clear_project: called");
        self.conn
            .execute(
                "DELETE FROM tasks WHERE project = ?1 AND user_id = ?2",
                params![name, sql_user(user_id)],
            )
            .context("Failed to clear project")
    }

    /// Delete a project row together with its tasks
    pub fn delete_project(&self, name: &str, user_id: u64) -> Result<bool> {
        debug!(%name, %user_id, "delete_project: called");
        let projects = self
            .conn
            .execute(
                "DELETE FROM projects WHERE name = ?1 AND user_id = ?2",
                params![name, sql_user(user_id)],
            )
            .context("Failed to delete project")?;
        let tasks = self.clear_project(name, user_id)?;
        Ok(projects > 0 || tasks > 0)
    }

    /// Task counts per status for one project
    pub fn project_stats(&self, name: &str, user_id: u64) -> Result<ProjectStats> {
        debug!(%name, %user_id, "project_stats: called");
        self.conn
            .query_row(
                "SELECT
                    COUNT(*),
                    COALESCE(SUM(CASE WHEN status = 'not_started' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN status = 'in_progress' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN status = 'done' THEN 1 ELSE 0 END), 0)
                 FROM tasks WHERE project = ?1 AND user_id = ?2",
                params![name, sql_user(user_id)],
                |row| {
                    Ok(ProjectStats {
                        total: row.get::<_, i64>(0)? as u64,
                        not_started: row.get::<_, i64>(1)? as u64,
                        in_progress: row.get::<_, i64>(2)? as u64,
                        done: row.get::<_, i64>(3)? as u64,
                    })
                },
            )
            .context("Failed to compute project stats")
    }
}

// Telegram user ids fit in 52 bits, so the i64 column never truncates
fn sql_user(user_id: u64) -> i64 {
    user_id as i64
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let status: String = row.get(3)?;
    let status = status
        .parse::<TaskStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, e.into()))?;
    let created_at: String = row.get(4)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

    Ok(Task {
        id: row.get(0)?,
        description: row.get(1)?,
        project: row.get(2)?,
        status,
        created_at,
        user_id: row.get::<_, i64>(5)? as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const USER: u64 = 42;
    const OTHER: u64 = 7;

    fn store() -> Store {
        Store::open_in_memory().unwrap()
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("nested").join("tasks.db");
        let store = Store::open(&path).unwrap();
        store.add_task(&NewTask::new("Persisted", "General", USER)).unwrap();
        drop(store);

        let reopened = Store::open(&path).unwrap();
        assert_eq!(reopened.list_tasks(&TaskFilter::for_user(USER)).unwrap().len(), 1);
    }

    #[test]
    fn test_add_and_get_task() {
        let store = store();
        let id = store.add_task(&NewTask::new("Fix the header logo", "Website", USER)).unwrap();

        let task = store.get_task(id, USER).unwrap().unwrap();
        assert_eq!(task.description, "Fix the header logo");
        assert_eq!(task.project, "Website");
        assert_eq!(task.status, TaskStatus::NotStarted);
        assert_eq!(task.user_id, USER);
    }

    #[test]
    fn test_get_task_is_scoped_to_owner() {
        let store = store();
        let id = store.add_task(&NewTask::new("Private", "General", USER)).unwrap();
        assert!(store.get_task(id, OTHER).unwrap().is_none());
    }

    #[test]
    fn test_list_tasks_newest_first_with_filters() {
        let store = store();
        let first = store.add_task(&NewTask::new("One", "A", USER)).unwrap();
        let second = store.add_task(&NewTask::new("Two", "B", USER)).unwrap();
        let third = store.add_task(&NewTask::new("Three", "A", USER)).unwrap();
        store.add_task(&NewTask::new("Foreign", "A", OTHER)).unwrap();
        store.update_task_status(third, TaskStatus::Done, USER).unwrap();

        let all = store.list_tasks(&TaskFilter::for_user(USER)).unwrap();
        let ids: Vec<i64> = all.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![third, second, first]);

        let in_a = store.list_tasks(&TaskFilter::for_user(USER).with_project("A")).unwrap();
        assert_eq!(in_a.len(), 2);

        let done_in_a = store
            .list_tasks(&TaskFilter::for_user(USER).with_project("A").with_status(TaskStatus::Done))
            .unwrap();
        assert_eq!(done_in_a.len(), 1);
        assert_eq!(done_in_a[0].id, third);
    }

    #[test]
    fn test_update_and_delete_report_missing_rows() {
        let store = store();
        let id = store.add_task(&NewTask::new("Task", "General", USER)).unwrap();

        assert!(store.update_task_status(id, TaskStatus::InProgress, USER).unwrap());
        assert!(!store.update_task_status(id, TaskStatus::Done, OTHER).unwrap());
        assert!(!store.update_task_status(999, TaskStatus::Done, USER).unwrap());

        assert!(store.delete_task(id, USER).unwrap());
        assert!(!store.delete_task(id, USER).unwrap());
    }

    #[test]
    fn test_add_project_rejects_duplicates_per_user() {
        let store = store();
        assert!(store.add_project("Website", USER).unwrap());
        assert!(!store.add_project("Website", USER).unwrap());
        assert!(store.add_project("Website", OTHER).unwrap());
        assert!(store.project_exists("Website", USER).unwrap());
        assert!(!store.project_exists("Mobile", USER).unwrap());
    }

    #[test]
    fn test_list_projects_is_union_of_rows_and_task_projects() {
        let store = store();
        store.add_project("Zeta", USER).unwrap();
        store.add_project("Alpha", USER).unwrap();
        store.add_task(&NewTask::new("Implicit", "Mobile", USER)).unwrap();
        store.add_task(&NewTask::new("Dup", "Alpha", USER)).unwrap();
        store.add_project("Hidden", OTHER).unwrap();

        assert_eq!(store.list_projects(USER).unwrap(), vec!["Alpha", "Mobile", "Zeta"]);
    }

    #[test]
    fn test_clear_project_keeps_project_row() {
        let store = store();
        store.add_project("Website", USER).unwrap();
        store.add_task(&NewTask::new("One", "Website", USER)).unwrap();
        store.add_task(&NewTask::new("Two", "Website", USER)).unwrap();

        assert_eq!(store.clear_project("Website", USER).unwrap(), 2);
        assert!(store.project_exists("Website", USER).unwrap());
        assert!(store.list_tasks(&TaskFilter::for_user(USER)).unwrap().is_empty());
    }

    #[test]
    fn test_delete_project_removes_row_and_tasks() {
        let store = store();
        store.add_project("Website", USER).unwrap();
        store.add_task(&NewTask::new("One", "Website", USER)).unwrap();

        assert!(store.delete_project("Website", USER).unwrap());
        assert!(store.list_projects(USER).unwrap().is_empty());
        assert!(!store.delete_project("Website", USER).unwrap());
    }

    #[test]
    fn test_project_stats_counts_by_status() {
        let store = store();
        let a = store.add_task(&NewTask::new("A", "Website", USER)).unwrap();
        let b = store.add_task(&NewTask::new("B", "Website", USER)).unwrap();
        store.add_task(&NewTask::new("C", "Website", USER)).unwrap();
        store.update_task_status(a, TaskStatus::InProgress, USER).unwrap();
        store.update_task_status(b, TaskStatus::Done, USER).unwrap();

        let stats = store.project_stats("Website", USER).unwrap();
        assert_eq!(
            stats,
            ProjectStats {
                total: 3,
                not_started: 1,
                in_progress: 1,
                done: 1,
            }
        );

        let empty = store.project_stats("Nothing", USER).unwrap();
        assert_eq!(empty, ProjectStats::default());
    }
}
