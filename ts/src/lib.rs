//! TaskStore - SQLite persistence for tasks and projects
//!
//! Owns the relational side of taskbot: one `tasks` table and one `projects`
//! table, both scoped per user. A project can exist explicitly (a row in
//! `projects`) or implicitly (tasks carrying its name); [`Store::list_projects`]
//! returns the union of both.
//!
//! # Example
//!
//! ```ignore
//! use taskstore::{NewTask, Store, TaskStatus};
//!
//! let store = Store::open("tasks.db")?;
//! store.add_project("Website", 42)?;
//! let id = store.add_task(&NewTask::new("Fix the header logo", "Website", 42))?;
//! store.update_task_status(id, TaskStatus::InProgress, 42)?;
//! ```

mod models;
mod store;

pub use models::{NewTask, ProjectStats, Task, TaskFilter, TaskStatus};
pub use store::Store;

/// Current time as an RFC 3339 timestamp, the format stored in `created_at`
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
