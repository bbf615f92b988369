//! Inline button payloads
//!
//! Payloads are `prefix` or `prefix:arg`. Everything after the first `:` is
//! the argument, so project names may contain colons.

use std::fmt;

use taskstore::TaskStatus;

/// Telegram rejects buttons whose payload is longer than this
pub const MAX_DATA_BYTES: usize = 64;

const LONGEST_NAME_PREFIX: &str = "select_project_for_tasks:";

/// Longest project name that fits every project button
pub const MAX_PROJECT_NAME_BYTES: usize = MAX_DATA_BYTES - LONGEST_NAME_PREFIX.len();

/// Whether `name` can be carried by project buttons
pub fn fits_project_name(name: &str) -> bool {
    name.len() <= MAX_PROJECT_NAME_BYTES
}

/// A parsed button press
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    // Tasks
    TaskInfo(i64),
    StartTask(i64),
    DoneTask(i64),
    DeleteTask(i64),
    ConfirmDelete(i64),
    CancelDelete(i64),

    // Filters
    ShowTaskList,
    ShowStatusFilter,
    /// `None` shows every status
    FilterStatus(Option<TaskStatus>),
    ShowProjectFilter,
    FilterProject(String),

    // Projects
    ShowProjects,
    ManageProject(String),
    ProjectTasks(String),
    AddNewProject,
    CreateProject,
    ClearProject(String),
    DeleteProject(String),
    ConfirmProjectClear(String),
    ConfirmProjectDelete(String),
    CancelProjectClear(String),
    CancelProjectDelete(String),
    BackToProjects,

    // Task creation
    SelectProjectForTasks(String),
    CreateNewProjectForTasks,
    CancelTasksCreation,
}

impl CallbackAction {
    /// Parse button data; `None` for anything unknown or malformed
    pub fn parse(data: &str) -> Option<Self> {
        let (prefix, arg) = match data.split_once(':') {
            Some((prefix, arg)) => (prefix, Some(arg)),
            None => (data, None),
        };

        let id = || arg.and_then(|a| a.parse::<i64>().ok());
        let name = || arg.filter(|a| !a.is_empty()).map(str::to_string);

        let action = match prefix {
            "task_info" => Self::TaskInfo(id()?),
            "start_task" => Self::StartTask(id()?),
            "done_task" => Self::DoneTask(id()?),
            "delete_task" => Self::DeleteTask(id()?),
            "confirm_delete" => Self::ConfirmDelete(id()?),
            "cancel_delete" => Self::CancelDelete(id()?),

            "show_task_list" => Self::ShowTaskList,
            "show_status_filter" => Self::ShowStatusFilter,
            "filter_status" => match arg? {
                "all" => Self::FilterStatus(None),
                status => Self::FilterStatus(Some(status.parse().ok()?)),
            },
            "show_project_filter" => Self::ShowProjectFilter,
            "filter_project" => Self::FilterProject(name()?),

            "show_projects" => Self::ShowProjects,
            "manage_project" => Self::ManageProject(name()?),
            "project_tasks" => Self::ProjectTasks(name()?),
            "add_new_project" => Self::AddNewProject,
            "create_project" => Self::CreateProject,
            "clear_project" => Self::ClearProject(name()?),
            "delete_project" => Self::DeleteProject(name()?),
            "confirm_project_clear" => Self::ConfirmProjectClear(name()?),
            "confirm_project_delete" => Self::ConfirmProjectDelete(name()?),
            "cancel_project_clear" => Self::CancelProjectClear(name()?),
            "cancel_project_delete" => Self::CancelProjectDelete(name()?),
            "back_to_projects" => Self::BackToProjects,

            "select_project_for_tasks" => Self::SelectProjectForTasks(name()?),
            "create_new_project_for_tasks" => Self::CreateNewProjectForTasks,
            "cancel_tasks_creation" => Self::CancelTasksCreation,

            _ => return None,
        };
        Some(action)
    }
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TaskInfo(id) => write!(f, "task_info:{}", id),
            Self::StartTask(id) => write!(f, "start_task:{}", id),
            Self::DoneTask(id) => write!(f, "done_task:{}", id),
            Self::DeleteTask(id) => write!(f, "delete_task:{}", id),
            Self::ConfirmDelete(id) => write!(f, "confirm_delete:{}", id),
            Self::CancelDelete(id) => write!(f, "cancel_delete:{}", id),

            Self::ShowTaskList => f.write_str("show_task_list"),
            Self::ShowStatusFilter => f.write_str("show_status_filter"),
            Self::FilterStatus(None) => f.write_str("filter_status:all"),
            Self::FilterStatus(Some(status)) => write!(f, "filter_status:{}", status),
            Self::ShowProjectFilter => f.write_str("show_project_filter"),
            Self::FilterProject(name) => write!(f, "filter_project:{}", name),

            Self::ShowProjects => f.write_str("show_projects"),
            Self::ManageProject(name) => write!(f, "manage_project:{}", name),
            Self::ProjectTasks(name) => write!(f, "project_tasks:{}", name),
            Self::AddNewProject => f.write_str("add_new_project"),
            Self::CreateProject => f.write_str("create_project"),
            Self::ClearProject(name) => write!(f, "clear_project:{}", name),
            Self::DeleteProject(name) => write!(f, "delete_project:{}", name),
            Self::ConfirmProjectClear(name) => write!(f, "confirm_project_clear:{}", name),
            Self::ConfirmProjectDelete(name) => write!(f, "confirm_project_delete:{}", name),
            Self::CancelProjectClear(name) => write!(f, "cancel_project_clear:{}", name),
            Self::CancelProjectDelete(name) => write!(f, "cancel_project_delete:{}", name),
            Self::BackToProjects => f.write_str("back_to_projects"),

            Self::SelectProjectForTasks(name) => write!(f, "select_project_for_tasks:{}", name),
            Self::CreateNewProjectForTasks => f.write_str("create_new_project_for_tasks"),
            Self::CancelTasksCreation => f.write_str("cancel_tasks_creation"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_task_actions() {
        assert_eq!(CallbackAction::parse("task_info:42"), Some(CallbackAction::TaskInfo(42)));
        assert_eq!(CallbackAction::parse("done_task:7"), Some(CallbackAction::DoneTask(7)));
        assert_eq!(CallbackAction::parse("confirm_delete:3"), Some(CallbackAction::ConfirmDelete(3)));
    }

    #[test]
    fn test_parse_rejects_bad_ids() {
        assert_eq!(CallbackAction::parse("task_info"), None);
        assert_eq!(CallbackAction::parse("task_info:abc"), None);
        assert_eq!(CallbackAction::parse("start_task:"), None);
    }

    #[test]
    fn test_parse_status_filter() {
        assert_eq!(CallbackAction::parse("filter_status:all"), Some(CallbackAction::FilterStatus(None)));
        assert_eq!(
            CallbackAction::parse("filter_status:in_progress"),
            Some(CallbackAction::FilterStatus(Some(TaskStatus::InProgress)))
        );
        assert_eq!(CallbackAction::parse("filter_status:someday"), None);
    }

    #[test]
    fn test_project_names_keep_colons() {
        assert_eq!(
            CallbackAction::parse("select_project_for_tasks:Ops: Q3"),
            Some(CallbackAction::SelectProjectForTasks("Ops: Q3".to_string()))
        );
        assert_eq!(CallbackAction::parse("manage_project:"), None);
    }

    #[test]
    fn test_longest_project_name_fits_every_payload() {
        let name = format!("{}x", "й".repeat(19));
        assert_eq!(name.len(), MAX_PROJECT_NAME_BYTES);
        assert!(fits_project_name(&name));

        let actions = [
            CallbackAction::FilterProject(name.clone()),
            CallbackAction::ManageProject(name.clone()),
            CallbackAction::ProjectTasks(name.clone()),
            CallbackAction::ClearProject(name.clone()),
            CallbackAction::DeleteProject(name.clone()),
            CallbackAction::ConfirmProjectClear(name.clone()),
            CallbackAction::ConfirmProjectDelete(name.clone()),
            CallbackAction::CancelProjectClear(name.clone()),
            CallbackAction::CancelProjectDelete(name.clone()),
            CallbackAction::SelectProjectForTasks(name.clone()),
        ];
        for action in actions {
            assert!(action.to_string().len() <= MAX_DATA_BYTES, "{} is too long", action);
        }

        assert!(!fits_project_name("Редизайн сайта компании"));
    }

    #[test]
    fn test_unknown_data() {
        assert_eq!(CallbackAction::parse("launch_rockets"), None);
        assert_eq!(CallbackAction::parse(""), None);
    }

    #[test]
    fn test_display_parses_back() {
        let actions = [
            CallbackAction::DeleteTask(9),
            CallbackAction::FilterStatus(Some(TaskStatus::NotStarted)),
            CallbackAction::FilterStatus(None),
            CallbackAction::ConfirmProjectDelete("Website".to_string()),
            CallbackAction::CreateNewProjectForTasks,
            CallbackAction::BackToProjects,
        ];
        for action in actions {
            assert_eq!(CallbackAction::parse(&action.to_string()), Some(action));
        }
    }
}
