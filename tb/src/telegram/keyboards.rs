//! Inline keyboards

use taskstore::{Task, TaskStatus};
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use tracing::warn;

use super::callbacks::{CallbackAction, fits_project_name};
use super::format::status_label;

fn button(text: impl Into<String>, action: CallbackAction) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text, action.to_string())
}

/// Two buttons per row
fn pairs(buttons: Vec<InlineKeyboardButton>) -> Vec<Vec<InlineKeyboardButton>> {
    buttons.chunks(2).map(<[InlineKeyboardButton]>::to_vec).collect()
}

/// One button per project, leaving out names too long for a payload
fn project_buttons(projects: &[String], action: fn(String) -> CallbackAction) -> Vec<InlineKeyboardButton> {
    projects
        .iter()
        .filter(|p| {
            let fits = fits_project_name(p);
            if !fits {
                warn!(project = %p, "Project name too long for a button, skipped");
            }
            fits
        })
        .map(|p| button(format!("📁 {}", p), action(p.clone())))
        .collect()
}

fn task_rows(tasks: &[Task]) -> Vec<Vec<InlineKeyboardButton>> {
    tasks
        .iter()
        .map(|t| vec![button(format!("🔗 Task #{}", t.id), CallbackAction::TaskInfo(t.id))])
        .collect()
}

fn active(tasks: &[Task]) -> Vec<Task> {
    tasks.iter().filter(|t| t.status.is_active()).cloned().collect()
}

/// Entry points shown under welcome and confirmation messages
pub fn main_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        button("📋 Tasks", CallbackAction::ShowTaskList),
        button("📁 Projects", CallbackAction::ShowProjects),
    ]])
}

/// Main task list: one button per active task plus the filters
pub fn task_list(tasks: &[Task]) -> InlineKeyboardMarkup {
    let mut rows = task_rows(&active(tasks));
    rows.push(vec![
        button("🔍 By status", CallbackAction::ShowStatusFilter),
        button("📁 By project", CallbackAction::ShowProjectFilter),
    ]);
    InlineKeyboardMarkup::new(rows)
}

pub fn filtered_by_status(tasks: &[Task]) -> InlineKeyboardMarkup {
    let mut rows = task_rows(tasks);
    rows.push(vec![
        button("🔍 Statuses", CallbackAction::ShowStatusFilter),
        button("◀️ Back", CallbackAction::ShowTaskList),
    ]);
    InlineKeyboardMarkup::new(rows)
}

pub fn filtered_by_project(tasks: &[Task]) -> InlineKeyboardMarkup {
    let mut rows = task_rows(&active(tasks));
    rows.push(vec![
        button("📁 Projects", CallbackAction::ShowProjectFilter),
        button("◀️ Back", CallbackAction::ShowTaskList),
    ]);
    InlineKeyboardMarkup::new(rows)
}

pub fn status_filter() -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = TaskStatus::ALL
        .iter()
        .map(|s| vec![button(status_label(*s), CallbackAction::FilterStatus(Some(*s)))])
        .collect();
    rows.push(vec![button("📋 All tasks", CallbackAction::FilterStatus(None))]);
    rows.push(vec![button("◀️ Back", CallbackAction::ShowTaskList)]);
    InlineKeyboardMarkup::new(rows)
}

pub fn project_filter(projects: &[String]) -> InlineKeyboardMarkup {
    let mut rows = pairs(project_buttons(projects, CallbackAction::FilterProject));
    rows.push(vec![button("◀️ Back", CallbackAction::ShowTaskList)]);
    InlineKeyboardMarkup::new(rows)
}

/// Actions for a single task, depending on its status
pub fn task_actions(task: &Task) -> InlineKeyboardMarkup {
    let mut buttons = Vec::new();
    if task.status != TaskStatus::InProgress {
        buttons.push(button("🚧 Start", CallbackAction::StartTask(task.id)));
    }
    if task.status != TaskStatus::Done {
        buttons.push(button("✅ Done", CallbackAction::DoneTask(task.id)));
    }
    buttons.push(button("🗑️ Delete", CallbackAction::DeleteTask(task.id)));
    let mut rows = pairs(buttons);
    rows.push(vec![button("◀️ Back", CallbackAction::ShowTaskList)]);
    InlineKeyboardMarkup::new(rows)
}

pub fn confirm_task_delete(id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        button("✔️ Confirm", CallbackAction::ConfirmDelete(id)),
        button("✖️ Cancel", CallbackAction::CancelDelete(id)),
    ]])
}

/// Project management screen
pub fn project_management(projects: &[String]) -> InlineKeyboardMarkup {
    let mut rows = pairs(project_buttons(projects, CallbackAction::ManageProject));
    rows.push(vec![
        button("➕ Add project", CallbackAction::AddNewProject),
        button("✏️ Quick create", CallbackAction::CreateProject),
    ]);
    InlineKeyboardMarkup::new(rows)
}

pub fn project_actions(name: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![button("📋 Tasks", CallbackAction::ProjectTasks(name.to_string()))],
        vec![
            button("🧹 Clear", CallbackAction::ClearProject(name.to_string())),
            button("🗑️ Delete", CallbackAction::DeleteProject(name.to_string())),
        ],
        vec![button("◀️ Back", CallbackAction::BackToProjects)],
    ])
}

pub fn confirm_project_clear(name: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        button("✔️ Confirm", CallbackAction::ConfirmProjectClear(name.to_string())),
        button("✖️ Cancel", CallbackAction::CancelProjectClear(name.to_string())),
    ]])
}

pub fn confirm_project_delete(name: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        button("✔️ Confirm", CallbackAction::ConfirmProjectDelete(name.to_string())),
        button("✖️ Cancel", CallbackAction::CancelProjectDelete(name.to_string())),
    ]])
}

/// Where the extracted tasks should go
pub fn project_choice(projects: &[String]) -> InlineKeyboardMarkup {
    let mut rows = pairs(project_buttons(projects, CallbackAction::SelectProjectForTasks));
    rows.push(vec![button("🆕 New project", CallbackAction::CreateNewProjectForTasks)]);
    rows.push(vec![button("❌ Cancel", CallbackAction::CancelTasksCreation)]);
    InlineKeyboardMarkup::new(rows)
}

pub fn cancel_tasks_creation() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![button("❌ Cancel", CallbackAction::CancelTasksCreation)]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::telegram::callbacks::MAX_DATA_BYTES;
    use teloxide::types::InlineKeyboardButtonKind;

    fn data(markup: &InlineKeyboardMarkup) -> Vec<Vec<String>> {
        markup
            .inline_keyboard
            .iter()
            .map(|row| {
                row.iter()
                    .map(|b| match &b.kind {
                        InlineKeyboardButtonKind::CallbackData(d) => d.clone(),
                        other => panic!("unexpected button kind: {:?}", other),
                    })
                    .collect()
            })
            .collect()
    }

    fn task(id: i64, status: TaskStatus) -> Task {
        Task {
            id,
            description: format!("Task {}", id),
            project: "Website".to_string(),
            status,
            created_at: Utc::now(),
            user_id: 7,
        }
    }

    #[test]
    fn test_project_choice_two_per_row() {
        let projects: Vec<String> = ["A", "B", "C"].iter().map(|s| s.to_string()).collect();
        assert_eq!(
            data(&project_choice(&projects)),
            vec![
                vec!["select_project_for_tasks:A".to_string(), "select_project_for_tasks:B".to_string()],
                vec!["select_project_for_tasks:C".to_string()],
                vec!["create_new_project_for_tasks".to_string()],
                vec!["cancel_tasks_creation".to_string()],
            ]
        );
    }

    #[test]
    fn test_project_choice_stays_within_payload_limit() {
        let projects = vec!["Редизайн сайта компании".to_string(), "Website".to_string()];
        let payloads: Vec<String> = data(&project_choice(&projects)).into_iter().flatten().collect();

        assert!(payloads.iter().all(|p| p.len() <= MAX_DATA_BYTES));
        assert_eq!(
            payloads,
            vec![
                "select_project_for_tasks:Website".to_string(),
                "create_new_project_for_tasks".to_string(),
                "cancel_tasks_creation".to_string(),
            ]
        );
    }

    #[test]
    fn test_task_actions_depend_on_status() {
        let rows = data(&task_actions(&task(5, TaskStatus::InProgress)));
        assert_eq!(rows[0], vec!["done_task:5".to_string(), "delete_task:5".to_string()]);

        let rows = data(&task_actions(&task(5, TaskStatus::Done)));
        assert_eq!(rows[0], vec!["start_task:5".to_string(), "delete_task:5".to_string()]);
    }

    #[test]
    fn test_task_list_skips_done_tasks() {
        let tasks = vec![task(1, TaskStatus::NotStarted), task(2, TaskStatus::Done)];
        let rows = data(&task_list(&tasks));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["task_info:1".to_string()]);
    }

    #[test]
    fn test_every_button_parses() {
        let projects = vec!["Website".to_string()];
        let markups = [
            main_menu(),
            status_filter(),
            project_filter(&projects),
            project_management(&projects),
            project_actions("Website"),
            confirm_project_clear("Website"),
            confirm_project_delete("Website"),
            confirm_task_delete(3),
            project_choice(&projects),
            cancel_tasks_creation(),
        ];
        for markup in &markups {
            for payload in data(markup).into_iter().flatten() {
                assert!(CallbackAction::parse(&payload).is_some(), "unparsed payload {}", payload);
            }
        }
    }
}
