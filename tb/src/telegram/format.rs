//! HTML rendering for chat messages

use taskstore::{ProjectStats, Task, TaskStatus};

use crate::flow::FlowError;

/// Telegram rejects messages over 4096 chars; lists stop well before that
pub const MAX_LIST_CHARS: usize = 4000;

pub const WELCOME: &str = "👋 <b>Task Bot</b> turns your messages into tasks.\n\n\
Send one or more messages, or forward them from other chats. After a short pause \
I collect them into tasks and ask which project they belong to.\n\n\
<b>Commands:</b>\n\
• /list - Show active tasks\n\
• /projects - Manage projects\n\
• /add &lt;text&gt; - Add one task right away\n\
• /help - Show help";

const HELP_INTRO: &str = "<b>📱 Task Bot</b>\n\n\
<b>Creating tasks:</b>\n\
• Send a message describing the task\n\
• Several messages in a row are grouped into one batch\n\
• /add stores a single task in the default project\n\n\
<b>Managing tasks:</b>\n\
• /list shows active tasks; tap one to change its status or delete it\n\
• Filter the list by status or by project\n\n\
<b>Projects:</b>\n\
• /projects shows statistics and lets you create, clear or delete projects";

/// Help text followed by the generated command list
pub fn help(commands: &str) -> String {
    format!("{}\n\n{}", HELP_INTRO, escape_html(commands))
}

/// Escape text for HTML parse mode
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn status_emoji(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::NotStarted => "⏳",
        TaskStatus::InProgress => "🚧",
        TaskStatus::Done => "✅",
    }
}

pub fn status_title(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::NotStarted => "Not started",
        TaskStatus::InProgress => "In progress",
        TaskStatus::Done => "Done",
    }
}

pub fn status_label(status: TaskStatus) -> String {
    format!("{} {}", status_emoji(status), status_title(status))
}

/// Full view of one task
pub fn task_card(task: &Task) -> String {
    format!(
        "📌 {}\n📁 {}\n{}\n📅 {}",
        escape_html(&task.description),
        escape_html(&task.project),
        status_label(task.status),
        task.created_at.format("%Y-%m-%d"),
    )
}

/// Numbered list of active tasks
pub fn task_list(tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return "No tasks found".to_string();
    }
    let lines: Vec<String> = tasks
        .iter()
        .filter(|t| t.status.is_active())
        .enumerate()
        .map(|(i, t)| format!("{}. [{}] {}", i + 1, status_emoji(t.status), escape_html(&t.description)))
        .collect();
    if lines.is_empty() {
        return "No active tasks".to_string();
    }
    join_capped(&lines, "\n\n", MAX_LIST_CHARS)
}

/// Numbered list of every task given, done ones included
pub fn full_task_list(tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return "No tasks found".to_string();
    }
    let lines: Vec<String> = tasks
        .iter()
        .enumerate()
        .map(|(i, t)| format!("{}. [{}] {}", i + 1, status_emoji(t.status), escape_html(&t.description)))
        .collect();
    join_capped(&lines, "\n\n", MAX_LIST_CHARS)
}

pub fn task_list_header(status: Option<TaskStatus>, project: Option<&str>) -> String {
    let mut header = "📋 Tasks".to_string();
    if let Some(status) = status {
        header.push_str(&format!(" • {}", status_label(status)));
    }
    if let Some(project) = project {
        header.push_str(&format!(" • Project: {}", escape_html(project)));
    }
    header
}

/// Per-status counts for the status filter screen
pub fn status_overview(tasks: &[Task]) -> String {
    let count = |status: TaskStatus| tasks.iter().filter(|t| t.status == status).count();
    let mut text = "📋 Tasks • Statuses\n\n".to_string();
    for status in TaskStatus::ALL {
        text.push_str(&format!("{}: {}\n", status_label(status), count(status)));
    }
    text.push_str(&format!("\nTotal tasks: {}", tasks.len()));
    text
}

/// Project list for the project filter screen
pub fn project_filter_overview(projects: &[(String, ProjectStats)]) -> String {
    let mut text = "📋 Tasks • Projects\n\n".to_string();
    for (name, stats) in projects {
        text.push_str(&format!(
            "📁 <b>{}</b>\n   • Total tasks: {}\n   • Active: {}\n\n",
            escape_html(name),
            stats.total,
            stats.active()
        ));
    }
    text
}

/// Project management screen
pub fn projects_overview(projects: &[(String, ProjectStats)]) -> String {
    if projects.is_empty() {
        return "📁 You have no projects yet.\n\nTap the button below to create the first one.".to_string();
    }
    let mut text = "📁 Projects:\n\n".to_string();
    for (name, stats) in projects {
        text.push_str(&format!(
            "📂 <b>{}</b>\n   📊 Total: {} | ⏳ {} | 🚧 {} | ✅ {}\n\n",
            escape_html(name),
            stats.total,
            stats.not_started,
            stats.in_progress,
            stats.done
        ));
    }
    text
}

pub fn project_info(name: &str, stats: &ProjectStats) -> String {
    format!(
        "📁 Project: <b>{}</b>\n\n📊 Statistics:\n   • Total tasks: {}\n   • {}: {}\n   • {}: {}\n   • {}: {}\n\nChoose an action:",
        escape_html(name),
        stats.total,
        status_label(TaskStatus::NotStarted),
        stats.not_started,
        status_label(TaskStatus::InProgress),
        stats.in_progress,
        status_label(TaskStatus::Done),
        stats.done,
    )
}

pub fn confirm_project_clear(name: &str) -> String {
    format!(
        "🧹 Clear project \"{}\"?\n\n⚠️ This deletes ALL tasks in the project. The project itself stays.",
        escape_html(name)
    )
}

pub fn confirm_project_delete(name: &str) -> String {
    format!(
        "🗑️ Delete project \"{}\"?\n\n⚠️ Its tasks are deleted too.",
        escape_html(name)
    )
}

pub fn confirm_task_delete(task: &Task) -> String {
    format!(
        "🗑️ Delete task #{}?\n\n{}",
        task.id,
        escape_html(&task.description)
    )
}

pub fn analyzing(message_count: usize) -> String {
    match message_count {
        1 => "⏳ Analyzing 1 message...".to_string(),
        n => format!("⏳ Analyzing {} messages...", n),
    }
}

fn numbered(tasks: &[String]) -> String {
    tasks
        .iter()
        .enumerate()
        .map(|(i, t)| format!("{}. {}", i + 1, escape_html(t)))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn project_choice(tasks: &[String]) -> String {
    format!(
        "📝 Found {} task(s):\n\n{}\n\nChoose a project:",
        tasks.len(),
        numbered(tasks)
    )
}

pub fn new_project_prompt(tasks: Option<&[String]>) -> String {
    match tasks {
        Some(tasks) => format!(
            "📝 Found {} task(s):\n\n{}\n\n🆕 Send a name for the new project:",
            tasks.len(),
            numbered(tasks)
        ),
        None => "🆕 New project\n\nSend the project name:".to_string(),
    }
}

pub fn task_summary(project: &str, tasks: &[Task]) -> String {
    let lines: Vec<String> = tasks
        .iter()
        .enumerate()
        .map(|(i, t)| format!("{}. <b>{}</b> (#{})", i + 1, escape_html(&t.description), t.id))
        .collect();
    let header = format!("✅ Created {} task(s) in project <b>{}</b>:\n\n", tasks.len(), escape_html(project));
    let budget = MAX_LIST_CHARS.saturating_sub(header.chars().count());
    header + &join_capped(&lines, "\n", budget)
}

pub fn task_created(task: &Task) -> String {
    format!("✅ Task added\n\n{}", task_card(task))
}

pub fn project_created(name: &str) -> String {
    format!(
        "✅ Project \"{}\" created.\n\nNew tasks can now be assigned to it.",
        escape_html(name)
    )
}

pub fn flow_error(error: &FlowError) -> String {
    match error {
        FlowError::EmptyExtraction => "🤷 I could not find any tasks in those messages.".to_string(),
        FlowError::DuplicateProject(name) => format!(
            "⚠️ Project \"{}\" already exists. Send another name.",
            escape_html(name)
        ),
        FlowError::PersistenceFailure { created: 0, total: 0 } => {
            "❌ Could not save the project. Please try again later.".to_string()
        }
        FlowError::PersistenceFailure { created, total } => format!(
            "❌ Saving failed: {} of {} task(s) were created.",
            created, total
        ),
        FlowError::InvalidInput(reason) => format!("⚠️ {}. Please try again.", capitalize(reason)),
        FlowError::TasksLost => "⚠️ These tasks are no longer available. Please send the messages again.".to_string(),
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Join whole lines while the result stays within `max` chars
///
/// Only a first line that is too long on its own gets cut.
pub fn join_capped(lines: &[String], separator: &str, max: usize) -> String {
    let separator_chars = separator.chars().count();
    let mut out = String::new();
    let mut used = 0;
    for line in lines {
        let extra = if out.is_empty() { 0 } else { separator_chars };
        let len = line.chars().count();
        if used + extra + len > max {
            if out.is_empty() {
                return cap_chars(line, max);
            }
            break;
        }
        if extra > 0 {
            out.push_str(separator);
        }
        out.push_str(line);
        used += extra + len;
    }
    out
}

/// Cut escaped HTML to at most `max` chars, never inside a char or an entity
pub fn cap_chars(text: &str, max: usize) -> String {
    let Some((idx, _)) = text.char_indices().nth(max) else {
        return text.to_string();
    };
    let cut = &text[..idx];
    match (cut.rfind('&'), cut.rfind(';')) {
        (Some(amp), semi) if semi.is_none_or(|semi| semi < amp) => cut[..amp].to_string(),
        _ => cut.to_string(),
    }
}
