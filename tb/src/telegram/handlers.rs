//! Update routing: commands, button presses and free text

use std::sync::Arc;

use eyre::Context;
use taskstore::{ProjectStats, TaskFilter, TaskStatus};
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, MessageId, ParseMode};
use teloxide::utils::command::BotCommands;
use tracing::{debug, info, warn};

use super::callbacks::CallbackAction;
use super::presenter::message_ref;
use super::{format, keyboards};
use crate::flow::{AssignmentFlow, InboundText, TaskGateway};
use crate::session::{UserId, one_shot};

/// Shared handler state
#[derive(Clone)]
pub struct App {
    pub flow: Arc<AssignmentFlow>,
    /// Username used to recognize `/command@name`
    pub bot_name: String,
}

impl App {
    fn gateway(&self) -> &Arc<dyn TaskGateway> {
        self.flow.gateway()
    }
}

/// Slash commands the bot answers itself
#[derive(BotCommands, Debug, Clone, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Commands:")]
pub enum Command {
    #[command(description = "welcome message and active tasks")]
    Start,
    #[command(description = "how the bot works")]
    Help,
    #[command(description = "show active tasks")]
    List,
    #[command(description = "manage projects")]
    Projects,
    #[command(description = "add one task right away, e.g. /add Buy milk")]
    Add(String),
    #[command(description = "analyze waiting messages now")]
    Process,
    #[command(description = "drop waiting messages")]
    Cancel,
}

/// Long-poll until Ctrl-C
pub async fn dispatch(bot: Bot, app: App) {
    debug!("dispatch: called");
    let message_app = app.clone();
    let callback_app = app;

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(move |bot: Bot, msg: Message| {
            let app = message_app.clone();
            async move {
                if let Err(e) = handle_message(&bot, &app, &msg).await {
                    warn!(chat_id = msg.chat.id.0, error = %e, "Failed to handle message");
                }
                respond(())
            }
        }))
        .branch(Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
            let app = callback_app.clone();
            async move {
                if let Err(e) = handle_callback(&bot, &app, &q).await {
                    warn!(user_id = q.from.id.0, error = %e, "Failed to handle button press");
                }
                respond(())
            }
        }));

    info!("Starting Telegram long polling");
    Dispatcher::builder(bot, handler)
        .default_handler(|_| async {})
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
    info!("Telegram long polling stopped");
}

async fn handle_message(bot: &Bot, app: &App, msg: &Message) -> eyre::Result<()> {
    let Some(user) = msg.from.as_ref() else {
        debug!(chat_id = msg.chat.id.0, "handle_message: no sender, ignored");
        return Ok(());
    };
    let Some(text) = msg.text().or_else(|| msg.caption()) else {
        debug!(chat_id = msg.chat.id.0, "handle_message: no text, ignored");
        return Ok(());
    };
    let is_forwarded = msg.forward_origin().is_some();
    debug!(chat_id = msg.chat.id.0, user_id = user.id.0, is_forwarded, "handle_message: called");

    if !is_forwarded {
        if let Ok(command) = Command::parse(text, &app.bot_name) {
            return run_command(bot, app, msg.chat.id, user.id.0, command).await;
        }
    }

    let outcome = app
        .flow
        .inbound_text(InboundText {
            conversation: msg.chat.id.0,
            user: user.id.0,
            text: text.to_string(),
            raw_ref: message_ref(msg),
            is_forwarded,
        })
        .await?;
    debug!(chat_id = msg.chat.id.0, ?outcome, "handle_message: routed");
    Ok(())
}

async fn reply(bot: &Bot, chat: ChatId, text: impl Into<String>, keyboard: Option<InlineKeyboardMarkup>) -> eyre::Result<()> {
    let request = bot.send_message(chat, text).parse_mode(ParseMode::Html);
    let sent = match keyboard {
        Some(keyboard) => request.reply_markup(keyboard).await,
        None => request.await,
    };
    sent.context("Failed to send message")?;
    Ok(())
}

async fn run_command(bot: &Bot, app: &App, chat: ChatId, user: UserId, command: Command) -> eyre::Result<()> {
    debug!(chat_id = chat.0, %user, ?command, "run_command: called");
    match command {
        Command::Start => {
            reply(bot, chat, format::WELCOME, Some(keyboards::main_menu())).await?;
            let tasks = app.gateway().list_tasks(user).await?;
            if tasks.iter().any(|t| t.status.is_active()) {
                let (text, keyboard) = task_list_view(app, user).await?;
                reply(bot, chat, text, Some(keyboard)).await?;
            }
        }
        Command::Help => {
            let text = format::help(&Command::descriptions().to_string());
            reply(bot, chat, text, Some(keyboards::main_menu())).await?;
        }
        Command::List => {
            let (text, keyboard) = task_list_view(app, user).await?;
            reply(bot, chat, text, Some(keyboard)).await?;
        }
        Command::Projects => {
            let (text, keyboard) = projects_view(app, user).await?;
            reply(bot, chat, text, Some(keyboard)).await?;
        }
        Command::Add(text) => {
            let outcome = app.flow.quick_add(chat.0, user, text.trim()).await;
            debug!(chat_id = chat.0, ?outcome, "run_command: quick add finished");
        }
        Command::Process => {
            if !app.flow.session().process_now(chat.0).await? {
                reply(bot, chat, "Nothing to process: no messages are waiting.", None).await?;
            }
        }
        Command::Cancel => {
            app.flow.cancel_requested(chat.0).await?;
        }
    }
    Ok(())
}

async fn task_list_view(app: &App, user: UserId) -> eyre::Result<(String, InlineKeyboardMarkup)> {
    let tasks = app.gateway().list_tasks(user).await?;
    let text = format!("{}\n\n{}", format::task_list_header(None, None), format::task_list(&tasks));
    Ok((text, keyboards::task_list(&tasks)))
}

async fn project_stats(app: &App, user: UserId) -> eyre::Result<Vec<(String, ProjectStats)>> {
    let projects = app.gateway().list_projects(user).await?;
    let mut stats = Vec::with_capacity(projects.len());
    for name in projects {
        let counts = app.gateway().project_stats(&name, user).await?;
        stats.push((name, counts));
    }
    Ok(stats)
}

async fn projects_view(app: &App, user: UserId) -> eyre::Result<(String, InlineKeyboardMarkup)> {
    let stats = project_stats(app, user).await?;
    let names: Vec<String> = stats.iter().map(|(name, _)| name.clone()).collect();
    Ok((format::projects_overview(&stats), keyboards::project_management(&names)))
}

async fn project_info_view(app: &App, user: UserId, name: &str) -> eyre::Result<(String, InlineKeyboardMarkup)> {
    let stats = app.gateway().project_stats(name, user).await?;
    Ok((format::project_info(name, &stats), keyboards::project_actions(name)))
}

/// The message a button press came from
struct Screen<'a> {
    bot: &'a Bot,
    chat: ChatId,
    message: MessageId,
}

impl Screen<'_> {
    async fn edit(&self, text: impl Into<String>, keyboard: Option<InlineKeyboardMarkup>) -> eyre::Result<()> {
        let request = self
            .bot
            .edit_message_text(self.chat, self.message, text)
            .parse_mode(ParseMode::Html);
        let result = match keyboard {
            Some(keyboard) => request.reply_markup(keyboard).await,
            None => request.await,
        };
        match result {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains("message is not modified") => Ok(()),
            Err(e) => Err(e).context("Failed to edit message"),
        }
    }

    async fn delete(&self) {
        if let Err(e) = self.bot.delete_message(self.chat, self.message).await {
            debug!(chat_id = self.chat.0, error = %e, "Screen::delete: message already gone");
        }
    }
}

async fn handle_callback(bot: &Bot, app: &App, q: &CallbackQuery) -> eyre::Result<()> {
    let user = q.from.id.0;
    let data = q.data.as_deref().unwrap_or_default();
    debug!(%user, %data, "handle_callback: called");

    let notice = match (q.regular_message(), CallbackAction::parse(data)) {
        (Some(message), Some(action)) => {
            let screen = Screen {
                bot,
                chat: message.chat.id,
                message: message.id,
            };
            run_callback(app, &screen, user, action).await.unwrap_or_else(|e| {
                warn!(%user, %data, error = %e, "Button action failed");
                Some("Something went wrong, please try again".to_string())
            })
        }
        _ => {
            debug!(%user, %data, "handle_callback: unknown action");
            Some("Action unavailable".to_string())
        }
    };

    let answer = bot.answer_callback_query(q.id.clone());
    let answered = match notice {
        Some(text) => answer.text(text).await,
        None => answer.await,
    };
    answered.context("Failed to answer button press")?;
    Ok(())
}

/// Perform a button action; returns the toast shown to the user
async fn run_callback(app: &App, screen: &Screen<'_>, user: UserId, action: CallbackAction) -> eyre::Result<Option<String>> {
    debug!(%user, ?action, "run_callback: called");
    let conversation = screen.chat.0;
    let gateway = app.gateway();

    let notice = match action {
        CallbackAction::TaskInfo(id) | CallbackAction::CancelDelete(id) => match gateway.get_task(id, user).await? {
            Some(task) => {
                screen.edit(format::task_card(&task), Some(keyboards::task_actions(&task))).await?;
                None
            }
            None => Some("⚠️ Task not found".to_string()),
        },

        CallbackAction::StartTask(id) => set_status(app, screen, user, id, TaskStatus::InProgress).await?,
        CallbackAction::DoneTask(id) => set_status(app, screen, user, id, TaskStatus::Done).await?,

        CallbackAction::DeleteTask(id) => match gateway.get_task(id, user).await? {
            Some(task) => {
                screen
                    .edit(format::confirm_task_delete(&task), Some(keyboards::confirm_task_delete(id)))
                    .await?;
                None
            }
            None => Some("⚠️ Task not found".to_string()),
        },

        CallbackAction::ConfirmDelete(id) => {
            if gateway.delete_task(id, user).await? {
                info!(%user, task_id = id, "Task deleted");
                screen
                    .edit(format!("✅ Task #{} deleted.", id), Some(keyboards::main_menu()))
                    .await?;
                Some("Task deleted".to_string())
            } else {
                screen.edit(format!("⚠️ Could not delete task #{}.", id), None).await?;
                Some("Delete failed".to_string())
            }
        }

        CallbackAction::ShowTaskList => {
            let (text, keyboard) = task_list_view(app, user).await?;
            screen.edit(text, Some(keyboard)).await?;
            None
        }

        CallbackAction::ShowStatusFilter => {
            let tasks = gateway.list_tasks(user).await?;
            screen
                .edit(format::status_overview(&tasks), Some(keyboards::status_filter()))
                .await?;
            None
        }

        CallbackAction::FilterStatus(status) => {
            let mut filter = TaskFilter::for_user(user);
            if let Some(status) = status {
                filter = filter.with_status(status);
            }
            let tasks = gateway.list_tasks_filtered(filter).await?;
            let text = format!(
                "{}\n\n{}",
                format::task_list_header(status, None),
                format::full_task_list(&tasks)
            );
            screen.edit(text, Some(keyboards::filtered_by_status(&tasks))).await?;
            None
        }

        CallbackAction::ShowProjectFilter => {
            let stats = project_stats(app, user).await?;
            if stats.is_empty() {
                screen
                    .edit(
                        "📁 You have no projects yet.\n\nCreate one from /projects first.",
                        Some(keyboards::main_menu()),
                    )
                    .await?;
                Some("No projects".to_string())
            } else {
                let names: Vec<String> = stats.iter().map(|(name, _)| name.clone()).collect();
                screen
                    .edit(format::project_filter_overview(&stats), Some(keyboards::project_filter(&names)))
                    .await?;
                None
            }
        }

        CallbackAction::FilterProject(name) | CallbackAction::ProjectTasks(name) => {
            let tasks = gateway
                .list_tasks_filtered(TaskFilter::for_user(user).with_project(name.as_str()))
                .await?;
            if tasks.is_empty() {
                screen
                    .edit(
                        format!(
                            "📁 Project \"{}\"\n\nNo tasks yet. Pick this project when creating tasks.",
                            format::escape_html(&name)
                        ),
                        Some(keyboards::project_actions(&name)),
                    )
                    .await?;
                Some("Project is empty".to_string())
            } else {
                let text = format!(
                    "{}\n\n{}",
                    format::task_list_header(None, Some(name.as_str())),
                    format::task_list(&tasks)
                );
                screen.edit(text, Some(keyboards::filtered_by_project(&tasks))).await?;
                None
            }
        }

        CallbackAction::ShowProjects | CallbackAction::BackToProjects => {
            let (text, keyboard) = projects_view(app, user).await?;
            screen.edit(text, Some(keyboard)).await?;
            None
        }

        CallbackAction::ManageProject(name) => {
            let (text, keyboard) = project_info_view(app, user, &name).await?;
            screen.edit(text, Some(keyboard)).await?;
            None
        }

        CallbackAction::AddNewProject => {
            screen.delete().await;
            app.flow.project_name_requested(conversation).await?;
            Some("Send the project name".to_string())
        }

        CallbackAction::CreateProject => {
            let flow = app.flow.clone();
            app.flow
                .session()
                .register_one_shot(
                    user,
                    one_shot(move |ctx, text| async move {
                        let outcome = flow.create_project(ctx.conversation, ctx.user, &text).await?;
                        debug!(conversation = ctx.conversation, ?outcome, "create_project one-shot finished");
                        Ok::<(), eyre::Report>(())
                    }),
                )
                .await?;
            screen
                .edit(
                    "📁 New project\n\nSend the project name in your next message.",
                    Some(keyboards::main_menu()),
                )
                .await?;
            None
        }

        CallbackAction::ClearProject(name) => {
            screen
                .edit(format::confirm_project_clear(&name), Some(keyboards::confirm_project_clear(&name)))
                .await?;
            None
        }

        CallbackAction::DeleteProject(name) => {
            screen
                .edit(format::confirm_project_delete(&name), Some(keyboards::confirm_project_delete(&name)))
                .await?;
            None
        }

        CallbackAction::ConfirmProjectClear(name) => {
            let cleared = gateway.clear_project(&name, user).await?;
            info!(%user, project = %name, %cleared, "Project cleared");
            screen
                .edit(
                    format!(
                        "✅ Project \"{}\" cleared.\nDeleted tasks: {}",
                        format::escape_html(&name),
                        cleared
                    ),
                    Some(keyboards::project_actions(&name)),
                )
                .await?;
            Some("Project cleared".to_string())
        }

        CallbackAction::ConfirmProjectDelete(name) => {
            if gateway.delete_project(&name, user).await? {
                info!(%user, project = %name, "Project deleted");
                let (text, keyboard) = projects_view(app, user).await?;
                screen.edit(text, Some(keyboard)).await?;
                Some(format!("Project \"{}\" deleted", name))
            } else {
                screen
                    .edit(
                        format!("❌ Could not delete project \"{}\"", format::escape_html(&name)),
                        Some(keyboards::main_menu()),
                    )
                    .await?;
                Some("Delete failed".to_string())
            }
        }

        CallbackAction::CancelProjectClear(name) | CallbackAction::CancelProjectDelete(name) => {
            let (text, keyboard) = project_info_view(app, user, &name).await?;
            screen.edit(text, Some(keyboard)).await?;
            Some("Cancelled".to_string())
        }

        CallbackAction::SelectProjectForTasks(name) => {
            let outcome = app.flow.project_chosen(conversation, user, &name).await?;
            debug!(%conversation, ?outcome, "run_callback: project chosen");
            None
        }

        CallbackAction::CreateNewProjectForTasks => {
            screen.delete().await;
            app.flow.new_project_requested(conversation).await?;
            Some("Send the project name".to_string())
        }

        CallbackAction::CancelTasksCreation => {
            screen.delete().await;
            app.flow.cancel_requested(conversation).await?;
            None
        }
    };
    Ok(notice)
}

async fn set_status(
    app: &App,
    screen: &Screen<'_>,
    user: UserId,
    id: i64,
    status: TaskStatus,
) -> eyre::Result<Option<String>> {
    let Some(mut task) = app.gateway().get_task(id, user).await? else {
        return Ok(Some("⚠️ Task not found".to_string()));
    };
    if task.status == status {
        return Ok(Some(format!("Task is already '{}'", format::status_title(status))));
    }
    if !app.gateway().update_task_status(id, status, user).await? {
        return Ok(Some("⚠️ Status update failed".to_string()));
    }
    info!(%user, task_id = id, %status, "Task status changed");
    task.status = status;
    screen
        .edit(format::task_card(&task), Some(keyboards::task_actions(&task)))
        .await?;
    Ok(Some(format!(
        "{} Marked as '{}'",
        format::status_emoji(status),
        format::status_title(status)
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOT: &str = "task_bot";

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/start", BOT).ok(), Some(Command::Start));
        assert_eq!(Command::parse("/list@task_bot", BOT).ok(), Some(Command::List));
        assert_eq!(Command::parse("/process", BOT).ok(), Some(Command::Process));
        assert_eq!(Command::parse("/cancel", BOT).ok(), Some(Command::Cancel));
    }

    #[test]
    fn test_parse_add_keeps_arguments() {
        assert_eq!(Command::parse("/add Call Bob", BOT).ok(), Some(Command::Add("Call Bob".to_string())));
        assert_eq!(
            Command::parse("/add@task_bot Buy milk. Two liters", BOT).ok(),
            Some(Command::Add("Buy milk. Two liters".to_string()))
        );
    }

    #[test]
    fn test_parse_rejects_other_text() {
        assert!(Command::parse("start", BOT).is_err());
        assert!(Command::parse("/unknown", BOT).is_err());
        assert!(Command::parse("/list@other_bot", BOT).is_err());
    }

    #[test]
    fn test_help_lists_every_command() {
        let help = Command::descriptions().to_string();
        for name in ["/start", "/help", "/list", "/projects", "/add", "/process", "/cancel"] {
            assert!(help.contains(name), "{} missing from help", name);
        }
    }
}
