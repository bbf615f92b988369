//! Flow output rendered as Telegram messages

use async_trait::async_trait;
use eyre::Context;
use taskstore::Task;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, MessageId, ParseMode};
use tracing::{debug, warn};

use super::{format, keyboards};
use crate::flow::{FlowError, Presenter};
use crate::session::{ConversationId, RawRef};

/// Encode a sent message as a [`RawRef`]
pub fn message_ref(msg: &Message) -> RawRef {
    RawRef::new(format!("{}:{}", msg.chat.id.0, msg.id.0))
}

/// Decode a [`RawRef`] made by [`message_ref`]
pub fn parse_ref(raw_ref: &RawRef) -> Option<(ChatId, MessageId)> {
    let (chat, message) = raw_ref.as_str().split_once(':')?;
    Some((ChatId(chat.parse().ok()?), MessageId(message.parse().ok()?)))
}

/// [`Presenter`] over the Bot API
#[derive(Clone)]
pub struct TelegramPresenter {
    bot: Bot,
}

impl TelegramPresenter {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    async fn send(
        &self,
        conversation: ConversationId,
        text: String,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> eyre::Result<Message> {
        let request = self.bot.send_message(ChatId(conversation), text).parse_mode(ParseMode::Html);
        let sent = match keyboard {
            Some(keyboard) => request.reply_markup(keyboard).await,
            None => request.await,
        };
        sent.context("Failed to send message")
    }

    /// Replace the progress message if there is one, otherwise send a new message
    async fn show(
        &self,
        conversation: ConversationId,
        status: Option<&RawRef>,
        text: String,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> eyre::Result<()> {
        if let Some((chat, message)) = status.and_then(parse_ref) {
            let request = self
                .bot
                .edit_message_text(chat, message, text.clone())
                .parse_mode(ParseMode::Html);
            let edited = match keyboard.clone() {
                Some(keyboard) => request.reply_markup(keyboard).await,
                None => request.await,
            };
            match edited {
                Ok(_) => return Ok(()),
                Err(e) => warn!(%conversation, error = %e, "Failed to edit progress message, sending a new one"),
            }
        }
        self.send(conversation, text, keyboard).await.map(|_| ())
    }
}

#[async_trait]
impl Presenter for TelegramPresenter {
    async fn present_progress(&self, conversation: ConversationId, message_count: usize) -> eyre::Result<Option<RawRef>> {
        debug!(%conversation, %message_count, "present_progress: called");
        let sent = self.send(conversation, format::analyzing(message_count), None).await?;
        Ok(Some(message_ref(&sent)))
    }

    async fn present_project_choice(
        &self,
        conversation: ConversationId,
        tasks: &[String],
        projects: &[String],
        status: Option<&RawRef>,
    ) -> eyre::Result<()> {
        debug!(%conversation, tasks = tasks.len(), projects = projects.len(), "present_project_choice: called");
        self.show(
            conversation,
            status,
            format::project_choice(tasks),
            Some(keyboards::project_choice(projects)),
        )
        .await
    }

    async fn present_new_project_prompt(
        &self,
        conversation: ConversationId,
        tasks: Option<&[String]>,
        status: Option<&RawRef>,
    ) -> eyre::Result<()> {
        debug!(%conversation, with_tasks = tasks.is_some(), "present_new_project_prompt: called");
        let keyboard = tasks.map(|_| keyboards::cancel_tasks_creation());
        self.show(conversation, status, format::new_project_prompt(tasks), keyboard)
            .await
    }

    async fn present_task_summary(
        &self,
        conversation: ConversationId,
        project: &str,
        tasks: &[Task],
        status: Option<&RawRef>,
    ) -> eyre::Result<()> {
        debug!(%conversation, %project, count = tasks.len(), "present_task_summary: called");
        if let Some((chat, message)) = status.and_then(parse_ref) {
            if let Err(e) = self.bot.delete_message(chat, message).await {
                debug!(%conversation, error = %e, "present_task_summary: progress message already gone");
            }
        }
        self.send(conversation, format::task_summary(project, tasks), Some(keyboards::main_menu()))
            .await
            .map(|_| ())
    }

    async fn present_task_created(&self, conversation: ConversationId, task: &Task) -> eyre::Result<()> {
        debug!(%conversation, task_id = task.id, "present_task_created: called");
        self.send(conversation, format::task_created(task), Some(keyboards::task_actions(task)))
            .await
            .map(|_| ())
    }

    async fn present_project_created(&self, conversation: ConversationId, name: &str) -> eyre::Result<()> {
        debug!(%conversation, %name, "present_project_created: called");
        self.send(conversation, format::project_created(name), Some(keyboards::main_menu()))
            .await
            .map(|_| ())
    }

    async fn present_cancelled(&self, conversation: ConversationId) -> eyre::Result<()> {
        debug!(%conversation, "present_cancelled: called");
        self.send(conversation, "❌ Task creation cancelled.".to_string(), None)
            .await
            .map(|_| ())
    }

    async fn present_error(&self, conversation: ConversationId, error: &FlowError) -> eyre::Result<()> {
        debug!(%conversation, %error, "present_error: called");
        self.send(conversation, format::flow_error(error), None).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ref() {
        let (chat, message) = parse_ref(&RawRef::new("-100123:42")).unwrap();
        assert_eq!(chat, ChatId(-100123));
        assert_eq!(message, MessageId(42));
    }

    #[test]
    fn test_parse_ref_rejects_garbage() {
        assert!(parse_ref(&RawRef::new("nonsense")).is_none());
        assert!(parse_ref(&RawRef::new("1:x")).is_none());
    }
}
