//! Telegram front end
//!
//! Long polling via teloxide. Free text goes to the assignment flow,
//! commands and buttons are answered here against the task store.

use std::sync::Arc;

use eyre::Context;
use teloxide::Bot;
use teloxide::prelude::Requester;
use tracing::{debug, info};

pub mod callbacks;
mod format;
mod handlers;
mod keyboards;
mod presenter;

pub use callbacks::CallbackAction;
pub use handlers::{App, Command};
pub use presenter::TelegramPresenter;

use crate::config::Config;
use crate::extract::create_extractor;
use crate::flow::{AssignmentFlow, spawn_dispatcher};
use crate::session::SessionManager;
use crate::state::StateManager;

/// Run the bot until Ctrl-C
pub async fn run(config: &Config) -> eyre::Result<()> {
    debug!(db_path = %config.storage.db_path.display(), "run: called");
    let token = config.telegram.get_token()?;
    let bot = Bot::new(token);
    let me = bot.get_me().await.context("Failed to fetch bot identity")?;
    let bot_name = me.username().to_string();

    let state = StateManager::spawn(&config.storage.db_path).context("Failed to open task database")?;
    let (session, ready) = SessionManager::spawn(config.session.debounce());
    let flow = Arc::new(AssignmentFlow::new(
        session.clone(),
        create_extractor(config),
        Arc::new(state.clone()),
        Arc::new(TelegramPresenter::new(bot.clone())),
        config.tasks.default_project.clone(),
    )
    .with_max_project_name_bytes(callbacks::MAX_PROJECT_NAME_BYTES));
    let dispatcher = spawn_dispatcher(flow.clone(), ready);

    info!(%bot_name, debounce_ms = config.session.debounce_ms, "Bot started");
    handlers::dispatch(bot, App { flow, bot_name }).await;

    info!("Shutting down");
    session.shutdown().await?;
    state.shutdown().await?;
    dispatcher.await.context("Batch dispatcher panicked")?;
    Ok(())
}
