//! Task Bot - chat messages in, tracked tasks out
//!
//! A Telegram bot that collects bursts of messages, extracts task
//! descriptions from them (language model with a heuristic fallback), asks
//! which project they belong to and stores them in SQLite.
//!
//! # Modules
//!
//! - [`session`] - Per-conversation batches, state and debounce timers
//! - [`extract`] - Task extraction with model and heuristic paths
//! - [`llm`] - Chat-completion client used by extraction
//! - [`flow`] - Batch to tasks to project assignment
//! - [`state`] - Storage actor over the task database
//! - [`telegram`] - Bot front end
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod extract;
pub mod flow;
pub mod llm;
pub mod session;
pub mod state;
pub mod telegram;

pub use config::Config;
pub use extract::{Extraction, TaskExtractor, Via};
pub use flow::{AssignmentFlow, FlowError, FlowOutcome, InboundText, Presenter, TaskGateway};
pub use session::SessionManager;
pub use state::StateManager;
