//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// Task Bot - turns chat messages into tracked tasks
#[derive(Parser)]
#[command(
    name = "tb",
    about = "Telegram bot that turns chat messages into tracked tasks",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the Telegram bot (default)
    Run,

    /// Extract task descriptions from text without storing anything
    Extract {
        /// Message texts; several are treated as one batch
        #[arg(required = true, value_name = "TEXT")]
        texts: Vec<String>,

        /// Treat a single text as an ad hoc task instead of a batch
        #[arg(short, long)]
        single: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// List stored tasks
    Tasks {
        /// Telegram user id owning the tasks
        #[arg(short, long)]
        user: u64,

        /// Filter by status (not_started, in_progress, done)
        #[arg(short, long)]
        status: Option<String>,

        /// Filter by project
        #[arg(short, long)]
        project: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// List projects with task counts
    Projects {
        /// Telegram user id owning the projects
        #[arg(short, long)]
        user: u64,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskbot")
        .join("logs")
        .join("taskbot.log");
    debug!(?path, "get_log_path: returning path");
    path
}

fn env_status(name: &str) -> String {
    let set = std::env::var(name).is_ok_and(|v| !v.trim().is_empty());
    let icon = if set { "\u{2705}" } else { "\u{274C}" };
    let state = if set { "set" } else { "not set" };
    format!("  {} {:<20} {}\n", icon, name, state)
}

/// Generate the after_help text with credential status and the log location
pub fn generate_after_help() -> String {
    debug!("generate_after_help: called");
    let mut help = String::new();

    help.push_str("Environment:\n");
    help.push_str(&env_status("TELEGRAM_BOT_TOKEN"));
    help.push_str(&env_status("OPENAI_API_KEY"));
    help.push_str("  Without an API key tasks are extracted with the first-sentence heuristic.\n");

    help.push('\n');
    help.push_str(&format!("Bot logs are written to: {}\n", get_log_path().display()));
    help
}

/// Output format for listing commands
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_command() {
        let cli = Cli::parse_from(["tb"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_parse_run() {
        let cli = Cli::parse_from(["tb", "run"]);
        assert!(matches!(cli.command, Some(Command::Run)));
    }

    #[test]
    fn test_cli_parse_extract_batch() {
        let cli = Cli::parse_from(["tb", "extract", "Fix the logo", "Update footer"]);
        match cli.command {
            Some(Command::Extract { texts, single, format }) => {
                assert_eq!(texts, vec!["Fix the logo", "Update footer"]);
                assert!(!single);
                assert_eq!(format, OutputFormat::Text);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_extract_requires_text() {
        assert!(Cli::try_parse_from(["tb", "extract"]).is_err());
    }

    #[test]
    fn test_cli_parse_tasks_filters() {
        let cli = Cli::parse_from(["tb", "tasks", "--user", "7", "--status", "done", "--project", "Web"]);
        match cli.command {
            Some(Command::Tasks {
                user, status, project, ..
            }) => {
                assert_eq!(user, 7);
                assert_eq!(status.as_deref(), Some("done"));
                assert_eq!(project.as_deref(), Some("Web"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_global_options() {
        let cli = Cli::parse_from(["tb", "projects", "-u", "7", "--log-level", "debug", "-c", "/tmp/tb.yml"]);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/tb.yml")));
        assert!(matches!(cli.command, Some(Command::Projects { user: 7, .. })));
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("plain".parse::<OutputFormat>(), Ok(OutputFormat::Text));
        assert!("table".parse::<OutputFormat>().is_err());
    }
}
