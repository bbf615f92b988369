//! Task Bot - turns chat messages into tracked tasks
//!
//! CLI entry point: runs the Telegram bot or inspects extraction and storage.

use std::fs;

use clap::{CommandFactory, FromArgMatches};
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info};

use taskbot::cli::{Cli, Command, OutputFormat, generate_after_help, get_log_path};
use taskbot::config::Config;
use taskbot::extract::{TaskExtractor, Via, create_extractor};
use taskbot::flow::TaskGateway;
use taskbot::state::StateManager;
use taskbot::telegram;
use taskstore::{TaskFilter, TaskStatus};

/// Map a level name to a tracing level; unknown names fall back to INFO
fn parse_level(level: Option<&str>) -> tracing::Level {
    match level.map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") | None => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    }
}

/// Initialize tracing: the bot logs to a file, one-shot commands to stderr
fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>, to_file: bool) -> Result<()> {
    // Priority: CLI --log-level > config file > default (INFO)
    let level = parse_level(cli_log_level.or(config_log_level));
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    if to_file {
        let log_path = get_log_path();
        if let Some(log_dir) = log_path.parent() {
            fs::create_dir_all(log_dir).context("Failed to create log directory")?;
        }
        let log_file = fs::File::create(&log_path).context("Failed to create log file")?;
        tracing_subscriber::fmt()
            .with_writer(log_file)
            .with_ansi(false)
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    }

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cmd = Cli::command().after_help(generate_after_help());
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    let runs_bot = matches!(cli.command, None | Some(Command::Run));
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref(), runs_bot)
        .context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(db_path = %config.storage.db_path.display(), model = %config.llm.model, "Task Bot loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        None | Some(Command::Run) => {
            debug!("main: matched Run command");
            cmd_run(&config).await
        }
        Some(Command::Extract { texts, single, format }) => {
            debug!(count = texts.len(), single, %format, "main: matched Extract command");
            cmd_extract(&config, &texts, single, format).await
        }
        Some(Command::Tasks {
            user,
            status,
            project,
            format,
        }) => {
            debug!(%user, ?status, ?project, %format, "main: matched Tasks command");
            cmd_tasks(&config, user, status.as_deref(), project, format).await
        }
        Some(Command::Projects { user, format }) => {
            debug!(%user, %format, "main: matched Projects command");
            cmd_projects(&config, user, format).await
        }
    }
}

/// Run the Telegram bot
async fn cmd_run(config: &Config) -> Result<()> {
    debug!("cmd_run: called");
    config.validate()?;
    println!("Task Bot running, logs at {}", get_log_path().display());
    telegram::run(config).await
}

/// Extract descriptions and print which path produced them
async fn cmd_extract(config: &Config, texts: &[String], single: bool, format: OutputFormat) -> Result<()> {
    debug!(count = texts.len(), single, "cmd_extract: called");
    let extractor = create_extractor(config);

    let (via, descriptions) = if single {
        let extraction = extractor.extract_single(&texts.join(" ")).await;
        (extraction.via, vec![extraction.value])
    } else {
        let extraction = extractor.extract_group(texts).await;
        (extraction.via, extraction.value)
    };

    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({ "via": via, "tasks": descriptions });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            let via = match via {
                Via::Model => via.to_string().green(),
                Via::Fallback => via.to_string().yellow(),
            };
            println!("via: {}", via);
            for (i, description) in descriptions.iter().enumerate() {
                if description.is_empty() {
                    println!("{}. {}", i + 1, "(empty)".dimmed());
                } else {
                    println!("{}. {}", i + 1, description);
                }
            }
        }
    }
    Ok(())
}

fn open_state(config: &Config) -> Result<StateManager> {
    StateManager::spawn(&config.storage.db_path)
        .with_context(|| format!("Failed to open task database at {}", config.storage.db_path.display()))
}

/// Print stored tasks for a user
async fn cmd_tasks(
    config: &Config,
    user: u64,
    status: Option<&str>,
    project: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    debug!(%user, ?status, ?project, "cmd_tasks: called");
    let mut filter = TaskFilter::for_user(user);
    if let Some(status) = status {
        filter = filter.with_status(status.parse::<TaskStatus>()?);
    }
    if let Some(project) = project {
        filter = filter.with_project(project);
    }

    let state = open_state(config)?;
    let tasks = state.list_tasks_filtered(filter).await?;
    state.shutdown().await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&tasks)?),
        OutputFormat::Text => {
            if tasks.is_empty() {
                println!("No tasks found");
            }
            for task in &tasks {
                let status = match task.status {
                    TaskStatus::NotStarted => task.status.as_str().normal(),
                    TaskStatus::InProgress => task.status.as_str().yellow(),
                    TaskStatus::Done => task.status.as_str().green(),
                };
                println!(
                    "#{:<5} {:<12} {} {}",
                    task.id,
                    status,
                    task.description,
                    format!("({})", task.project).dimmed()
                );
            }
        }
    }
    Ok(())
}

/// Print projects with per-status counts
async fn cmd_projects(config: &Config, user: u64, format: OutputFormat) -> Result<()> {
    debug!(%user, "cmd_projects: called");
    let state = open_state(config)?;
    let mut rows = Vec::new();
    for name in state.list_projects(user).await? {
        let stats = state.project_stats(&name, user).await?;
        rows.push((name, stats));
    }
    state.shutdown().await?;

    match format {
        OutputFormat::Json => {
            let out: Vec<serde_json::Value> = rows
                .iter()
                .map(|(name, stats)| serde_json::json!({ "name": name, "stats": stats }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            if rows.is_empty() {
                println!("No projects found");
            }
            for (name, stats) in &rows {
                println!(
                    "{:<24} total {:>3}  not started {:>3}  in progress {:>3}  done {:>3}",
                    name.bold(),
                    stats.total,
                    stats.not_started,
                    stats.in_progress,
                    stats.done
                );
            }
        }
    }
    Ok(())
}
