//! taskbot configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Main taskbot configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level used when `--log-level` is not given
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Telegram transport
    pub telegram: TelegramConfig,

    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Extraction limits and timeouts
    pub extraction: ExtractionConfig,

    /// Message batching
    pub session: SessionConfig,

    /// SQLite storage
    pub storage: StorageConfig,

    /// Task defaults
    pub tasks: TasksConfig,
}

impl Config {
    /// Validate configuration before starting the bot
    ///
    /// The LLM key is optional (extraction degrades to the local heuristic),
    /// the Telegram token is not.
    pub fn validate(&self) -> Result<()> {
        debug!(token_env = %self.telegram.token_env, "validate: called");
        if std::env::var(&self.telegram.token_env).is_err() {
            return Err(eyre::eyre!(
                "Telegram bot token not found. Set the {} environment variable.",
                self.telegram.token_env
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    ///
    /// `--config` path, then `./.taskbot.yml`, then
    /// `~/.config/taskbot/taskbot.yml`, then built-in defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let local_config = PathBuf::from(".taskbot.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("taskbot").join("taskbot.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialized
    ///
    /// Any failure yields `None`; the full load reports it later.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load(config_path).ok().and_then(|config| config.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Telegram transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Environment variable containing the bot token
    #[serde(rename = "token-env")]
    pub token_env: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token_env: "TELEGRAM_BOT_TOKEN".to_string(),
        }
    }
}

impl TelegramConfig {
    pub fn get_token(&self) -> Result<String> {
        std::env::var(&self.token_env).context(format!("{} is not set", self.token_env))
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name (only "openai" is supported)
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// HTTP client timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com".to_string(),
            timeout_ms: 15_000,
        }
    }
}

impl LlmConfig {
    /// API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env).context(format!("{} is not set", self.api_key_env))
    }

    /// Whether a key is available, which selects the remote extractor
    pub fn has_api_key(&self) -> bool {
        std::env::var(&self.api_key_env).is_ok_and(|key| !key.trim().is_empty())
    }
}

/// Extraction limits and timeouts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Time budget for one single-message extraction
    #[serde(rename = "single-timeout-ms")]
    pub single_timeout_ms: u64,

    /// Time budget for one batch extraction
    #[serde(rename = "group-timeout-ms")]
    pub group_timeout_ms: u64,

    /// Input cap in characters for single extraction
    #[serde(rename = "single-input-chars")]
    pub single_input_chars: usize,

    /// Input cap in characters for batch extraction
    #[serde(rename = "group-input-chars")]
    pub group_input_chars: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            single_timeout_ms: 10_000,
            group_timeout_ms: 15_000,
            single_input_chars: 500,
            group_input_chars: 2000,
        }
    }
}

impl ExtractionConfig {
    pub fn single_timeout(&self) -> Duration {
        Duration::from_millis(self.single_timeout_ms)
    }

    pub fn group_timeout(&self) -> Duration {
        Duration::from_millis(self.group_timeout_ms)
    }
}

/// Message batching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Quiet period before a batch is processed
    #[serde(rename = "debounce-ms")]
    pub debounce_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { debounce_ms: 5000 }
    }
}

impl SessionConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// SQLite storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file
    #[serde(rename = "db-path")]
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("taskbot")
                .join("tasks.db"),
        }
    }
}

/// Task defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TasksConfig {
    /// Project used by `/add`
    #[serde(rename = "default-project")]
    pub default_project: String,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            default_project: "General".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.session.debounce_ms, 5000);
        assert_eq!(config.extraction.single_input_chars, 500);
        assert_eq!(config.extraction.group_input_chars, 2000);
        assert_eq!(config.tasks.default_project, "General");
        assert!(config.log_level.is_none());
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
log-level: debug
telegram:
  token-env: MY_BOT_TOKEN
llm:
  model: gpt-4o
  api-key-env: MY_API_KEY
  base-url: https://llm.example.com
extraction:
  group-timeout-ms: 20000
session:
  debounce-ms: 2500
storage:
  db-path: /tmp/taskbot-test.db
tasks:
  default-project: Inbox
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.telegram.token_env, "MY_BOT_TOKEN");
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.api_key_env, "MY_API_KEY");
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.extraction.group_timeout(), Duration::from_secs(20));
        assert_eq!(config.extraction.single_timeout(), Duration::from_secs(10));
        assert_eq!(config.session.debounce(), Duration::from_millis(2500));
        assert_eq!(config.storage.db_path, PathBuf::from("/tmp/taskbot-test.db"));
        assert_eq!(config.tasks.default_project, "Inbox");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_yaml::from_str("session:\n  debounce-ms: 100\n").unwrap();
        assert_eq!(config.session.debounce_ms, 100);
        assert_eq!(config.telegram.token_env, "TELEGRAM_BOT_TOKEN");
        assert_eq!(config.extraction.group_timeout_ms, 15_000);
    }

    #[test]
    fn test_load_explicit_path() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("taskbot.yml");
        fs::write(&path, "tasks:\n  default-project: Work\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.tasks.default_project, "Work");
    }

    #[test]
    fn test_load_explicit_path_missing_is_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("missing.yml");
        assert!(Config::load(Some(&path)).is_err());
        assert!(Config::load_log_level(Some(&path)).is_none());
    }

    #[test]
    #[serial]
    fn test_validate_requires_telegram_token() {
        let mut config = Config::default();
        config.telegram.token_env = "TASKBOT_TEST_TOKEN_UNSET".to_string();
        // SAFETY: serialized test, no other thread reads this variable
        unsafe { std::env::remove_var("TASKBOT_TEST_TOKEN_UNSET") };
        assert!(config.validate().is_err());

        config.telegram.token_env = "TASKBOT_TEST_TOKEN_SET".to_string();
        unsafe { std::env::set_var("TASKBOT_TEST_TOKEN_SET", "123:abc") };
        assert!(config.validate().is_ok());
        assert_eq!(config.telegram.get_token().unwrap(), "123:abc");
        unsafe { std::env::remove_var("TASKBOT_TEST_TOKEN_SET") };
    }

    #[test]
    #[serial]
    fn test_has_api_key_ignores_blank_values() {
        let mut config = LlmConfig::default();
        config.api_key_env = "TASKBOT_TEST_LLM_KEY".to_string();
        unsafe { std::env::set_var("TASKBOT_TEST_LLM_KEY", "  ") };
        assert!(!config.has_api_key());
        unsafe { std::env::set_var("TASKBOT_TEST_LLM_KEY", "sk-test") };
        assert!(config.has_api_key());
        unsafe { std::env::remove_var("TASKBOT_TEST_LLM_KEY") };
        assert!(!config.has_api_key());
    }
}
