//! Model-backed task extraction
//!
//! Every call makes exactly one completion request raced against a timeout.
//! Anything short of a usable JSON payload degrades to the local heuristic
//! and is logged at warn level; callers only see the [`Via`] tag.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, warn};

use super::fallback::{self, truncate_chars};
use super::{Extraction, TaskExtractor, Via};
use crate::config::ExtractionConfig;
use crate::llm::{CompletionRequest, LlmClient, LlmError};

const SINGLE_SYSTEM_PROMPT: &str = "Analyze the text and extract a short task description. \
Reply with JSON only: {\"description\": \"short task\"}";

const GROUP_SYSTEM_PROMPT: &str = "Analyze the messages from the client and group them into separate tasks.\n\
Each task must be a logically connected unit of work with a CLEAR DESCRIPTION.\n\
Reply with a JSON array of strings holding real task descriptions only: \
[\"Update the GitHub link\", \"Replace links in the footer\", \"Add text and icons\"]\n\
Do NOT use placeholder names like \"Task 1\", \"Task 2\"; describe the concrete work.";

const SINGLE_TEMPERATURE: f32 = 0.1;
const GROUP_TEMPERATURE: f32 = 0.2;
const SINGLE_MAX_TOKENS: u32 = 100;
const GROUP_MAX_TOKENS: u32 = 300;

/// Longest single description accepted from the model
pub const SINGLE_DESCRIPTION_CHARS: usize = 100;

/// Longest grouped description accepted from the model
pub const GROUP_DESCRIPTION_CHARS: usize = 150;

static OBJECT_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\{[^}]*\}").ok());
static ARRAY_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\[[^\]]*\]").ok());

#[derive(Debug, Deserialize)]
struct SinglePayload {
    description: Option<String>,
}

/// Why a model answer was not used
#[derive(Debug)]
enum Degraded {
    Llm(LlmError),
    EmptyContent,
    NoJson,
    BadJson(serde_json::Error),
    NoDescriptions,
}

impl std::fmt::Display for Degraded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Degraded::Llm(e) => write!(f, "llm error ({}): {}", e.kind(), e),
            Degraded::EmptyContent => f.write_str("empty response"),
            Degraded::NoJson => f.write_str("no JSON payload in response"),
            Degraded::BadJson(e) => write!(f, "unparsable JSON: {}", e),
            Degraded::NoDescriptions => f.write_str("no usable descriptions"),
        }
    }
}

/// Extractor backed by an [`LlmClient`], degrading to the local heuristic
pub struct Extractor {
    llm: Arc<dyn LlmClient>,
    limits: ExtractionConfig,
}

impl Extractor {
    pub fn new(llm: Arc<dyn LlmClient>, limits: ExtractionConfig) -> Self {
        debug!(?limits, "Extractor::new: called");
        Self { llm, limits }
    }

    /// Ask the model and return the trimmed text content
    async fn ask(&self, request: CompletionRequest, budget: Duration) -> Result<String, Degraded> {
        debug!(budget_ms = budget.as_millis() as u64, "ask: called");
        let response = match tokio::time::timeout(budget, self.llm.complete(request)).await {
            Ok(result) => result.map_err(Degraded::Llm)?,
            Err(_) => return Err(Degraded::Llm(LlmError::Timeout(budget))),
        };
        let content = response.content.unwrap_or_default().trim().to_string();
        if content.is_empty() {
            return Err(Degraded::EmptyContent);
        }
        Ok(content)
    }

    async fn single_from_model(&self, text: &str) -> Result<String, Degraded> {
        let input: String = text.chars().take(self.limits.single_input_chars).collect();
        let request = CompletionRequest::simple(SINGLE_SYSTEM_PROMPT, input, SINGLE_MAX_TOKENS)
            .with_temperature(SINGLE_TEMPERATURE);
        let content = self.ask(request, self.limits.single_timeout()).await?;
        parse_single(&content)
    }

    async fn group_from_model(&self, texts: &[String]) -> Result<Vec<String>, Degraded> {
        let combined: String = render_group_input(texts)
            .chars()
            .take(self.limits.group_input_chars)
            .collect();
        let request = CompletionRequest::simple(GROUP_SYSTEM_PROMPT, combined, GROUP_MAX_TOKENS)
            .with_temperature(GROUP_TEMPERATURE);
        let content = self.ask(request, self.limits.group_timeout()).await?;
        parse_group(&content)
    }
}

#[async_trait]
impl TaskExtractor for Extractor {
    async fn extract_single(&self, text: &str) -> Extraction<String> {
        debug!(text_len = text.len(), "Extractor::extract_single: called");
        match self.single_from_model(text).await {
            Ok(description) => Extraction::new(Via::Model, description),
            Err(reason) => {
                warn!(%reason, "Model extraction degraded, using first sentence");
                Extraction::new(Via::Fallback, fallback::describe(text))
            }
        }
    }

    async fn extract_group(&self, texts: &[String]) -> Extraction<Vec<String>> {
        debug!(count = texts.len(), "Extractor::extract_group: called");
        if texts.is_empty() {
            debug!("Extractor::extract_group: nothing to extract");
            return Extraction::new(Via::Fallback, Vec::new());
        }
        match self.group_from_model(texts).await {
            Ok(descriptions) => Extraction::new(Via::Model, descriptions),
            Err(reason) => {
                warn!(%reason, count = texts.len(), "Model grouping degraded, one task per message");
                Extraction::new(Via::Fallback, fallback::describe_all(texts))
            }
        }
    }
}

/// `Message N: text` blocks separated by blank lines
pub fn render_group_input(texts: &[String]) -> String {
    texts
        .iter()
        .enumerate()
        .map(|(idx, text)| format!("Message {}: {}", idx + 1, text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn parse_single(content: &str) -> Result<String, Degraded> {
    let pattern = OBJECT_PATTERN.as_ref().ok_or(Degraded::NoJson)?;
    let found = pattern.find(content).ok_or(Degraded::NoJson)?;
    let payload: SinglePayload = serde_json::from_str(found.as_str()).map_err(Degraded::BadJson)?;
    let description = payload.description.unwrap_or_default();
    let description = description.trim();
    if description.is_empty() {
        return Err(Degraded::NoDescriptions);
    }
    Ok(truncate_chars(description, SINGLE_DESCRIPTION_CHARS))
}

fn parse_group(content: &str) -> Result<Vec<String>, Degraded> {
    let pattern = ARRAY_PATTERN.as_ref().ok_or(Degraded::NoJson)?;
    let found = pattern.find(content).ok_or(Degraded::NoJson)?;
    let items: Vec<serde_json::Value> = serde_json::from_str(found.as_str()).map_err(Degraded::BadJson)?;
    let descriptions: Vec<String> = items
        .iter()
        .filter_map(|item| item.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| truncate_chars(s, GROUP_DESCRIPTION_CHARS))
        .collect();
    if descriptions.is_empty() {
        return Err(Degraded::NoDescriptions);
    }
    Ok(descriptions)
}
