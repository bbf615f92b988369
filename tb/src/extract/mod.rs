//! Task extraction: raw chat text in, task descriptions out
//!
//! Two interchangeable strategies share the [`TaskExtractor`] contract:
//! [`Extractor`] asks a language model and degrades to the heuristic on any
//! failure, [`FallbackExtractor`] only runs the heuristic. Both are total.
//! Results carry a [`Via`] tag naming the path that produced them.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

pub mod fallback;
mod remote;

pub use fallback::FallbackExtractor;
pub use remote::{Extractor, GROUP_DESCRIPTION_CHARS, SINGLE_DESCRIPTION_CHARS, render_group_input};

use crate::config::Config;
use crate::llm;

/// Which path produced an extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Via {
    Model,
    Fallback,
}

impl fmt::Display for Via {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Via::Model => f.write_str("model"),
            Via::Fallback => f.write_str("fallback"),
        }
    }
}

/// Extraction result tagged with the path that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Extraction<T> {
    pub via: Via,
    pub value: T,
}

impl<T> Extraction<T> {
    pub fn new(via: Via, value: T) -> Self {
        Self { via, value }
    }
}

/// Turns chat text into task descriptions; never fails
#[async_trait]
pub trait TaskExtractor: Send + Sync {
    /// One description for one ad hoc message
    async fn extract_single(&self, text: &str) -> Extraction<String>;

    /// Descriptions for a batch of messages, in arrival order
    ///
    /// The model may merge or split messages; the heuristic returns exactly
    /// one description per input.
    async fn extract_group(&self, texts: &[String]) -> Extraction<Vec<String>>;
}

/// Pick the extraction strategy at startup
///
/// The model-backed extractor is used when the configured API key variable
/// is set and the client builds; otherwise the heuristic runs alone.
pub fn create_extractor(config: &Config) -> Arc<dyn TaskExtractor> {
    debug!(api_key_env = %config.llm.api_key_env, "create_extractor: called");
    if !config.llm.has_api_key() {
        info!(
            "{} not set, extracting tasks with the first-sentence heuristic",
            config.llm.api_key_env
        );
        return Arc::new(FallbackExtractor);
    }

    match llm::create_client(&config.llm) {
        Ok(client) => {
            info!(model = %config.llm.model, "Extracting tasks with the language model");
            Arc::new(Extractor::new(client, config.extraction.clone()))
        }
        Err(e) => {
            warn!(error = %e, "Failed to create LLM client, extracting tasks with the heuristic");
            Arc::new(FallbackExtractor)
        }
    }
}
