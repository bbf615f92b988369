//! Deterministic task extraction used when no model is available
//!
//! The description of a message is its first sentence: leading terminators
//! and whitespace are skipped, then everything up to the next `.`, `!` or `?`
//! is kept. Output is always cut to [`MAX_DESCRIPTION_CHARS`].

use async_trait::async_trait;
use tracing::debug;

use super::{Extraction, TaskExtractor, Via};

/// Longest description the heuristic produces, ellipsis included
pub const MAX_DESCRIPTION_CHARS: usize = 100;

const ELLIPSIS: &str = "...";

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// First sentence of `text`, trimmed; empty for punctuation-only input
pub fn first_sentence(text: &str) -> &str {
    let start = text.trim_start_matches(|c: char| is_terminator(c) || c.is_whitespace());
    let end = start.find(is_terminator).unwrap_or(start.len());
    start[..end].trim()
}

/// Cut `text` to at most `max_chars` characters, marking the cut with `...`
///
/// Counts characters, not bytes, so multi-byte scripts are never split.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

/// Description for one message
pub fn describe(text: &str) -> String {
    truncate_chars(first_sentence(text), MAX_DESCRIPTION_CHARS)
}

/// One description per message, in order
pub fn describe_all(texts: &[String]) -> Vec<String> {
    debug!(count = texts.len(), "describe_all: called");
    texts.iter().map(|text| describe(text)).collect()
}

/// Extractor that never calls out; used when no API key is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackExtractor;

#[async_trait]
impl TaskExtractor for FallbackExtractor {
    async fn extract_single(&self, text: &str) -> Extraction<String> {
        debug!(text_len = text.len(), "FallbackExtractor::extract_single: called");
        Extraction::new(Via::Fallback, describe(text))
    }

    async fn extract_group(&self, texts: &[String]) -> Extraction<Vec<String>> {
        debug!(count = texts.len(), "FallbackExtractor::extract_group: called");
        Extraction::new(Via::Fallback, describe_all(texts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_first_sentence() {
        assert_eq!(first_sentence("Fix the header logo"), "Fix the header logo");
        assert_eq!(first_sentence("Fix the logo. Then deploy!"), "Fix the logo");
        assert_eq!(first_sentence("  Why is it red? No idea"), "Why is it red");
        assert_eq!(first_sentence("...Ship it. Now"), "Ship it");
        assert_eq!(first_sentence("..."), "");
        assert_eq!(first_sentence("!?! "), "");
        assert_eq!(first_sentence(""), "");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 100), "short");

        let long = "a".repeat(150);
        let cut = truncate_chars(&long, 100);
        assert_eq!(cut.chars().count(), 100);
        assert!(cut.ends_with("..."));
        assert_eq!(&cut[..97], &long[..97]);

        let exact = "b".repeat(100);
        assert_eq!(truncate_chars(&exact, 100), exact);
    }

    #[test]
    fn test_truncate_is_utf8_safe() {
        let cyrillic = "Обновить ссылку на GitHub ".repeat(10);
        let cut = truncate_chars(&cyrillic, 100);
        assert_eq!(cut.chars().count(), 100);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn test_describe_all_burst() {
        let texts = vec!["Fix the header logo".to_string(), "Also update the footer link".to_string()];
        assert_eq!(describe_all(&texts), vec!["Fix the header logo", "Also update the footer link"]);
    }

    #[tokio::test]
    async fn test_fallback_extractor_tags_result() {
        let extractor = FallbackExtractor;
        let single = extractor.extract_single("Deploy on Friday. Please").await;
        assert_eq!(single.via, Via::Fallback);
        assert_eq!(single.value, "Deploy on Friday");

        let group = extractor.extract_group(&["...".to_string()]).await;
        assert_eq!(group.via, Via::Fallback);
        assert_eq!(group.value, vec![String::new()]);

        let empty = extractor.extract_group(&[]).await;
        assert!(empty.value.is_empty());
    }

    proptest! {
        #[test]
        fn prop_describe_all_preserves_cardinality(texts in proptest::collection::vec(".*", 0..20)) {
            let out = describe_all(&texts);
            prop_assert_eq!(out.len(), texts.len());
        }

        #[test]
        fn prop_description_never_exceeds_limit(text in "\\PC{0,400}") {
            let out = describe(&text);
            prop_assert!(out.chars().count() <= MAX_DESCRIPTION_CHARS);
        }

        #[test]
        fn prop_description_has_no_terminators(text in "[a-zа-я .!?]{0,200}") {
            let out = describe(&text);
            let body = out.strip_suffix("...").unwrap_or(&out);
            prop_assert!(!body.contains(['.', '!', '?']));
        }
    }
}
