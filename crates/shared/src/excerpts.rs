use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::generation::TextGenerator;
use crate::models::ArticleRecord;

pub const DEFAULT_EXTRACTION_INSTRUCTION: &str = "You are a news outlet that has to select and \
filter information based on these topics: \"Effects of Technology on Children\", \"Effects of \
Usage of Technology in People\". The texts selected should be relevant for an outlet that wants \
to promote the aware usage of technology and protect the people and most of all the children \
from misuse. Present only information that can be interesting for conscious parents that want \
to educate their children in the best way possible and want to get informed about the risks and \
opportunities of technology.";

/// Ordered excerpts awaiting inclusion in a draft. Duplicates are allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExcerptList {
    items: Vec<String>,
}

impl ExcerptList {
    pub fn new(items: Vec<String>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn remove(&mut self, index: usize) -> Result<String> {
        self.check(index)?;
        Ok(self.items.remove(index))
    }

    /// Swaps an item with its neighbour. Moving past either end is a no-op.
    pub fn move_item(&mut self, index: usize, up: bool) -> Result<()> {
        self.check(index)?;
        let target = if up {
            index.checked_sub(1)
        } else {
            Some(index + 1).filter(|&t| t < self.items.len())
        };
        if let Some(target) = target {
            self.items.swap(index, target);
        }
        Ok(())
    }

    /// Drag-and-drop: takes the item at `from` and reinserts it at `to`.
    pub fn move_to(&mut self, from: usize, to: usize) -> Result<()> {
        self.check(from)?;
        self.check(to)?;
        let item = self.items.remove(from);
        self.items.insert(to, item);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    fn check(&self, index: usize) -> Result<()> {
        if index < self.items.len() {
            Ok(())
        } else {
            Err(PipelineError::IndexOutOfRange {
                index,
                len: self.items.len(),
            })
        }
    }
}

/// Strips a leading ```` ``` ```` / ```` ```json ```` fence line and the closing fence.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // drop the info string ("json", "JSON", ...) up to the end of the line
    let body = match rest.find('\n') {
        Some(newline) if rest[..newline].trim().chars().all(|c| c.is_ascii_alphanumeric()) => {
            &rest[newline + 1..]
        }
        Some(_) => rest,
        None => rest
            .trim_start_matches(|c: char| c.is_ascii_alphabetic())
            .trim_start(),
    };

    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parses a reply that must be a JSON array of strings. Anything else is
/// rejected as a whole; nothing is partially consumed.
pub fn try_decode_string_array(text: &str) -> Result<Vec<String>> {
    let body = strip_code_fence(text);
    let items: Vec<String> = serde_json::from_str(body)
        .map_err(|e| PipelineError::MalformedGenerationOutput(e.to_string()))?;

    Ok(items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

/// Like [`try_decode_string_array`] but falls back to an empty list.
pub fn decode_excerpts(text: &str) -> Vec<String> {
    match try_decode_string_array(text) {
        Ok(items) => items,
        Err(e) => {
            warn!(error = %e, "discarding malformed extraction reply");
            Vec::new()
        }
    }
}

pub fn build_extraction_prompt(instruction: &str, content: &str) -> String {
    format!(
        "You are a helpful assistant.\n{}\n. Avoid texts that may promote specific products \
with a specific brand.\n Extract interesting quotes, facts, novel ideas, and statistics from the \
given article content and return them as a strictly valid JSON array of strings. \nMake sure \
every item always explain a specific word that is being used or explains from which survey or \
source, this information comes from so every list item can stand on its own.\n Return no other \
text.\n\nArticle content:\n{}",
        instruction.trim(),
        content
    )
}

pub struct ExcerptSynthesizer {
    generator: Arc<dyn TextGenerator>,
    min_content_chars: usize,
    concurrency: usize,
}

impl ExcerptSynthesizer {
    pub fn new(generator: Arc<dyn TextGenerator>, min_content_chars: usize, concurrency: usize) -> Self {
        Self {
            generator,
            min_content_chars,
            concurrency: concurrency.max(1),
        }
    }

    pub fn qualifies(&self, article: &ArticleRecord) -> bool {
        article.full_content_len() >= self.min_content_chars
    }

    /// Flat list of excerpts in article order. Short articles, failed calls and
    /// malformed replies contribute nothing.
    pub async fn synthesize(&self, articles: &[ArticleRecord], instruction: &str) -> Vec<String> {
        let qualifying: Vec<&ArticleRecord> = articles.iter().filter(|a| self.qualifies(a)).collect();
        let skipped = articles.len() - qualifying.len();
        if skipped > 0 {
            debug!(skipped, min_chars = self.min_content_chars, "skipping articles with too little content");
        }

        let per_article: Vec<Vec<String>> = stream::iter(qualifying)
            .map(|article| async move {
                let content = article.full_content.as_deref().unwrap_or_default();
                let prompt = build_extraction_prompt(instruction, content);
                match self.generator.complete(&prompt).await {
                    Ok(reply) => decode_excerpts(&reply),
                    Err(e) => {
                        warn!(url = %article.url, error = %e, "excerpt extraction failed");
                        Vec::new()
                    }
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let contributing = per_article.iter().filter(|v| !v.is_empty()).count();
        let excerpts: Vec<String> = per_article.into_iter().flatten().collect();

        info!(
            articles = articles.len(),
            contributing,
            excerpts = excerpts.len(),
            "excerpt synthesis complete"
        );

        excerpts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeGenerator;

    fn article_with_content(url: &str, chars: usize) -> ArticleRecord {
        ArticleRecord::new(url, url).with_full_content("x".repeat(chars))
    }

    #[test]
    fn fenced_and_bare_arrays_decode_identically() {
        let bare = r#"["Fact one from the Pew survey", "Fact two"]"#;
        let fenced = format!("```json\n{}\n```", bare);
        let fenced_upper = format!("```JSON\n{}\n```\n", bare);
        let fenced_plain = format!("```\n{}\n```", bare);

        let expected = try_decode_string_array(bare).unwrap();
        assert_eq!(expected.len(), 2);
        assert_eq!(try_decode_string_array(&fenced).unwrap(), expected);
        assert_eq!(try_decode_string_array(&fenced_upper).unwrap(), expected);
        assert_eq!(try_decode_string_array(&fenced_plain).unwrap(), expected);
    }

    #[test]
    fn single_line_fence_is_stripped() {
        assert_eq!(strip_code_fence("```json [\"a\"]```"), "[\"a\"]");
    }

    #[test]
    fn non_array_replies_decode_to_empty() {
        assert!(decode_excerpts("Here are the facts you asked for: 1. ...").is_empty());
        assert!(decode_excerpts(r#"{"facts": ["a"]}"#).is_empty());
        assert!(decode_excerpts("").is_empty());
        // truncated array
        assert!(decode_excerpts(r#"["complete item", "cut off mid-sen"#).is_empty());
    }

    #[test]
    fn mixed_type_array_is_rejected_whole() {
        let result = try_decode_string_array(r#"["a valid fact", 42, "another fact"]"#);
        assert!(matches!(
            result,
            Err(PipelineError::MalformedGenerationOutput(_))
        ));
    }

    #[test]
    fn blank_items_are_dropped() {
        let items = try_decode_string_array(r#"["  first  ", "", "   "]"#).unwrap();
        assert_eq!(items, vec!["first"]);
    }

    #[test]
    fn prompt_embeds_instruction_and_content() {
        let prompt = build_extraction_prompt("Focus on parenting.", "BODY TEXT");
        assert!(prompt.contains("Focus on parenting."));
        assert!(prompt.contains("strictly valid JSON array of strings"));
        assert!(prompt.ends_with("Article content:\nBODY TEXT"));
    }

    #[test]
    fn excerpt_list_reorders_and_removes() {
        let mut list = ExcerptList::new(vec!["a".into(), "b".into(), "c".into()]);

        list.move_item(0, false).unwrap();
        assert_eq!(list.items(), ["b", "a", "c"]);

        // moving the first item up changes nothing
        list.move_item(0, true).unwrap();
        assert_eq!(list.items(), ["b", "a", "c"]);

        list.move_to(2, 0).unwrap();
        assert_eq!(list.items(), ["c", "b", "a"]);

        assert_eq!(list.remove(1).unwrap(), "b");
        assert_eq!(list.items(), ["c", "a"]);

        assert!(matches!(
            list.remove(5),
            Err(PipelineError::IndexOutOfRange { index: 5, len: 2 })
        ));
    }

    #[tokio::test]
    async fn short_content_yields_no_excerpts_and_no_call() {
        let generator = Arc::new(FakeGenerator::always(r#"["should not appear"]"#));
        let synthesizer = ExcerptSynthesizer::new(generator.clone(), 300, 2);

        let excerpts = synthesizer
            .synthesize(&[article_with_content("https://a.test/short", 299)], "instr")
            .await;

        assert!(excerpts.is_empty());
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn only_articles_with_enough_content_contribute() {
        let generator = Arc::new(FakeGenerator::scripted(vec![
            Ok(r#"["first article fact A", "first article fact B"]"#.to_string()),
            Ok("```json\n[\"third article fact\"]\n```".to_string()),
        ]));
        let synthesizer = ExcerptSynthesizer::new(generator.clone(), 300, 1);
        let articles = vec![
            article_with_content("https://a.test/1", 800),
            article_with_content("https://a.test/2", 250),
            article_with_content("https://a.test/3", 300),
        ];

        let excerpts = synthesizer.synthesize(&articles, "instr").await;

        assert_eq!(
            excerpts,
            vec!["first article fact A", "first article fact B", "third article fact"]
        );
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn malformed_or_failed_replies_drop_only_that_article() {
        let generator = Arc::new(FakeGenerator::scripted(vec![
            Ok("Sorry, I cannot help with that.".to_string()),
            Err(PipelineError::UpstreamUnavailable("boom".to_string())),
            Ok(r#"["survivor fact", "another fact"]"#.to_string()),
        ]));
        let synthesizer = ExcerptSynthesizer::new(generator, 300, 1);
        let articles = vec![
            article_with_content("https://a.test/1", 400),
            article_with_content("https://a.test/2", 400),
            article_with_content("https://a.test/3", 400),
        ];

        let excerpts = synthesizer.synthesize(&articles, "instr").await;
        assert_eq!(excerpts, vec!["survivor fact", "another fact"]);
    }

    #[tokio::test]
    async fn duplicates_across_articles_are_kept() {
        let generator = Arc::new(FakeGenerator::always(r#"["same fact"]"#));
        let synthesizer = ExcerptSynthesizer::new(generator, 10, 2);
        let articles = vec![
            article_with_content("https://a.test/1", 20),
            article_with_content("https://a.test/2", 20),
        ];

        let excerpts = synthesizer.synthesize(&articles, "instr").await;
        assert_eq!(excerpts, vec!["same fact", "same fact"]);
    }
}
