use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use scraper::{ElementRef, Html, Node};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{PipelineError, Result};
use crate::models::ArticleRecord;

/// Prose and heading tags whose text counts as article content.
const BLOCK_TAGS: &[&str] = &["p", "h1", "h2", "h3", "h4", "h5", "h6"];

/// Subtrees removed before the walk.
const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// Raw page retrieval. `Ok(None)` means the page exists but has nothing for us.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Option<String>>;
}

pub struct HttpPageFetcher {
    client: Client,
    semaphore: Arc<Semaphore>,
    max_attempts: u32,
}

impl HttpPageFetcher {
    pub fn new(timeout: Duration, concurrency: usize, max_attempts: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (compatible; PressRoom/0.1)")
            .build()?;

        Ok(Self {
            client,
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            max_attempts: max_attempts.max(1),
        })
    }

    async fn try_fetch(&self, url: &str) -> Result<Option<String>> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if status == 401 || status == 403 || status == 404 {
            return Ok(None);
        }

        if !status.is_success() {
            return Err(PipelineError::UpstreamUnavailable(format!(
                "HTTP error: {}",
                status
            )));
        }

        let html = response.text().await?;
        if html.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(html))
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<Option<String>> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| PipelineError::UpstreamUnavailable(e.to_string()))?;

        let mut attempt = 0;
        loop {
            match self.try_fetch(url).await {
                Ok(content) => return Ok(content),
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        return Err(e);
                    }
                    let backoff = Duration::from_millis(500 * 2_u64.pow(attempt - 1));
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

/// Collects the trimmed text of every paragraph and heading, drops fragments of
/// `min_fragment_chars` characters or fewer, and joins the rest with spaces.
pub fn extract_text(html: &str, min_fragment_chars: usize) -> String {
    let document = Html::parse_document(html);
    let mut fragments = Vec::new();
    collect_blocks(document.root_element(), &mut fragments);

    fragments
        .into_iter()
        .filter(|f| f.chars().count() > min_fragment_chars)
        .collect::<Vec<_>>()
        .join(" ")
}

fn collect_blocks(element: ElementRef<'_>, out: &mut Vec<String>) {
    for child in element.children() {
        let Some(child) = ElementRef::wrap(child) else {
            continue;
        };
        let name = child.value().name();

        if SKIPPED_TAGS.contains(&name) {
            continue;
        }

        if BLOCK_TAGS.contains(&name) {
            let text = inner_text(child);
            if !text.is_empty() {
                out.push(text);
            }
        } else {
            collect_blocks(child, out);
        }
    }
}

fn inner_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    push_text(element, &mut raw);
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn push_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if el.name() == "br" => out.push(' '),
            Node::Element(el) if SKIPPED_TAGS.contains(&el.name()) => {}
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    push_text(child, out);
                }
            }
            _ => {}
        }
    }
}

fn is_fetchable(url: &str) -> bool {
    Url::parse(url)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

pub struct ContentExtractor {
    fetcher: Arc<dyn PageFetcher>,
    min_fragment_chars: usize,
    concurrency: usize,
}

impl ContentExtractor {
    pub fn new(fetcher: Arc<dyn PageFetcher>, min_fragment_chars: usize, concurrency: usize) -> Self {
        Self {
            fetcher,
            min_fragment_chars,
            concurrency: concurrency.max(1),
        }
    }

    /// Body text for one article; any failure yields an empty string.
    pub async fn extract_one(&self, url: &str) -> String {
        if !is_fetchable(url) {
            warn!(url, "skipping unsupported url");
            return String::new();
        }

        match self.fetcher.fetch(url).await {
            Ok(Some(html)) => {
                let text = extract_text(&html, self.min_fragment_chars);
                debug!(url, chars = text.len(), "extracted content");
                text
            }
            Ok(None) => {
                debug!(url, "page has no accessible content");
                String::new()
            }
            Err(e) => {
                warn!(url, error = %e, "failed to fetch article");
                String::new()
            }
        }
    }

    /// Returns one record per input, in input order, each carrying `full_content`.
    pub async fn extract(&self, articles: Vec<ArticleRecord>) -> Vec<ArticleRecord> {
        let total = articles.len();

        let extracted: Vec<ArticleRecord> = stream::iter(articles)
            .map(|article| async move {
                let text = self.extract_one(&article.url).await;
                article.with_full_content(text)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let with_content = extracted
            .iter()
            .filter(|a| a.full_content_len() > 0)
            .count();
        info!(total, with_content, "content extraction complete");

        extracted
    }
}
