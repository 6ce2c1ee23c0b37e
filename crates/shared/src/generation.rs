use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};

/// A language model seen as `complete(prompt) -> text`. Replies carry no
/// structural guarantee.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[derive(Serialize)]
struct ClaudeRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ClaudeResponse {
    content: Vec<Content>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub max_attempts: u32,
    pub concurrency: usize,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            model: "claude-3-5-haiku-20241022".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 4096,
            timeout: Duration::from_secs(120),
            max_attempts: 5,
            concurrency: 2,
        }
    }
}

pub struct ClaudeGenerator {
    client: Client,
    api_key: String,
    options: GeneratorOptions,
    semaphore: Arc<Semaphore>,
}

impl fmt::Debug for ClaudeGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaudeGenerator")
            .field("api_key", &"<redacted>")
            .field("options", &self.options)
            .finish()
    }
}

impl ClaudeGenerator {
    pub fn new(api_key: impl Into<String>, options: GeneratorOptions) -> Result<Self> {
        let client = Client::builder().timeout(options.timeout).build()?;

        // Low concurrency keeps us under the per-minute token limits
        let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));

        Ok(Self {
            client,
            api_key: api_key.into(),
            options,
            semaphore,
        })
    }

    async fn try_complete(&self, prompt: &str) -> Result<String> {
        let request = ClaudeRequest {
            model: &self.options.model,
            max_tokens: self.options.max_tokens,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let url = format!(
            "{}/v1/messages",
            self.options.base_url.trim_end_matches('/')
        );

        let response = self
            .client
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unknown error"));
            return Err(PipelineError::UpstreamUnavailable(format!(
                "Claude API error {}: {}",
                status, error_text
            )));
        }

        let claude_response = response.json::<ClaudeResponse>().await?;

        if claude_response.stop_reason.as_deref() == Some("max_tokens") {
            return Err(PipelineError::MalformedGenerationOutput(
                "reply was cut off at the token limit".to_string(),
            ));
        }

        let text: String = claude_response
            .content
            .iter()
            .map(|c| c.text.as_str())
            .collect();

        Ok(text.trim().to_string())
    }
}

#[async_trait]
impl TextGenerator for ClaudeGenerator {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| PipelineError::UpstreamUnavailable(e.to_string()))?;

        let attempts = self.options.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match self.try_complete(prompt).await {
                Ok(text) => {
                    debug!(chars = text.len(), "generation complete");
                    return Ok(text);
                }
                // A truncated reply would be truncated again
                Err(e @ PipelineError::MalformedGenerationOutput(_)) => return Err(e),
                Err(e) => {
                    attempt += 1;
                    if attempt >= attempts {
                        warn!(error = %e, attempts, "generation failed");
                        return Err(e);
                    }

                    let is_rate_limit = e.to_string().contains("rate_limit");

                    // Longer backoff for rate limits
                    let backoff = if is_rate_limit {
                        Duration::from_secs(15 * attempt as u64)
                    } else {
                        Duration::from_millis(1000 * 2_u64.pow(attempt - 1))
                    };

                    if is_rate_limit {
                        warn!(?backoff, "rate limit hit, waiting before retry");
                    }

                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}
