use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{PipelineError, Result};
use crate::models::ArticleRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMode {
    Relevancy,
    Popularity,
    PublishedAt,
}

impl SortMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::Relevancy => "relevancy",
            SortMode::Popularity => "popularity",
            SortMode::PublishedAt => "publishedAt",
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "relevancy" => Ok(SortMode::Relevancy),
            "popularity" => Ok(SortMode::Popularity),
            "publishedat" => Ok(SortMode::PublishedAt),
            other => Err(format!("unknown sort mode: {}", other)),
        }
    }
}

/// One page query for one search term.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub term: String,
    pub page: u32,
    pub from: Option<DateTime<Utc>>,
    pub sort: SortMode,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub status: String,
    #[serde(default)]
    pub total_results: Option<u64>,
    #[serde(default)]
    pub articles: Vec<ArticleRecord>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl SearchPage {
    pub fn ok(articles: Vec<ArticleRecord>) -> Self {
        Self {
            status: "ok".to_string(),
            total_results: Some(articles.len() as u64),
            articles,
            code: None,
            message: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[async_trait]
pub trait NewsSearch: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<SearchPage>;
}

pub struct NewsApiClient {
    client: Client,
    api_key: String,
    base_url: String,
    page_size: u32,
    language: String,
}

impl fmt::Debug for NewsApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewsApiClient")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("page_size", &self.page_size)
            .field("language", &self.language)
            .finish()
    }
}

impl NewsApiClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            page_size: 20,
            language: "en".to_string(),
        })
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    fn everything_url(&self, request: &SearchRequest) -> String {
        let mut url = format!(
            "{}/everything?q={}&sortBy={}&page={}&pageSize={}&language={}",
            self.base_url,
            urlencoding::encode(&request.term),
            request.sort,
            request.page,
            self.page_size,
            urlencoding::encode(&self.language)
        );
        if let Some(from) = request.from {
            let from = from.to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
            url.push_str(&format!("&from={}", urlencoding::encode(&from)));
        }
        url
    }
}

#[async_trait]
impl NewsSearch for NewsApiClient {
    async fn search(&self, request: &SearchRequest) -> Result<SearchPage> {
        let response = self
            .client
            .get(self.everything_url(request))
            .header("X-Api-Key", &self.api_key)
            .header("User-Agent", "press-room/0.1")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        // NewsAPI reports failures as {"status":"error","code":..,"message":..}
        match serde_json::from_str::<SearchPage>(&body) {
            Ok(page) if page.is_ok() && status.is_success() => Ok(page),
            Ok(page) => Err(PipelineError::UpstreamUnavailable(format!(
                "NewsAPI returned {} ({}): {}",
                status,
                page.code.as_deref().unwrap_or("unknown"),
                page.message.as_deref().unwrap_or("no message")
            ))),
            Err(_) if !status.is_success() => Err(PipelineError::UpstreamUnavailable(format!(
                "NewsAPI returned {}",
                status
            ))),
            Err(e) => Err(PipelineError::Serialization(e)),
        }
    }
}
