use anyhow::{anyhow, Context, Result};
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::models::Label;
use crate::search::SortMode;

const SETUP_HINT: &str = "To fix this, create ~/.config/press-room/.env with:\n  \
    NEWS_API_KEY=your_newsapi_key\n  \
    ANTHROPIC_API_KEY=your_anthropic_key\n  \
    CLASSIFIER_API_URL=http://localhost:8000";

#[derive(Debug, Clone)]
pub struct Config {
    news_api_key: Option<String>,
    anthropic_api_key: Option<String>,
    classifier_api_url: Option<String>,
    pub news_api_base_url: String,
    pub anthropic_base_url: String,
    pub anthropic_model: String,
    pub settings: PipelineSettings,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Try to load .env from multiple locations
        Self::try_load_dotenv();

        Ok(Self {
            news_api_key: env::var("NEWS_API_KEY").ok(),
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").ok(),
            classifier_api_url: env::var("CLASSIFIER_API_URL").ok(),
            news_api_base_url: env::var("NEWS_API_BASE_URL")
                .unwrap_or_else(|_| "https://newsapi.org/v2".to_string()),
            anthropic_base_url: env::var("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|_| "https://api.anthropic.com".to_string()),
            anthropic_model: env::var("ANTHROPIC_MODEL")
                .unwrap_or_else(|_| "claude-3-5-haiku-20241022".to_string()),
            settings: PipelineSettings::from_env()?,
        })
    }

    pub fn news_api_key(&self) -> Result<&str> {
        self.news_api_key.as_deref().ok_or_else(|| {
            anyhow!(
                "NEWS_API_KEY not found.\n\n{}\n\nGet a NewsAPI key from: https://newsapi.org/register",
                SETUP_HINT
            )
        })
    }

    pub fn anthropic_api_key(&self) -> Result<&str> {
        self.anthropic_api_key.as_deref().ok_or_else(|| {
            anyhow!(
                "ANTHROPIC_API_KEY not found.\n\n{}\n\nGet your Anthropic API key from: https://console.anthropic.com/settings/keys",
                SETUP_HINT
            )
        })
    }

    pub fn classifier_api_url(&self) -> Result<&str> {
        self.classifier_api_url
            .as_deref()
            .ok_or_else(|| anyhow!("CLASSIFIER_API_URL not found.\n\n{}", SETUP_HINT))
    }

    fn try_load_dotenv() {
        // 1. Current directory (for development)
        if dotenvy::dotenv().is_ok() {
            return;
        }

        // 2. ~/.config/press-room/.env (standard config location)
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("press-room").join(".env");
            if config_path.exists() && dotenvy::from_path(&config_path).is_ok() {
                return;
            }
        }

        // 3. ~/.env (home directory)
        if let Some(home_dir) = dirs::home_dir() {
            let home_path = home_dir.join(".env");
            if home_path.exists() {
                let _ = dotenvy::from_path(&home_path);
            }
        }
    }
}

/// How one retrieval mode queries the search capability.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalProfile {
    /// `None` means no lower bound on publication time.
    pub recency: Option<Duration>,
    pub page_limit: u32,
    pub sort: SortMode,
    pub default_label: Label,
}

impl RetrievalProfile {
    /// Bulk collection of training data; the operator unticks what is irrelevant.
    pub fn training_feed() -> Self {
        Self {
            recency: None,
            page_limit: 5,
            sort: SortMode::Relevancy,
            default_label: Label::Relevant,
        }
    }

    /// Fresh, unlabeled pool handed to the classifier for scoring.
    pub fn candidate_pool() -> Self {
        Self {
            recency: Some(Duration::from_secs(48 * 60 * 60)),
            page_limit: 4,
            sort: SortMode::Popularity,
            default_label: Label::Irrelevant,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub training_feed: RetrievalProfile,
    pub candidate_pool: RetrievalProfile,
    pub page_size: u32,
    pub language: String,
    pub volume_threshold: usize,
    pub min_fragment_chars: usize,
    pub min_content_chars: usize,
    pub default_threshold: f32,
    pub smart_threshold: f32,
    pub max_selection: usize,
    pub max_versions: usize,
    pub default_versions: usize,
    pub search_concurrency: usize,
    pub fetch_concurrency: usize,
    pub generation_concurrency: usize,
    pub http_timeout: Duration,
    pub generation_timeout: Duration,
    pub fetch_attempts: u32,
    pub generation_attempts: u32,
    pub generation_max_tokens: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            training_feed: RetrievalProfile::training_feed(),
            candidate_pool: RetrievalProfile::candidate_pool(),
            page_size: 20,
            language: "en".to_string(),
            volume_threshold: 200,
            min_fragment_chars: 30,
            min_content_chars: 300,
            default_threshold: 0.7,
            smart_threshold: 0.5,
            max_selection: 15,
            max_versions: 4,
            default_versions: 2,
            search_concurrency: 4,
            fetch_concurrency: 10,
            generation_concurrency: 2,
            http_timeout: Duration::from_secs(30),
            generation_timeout: Duration::from_secs(120),
            fetch_attempts: 3,
            generation_attempts: 5,
            generation_max_tokens: 4096,
        }
    }
}

impl PipelineSettings {
    /// Defaults overridden by any `PRESS_ROOM_*` variables that are set.
    pub fn from_env() -> Result<Self> {
        let mut settings = Self::default();

        if let Some(hours) = env_parse::<u64>("PRESS_ROOM_TRAINING_RECENCY_HOURS")? {
            settings.training_feed.recency = recency_from_hours(hours)
                .context("Invalid PRESS_ROOM_TRAINING_RECENCY_HOURS")?;
        }
        if let Some(pages) = env_parse("PRESS_ROOM_TRAINING_PAGES")? {
            settings.training_feed.page_limit = pages;
        }
        if let Some(label) = env_parse::<u8>("PRESS_ROOM_TRAINING_LABEL")? {
            settings.training_feed.default_label = Label::try_from(label)
                .map_err(|e| anyhow!(e))
                .context("Invalid PRESS_ROOM_TRAINING_LABEL")?;
        }
        if let Some(hours) = env_parse::<u64>("PRESS_ROOM_CANDIDATE_RECENCY_HOURS")? {
            settings.candidate_pool.recency = recency_from_hours(hours)
                .context("Invalid PRESS_ROOM_CANDIDATE_RECENCY_HOURS")?;
        }
        if let Some(pages) = env_parse("PRESS_ROOM_CANDIDATE_PAGES")? {
            settings.candidate_pool.page_limit = pages;
        }
        if let Some(size) = env_parse("PRESS_ROOM_PAGE_SIZE")? {
            settings.page_size = size;
        }
        if let Ok(language) = env::var("PRESS_ROOM_LANGUAGE") {
            settings.language = language;
        }
        if let Some(threshold) = env_parse("PRESS_ROOM_VOLUME_THRESHOLD")? {
            settings.volume_threshold = threshold;
        }
        if let Some(chars) = env_parse("PRESS_ROOM_MIN_FRAGMENT_CHARS")? {
            settings.min_fragment_chars = chars;
        }
        if let Some(chars) = env_parse("PRESS_ROOM_MIN_CONTENT_CHARS")? {
            settings.min_content_chars = chars;
        }
        if let Some(threshold) = env_parse("PRESS_ROOM_DEFAULT_THRESHOLD")? {
            settings.default_threshold = threshold;
        }
        if let Some(threshold) = env_parse("PRESS_ROOM_SMART_THRESHOLD")? {
            settings.smart_threshold = threshold;
        }
        if let Some(max) = env_parse("PRESS_ROOM_MAX_SELECTION")? {
            settings.max_selection = max;
        }
        if let Some(max) = env_parse("PRESS_ROOM_MAX_VERSIONS")? {
            settings.max_versions = max;
        }
        if let Some(versions) = env_parse("PRESS_ROOM_DEFAULT_VERSIONS")? {
            settings.default_versions = versions;
        }
        if let Some(n) = env_parse("PRESS_ROOM_SEARCH_CONCURRENCY")? {
            settings.search_concurrency = n;
        }
        if let Some(n) = env_parse("PRESS_ROOM_FETCH_CONCURRENCY")? {
            settings.fetch_concurrency = n;
        }
        if let Some(n) = env_parse("PRESS_ROOM_FETCH_ATTEMPTS")? {
            settings.fetch_attempts = n;
        }
        if let Some(n) = env_parse("PRESS_ROOM_GENERATION_ATTEMPTS")? {
            settings.generation_attempts = n;
        }
        if let Some(n) = env_parse("PRESS_ROOM_GENERATION_MAX_TOKENS")? {
            settings.generation_max_tokens = n;
        }
        if let Some(n) = env_parse("PRESS_ROOM_GENERATION_CONCURRENCY")? {
            settings.generation_concurrency = n;
        }
        if let Some(secs) = env_parse("PRESS_ROOM_HTTP_TIMEOUT_SECS")? {
            settings.http_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse("PRESS_ROOM_GENERATION_TIMEOUT_SECS")? {
            settings.generation_timeout = Duration::from_secs(secs);
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=4).contains(&self.max_versions) {
            anyhow::bail!("max_versions must be between 1 and 4, got {}", self.max_versions);
        }
        if !(1..=self.max_versions).contains(&self.default_versions) {
            anyhow::bail!(
                "default_versions must be between 1 and {}, got {}",
                self.max_versions,
                self.default_versions
            );
        }
        for (name, value) in [
            ("default_threshold", self.default_threshold),
            ("smart_threshold", self.smart_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("{} must be within 0.0..=1.0, got {}", name, value);
            }
        }
        let max_recency = Duration::from_secs(MAX_RECENCY_HOURS * 60 * 60);
        for (name, profile) in [
            ("training_feed", &self.training_feed),
            ("candidate_pool", &self.candidate_pool),
        ] {
            if profile.recency.is_some_and(|window| window > max_recency) {
                anyhow::bail!(
                    "{} recency window must be at most {} hours",
                    name,
                    MAX_RECENCY_HOURS
                );
            }
        }
        if self.max_selection == 0 {
            anyhow::bail!("max_selection must be at least 1");
        }
        if self.search_concurrency == 0
            || self.fetch_concurrency == 0
            || self.generation_concurrency == 0
        {
            anyhow::bail!("concurrency limits must be at least 1");
        }
        Ok(())
    }
}

/// Longest accepted recency window, ten years.
pub const MAX_RECENCY_HOURS: u64 = 10 * 365 * 24;

/// Converts an hour count into a recency window; zero disables the window.
pub fn recency_from_hours(hours: u64) -> Result<Option<Duration>> {
    if hours == 0 {
        return Ok(None);
    }
    if hours > MAX_RECENCY_HOURS {
        anyhow::bail!(
            "recency window must be at most {} hours, got {}",
            MAX_RECENCY_HOURS,
            hours
        );
    }
    let secs = hours
        .checked_mul(60 * 60)
        .ok_or_else(|| anyhow!("recency window of {} hours is too large", hours))?;
    Ok(Some(Duration::from_secs(secs)))
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow!("Invalid value for {}: {:?} ({})", key, raw, e)),
        Err(_) => Ok(None),
    }
}
