//! In-memory stand-ins for the external capabilities.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::classifier::{Classifier, TrainOutcome};
use crate::error::{PipelineError, Result};
use crate::extractor::PageFetcher;
use crate::generation::TextGenerator;
use crate::models::{ArticleRecord, Label};
use crate::search::{NewsSearch, SearchPage, SearchRequest};

enum PageBehavior {
    Articles(Vec<ArticleRecord>),
    Fail,
    ErrorStatus,
}

/// Pages keyed by (term, page); unknown pages come back empty.
#[derive(Default)]
pub struct FakeSearch {
    pages: HashMap<(String, u32), PageBehavior>,
    requests: Mutex<Vec<SearchRequest>>,
}

impl FakeSearch {
    pub fn with_page(mut self, term: &str, page: u32, articles: Vec<ArticleRecord>) -> Self {
        self.pages
            .insert((term.to_string(), page), PageBehavior::Articles(articles));
        self
    }

    pub fn with_failure(mut self, term: &str, page: u32) -> Self {
        self.pages.insert((term.to_string(), page), PageBehavior::Fail);
        self
    }

    pub fn with_error_status(mut self, term: &str, page: u32) -> Self {
        self.pages
            .insert((term.to_string(), page), PageBehavior::ErrorStatus);
        self
    }

    /// `count` distinct articles for `term` on page 1.
    pub fn with_many(self, term: &str, count: usize) -> Self {
        let articles = (0..count)
            .map(|i| ArticleRecord::new(format!("https://{}.test/{}", term, i), format!("{} {}", term, i)))
            .collect();
        self.with_page(term, 1, articles)
    }

    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl NewsSearch for FakeSearch {
    async fn search(&self, request: &SearchRequest) -> Result<SearchPage> {
        self.requests.lock().unwrap().push(request.clone());

        match self.pages.get(&(request.term.clone(), request.page)) {
            Some(PageBehavior::Articles(articles)) => Ok(SearchPage::ok(articles.clone())),
            Some(PageBehavior::Fail) => Err(PipelineError::UpstreamUnavailable(
                "connection reset".to_string(),
            )),
            Some(PageBehavior::ErrorStatus) => Ok(SearchPage {
                status: "error".to_string(),
                total_results: None,
                articles: Vec::new(),
                code: Some("rateLimited".to_string()),
                message: Some("slow down".to_string()),
            }),
            None => Ok(SearchPage::ok(Vec::new())),
        }
    }
}

/// Replies are handed out in call order; `always` repeats one reply forever.
pub struct FakeGenerator {
    script: Mutex<VecDeque<Result<String>>>,
    fallback: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn scripted(replies: Vec<Result<String>>) -> Self {
        Self {
            script: Mutex::new(replies.into()),
            fallback: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn always(reply: &str) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Some(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        if let Some(reply) = self.script.lock().unwrap().pop_front() {
            return reply;
        }
        self.fallback
            .clone()
            .ok_or_else(|| PipelineError::UpstreamUnavailable("script exhausted".to_string()))
    }
}

/// Scores by a fixed per-url probability; returns only records at or above the threshold.
#[derive(Default)]
pub struct FakeClassifier {
    scores: HashMap<String, f32>,
    fail_training: bool,
    fail_scoring: bool,
    trained_with: Mutex<Vec<usize>>,
    thresholds: Mutex<Vec<f32>>,
}

impl FakeClassifier {
    pub fn with_score(mut self, url: &str, score: f32) -> Self {
        self.scores.insert(url.to_string(), score);
        self
    }

    pub fn failing_training(mut self) -> Self {
        self.fail_training = true;
        self
    }

    pub fn failing_scoring(mut self) -> Self {
        self.fail_scoring = true;
        self
    }

    pub fn train_calls(&self) -> Vec<usize> {
        self.trained_with.lock().unwrap().clone()
    }

    pub fn thresholds(&self) -> Vec<f32> {
        self.thresholds.lock().unwrap().clone()
    }
}

#[async_trait]
impl Classifier for FakeClassifier {
    async fn train(&self, articles: &[ArticleRecord]) -> Result<TrainOutcome> {
        self.trained_with.lock().unwrap().push(articles.len());
        if self.fail_training {
            return Err(PipelineError::UpstreamUnavailable(
                "classifier returned 500".to_string(),
            ));
        }
        Ok(TrainOutcome {
            message: format!("trained on {} articles", articles.len()),
        })
    }

    async fn score(
        &self,
        articles: &[ArticleRecord],
        threshold: f32,
    ) -> Result<Vec<ArticleRecord>> {
        self.thresholds.lock().unwrap().push(threshold);
        if self.fail_scoring {
            return Err(PipelineError::UpstreamUnavailable(
                "classifier returned 503".to_string(),
            ));
        }
        Ok(articles
            .iter()
            .filter(|a| self.scores.get(&a.url).copied().unwrap_or(0.0) >= threshold)
            .cloned()
            .map(|a| a.with_label(Label::Relevant))
            .collect())
    }
}

/// Canned HTML per url; unknown urls have no content.
#[derive(Default)]
pub struct FakeFetcher {
    pages: HashMap<String, Option<String>>,
}

impl FakeFetcher {
    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), Some(html.to_string()));
        self
    }

    pub fn with_failure(mut self, url: &str) -> Self {
        self.pages.insert(url.to_string(), None);
        self
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Option<String>> {
        match self.pages.get(url) {
            Some(Some(html)) => Ok(Some(html.clone())),
            Some(None) => Err(PipelineError::UpstreamUnavailable(format!(
                "timed out fetching {}",
                url
            ))),
            None => Ok(None),
        }
    }
}
