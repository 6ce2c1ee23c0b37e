use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{PipelineError, Result};
use crate::models::{ArticleRecord, Label};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrainOutcome {
    #[serde(default)]
    pub message: String,
}

/// Remote relevance model: learns from labeled articles, then labels new ones.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn train(&self, articles: &[ArticleRecord]) -> Result<TrainOutcome>;

    /// Returns records carrying updated labels; the set may be a subset of the input.
    async fn score(&self, articles: &[ArticleRecord], threshold: f32)
        -> Result<Vec<ArticleRecord>>;
}

/// Copies the classifier's labels onto `pool` by url. Records the classifier
/// did not return are marked irrelevant.
pub fn apply_scores(pool: &[ArticleRecord], scored: Vec<ArticleRecord>) -> Vec<ArticleRecord> {
    let labels: HashMap<String, Label> = scored.into_iter().map(|a| (a.url, a.label)).collect();

    pool.iter()
        .cloned()
        .map(|article| {
            let label = labels.get(&article.url).copied().unwrap_or(Label::Irrelevant);
            article.with_label(label)
        })
        .collect()
}

#[derive(Serialize)]
struct TrainRequest<'a> {
    articles: &'a [ArticleRecord],
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    articles: &'a [ArticleRecord],
    threshold: f32,
}

#[derive(Deserialize)]
struct ClassifyResponse {
    classified_articles: Vec<ArticleRecord>,
}

#[derive(Debug)]
pub struct RemoteClassifier {
    client: Client,
    base_url: String,
}

impl RemoteClassifier {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, path))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unknown error"));
            return Err(PipelineError::UpstreamUnavailable(format!(
                "classifier {} returned {}: {}",
                path, status, error_text
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl Classifier for RemoteClassifier {
    async fn train(&self, articles: &[ArticleRecord]) -> Result<TrainOutcome> {
        let response = self
            .post("train-classifier", &TrainRequest { articles })
            .await?;
        Ok(response.json::<TrainOutcome>().await?)
    }

    async fn score(
        &self,
        articles: &[ArticleRecord],
        threshold: f32,
    ) -> Result<Vec<ArticleRecord>> {
        let response = self
            .post("classify-articles", &ClassifyRequest { articles, threshold })
            .await?;
        Ok(response.json::<ClassifyResponse>().await?.classified_articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_scores_merges_by_url_and_defaults_missing_to_irrelevant() {
        let pool = vec![
            ArticleRecord::new("https://a.test/1", "one"),
            ArticleRecord::new("https://a.test/2", "two").with_label(Label::Relevant),
            ArticleRecord::new("https://a.test/3", "three"),
        ];
        let scored = vec![
            ArticleRecord::new("https://a.test/3", "three").with_label(Label::Relevant),
            ArticleRecord::new("https://elsewhere.test/x", "unknown").with_label(Label::Relevant),
        ];

        let merged = apply_scores(&pool, scored);

        let labels: Vec<Label> = merged.iter().map(|a| a.label).collect();
        assert_eq!(
            labels,
            vec![Label::Irrelevant, Label::Irrelevant, Label::Relevant]
        );
        // pool order and membership are preserved
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[2].title, "three");
    }
}
