//! Keyword retrieval across terms and pages with a single dedup set per call.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::RetrievalProfile;
use crate::error::{PipelineError, Result};
use crate::models::ArticleRecord;
use crate::search::{NewsSearch, SearchRequest};

/// Splits a comma-separated query into trimmed, non-empty terms.
pub fn parse_keywords(query: &str) -> Result<Vec<String>> {
    let terms: Vec<String> = query
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();

    if terms.is_empty() {
        return Err(PipelineError::InvalidQuery(
            "enter at least one keyword (separate multiple keywords with commas)".to_string(),
        ));
    }

    Ok(terms)
}

pub struct Retriever {
    search: Arc<dyn NewsSearch>,
    concurrency: usize,
}

impl Retriever {
    pub fn new(search: Arc<dyn NewsSearch>, concurrency: usize) -> Self {
        Self {
            search,
            concurrency: concurrency.max(1),
        }
    }

    /// Queries every term across `profile.page_limit` pages. Failed pages are
    /// skipped; the first occurrence of each URL wins, in term then page order.
    pub async fn retrieve(
        &self,
        query: &str,
        profile: &RetrievalProfile,
    ) -> Result<Vec<ArticleRecord>> {
        let terms = parse_keywords(query)?;

        let from = match profile.recency {
            Some(window) => {
                let window = chrono::Duration::from_std(window)
                    .map_err(|e| PipelineError::InvalidQuery(format!("recency window: {}", e)))?;
                let from = Utc::now().checked_sub_signed(window).ok_or_else(|| {
                    PipelineError::InvalidQuery(format!(
                        "recency window of {} hours reaches past the earliest representable date",
                        window.num_hours()
                    ))
                })?;
                Some(from)
            }
            None => None,
        };

        let requests: Vec<SearchRequest> = terms
            .iter()
            .flat_map(|term| {
                (1..=profile.page_limit).map(move |page| SearchRequest {
                    term: term.clone(),
                    page,
                    from,
                    sort: profile.sort,
                })
            })
            .collect();

        let request_count = requests.len();

        // `buffered` keeps results in request order so dedup is deterministic
        let pages: Vec<Vec<ArticleRecord>> = stream::iter(requests)
            .map(|request| async move {
                match self.search.search(&request).await {
                    Ok(page) if page.is_ok() => page.articles,
                    Ok(page) => {
                        warn!(
                            term = %request.term,
                            page = request.page,
                            status = %page.status,
                            "search page returned non-ok status, skipping"
                        );
                        Vec::new()
                    }
                    Err(e) => {
                        warn!(
                            term = %request.term,
                            page = request.page,
                            error = %e,
                            "search page failed, skipping"
                        );
                        Vec::new()
                    }
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut seen: HashSet<String> = HashSet::new();
        let mut combined = Vec::new();

        for article in pages.into_iter().flatten() {
            if article.url.trim().is_empty() {
                debug!(title = %article.title, "dropping article without url");
                continue;
            }
            if seen.insert(article.url.clone()) {
                combined.push(article.with_label(profile.default_label));
            }
        }

        info!(
            terms = terms.len(),
            requests = request_count,
            articles = combined.len(),
            "retrieval complete"
        );

        Ok(combined)
    }
}
