//! One operator's curation session: the phase plus everything it owns.
//!
//! Every operation that awaits an external call computes its result first and
//! only then writes to the session, so dropping an in-progress future leaves
//! the previous state intact.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};

use crate::classifier::{apply_scores, Classifier, RemoteClassifier, TrainOutcome};
use crate::config::{Config, PipelineSettings};
use crate::drafts::{Draft, DraftGenerator, DraftSet, Platform};
use crate::error::{PipelineError, Result};
use crate::excerpts::{ExcerptList, ExcerptSynthesizer};
use crate::extractor::{ContentExtractor, HttpPageFetcher, PageFetcher};
use crate::generation::{ClaudeGenerator, GeneratorOptions, TextGenerator};
use crate::io;
use crate::models::{ArticleRecord, DatasetExport};
use crate::phase::{PhaseEvent, PipelinePhase};
use crate::retriever::Retriever;
use crate::search::{NewsApiClient, NewsSearch};

/// The external capabilities a session talks to.
#[derive(Clone)]
pub struct Services {
    pub search: Arc<dyn NewsSearch>,
    pub classifier: Arc<dyn Classifier>,
    pub fetcher: Arc<dyn PageFetcher>,
    pub generator: Arc<dyn TextGenerator>,
}

impl Services {
    /// HTTP-backed services for every capability.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let settings = &config.settings;

        let search = NewsApiClient::new(
            config.news_api_key()?,
            config.news_api_base_url.as_str(),
            settings.http_timeout,
        )?
        .with_page_size(settings.page_size)
        .with_language(settings.language.as_str());

        let classifier = RemoteClassifier::new(config.classifier_api_url()?, settings.generation_timeout)?;

        let fetcher = HttpPageFetcher::new(
            settings.http_timeout,
            settings.fetch_concurrency,
            settings.fetch_attempts,
        )?;

        let generator = ClaudeGenerator::new(
            config.anthropic_api_key()?,
            GeneratorOptions {
                model: config.anthropic_model.clone(),
                base_url: config.anthropic_base_url.clone(),
                max_tokens: settings.generation_max_tokens,
                timeout: settings.generation_timeout,
                max_attempts: settings.generation_attempts,
                concurrency: settings.generation_concurrency,
            },
        )?;

        Ok(Self {
            search: Arc::new(search),
            classifier: Arc::new(classifier),
            fetcher: Arc::new(fetcher),
            generator: Arc::new(generator),
        })
    }
}

/// Single-flight guard for training requests.
#[derive(Debug, Clone, Default)]
pub struct TrainGate(Arc<AtomicBool>);

impl TrainGate {
    pub fn try_acquire(&self) -> Result<TrainPermit> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| PipelineError::TrainingInFlight)?;
        Ok(TrainPermit(Arc::clone(&self.0)))
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Held while a training request is outstanding; released on drop.
#[derive(Debug)]
pub struct TrainPermit(Arc<AtomicBool>);

impl Drop for TrainPermit {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct CurationSession {
    settings: PipelineSettings,
    classifier: Arc<dyn Classifier>,
    retriever: Retriever,
    extractor: ContentExtractor,
    synthesizer: ExcerptSynthesizer,
    draft_generator: DraftGenerator,
    snapshot_dir: Option<PathBuf>,
    train_gate: TrainGate,

    phase: PipelinePhase,
    query: Option<String>,
    articles: Vec<ArticleRecord>,
    candidate_pool: Vec<ArticleRecord>,
    excerpts: ExcerptList,
    drafts: Option<DraftSet>,
}

impl CurationSession {
    pub fn new(settings: PipelineSettings, services: Services) -> Self {
        Self {
            retriever: Retriever::new(services.search, settings.search_concurrency),
            extractor: ContentExtractor::new(
                services.fetcher,
                settings.min_fragment_chars,
                settings.fetch_concurrency,
            ),
            synthesizer: ExcerptSynthesizer::new(
                Arc::clone(&services.generator),
                settings.min_content_chars,
                settings.generation_concurrency,
            ),
            draft_generator: DraftGenerator::new(services.generator, settings.max_versions),
            classifier: services.classifier,
            snapshot_dir: None,
            train_gate: TrainGate::default(),
            settings,
            phase: PipelinePhase::KeywordEntry,
            query: None,
            articles: Vec::new(),
            candidate_pool: Vec::new(),
            excerpts: ExcerptList::default(),
            drafts: None,
        }
    }

    /// Write an audit snapshot of extracted content into `dir` on every extraction.
    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = Some(dir.into());
        self
    }

    pub fn phase(&self) -> PipelinePhase {
        self.phase
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn articles(&self) -> &[ArticleRecord] {
        &self.articles
    }

    pub fn relevant_count(&self) -> usize {
        self.articles
            .iter()
            .filter(|a| a.label.is_relevant())
            .count()
    }

    pub fn excerpts(&self) -> &ExcerptList {
        &self.excerpts
    }

    pub fn drafts(&self) -> Option<&DraftSet> {
        self.drafts.as_ref()
    }

    pub fn selected_draft(&self) -> Option<&Draft> {
        self.drafts.as_ref().and_then(DraftSet::selected)
    }

    pub fn train_gate(&self) -> TrainGate {
        self.train_gate.clone()
    }

    /// Runs a retrieval for the current phase and returns the number of records.
    ///
    /// In keyword entry this is the training feed and the volume gate decides
    /// whether labeling opens. In classifier-assisted mode it fetches a fresh
    /// candidate pool and scores it at the default threshold; if scoring fails
    /// the unscored pool is kept and the error returned.
    pub async fn search(&mut self, query: &str) -> Result<usize> {
        self.phase.require(
            &[PipelinePhase::KeywordEntry, PipelinePhase::ClassifierAssisted],
            "search for articles",
        )?;

        match self.phase {
            PipelinePhase::ClassifierAssisted => {
                let pool = self
                    .retriever
                    .retrieve(query, &self.settings.candidate_pool)
                    .await?;
                let scored = self
                    .classifier
                    .score(&pool, self.settings.default_threshold)
                    .await;

                let count = pool.len();
                self.query = Some(query.to_string());
                match scored {
                    Ok(scored) => {
                        self.articles = apply_scores(&pool, scored);
                        self.candidate_pool = pool;
                        info!(count, relevant = self.relevant_count(), "candidate pool scored");
                        Ok(count)
                    }
                    Err(e) => {
                        self.articles = pool.clone();
                        self.candidate_pool = pool;
                        Err(e)
                    }
                }
            }
            _ => {
                let articles = self
                    .retriever
                    .retrieve(query, &self.settings.training_feed)
                    .await?;
                let count = articles.len();
                let next = self.phase.next(PhaseEvent::Retrieved {
                    count,
                    threshold: self.settings.volume_threshold,
                })?;

                self.articles = articles;
                self.query = Some(query.to_string());
                self.phase = next;
                Ok(count)
            }
        }
    }

    pub fn toggle_label(&mut self, index: usize) -> Result<()> {
        self.phase.require(
            &[PipelinePhase::Labeling, PipelinePhase::ClassifierAssisted],
            "change labels",
        )?;
        let len = self.articles.len();
        let article = self
            .articles
            .get_mut(index)
            .ok_or(PipelineError::IndexOutOfRange { index, len })?;
        article.label = article.label.toggled();
        Ok(())
    }

    pub fn remove_article(&mut self, index: usize) -> Result<ArticleRecord> {
        self.phase.require(
            &[PipelinePhase::Labeling, PipelinePhase::ClassifierAssisted],
            "remove articles",
        )?;
        if index >= self.articles.len() {
            return Err(PipelineError::IndexOutOfRange {
                index,
                len: self.articles.len(),
            });
        }
        let removed = self.articles.remove(index);
        self.candidate_pool.retain(|a| a.url != removed.url);
        Ok(removed)
    }

    /// Sends the labeled collection to the classifier. On failure nothing changes.
    pub async fn train(&mut self) -> Result<TrainOutcome> {
        self.phase
            .require(&[PipelinePhase::Labeling], "train the classifier")?;

        let need = self.settings.volume_threshold;
        if self.articles.len() < need {
            return Err(PipelineError::InsufficientData {
                have: self.articles.len(),
                need,
            });
        }

        let _permit = self.train_gate.try_acquire()?;
        let outcome = self.classifier.train(&self.articles).await?;
        self.phase = self.phase.next(PhaseEvent::Trained)?;

        info!(articles = self.articles.len(), message = %outcome.message, "classifier trained");
        Ok(outcome)
    }

    /// Re-scores the stored candidate pool without fetching again. Returns the
    /// number of relevant records.
    pub async fn smart_filter(&mut self, threshold: Option<f32>) -> Result<usize> {
        self.phase
            .require(&[PipelinePhase::ClassifierAssisted], "re-score articles")?;

        if self.candidate_pool.is_empty() {
            return Ok(0);
        }

        let threshold = threshold.unwrap_or(self.settings.smart_threshold);
        let scored = self.classifier.score(&self.candidate_pool, threshold).await?;
        self.articles = apply_scores(&self.candidate_pool, scored);

        let relevant = self.relevant_count();
        info!(threshold, relevant, "candidate pool re-scored");
        Ok(relevant)
    }

    /// Moves the relevant records into generation.
    pub fn enter_generation(&mut self) -> Result<usize> {
        let selected: Vec<ArticleRecord> = self
            .articles
            .iter()
            .filter(|a| a.label.is_relevant())
            .cloned()
            .collect();

        let next = self.phase.next(PhaseEvent::SelectionConfirmed {
            selected: selected.len(),
            max: self.settings.max_selection,
        })?;

        let count = selected.len();
        self.articles = selected;
        self.candidate_pool.clear();
        self.phase = next;
        Ok(count)
    }

    /// Scrapes the selected articles and distils them into excerpts. Returns the
    /// number of excerpts. With nothing usable the phase does not change.
    pub async fn extract_excerpts(&mut self, instruction: &str) -> Result<usize> {
        self.phase
            .require(&[PipelinePhase::Extracting], "extract excerpts")?;

        let extracted = self.extractor.extract(self.articles.clone()).await;

        if let Some(dir) = &self.snapshot_dir {
            match io::save_snapshot(dir, &extracted) {
                Ok(path) => info!(path = %path.display(), "saved extraction snapshot"),
                Err(e) => error!(error = %e, "failed to save extraction snapshot"),
            }
        }

        let excerpts = self.synthesizer.synthesize(&extracted, instruction).await;
        let next = self.phase.next(PhaseEvent::ExcerptsReady {
            count: excerpts.len(),
        })?;

        let count = excerpts.len();
        self.excerpts = ExcerptList::new(excerpts);
        self.articles.clear();
        self.phase = next;
        Ok(count)
    }

    pub fn remove_excerpt(&mut self, index: usize) -> Result<String> {
        self.phase
            .require(&[PipelinePhase::Drafting], "edit excerpts")?;
        self.excerpts.remove(index)
    }

    pub fn move_excerpt(&mut self, index: usize, up: bool) -> Result<()> {
        self.phase
            .require(&[PipelinePhase::Drafting], "edit excerpts")?;
        self.excerpts.move_item(index, up)
    }

    pub fn move_excerpt_to(&mut self, from: usize, to: usize) -> Result<()> {
        self.phase
            .require(&[PipelinePhase::Drafting], "edit excerpts")?;
        self.excerpts.move_to(from, to)
    }

    pub async fn generate_drafts(
        &mut self,
        prompt: &str,
        platform: Platform,
        versions: usize,
    ) -> Result<&DraftSet> {
        self.phase
            .require(&[PipelinePhase::Drafting], "generate drafts")?;

        let set = self
            .draft_generator
            .generate(prompt, self.excerpts.items(), platform, versions)
            .await?;
        let next = self
            .phase
            .next(PhaseEvent::DraftsReady { count: set.len() })?;

        self.phase = next;
        Ok(self.drafts.insert(set))
    }

    pub fn choose_draft(&mut self, index: usize) -> Result<&Draft> {
        self.phase
            .require(&[PipelinePhase::Finalizing], "choose a draft")?;
        self.drafts
            .as_mut()
            .ok_or(PipelineError::NoDraftSelected)?
            .choose(index)
    }

    pub fn edit_draft(&mut self, text: impl Into<String>) -> Result<()> {
        self.phase
            .require(&[PipelinePhase::Finalizing], "edit the draft")?;
        self.drafts
            .as_mut()
            .ok_or(PipelineError::NoDraftSelected)?
            .edit(text)
    }

    pub fn export_draft(&self, dir: &Path) -> anyhow::Result<PathBuf> {
        self.phase
            .require(&[PipelinePhase::Finalizing], "export the draft")?;
        let draft = self.selected_draft().ok_or(PipelineError::NoDraftSelected)?;
        io::save_draft(dir, draft)
    }

    pub fn export_dataset(&self, dir: &Path) -> anyhow::Result<PathBuf> {
        if self.articles.is_empty() {
            anyhow::bail!("There are no articles to export");
        }
        let data = DatasetExport::new(self.query.clone(), self.articles.clone());
        io::save_dataset(dir, &data)
    }

    /// Loads a previously exported dataset as if it had just been retrieved.
    pub fn import_dataset(&mut self, path: &Path) -> anyhow::Result<usize> {
        self.phase
            .require(&[PipelinePhase::KeywordEntry], "import a dataset")?;

        let data = io::load_dataset(path)?;
        let count = data.articles.len();
        let next = self.phase.next(PhaseEvent::Retrieved {
            count,
            threshold: self.settings.volume_threshold,
        })?;

        self.articles = data.articles;
        self.query = data.query;
        self.phase = next;
        Ok(count)
    }

    /// Back to keyword entry with all working data discarded.
    pub fn reset(&mut self) {
        self.phase = PipelinePhase::KeywordEntry;
        self.query = None;
        self.articles.clear();
        self.candidate_pool.clear();
        self.excerpts.clear();
        self.drafts = None;
        info!("session reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Label;
    use crate::testing::{FakeClassifier, FakeFetcher, FakeGenerator, FakeSearch};
    use tempfile::TempDir;

    const THRESHOLD: usize = 5;

    fn settings() -> PipelineSettings {
        PipelineSettings {
            volume_threshold: THRESHOLD,
            ..PipelineSettings::default()
        }
    }

    fn long_page(topic: &str) -> String {
        format!(
            "<html><body><h1>{topic}: what the new survey says</h1><p>{}</p></body></html>",
            "Researchers surveyed two thousand families about screens and sleep. ".repeat(6)
        )
    }

    struct Harness {
        search: Arc<FakeSearch>,
        classifier: Arc<FakeClassifier>,
        generator: Arc<FakeGenerator>,
    }

    impl Harness {
        fn session(&self, fetcher: FakeFetcher) -> CurationSession {
            CurationSession::new(
                settings(),
                Services {
                    search: self.search.clone(),
                    classifier: self.classifier.clone(),
                    fetcher: Arc::new(fetcher),
                    generator: self.generator.clone(),
                },
            )
        }
    }

    fn harness(classifier: FakeClassifier, generator: FakeGenerator) -> Harness {
        let candidates = (0..3)
            .map(|i| ArticleRecord::new(format!("https://news.test/{}", i), format!("story {}", i)))
            .collect();
        Harness {
            search: Arc::new(
                FakeSearch::default()
                    .with_many("alpha", THRESHOLD)
                    .with_page("kids", 1, candidates),
            ),
            classifier: Arc::new(classifier),
            generator: Arc::new(generator),
        }
    }

    fn scored_classifier() -> FakeClassifier {
        FakeClassifier::default()
            .with_score("https://news.test/0", 0.9)
            .with_score("https://news.test/1", 0.6)
            .with_score("https://news.test/2", 0.1)
    }

    async fn classifier_assisted(session: &mut CurationSession) {
        session.search("alpha").await.unwrap();
        session.train().await.unwrap();
        session.search("kids").await.unwrap();
    }

    #[tokio::test]
    async fn full_session_from_keywords_to_exported_post() {
        let h = harness(
            scored_classifier(),
            FakeGenerator::scripted(vec![
                Ok(r#"["Fact from story zero, per the family survey"]"#.to_string()),
                Ok(r#"["Fact from story one, per the sleep study"]"#.to_string()),
                Ok("Draft A".to_string()),
                Ok("Draft B".to_string()),
            ]),
        );
        let fetcher = FakeFetcher::default()
            .with_page("https://news.test/0", &long_page("Story zero"))
            .with_page("https://news.test/1", &long_page("Story one"));
        let snapshots = TempDir::new().unwrap();
        let mut session = h.session(fetcher).with_snapshot_dir(snapshots.path());

        assert_eq!(session.search("alpha").await.unwrap(), THRESHOLD);
        assert_eq!(session.phase(), PipelinePhase::Labeling);
        assert!(session.articles().iter().all(|a| a.label == Label::Relevant));

        session.toggle_label(0).unwrap();
        session.train().await.unwrap();
        assert_eq!(session.phase(), PipelinePhase::ClassifierAssisted);
        assert_eq!(h.classifier.train_calls(), vec![THRESHOLD]);

        session.search("kids").await.unwrap();
        assert_eq!(session.relevant_count(), 1);

        assert_eq!(session.smart_filter(None).await.unwrap(), 2);
        assert_eq!(h.classifier.thresholds(), vec![0.7, 0.5]);
        // re-scoring never refetches
        let fetched_kids = h
            .search
            .requests()
            .iter()
            .filter(|r| r.term == "kids")
            .count();
        assert_eq!(fetched_kids, 4);

        assert_eq!(session.enter_generation().unwrap(), 2);
        assert_eq!(session.phase(), PipelinePhase::Extracting);

        assert_eq!(session.extract_excerpts("parenting focus").await.unwrap(), 2);
        assert_eq!(session.phase(), PipelinePhase::Drafting);
        assert!(session.articles().is_empty());
        assert_eq!(std::fs::read_dir(snapshots.path()).unwrap().count(), 1);

        session.move_excerpt(1, true).unwrap();
        assert_eq!(
            session.excerpts().items()[0],
            "Fact from story one, per the sleep study"
        );

        let drafts = session
            .generate_drafts("Write warmly", Platform::LinkedIn, 2)
            .await
            .unwrap();
        assert_eq!(drafts.len(), 2);
        assert_eq!(session.phase(), PipelinePhase::Finalizing);

        assert_eq!(session.choose_draft(1).unwrap().text, "Draft B");
        session.edit_draft("Draft B, polished").unwrap();

        let out = TempDir::new().unwrap();
        let path = session.export_draft(out.path()).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "Draft B, polished");

        session.reset();
        assert_eq!(session.phase(), PipelinePhase::KeywordEntry);
        assert!(session.articles().is_empty());
        assert!(session.excerpts().is_empty());
        assert!(session.drafts().is_none());
        assert!(session.query().is_none());
    }

    #[tokio::test]
    async fn small_retrieval_stays_in_keyword_entry() {
        let h = harness(FakeClassifier::default(), FakeGenerator::always("x"));
        let mut session = h.session(FakeFetcher::default());

        assert_eq!(session.search("kids").await.unwrap(), 3);
        assert_eq!(session.phase(), PipelinePhase::KeywordEntry);
        assert_eq!(session.articles().len(), 3);
    }

    #[tokio::test]
    async fn training_below_threshold_is_rejected_without_state_change() {
        let h = harness(FakeClassifier::default(), FakeGenerator::always("x"));
        let mut session = h.session(FakeFetcher::default());
        session.search("alpha").await.unwrap();
        session.remove_article(0).unwrap();
        let before = session.articles().to_vec();

        let result = session.train().await;

        assert!(matches!(
            result,
            Err(PipelineError::InsufficientData { have: 4, need: 5 })
        ));
        assert_eq!(session.phase(), PipelinePhase::Labeling);
        assert_eq!(session.articles(), before.as_slice());
        assert!(h.classifier.train_calls().is_empty());
    }

    #[tokio::test]
    async fn failed_training_keeps_labels_and_phase() {
        let h = harness(
            FakeClassifier::default().failing_training(),
            FakeGenerator::always("x"),
        );
        let mut session = h.session(FakeFetcher::default());
        session.search("alpha").await.unwrap();
        session.toggle_label(2).unwrap();
        let before = session.articles().to_vec();

        assert!(session.train().await.is_err());
        assert_eq!(session.phase(), PipelinePhase::Labeling);
        assert_eq!(session.articles(), before.as_slice());
        assert!(!session.train_gate().is_busy());
    }

    #[tokio::test]
    async fn outstanding_training_blocks_a_second_request() {
        let h = harness(FakeClassifier::default(), FakeGenerator::always("x"));
        let mut session = h.session(FakeFetcher::default());
        session.search("alpha").await.unwrap();

        let permit = session.train_gate().try_acquire().unwrap();
        assert!(matches!(
            session.train().await,
            Err(PipelineError::TrainingInFlight)
        ));
        assert!(h.classifier.train_calls().is_empty());

        drop(permit);
        session.train().await.unwrap();
        assert_eq!(session.phase(), PipelinePhase::ClassifierAssisted);
    }

    #[tokio::test]
    async fn scoring_failure_keeps_unscored_pool() {
        let h = harness(
            FakeClassifier::default().failing_scoring(),
            FakeGenerator::always("x"),
        );
        let mut session = h.session(FakeFetcher::default());
        session.search("alpha").await.unwrap();
        session.train().await.unwrap();

        assert!(session.search("kids").await.is_err());
        assert_eq!(session.articles().len(), 3);
        assert_eq!(session.relevant_count(), 0);
        assert_eq!(session.phase(), PipelinePhase::ClassifierAssisted);
    }

    #[tokio::test]
    async fn generation_gate_rejects_empty_and_oversized_selections() {
        let mut classifier = FakeClassifier::default();
        for i in 0..16 {
            classifier = classifier.with_score(&format!("https://big.test/{}", i), 0.95);
        }
        let big_pool: Vec<ArticleRecord> = (0..16)
            .map(|i| ArticleRecord::new(format!("https://big.test/{}", i), "big"))
            .collect();
        let search = FakeSearch::default()
            .with_many("alpha", THRESHOLD)
            .with_page("big", 1, big_pool)
            .with_many("none", 3);
        let mut session = CurationSession::new(
            settings(),
            Services {
                search: Arc::new(search),
                classifier: Arc::new(classifier),
                fetcher: Arc::new(FakeFetcher::default()),
                generator: Arc::new(FakeGenerator::always("x")),
            },
        );
        session.search("alpha").await.unwrap();
        session.train().await.unwrap();

        session.search("none").await.unwrap();
        assert!(matches!(
            session.enter_generation(),
            Err(PipelineError::SelectionOutOfBounds { selected: 0, max: 15 })
        ));

        session.search("big").await.unwrap();
        assert_eq!(session.relevant_count(), 16);
        assert!(matches!(
            session.enter_generation(),
            Err(PipelineError::SelectionOutOfBounds { selected: 16, max: 15 })
        ));
        assert_eq!(session.phase(), PipelinePhase::ClassifierAssisted);

        session.toggle_label(0).unwrap();
        assert_eq!(session.enter_generation().unwrap(), 15);
        assert_eq!(session.phase(), PipelinePhase::Extracting);
    }

    #[tokio::test]
    async fn extraction_without_usable_content_stays_in_extracting() {
        let h = harness(scored_classifier(), FakeGenerator::always("[]"));
        // no pages available, so every article is empty
        let mut session = h.session(FakeFetcher::default());
        classifier_assisted(&mut session).await;
        session.enter_generation().unwrap();

        let result = session.extract_excerpts("instr").await;

        assert!(matches!(result, Err(PipelineError::NoExcerpts)));
        assert_eq!(session.phase(), PipelinePhase::Extracting);
        assert_eq!(session.articles().len(), 1);
        assert_eq!(h.generator.calls(), 0);
    }

    #[tokio::test]
    async fn failed_draft_batch_shows_no_drafts() {
        let h = harness(
            scored_classifier(),
            FakeGenerator::scripted(vec![
                Ok(r#"["a fact from the family survey"]"#.to_string()),
                Ok("Draft A".to_string()),
                Err(PipelineError::UpstreamUnavailable("overloaded".to_string())),
                Ok("Draft C".to_string()),
            ]),
        );
        let fetcher = FakeFetcher::default().with_page("https://news.test/0", &long_page("zero"));
        let mut session = h.session(fetcher);
        classifier_assisted(&mut session).await;
        session.enter_generation().unwrap();
        session.extract_excerpts("instr").await.unwrap();

        let result = session.generate_drafts("p", Platform::Twitter, 3).await;

        assert!(matches!(result, Err(PipelineError::GenerationBatchFailed(_))));
        assert!(session.drafts().is_none());
        assert_eq!(session.phase(), PipelinePhase::Drafting);
        assert_eq!(session.excerpts().len(), 1);
    }

    #[tokio::test]
    async fn operations_outside_their_phase_are_rejected() {
        let h = harness(FakeClassifier::default(), FakeGenerator::always("x"));
        let mut session = h.session(FakeFetcher::default());

        assert!(matches!(
            session.toggle_label(0),
            Err(PipelineError::InvalidTransition { .. })
        ));
        assert!(matches!(
            session.train().await,
            Err(PipelineError::InvalidTransition { .. })
        ));
        assert!(matches!(
            session.smart_filter(None).await,
            Err(PipelineError::InvalidTransition { .. })
        ));
        assert!(matches!(
            session.generate_drafts("p", Platform::LinkedIn, 1).await,
            Err(PipelineError::InvalidTransition { .. })
        ));

        session.search("alpha").await.unwrap();
        assert!(matches!(
            session.search("alpha").await,
            Err(PipelineError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn exported_dataset_can_be_imported_into_a_fresh_session() {
        let h = harness(FakeClassifier::default(), FakeGenerator::always("x"));
        let mut session = h.session(FakeFetcher::default());
        session.search("alpha").await.unwrap();
        session.toggle_label(1).unwrap();

        let dir = TempDir::new().unwrap();
        let path = session.export_dataset(dir.path()).unwrap();

        let mut fresh = h.session(FakeFetcher::default());
        assert_eq!(fresh.import_dataset(&path).unwrap(), THRESHOLD);
        assert_eq!(fresh.phase(), PipelinePhase::Labeling);
        assert_eq!(fresh.articles(), session.articles());
        assert_eq!(fresh.query(), Some("alpha"));
    }
}
