// Public modules
pub mod classifier;
pub mod config;
pub mod drafts;
pub mod error;
pub mod excerpts;
pub mod extractor;
pub mod generation;
pub mod io;
pub mod models;
pub mod phase;
pub mod retriever;
pub mod search;
pub mod session;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use classifier::{Classifier, RemoteClassifier, TrainOutcome};
pub use config::{Config, PipelineSettings, RetrievalProfile};
pub use drafts::{Draft, DraftGenerator, DraftSet, Platform, DEFAULT_POST_PROMPT};
pub use error::{PipelineError, Result};
pub use excerpts::{ExcerptList, ExcerptSynthesizer, DEFAULT_EXTRACTION_INSTRUCTION};
pub use extractor::{ContentExtractor, HttpPageFetcher, PageFetcher};
pub use generation::{ClaudeGenerator, GeneratorOptions, TextGenerator};
pub use io::{get_default_data_dir, list_datasets, load_dataset, save_dataset};
pub use models::{ArticleRecord, DatasetExport, Label, SourceRef};
pub use phase::{PhaseEvent, PipelinePhase};
pub use retriever::{parse_keywords, Retriever};
pub use search::{NewsApiClient, NewsSearch, SearchPage, SearchRequest, SortMode};
pub use session::{CurationSession, Services, TrainGate};
