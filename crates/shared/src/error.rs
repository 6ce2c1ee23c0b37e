use thiserror::Error;

use crate::phase::PipelinePhase;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Malformed generation output: {0}")]
    MalformedGenerationOutput(String),

    #[error("Not enough data to train the classifier: {have} articles, at least {need} required")]
    InsufficientData { have: usize, need: usize },

    #[error("Select between 1 and {max} relevant articles before continuing ({selected} selected)")]
    SelectionOutOfBounds { selected: usize, max: usize },

    #[error("Draft generation failed: {0}")]
    GenerationBatchFailed(String),

    #[error("A training request is already in progress")]
    TrainingInFlight,

    #[error("Cannot {action} during the {phase} phase")]
    InvalidTransition {
        phase: PipelinePhase,
        action: &'static str,
    },

    #[error("The selected articles don't contain any usable facts. Go back to article selection.")]
    NoExcerpts,

    #[error("The excerpt list is empty")]
    EmptyExcerptList,

    #[error("Version count must be between 1 and {max} ({requested} requested)")]
    InvalidVersionCount { requested: usize, max: usize },

    /// `index` is 0-based; the message numbers items from 1.
    #[error("Item {} is out of range (choose 1-{len})", .index + 1)]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Draft {} is not available (choose 1-{len})", .index + 1)]
    DraftIndexOutOfRange { index: usize, len: usize },

    #[error("Draft {} was already chosen; start over to pick a different one", .chosen + 1)]
    DraftAlreadyChosen { chosen: usize },

    #[error("No draft has been chosen yet")]
    NoDraftSelected,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    /// Per-unit failures that the stage recovers from by skipping the unit.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PipelineError::UpstreamUnavailable(_)
                | PipelineError::MalformedGenerationOutput(_)
                | PipelineError::Http(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
