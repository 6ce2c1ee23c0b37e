//! Workflow phases and their transition rules.
//!
//! Transitions are pure functions of the current phase and an event whose
//! payload carries the guard inputs, so they can be checked without any
//! session or network behind them.

use std::fmt;

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PipelinePhase {
    #[default]
    KeywordEntry,
    Labeling,
    ClassifierAssisted,
    Extracting,
    Drafting,
    Finalizing,
}

impl PipelinePhase {
    /// Fails with `InvalidTransition` unless the phase is one of `allowed`.
    pub fn require(&self, allowed: &[PipelinePhase], action: &'static str) -> Result<()> {
        if allowed.contains(self) {
            Ok(())
        } else {
            Err(PipelineError::InvalidTransition {
                phase: *self,
                action,
            })
        }
    }

    pub fn next(self, event: PhaseEvent) -> Result<PipelinePhase> {
        use PhaseEvent::*;
        use PipelinePhase::*;

        match (self, event) {
            (_, Reset) => Ok(KeywordEntry),

            (KeywordEntry, Retrieved { count, threshold }) => {
                Ok(if count >= threshold { Labeling } else { KeywordEntry })
            }
            // fresh pools are fetched as often as the operator likes
            (ClassifierAssisted, Retrieved { .. }) => Ok(ClassifierAssisted),

            (Labeling, Trained) => Ok(ClassifierAssisted),

            (ClassifierAssisted, SelectionConfirmed { selected, max }) => {
                if (1..=max).contains(&selected) {
                    Ok(Extracting)
                } else {
                    Err(PipelineError::SelectionOutOfBounds { selected, max })
                }
            }

            (Extracting, ExcerptsReady { count }) => {
                if count > 0 {
                    Ok(Drafting)
                } else {
                    Err(PipelineError::NoExcerpts)
                }
            }

            (Drafting, DraftsReady { count }) if count > 0 => Ok(Finalizing),

            (phase, event) => Err(PipelineError::InvalidTransition {
                phase,
                action: event.action(),
            }),
        }
    }
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelinePhase::KeywordEntry => "keyword entry",
            PipelinePhase::Labeling => "labeling",
            PipelinePhase::ClassifierAssisted => "classifier-assisted selection",
            PipelinePhase::Extracting => "extraction",
            PipelinePhase::Drafting => "drafting",
            PipelinePhase::Finalizing => "finalizing",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    /// A retrieval (or dataset import) finished with `count` records.
    Retrieved { count: usize, threshold: usize },
    /// The classifier accepted a training request.
    Trained,
    /// The operator asked to move the relevant records into generation.
    SelectionConfirmed { selected: usize, max: usize },
    ExcerptsReady { count: usize },
    DraftsReady { count: usize },
    Reset,
}

impl PhaseEvent {
    fn action(&self) -> &'static str {
        match self {
            PhaseEvent::Retrieved { .. } => "retrieve articles",
            PhaseEvent::Trained => "train the classifier",
            PhaseEvent::SelectionConfirmed { .. } => "start generation",
            PhaseEvent::ExcerptsReady { .. } => "accept excerpts",
            PhaseEvent::DraftsReady { .. } => "accept drafts",
            PhaseEvent::Reset => "reset",
        }
    }
}
