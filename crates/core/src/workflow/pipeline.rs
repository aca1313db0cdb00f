//! # Routing Policy
//!
//! The pipeline's state machine: a closed set of named stages and the
//! post-review transition rule. The topology is fixed and small (one loop,
//! one branch), so there is no generic graph engine here.

use serde::{Deserialize, Serialize};

use super::config::WorkflowConfig;

/// Stage of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    /// Architect producing the blueprint
    Architecting,
    /// Implementor generating per-file code
    Implementing,
    /// Reviewer scoring the codebase
    Reviewing,
    /// Fixer revising against feedback
    Fixing,
    /// Terminal: run accepted
    Complete,
}

impl WorkflowStage {
    /// The linear transitions; the review branch is decided by
    /// [`route_after_review`].
    pub fn next(self) -> WorkflowStage {
        match self {
            WorkflowStage::Architecting => WorkflowStage::Implementing,
            WorkflowStage::Implementing => WorkflowStage::Reviewing,
            // Reviewing branches via the router; Fixing always re-reviews.
            WorkflowStage::Reviewing => WorkflowStage::Reviewing,
            WorkflowStage::Fixing => WorkflowStage::Reviewing,
            WorkflowStage::Complete => WorkflowStage::Complete,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == WorkflowStage::Complete
    }
}

/// Decision taken after every reviewer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Terminate the loop and ship
    Accept,
    /// Loop back to the fixer
    Refactor,
}

/// The transition rule consulted after every reviewer run.
///
/// A score exactly at the threshold accepts (inclusive lower bound). The
/// budget comparison uses `>=`, so the last fixer pass is still followed by
/// one more review; if that review also fails the run ships best-effort.
pub fn route_after_review(score: f64, revision_count: u32, config: &WorkflowConfig) -> Verdict {
    if score >= config.threshold || revision_count >= config.max_revisions {
        Verdict::Accept
    } else {
        Verdict::Refactor
    }
}
