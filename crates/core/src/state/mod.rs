//! # Workflow State
//!
//! The single mutable record threaded through every step of the pipeline.
//! Each agent step returns a [`StateUpdate`] which is merged key-wise into
//! the running [`WorkflowState`]; invariants are checked at the merge
//! boundary so a malformed update never propagates downstream.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default skeleton template rendered under the generated code.
pub const DEFAULT_TEMPLATE: &str = "react_ts_tailwind";

/// Invariant violations detected while merging a step's update.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("architecture must list at least one file")]
    EmptyArchitecture,
    #[error("architecture file path is empty or duplicated: {0}")]
    BadArchitecturePath(String),
    #[error("review score {0} outside [0.0, 1.0]")]
    ScoreOutOfRange(f64),
    #[error("revision count may not decrease ({from} -> {to})")]
    RevisionRollback { from: u32, to: u32 },
}

/// Blueprint produced by the architect step.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Architecture {
    /// Relative paths of the files to generate, in implementation order
    pub files: Vec<String>,
    /// Technology stack chosen for the project
    pub technologies: Vec<String>,
    /// Variables handed to the skeleton template renderer
    #[serde(default)]
    pub template_variables: BTreeMap<String, serde_json::Value>,
    /// High-level summary of the application logic
    pub logic_summary: String,
}

impl Architecture {
    fn validate(&self) -> Result<(), StateError> {
        if self.files.is_empty() {
            return Err(StateError::EmptyArchitecture);
        }
        let mut seen = std::collections::BTreeSet::new();
        for path in &self.files {
            if path.trim().is_empty() || !seen.insert(path.as_str()) {
                return Err(StateError::BadArchitecturePath(path.clone()));
            }
        }
        Ok(())
    }
}

/// Verdict produced by the reviewer step.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Review {
    /// Quality score from 0.0 to 1.0
    pub score: f64,
    /// Feedback on what to improve
    pub feedback: String,
}

/// The mutable record passed through the graph. Created once per run with
/// only `user_prompt` populated; discarded after materialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    /// The originating request; immutable after initialization
    pub user_prompt: String,
    /// Written once by the architect step
    pub architecture: Option<Architecture>,
    /// Relative path -> full file text (never a diff)
    pub code: BTreeMap<String, String>,
    /// Last reviewer score; not accumulated
    pub review_score: Option<f64>,
    /// Last reviewer feedback, paired with the score
    pub review_feedback: Option<String>,
    /// Fixer invocations so far; the loop's starvation guard
    pub revision_count: u32,
    /// Which skeleton to render
    pub template_name: String,
    /// Cached skeleton render, used as prompt context only - the
    /// materializer re-renders independently
    pub rendered_templates: BTreeMap<String, String>,
}

impl WorkflowState {
    pub fn new(user_prompt: impl Into<String>) -> Self {
        Self {
            user_prompt: user_prompt.into(),
            architecture: None,
            code: BTreeMap::new(),
            review_score: None,
            review_feedback: None,
            revision_count: 0,
            template_name: DEFAULT_TEMPLATE.to_string(),
            rendered_templates: BTreeMap::new(),
        }
    }

    /// Merge a step's partial update, validating invariants at the boundary.
    pub fn apply(&mut self, update: StateUpdate) -> Result<(), StateError> {
        if let Some(arch) = update.architecture {
            arch.validate()?;
            self.architecture = Some(arch);
        }
        if let Some(code) = update.code {
            self.code = code;
        }
        if let Some(score) = update.review_score {
            if !(0.0..=1.0).contains(&score) || !score.is_finite() {
                return Err(StateError::ScoreOutOfRange(score));
            }
            self.review_score = Some(score);
        }
        if let Some(feedback) = update.review_feedback {
            self.review_feedback = Some(feedback);
        }
        if let Some(count) = update.revision_count {
            // Resets to 0 only come from the architect, before any fixer ran.
            if count < self.revision_count && count != 0 {
                return Err(StateError::RevisionRollback {
                    from: self.revision_count,
                    to: count,
                });
            }
            self.revision_count = count;
        }
        if let Some(name) = update.template_name {
            self.template_name = name;
        }
        if let Some(rendered) = update.rendered_templates {
            self.rendered_templates = rendered;
        }
        Ok(())
    }

    /// Template variables chosen by the architect, or an empty map.
    pub fn template_variables(&self) -> BTreeMap<String, serde_json::Value> {
        self.architecture
            .as_ref()
            .map(|a| a.template_variables.clone())
            .unwrap_or_default()
    }
}

/// Partial update returned by an agent step; unset fields leave the running
/// state untouched.
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub architecture: Option<Architecture>,
    pub code: Option<BTreeMap<String, String>>,
    pub review_score: Option<f64>,
    pub review_feedback: Option<String>,
    pub revision_count: Option<u32>,
    pub template_name: Option<String>,
    pub rendered_templates: Option<BTreeMap<String, String>>,
}
