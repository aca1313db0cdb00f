//! # Workflow Events
//!
//! Observable progress of a run. Events are collected on the runner and,
//! when a channel is attached, streamed to the caller as they happen.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of workflow event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowEventKind {
    /// Run started
    WorkflowStarted,
    /// Agent step started
    AgentStarted,
    /// Agent step completed successfully
    AgentCompleted,
    /// Reviewer produced a score
    ReviewScored,
    /// Router sent the run back to the fixer
    ReviewRejected,
    /// Fixer reply decoded to an empty file set; prior code kept
    RevisionDegenerate,
    /// Template render for prompt context failed (non-fatal)
    TemplateContextFailed,
    /// Run reached the terminal state
    WorkflowCompleted,
}

/// An event in a workflow run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEvent {
    /// Timestamp
    pub timestamp: DateTime<Utc>,
    /// Kind of event
    pub kind: WorkflowEventKind,
    /// Agent that produced this event
    pub agent: String,
    /// Associated data (JSON)
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl WorkflowEvent {
    /// Create a new event
    pub fn new(kind: WorkflowEventKind, agent: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            agent: agent.to_string(),
            data: None,
        }
    }

    /// Add data to the event
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}
