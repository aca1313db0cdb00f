//! Workflow run configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::state::DEFAULT_TEMPLATE;

/// Review score at or above which the run is accepted.
pub const DEFAULT_THRESHOLD: f64 = 0.8;

/// Fixer invocations allowed before the run ships best-effort.
pub const DEFAULT_MAX_REVISIONS: u32 = 3;

/// Configuration for a workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Accept threshold for the review score (inclusive)
    pub threshold: f64,
    /// Revision budget; bounds fixer invocations, not reviews
    pub max_revisions: u32,
    /// Skeleton template the run starts from
    pub template: String,
    /// Deadline applied to each agent step; the external capability is not
    /// trusted to bound its own latency. `None` waits indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_timeout: Option<Duration>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            max_revisions: DEFAULT_MAX_REVISIONS,
            template: DEFAULT_TEMPLATE.to_string(),
            step_timeout: None,
        }
    }
}

impl WorkflowConfig {
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }
}
