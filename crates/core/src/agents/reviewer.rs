//! # Reviewer Step
//!
//! Scores the whole generated codebase. The file mapping is serialized with
//! the multi-file codec so one structured call can see every file. No
//! default score is substituted on failure - a made-up score would steer the
//! routing policy blindly.

use tracing::info;

use super::prompts;
use crate::codec;
use crate::llm::{generate_structured, LanguageModel, LlmError};
use crate::state::{Review, StateUpdate, WorkflowState};

/// Run the reviewer over the current `code` mapping.
///
/// Sets `review_score` and `review_feedback`; never touches `revision_count`.
pub async fn run(
    llm: &dyn LanguageModel,
    state: &WorkflowState,
) -> Result<StateUpdate, LlmError> {
    info!(files = state.code.len(), "agent: reviewer");

    let user = format!("Code:\n{}", codec::encode(&state.code));
    let review: Review = generate_structured(llm, prompts::REVIEWER, &user).await?;

    Ok(StateUpdate {
        review_score: Some(review.score),
        review_feedback: Some(review.feedback),
        ..Default::default()
    })
}
