//! # Fixer Step
//!
//! Revises the codebase against the reviewer's feedback. The model must
//! return the complete delimited file set, which replaces `code` wholesale.
//! An empty decode is a no-op revision rather than data loss: the prior code
//! is kept and `revision_count` still advances so the loop cannot stall.

use tracing::{info, warn};

use super::prompts;
use crate::codec;
use crate::llm::{LanguageModel, LlmError};
use crate::state::{StateUpdate, WorkflowState};

/// Run the fixer over the current code and review feedback.
///
/// Always increments `revision_count` by exactly 1. When the reply decodes
/// to an empty mapping, `code` is left unset in the update so the runner can
/// surface the degenerate revision.
pub async fn run(
    llm: &dyn LanguageModel,
    state: &WorkflowState,
) -> Result<StateUpdate, LlmError> {
    info!(revision = state.revision_count + 1, "agent: fixer");

    let mut user = format!(
        "Current Codebase:\n{}\n\nReviewer Feedback: {}",
        codec::encode(&state.code),
        state.review_feedback.as_deref().unwrap_or("(none)"),
    );
    if !state.rendered_templates.is_empty() {
        user.push_str(&format!(
            "\n\nSkeleton files for context (do not emit these):\n{}",
            codec::encode(&state.rendered_templates)
        ));
    }

    let raw = llm.generate_text(prompts::FIXER, &user).await?;
    let revised = codec::decode(&raw);

    let code = if revised.is_empty() {
        warn!("fixer reply decoded to an empty file set; keeping prior code");
        None
    } else {
        Some(revised)
    };

    Ok(StateUpdate {
        code,
        revision_count: Some(state.revision_count + 1),
        ..Default::default()
    })
}
