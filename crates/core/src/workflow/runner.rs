//! # Workflow Runner
//!
//! The graph executor: drives the pipeline from an initial state holding
//! only the user prompt to the terminal state, merging each step's partial
//! update before the next step runs. Execution is strictly sequential -
//! at most one agent is active at a time, and the reviewer/fixer loop is a
//! serial cycle.
//!
//! Termination is guaranteed: `revision_count` strictly increases each time
//! the refactor branch is taken, and the router accepts once it reaches the
//! budget. The reviewer runs at most `max_revisions + 1` times, the fixer at
//! most `max_revisions` times.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::config::WorkflowConfig;
use super::events::{WorkflowEvent, WorkflowEventKind};
use super::pipeline::{route_after_review, Verdict, WorkflowStage};
use crate::agents::{architect, fixer, implementor, reviewer};
use crate::llm::{LanguageModel, LlmError};
use crate::state::{StateError, StateUpdate, WorkflowState};
use crate::template::TemplateRenderer;

/// Fatal errors for a workflow run. Rendering and build-check problems are
/// advisory and never surface here.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("agent step failed: {0}")]
    Agent(#[from] LlmError),
    #[error("state merge rejected: {0}")]
    State(#[from] StateError),
    #[error("agent step exceeded deadline of {0:?}")]
    Timeout(Duration),
}

/// Executes the pipeline graph against an injected generation capability.
pub struct WorkflowRunner {
    llm: Arc<dyn LanguageModel>,
    renderer: Option<Arc<dyn TemplateRenderer>>,
    config: WorkflowConfig,
    events: Vec<WorkflowEvent>,
    event_tx: Option<mpsc::Sender<WorkflowEvent>>,
}

impl WorkflowRunner {
    pub fn new(llm: Arc<dyn LanguageModel>, config: WorkflowConfig) -> Self {
        Self {
            llm,
            renderer: None,
            config,
            events: Vec::new(),
            event_tx: None,
        }
    }

    /// Attach a template renderer; its output is cached on the state as
    /// compatibility context for the implementor and fixer prompts.
    pub fn with_renderer(mut self, renderer: Arc<dyn TemplateRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Set event channel for streaming progress to the caller.
    pub fn with_event_channel(mut self, tx: mpsc::Sender<WorkflowEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Events recorded so far.
    pub fn events(&self) -> &[WorkflowEvent] {
        &self.events
    }

    /// Drive the graph from `user_prompt` to the terminal state.
    pub async fn run(&mut self, user_prompt: &str) -> Result<WorkflowState, WorkflowError> {
        let llm = Arc::clone(&self.llm);
        let mut state = WorkflowState::new(user_prompt);
        state.template_name = self.config.template.clone();
        let mut stage = WorkflowStage::Architecting;

        self.emit(
            WorkflowEvent::new(WorkflowEventKind::WorkflowStarted, "workflow")
                .with_data(json!({ "prompt": user_prompt })),
        )
        .await;

        // architect
        self.emit(WorkflowEvent::new(WorkflowEventKind::AgentStarted, "architect"))
            .await;
        let update = self.bounded(architect::run(llm.as_ref(), &state)).await?;
        state.apply(update)?;
        self.emit(WorkflowEvent::new(WorkflowEventKind::AgentCompleted, "architect"))
            .await;
        stage = stage.next();

        // Skeleton render for prompt context. Advisory: a failure degrades
        // the prompts, it does not abort the run.
        if let Some(renderer) = self.renderer.clone() {
            match renderer
                .render(&state.template_name, &state.template_variables())
                .await
            {
                Ok(rendered) => state.apply(StateUpdate {
                    rendered_templates: Some(rendered),
                    ..Default::default()
                })?,
                Err(e) => {
                    warn!(template = %state.template_name, error = %e, "skeleton context render failed");
                    self.emit(
                        WorkflowEvent::new(WorkflowEventKind::TemplateContextFailed, "workflow")
                            .with_data(json!({ "error": e.to_string() })),
                    )
                    .await;
                }
            }
        }

        // implementor
        self.emit(WorkflowEvent::new(WorkflowEventKind::AgentStarted, "implementor"))
            .await;
        let update = self.bounded(implementor::run(llm.as_ref(), &state)).await?;
        state.apply(update)?;
        self.emit(WorkflowEvent::new(WorkflowEventKind::AgentCompleted, "implementor"))
            .await;
        stage = stage.next();

        // review/fix cycle
        loop {
            debug!(?stage, revision = state.revision_count, "entering review");
            self.emit(WorkflowEvent::new(WorkflowEventKind::AgentStarted, "reviewer"))
                .await;
            let update = self.bounded(reviewer::run(llm.as_ref(), &state)).await?;
            state.apply(update)?;
            let score = state.review_score.unwrap_or(0.0);
            self.emit(
                WorkflowEvent::new(WorkflowEventKind::ReviewScored, "reviewer")
                    .with_data(json!({ "score": score, "revision": state.revision_count })),
            )
            .await;

            match route_after_review(score, state.revision_count, &self.config) {
                Verdict::Accept => {
                    stage = WorkflowStage::Complete;
                    break;
                }
                Verdict::Refactor => {
                    self.emit(
                        WorkflowEvent::new(WorkflowEventKind::ReviewRejected, "reviewer")
                            .with_data(json!({ "score": score })),
                    )
                    .await;
                    stage = WorkflowStage::Fixing;
                    self.emit(WorkflowEvent::new(WorkflowEventKind::AgentStarted, "fixer"))
                        .await;
                    let update = self.bounded(fixer::run(llm.as_ref(), &state)).await?;
                    if update.code.is_none() {
                        self.emit(WorkflowEvent::new(
                            WorkflowEventKind::RevisionDegenerate,
                            "fixer",
                        ))
                        .await;
                    }
                    state.apply(update)?;
                    self.emit(WorkflowEvent::new(WorkflowEventKind::AgentCompleted, "fixer"))
                        .await;
                    stage = stage.next();
                }
            }
        }

        debug_assert!(stage.is_terminal());
        self.emit(
            WorkflowEvent::new(WorkflowEventKind::WorkflowCompleted, "workflow").with_data(json!({
                "score": state.review_score,
                "revisions": state.revision_count,
                "files": state.code.len(),
            })),
        )
        .await;

        Ok(state)
    }

    /// Apply the configured per-step deadline to an agent future.
    async fn bounded<F>(&self, step: F) -> Result<StateUpdate, WorkflowError>
    where
        F: Future<Output = Result<StateUpdate, LlmError>>,
    {
        match self.config.step_timeout {
            Some(deadline) => tokio::time::timeout(deadline, step)
                .await
                .map_err(|_| WorkflowError::Timeout(deadline))?
                .map_err(WorkflowError::from),
            None => step.await.map_err(WorkflowError::from),
        }
    }

    async fn emit(&mut self, event: WorkflowEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event.clone()).await;
        }
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Scripted capability: replies are routed on the role instruction the
    /// runner passes as the system prompt.
    struct ScriptedLlm {
        architecture: serde_json::Value,
        reviews: Mutex<VecDeque<f64>>,
        implementor_reply: String,
        fixer_reply: String,
        architect_calls: AtomicU32,
        implementor_calls: AtomicU32,
        reviewer_calls: AtomicU32,
        fixer_calls: AtomicU32,
    }

    impl ScriptedLlm {
        fn new(files: &[&str], reviews: &[f64], implementor_reply: &str, fixer_reply: &str) -> Self {
            Self {
                architecture: serde_json::json!({
                    "files": files,
                    "technologies": ["react", "typescript"],
                    "logic_summary": "scripted",
                }),
                reviews: Mutex::new(reviews.iter().copied().collect()),
                implementor_reply: implementor_reply.to_string(),
                fixer_reply: fixer_reply.to_string(),
                architect_calls: AtomicU32::new(0),
                implementor_calls: AtomicU32::new(0),
                reviewer_calls: AtomicU32::new(0),
                fixer_calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedLlm {
        async fn generate_text(&self, system: &str, _user: &str) -> Result<String, LlmError> {
            if system.contains("Lead Developer") {
                self.implementor_calls.fetch_add(1, Ordering::SeqCst);
                Ok(self.implementor_reply.clone())
            } else {
                self.fixer_calls.fetch_add(1, Ordering::SeqCst);
                Ok(self.fixer_reply.clone())
            }
        }

        async fn generate_json(
            &self,
            system: &str,
            _user: &str,
            _schema: &serde_json::Value,
        ) -> Result<serde_json::Value, LlmError> {
            if system.contains("Architect") {
                self.architect_calls.fetch_add(1, Ordering::SeqCst);
                Ok(self.architecture.clone())
            } else {
                self.reviewer_calls.fetch_add(1, Ordering::SeqCst);
                let score = self
                    .reviews
                    .lock()
                    .unwrap()
                    .pop_front()
                    .ok_or_else(|| LlmError::Generation("no scripted review left".into()))?;
                Ok(serde_json::json!({ "score": score, "feedback": "scripted feedback" }))
            }
        }
    }

    #[tokio::test]
    async fn test_loop_terminates_on_exhausted_budget() {
        // Reviewer never satisfied: fixer must run exactly 3 times and the
        // 4th review accepts regardless of score.
        let llm = Arc::new(ScriptedLlm::new(
            &["src/App.tsx"],
            &[0.0, 0.0, 0.0, 0.0],
            "content",
            ">>> src/App.tsx\ncontent",
        ));
        let mut runner = WorkflowRunner::new(llm.clone(), WorkflowConfig::default());
        let state = runner.run("hopeless app").await.unwrap();

        assert_eq!(llm.fixer_calls.load(Ordering::SeqCst), 3);
        assert_eq!(llm.reviewer_calls.load(Ordering::SeqCst), 4);
        assert_eq!(state.revision_count, 3);
        assert_eq!(state.review_score, Some(0.0));
    }

    #[tokio::test]
    async fn test_end_to_end_todo_scenario() {
        let llm = Arc::new(ScriptedLlm::new(
            &["src/TodoList.tsx"],
            &[0.5, 0.9],
            "<content A>",
            ">>> src/TodoList.tsx\n<content B>",
        ));
        let mut runner = WorkflowRunner::new(llm.clone(), WorkflowConfig::default());
        let state = runner.run("todo app").await.unwrap();

        assert_eq!(llm.architect_calls.load(Ordering::SeqCst), 1);
        assert_eq!(llm.implementor_calls.load(Ordering::SeqCst), 1);
        assert_eq!(llm.reviewer_calls.load(Ordering::SeqCst), 2);
        assert_eq!(llm.fixer_calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.revision_count, 1);
        assert_eq!(state.code["src/TodoList.tsx"], "<content B>");
        assert_eq!(state.review_score, Some(0.9));
    }

    #[tokio::test]
    async fn test_accepts_first_review_at_threshold() {
        let llm = Arc::new(ScriptedLlm::new(&["src/a.tsx"], &[0.8], "x", ""));
        let mut runner = WorkflowRunner::new(llm.clone(), WorkflowConfig::default());
        let state = runner.run("easy app").await.unwrap();

        assert_eq!(llm.fixer_calls.load(Ordering::SeqCst), 0);
        assert_eq!(state.revision_count, 0);
    }

    #[tokio::test]
    async fn test_degenerate_fixer_reply_keeps_prior_code() {
        let llm = Arc::new(ScriptedLlm::new(
            &["src/a.tsx"],
            &[0.5, 0.9],
            "<content A>",
            "sorry, I cannot help with that",
        ));
        let mut runner = WorkflowRunner::new(llm.clone(), WorkflowConfig::default());
        let state = runner.run("app").await.unwrap();

        assert_eq!(state.code["src/a.tsx"], "<content A>");
        assert_eq!(state.revision_count, 1);
        assert!(runner
            .events()
            .iter()
            .any(|e| e.kind == WorkflowEventKind::RevisionDegenerate));
    }

    /// Capability that never answers, to exercise the step deadline.
    struct StalledLlm;

    #[async_trait]
    impl LanguageModel for StalledLlm {
        async fn generate_text(&self, _s: &str, _u: &str) -> Result<String, LlmError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!()
        }

        async fn generate_json(
            &self,
            _s: &str,
            _u: &str,
            _schema: &serde_json::Value,
        ) -> Result<serde_json::Value, LlmError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_timeout_fails_the_run() {
        let config = WorkflowConfig::default().with_step_timeout(Duration::from_millis(100));
        let mut runner = WorkflowRunner::new(Arc::new(StalledLlm), config);
        let err = runner.run("app").await.unwrap_err();
        assert!(matches!(err, WorkflowError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_events_are_streamed() {
        let (tx, mut rx) = mpsc::channel(64);
        let llm = Arc::new(ScriptedLlm::new(&["src/a.tsx"], &[0.9], "x", ""));
        let mut runner = WorkflowRunner::new(llm, WorkflowConfig::default()).with_event_channel(tx);
        runner.run("app").await.unwrap();

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(event.kind);
        }
        assert_eq!(kinds.first(), Some(&WorkflowEventKind::WorkflowStarted));
        assert_eq!(kinds.last(), Some(&WorkflowEventKind::WorkflowCompleted));
    }
}
