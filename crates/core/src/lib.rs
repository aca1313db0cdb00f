//! # Appforge Core
//!
//! The "Brain" of the Appforge system - turns a natural-language feature
//! request into a generated front-end source tree.
//!
//! ## Architecture
//!
//! - `agents/` - The four pipeline steps (architect, implementor, reviewer, fixer)
//! - `codec` - Multi-file text codec (the `>>> path` wire format)
//! - `llm/` - Generation capability trait + HTTP provider
//! - `models` - Centralized LLM provider configuration
//! - `state/` - The workflow state threaded through every step
//! - `template/` - Skeleton template rendering
//! - `workflow/` - Routing policy and the graph executor
//! - `materializer` - Writes the final project to disk
//!
//! ## Usage
//!
//! ```rust,ignore
//! use appforge_core::workflow::{WorkflowConfig, WorkflowRunner};
//!
//! let runner = WorkflowRunner::new(llm, WorkflowConfig::default())
//!     .with_renderer(renderer);
//! let state = runner.run("Build a todo app").await?;
//! ```

pub mod agents;
pub mod codec;
pub mod llm;
pub mod materializer;
pub mod models;
pub mod state;
pub mod template;
pub mod workflow;
