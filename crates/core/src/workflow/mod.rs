//! # Workflow Orchestration
//!
//! Wires the four agent steps and the routing policy into the pipeline
//! graph and drives it to completion.
//!
//! ## Topology
//!
//! ```text
//! architect → implementor → reviewer → {router} →(accept) complete
//!                               ▲           │
//!                               └── fixer ◄─┘ (refactor)
//! ```

pub mod config;
pub mod events;
pub mod pipeline;
pub mod runner;

pub use config::WorkflowConfig;
pub use events::{WorkflowEvent, WorkflowEventKind};
pub use pipeline::{route_after_review, Verdict, WorkflowStage};
pub use runner::{WorkflowError, WorkflowRunner};
