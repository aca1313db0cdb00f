//! # Agent Steps
//!
//! The four role-specialized steps of the pipeline. Each step is a pure
//! function `state -> StateUpdate` over an injected
//! [`LanguageModel`](crate::llm::LanguageModel); nothing here touches the disk.

pub mod architect;
pub mod fixer;
pub mod implementor;
pub mod reviewer;

/// Role instructions bundled at compile time.
pub mod prompts {
    pub const ARCHITECT: &str = include_str!("defaults/architect.md");
    pub const IMPLEMENTOR: &str = include_str!("defaults/implementor.md");
    pub const REVIEWER: &str = include_str!("defaults/reviewer.md");
    pub const FIXER: &str = include_str!("defaults/fixer.md");

}
