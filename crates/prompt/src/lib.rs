//! Prompt system for askwell.
//!
//! This crate provides structured prompt management with:
//! - Built-in prompt definitions for retrieval and code generation
//! - YAML overrides in `.askwell/prompts/<id>.yml`
//! - Handlebars template rendering

pub mod builder;
pub mod builtin;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use builtin::{builtin_prompt, CODEGEN_DEFAULT, RAG_CONCISE, RAG_DETAILED};
pub use loader::load_prompt;
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition, PromptOutputSpec};
