//! Turns a one-paragraph story prompt into a formatted screenplay and a set
//! of storyboard frames.
//!
//! The pipeline runs in two passes. `WorkflowManager::generate_screenplay`
//! analyzes the prompt, builds a character roster and writes scenes;
//! `WorkflowManager::generate_storyboard` then scores the screenplay for
//! visually important moments and renders one frame per moment. Text, image
//! and embedding backends are all optional: a stage whose backend is missing
//! or failing produces deterministic fallback output instead of aborting.

pub mod analyzer;
pub mod characters;
pub mod config;
pub mod consistency;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod image;
pub mod llm;
pub mod moments;
pub mod prompts;
pub mod scenes;
pub mod schema;
pub mod visual;
pub mod workflow;

pub use config::Config;
pub use error::StageError;
pub use workflow::{Stage, WorkflowManager};
