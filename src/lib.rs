//! Ghostwriter - a multi-stage LLM reply pipeline served over HTTP.
//!
//! A request walks an ordered chain of model stages (analyzer, imitator,
//! post_editor, masker), each stage feeding its output into the next. The
//! executor injects persona directives and conversation history, projects
//! dollar cost before anything runs, enforces a per-request budget cap, and
//! persists history turns and cost accounting on success.

pub mod chain;
pub mod config;
pub mod costlog;
pub mod error;
pub mod history;
pub mod llm;
pub mod persona;
pub mod pricing;
pub mod prompt;
pub mod server;
pub mod tokens;

pub use error::{GhostwriterError, Result};
