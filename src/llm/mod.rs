//! LLM client layer
//!
//! This module provides:
//! - Message types shared by every stage prompt
//! - The single-method LlmClient contract the chain executor consumes
//! - An OpenAI-compatible implementation covering the openai and groq providers

pub mod client;
pub mod openai;

pub use client::{LlmClient, LlmResponse, Message, Role};
pub use openai::{OpenAiCompatClient, OpenAiCompatConfig};
