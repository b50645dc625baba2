//! Core LLM client types and trait definition

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Role of one message in a stage prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A message in a stage prompt. Order is significant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Result of one client call.
///
/// `metadata` carries provider-reported details; the `model` key names the
/// model that actually served the call and is what cost accounting prices by.
#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub metadata: HashMap<String, String>,
}

impl LlmResponse {
    /// The serving model, if the provider reported one.
    pub fn model(&self) -> Option<&str> {
        self.metadata.get("model").map(String::as_str)
    }
}

/// Stateless LLM client - one call per stage, no shared conversation state.
///
/// Implementations must be safe to invoke concurrently from distinct chains.
/// Failures surface immediately; the chain executor does not retry.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(
        &self,
        messages: &[Message],
        max_output_tokens: Option<u32>,
        temperature: f32,
        top_p: f32,
    ) -> Result<LlmResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), "\"system\"");
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
    }

    #[test]
    fn test_role_deserialization() {
        let system: Role = serde_json::from_str("\"system\"").unwrap();
        let user: Role = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(system, Role::System);
        assert_eq!(user, Role::User);
    }

    #[test]
    fn test_message_constructors() {
        let msg = Message::system("Stay in character.");
        assert_eq!(msg.role, Role::System);
        assert_eq!(msg.content, "Stay in character.");

        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);

        let msg = Message::assistant("Hi there");
        assert_eq!(msg.role, Role::Assistant);
    }

    #[test]
    fn test_response_model_lookup() {
        let mut response = LlmResponse {
            text: "ok".to_string(),
            input_tokens: 10,
            output_tokens: 5,
            metadata: HashMap::new(),
        };
        assert_eq!(response.model(), None);

        response
            .metadata
            .insert("model".to_string(), "gpt-4o-mini".to_string());
        assert_eq!(response.model(), Some("gpt-4o-mini"));
    }

    #[test]
    fn test_response_default_is_empty() {
        let response = LlmResponse::default();
        assert!(response.text.is_empty());
        assert_eq!(response.input_tokens, 0);
        assert_eq!(response.output_tokens, 0);
        assert!(response.metadata.is_empty());
    }
}
