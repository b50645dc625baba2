//! OpenAI-compatible chat completions client.
//!
//! One client type covers every provider speaking the OpenAI wire shape;
//! Groq exposes the same API under a different base URL.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use crate::error::{GhostwriterError, Result};
use crate::llm::client::{LlmClient, LlmResponse, Message};

/// OpenAI chat completions base URL
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Groq's OpenAI-compatible base URL
const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Default per-call timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Configuration for an OpenAI-compatible client
#[derive(Debug, Clone)]
pub struct OpenAiCompatConfig {
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl OpenAiCompatConfig {
    pub fn openai(model: impl Into<String>) -> Self {
        Self {
            base_url: OPENAI_BASE_URL.to_string(),
            model: model.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn groq(model: impl Into<String>) -> Self {
        Self {
            base_url: GROQ_BASE_URL.to_string(),
            model: model.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Client for OpenAI-compatible chat completion endpoints
pub struct OpenAiCompatClient {
    client: Client,
    api_key: String,
    config: OpenAiCompatConfig,
}

impl OpenAiCompatClient {
    /// Create an OpenAI client, reading OPENAI_API_KEY from the environment
    pub fn openai(model: &str) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| GhostwriterError::Llm("OPENAI_API_KEY not set".to_string()))?;
        Self::with_api_key(api_key, OpenAiCompatConfig::openai(model))
    }

    /// Create a Groq client, reading GROQ_API_KEY from the environment
    pub fn groq(model: &str) -> Result<Self> {
        let api_key = std::env::var("GROQ_API_KEY")
            .map_err(|_| GhostwriterError::Llm("GROQ_API_KEY not set".to_string()))?;
        Self::with_api_key(api_key, OpenAiCompatConfig::groq(model))
    }

    /// Create a client with an explicit API key
    pub fn with_api_key(api_key: String, config: OpenAiCompatConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GhostwriterError::Llm(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    /// Build the chat completions request body
    fn build_request(
        &self,
        messages: &[Message],
        max_output_tokens: Option<u32>,
        temperature: f32,
        top_p: f32,
    ) -> Value {
        let messages: Vec<Value> = messages
            .iter()
            .map(|m| {
                json!({
                    "role": m.role.as_str(),
                    "content": m.content,
                })
            })
            .collect();

        let mut body = json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": temperature,
            "top_p": top_p,
        });

        if let Some(max_tokens) = max_output_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        body
    }

    /// Parse the API response into an LlmResponse
    fn parse_response(&self, body: Value) -> Result<LlmResponse> {
        let text = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                GhostwriterError::Llm("response carried no message content".to_string())
            })?
            .to_string();

        let input_tokens = body["usage"]["prompt_tokens"].as_u64().unwrap_or(0);
        let output_tokens = body["usage"]["completion_tokens"].as_u64().unwrap_or(0);

        // The serving model may differ from the requested alias; record what
        // the provider reports so accounting prices the real thing.
        let model = body["model"]
            .as_str()
            .unwrap_or(&self.config.model)
            .to_string();

        let mut metadata = HashMap::new();
        metadata.insert("model".to_string(), model);

        Ok(LlmResponse {
            text,
            input_tokens,
            output_tokens,
            metadata,
        })
    }

    /// Send a request to the chat completions endpoint
    async fn send_request(&self, body: Value) -> Result<Value> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| GhostwriterError::Llm(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GhostwriterError::Llm(format!(
                "API error {}: {}",
                status, error_body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| GhostwriterError::Llm(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    async fn generate(
        &self,
        messages: &[Message],
        max_output_tokens: Option<u32>,
        temperature: f32,
        top_p: f32,
    ) -> Result<LlmResponse> {
        let body = self.build_request(messages, max_output_tokens, temperature, top_p);
        let response = self.send_request(body).await?;
        self.parse_response(response)
    }
}

impl std::fmt::Debug for OpenAiCompatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish()
    }
}
