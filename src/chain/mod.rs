//! Multi-stage chain execution.
//!
//! `MultiModelChain` drives the configured stage sequence for one request:
//! load persona and history, assemble prompts, project cost against the
//! budget cap, run each stage feeding its output into the next, then
//! persist history and the cost log record on success.

pub mod projector;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ChainSettings;
use crate::costlog::{CostLogRecord, CostLogWriter};
use crate::error::{GhostwriterError, Result};
use crate::history::{HistoryStore, HistoryTurn, trim_turns};
use crate::llm::{LlmClient, Message};
use crate::persona::PersonaStore;
use crate::pricing::PricingTable;
use crate::prompt::{PromptInputs, assemble_stage_messages};

/// Semantic function of a stage within the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageRole {
    Analyzer,
    Imitator,
    PostEditor,
    Masker,
}

impl StageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageRole::Analyzer => "analyzer",
            StageRole::Imitator => "imitator",
            StageRole::PostEditor => "post_editor",
            StageRole::Masker => "masker",
        }
    }
}

/// Immutable description of one pipeline step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    pub role: StageRole,
    pub name: String,
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

/// A stage config paired with the client that executes it
#[derive(Clone)]
pub struct Stage {
    pub config: StageConfig,
    pub client: Arc<dyn LlmClient>,
}

impl Stage {
    pub fn new(config: StageConfig, client: Arc<dyn LlmClient>) -> Self {
        Self { config, client }
    }
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage").field("config", &self.config).finish()
    }
}

/// Incoming chain request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainRequest {
    /// Free-text conversation context, used when no conversation_id is given
    #[serde(default)]
    pub history: Option<String>,
    pub user_input: String,
    /// Open settings mapping; `target_words` is recognized
    #[serde(default)]
    pub settings: serde_json::Map<String, Value>,
    #[serde(default)]
    pub persona_id: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

impl ChainRequest {
    pub fn target_words(&self) -> Option<u64> {
        self.settings.get("target_words").and_then(Value::as_u64)
    }
}

/// Accounting for one executed stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageCall {
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
    pub latency_s: f64,
}

/// Aggregated result of one chain run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainResponse {
    pub output: String,
    pub latency_s: f64,
    pub cost_usd: f64,
    pub calls: BTreeMap<String, StageCall>,
}

/// The chain executor. Stages are fixed at construction; each run is an
/// independent task so distinct requests can execute concurrently.
pub struct MultiModelChain {
    stages: Vec<Stage>,
    pricing: PricingTable,
    cost_cap_usd: f64,
    history_max_tokens: u64,
    history: HistoryStore,
    personas: PersonaStore,
    cost_log: CostLogWriter,
}

impl MultiModelChain {
    pub fn new(stages: Vec<Stage>, pricing: PricingTable, settings: &ChainSettings) -> Self {
        Self {
            stages,
            pricing,
            cost_cap_usd: settings.cost_cap_usd,
            history_max_tokens: settings.history_max_tokens,
            history: HistoryStore::new(&settings.history_dir),
            personas: PersonaStore::new(&settings.persona_dir),
            cost_log: CostLogWriter::new(&settings.cost_log_path),
        }
    }

    /// Run the full chain for one request.
    ///
    /// On budget rejection nothing is invoked and nothing is persisted; on a
    /// stage failure the chain aborts with no history append and no cost log
    /// entry.
    pub async fn run(&self, request: &ChainRequest) -> Result<ChainResponse> {
        if request.user_input.trim().is_empty() {
            return Err(GhostwriterError::EmptyInput);
        }

        let start = Instant::now();

        let persona = match &request.persona_id {
            Some(id) => self.personas.load(id)?,
            None => None,
        };

        // conversation_id wins over the free-text history block
        let (turns, freeform) = match &request.conversation_id {
            Some(id) => {
                let loaded = self.history.load(id)?;
                (trim_turns(loaded, self.history_max_tokens), None)
            }
            None => (Vec::new(), request.history.as_deref()),
        };

        let target_words = request.target_words();
        let inputs = PromptInputs {
            persona: persona.as_deref(),
            history: &turns,
            freeform_history: freeform,
            user_input: &request.user_input,
            previous_output: None,
            target_words,
        };

        // Assemble every stage's prompt up front so projection covers the
        // whole plan before anything runs.
        let planned: Vec<Vec<Message>> = self
            .stages
            .iter()
            .map(|stage| assemble_stage_messages(stage.config.role, &inputs))
            .collect();

        let projected =
            projector::project_chain_cost(&self.stages, &planned, &self.pricing, target_words)?;
        projector::check_budget(projected, self.cost_cap_usd)?;
        debug!(
            "projected cost ${:.6} within cap ${:.6}",
            projected, self.cost_cap_usd
        );

        let mut calls = BTreeMap::new();
        let mut previous_output: Option<String> = None;
        let mut total_cost = 0.0;

        for (i, stage) in self.stages.iter().enumerate() {
            let messages = if i == 0 {
                planned[0].clone()
            } else {
                let inputs = PromptInputs {
                    previous_output: previous_output.as_deref(),
                    ..inputs
                };
                assemble_stage_messages(stage.config.role, &inputs)
            };

            debug!(
                "stage {} ({}) starting with {} messages",
                stage.config.name,
                stage.config.model,
                messages.len()
            );
            let (call, text) = self.execute_stage(stage, &messages).await?;
            debug!(
                "stage {} finished: {} in / {} out, ${:.6}, {:.3}s",
                stage.config.name,
                call.input_tokens,
                call.output_tokens,
                call.cost_usd,
                call.latency_s
            );

            total_cost += call.cost_usd;
            calls.insert(stage.config.role.as_str().to_string(), call);
            previous_output = Some(text);
        }

        let output = previous_output.unwrap_or_default();
        let latency_s = start.elapsed().as_secs_f64();

        // History first: a failed append must surface before we report success.
        if let Some(conversation_id) = &request.conversation_id {
            self.history.append(
                conversation_id,
                &[
                    HistoryTurn::user(request.user_input.clone()),
                    HistoryTurn::assistant(output.clone()),
                ],
            )?;
        }

        let record = CostLogRecord {
            timestamp: chrono::Utc::now(),
            conversation_id: request.conversation_id.clone(),
            total_cost_usd: total_cost,
            total_latency_s: latency_s,
            calls: calls.clone(),
        };
        if let Err(e) = self.cost_log.append(&record) {
            warn!(
                "cost log write failed ({}): {}",
                self.cost_log.path().display(),
                e
            );
        }

        info!(
            "chain complete: {} stages, ${:.6}, {:.3}s",
            self.stages.len(),
            total_cost,
            latency_s
        );

        Ok(ChainResponse {
            output,
            latency_s,
            cost_usd: total_cost,
            calls,
        })
    }

    /// Invoke one stage's client and account for the call.
    async fn execute_stage(&self, stage: &Stage, messages: &[Message]) -> Result<(StageCall, String)> {
        let stage_start = Instant::now();
        let response = stage
            .client
            .generate(
                messages,
                stage.config.max_output_tokens,
                stage.config.temperature,
                stage.config.top_p,
            )
            .await?;
        let latency_s = stage_start.elapsed().as_secs_f64();

        // Price by the model the provider reports as having served the call;
        // fall back to the configured model if the client omitted it.
        let model = response
            .model()
            .unwrap_or(&stage.config.model)
            .to_string();
        let model_pricing = self.pricing.lookup(&model)?;
        let cost_usd = model_pricing.cost_usd(response.input_tokens, response.output_tokens);

        let call = StageCall {
            model,
            input_tokens: response.input_tokens,
            output_tokens: response.output_tokens,
            cost_usd,
            latency_s,
        };
        Ok((call, response.text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_role_strings() {
        assert_eq!(StageRole::Analyzer.as_str(), "analyzer");
        assert_eq!(StageRole::Imitator.as_str(), "imitator");
        assert_eq!(StageRole::PostEditor.as_str(), "post_editor");
        assert_eq!(StageRole::Masker.as_str(), "masker");
    }

    #[test]
    fn test_stage_role_serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&StageRole::PostEditor).unwrap(),
            "\"post_editor\""
        );
        let role: StageRole = serde_json::from_str("\"masker\"").unwrap();
        assert_eq!(role, StageRole::Masker);
    }

    #[test]
    fn test_request_deserialization_minimal() {
        let request: ChainRequest =
            serde_json::from_str("{\"user_input\":\"Hello\"}").unwrap();
        assert_eq!(request.user_input, "Hello");
        assert_eq!(request.history, None);
        assert_eq!(request.persona_id, None);
        assert_eq!(request.conversation_id, None);
        assert_eq!(request.target_words(), None);
    }

    #[test]
    fn test_request_target_words() {
        let request: ChainRequest = serde_json::from_str(
            "{\"user_input\":\"Hi\",\"settings\":{\"target_words\":1000,\"other\":true}}",
        )
        .unwrap();
        assert_eq!(request.target_words(), Some(1000));
    }

    #[test]
    fn test_response_serialization_shape() {
        let mut calls = BTreeMap::new();
        calls.insert(
            "masker".to_string(),
            StageCall {
                model: "llama-3.1-8b".to_string(),
                input_tokens: 1100,
                output_tokens: 1100,
                cost_usd: 0.000143,
                latency_s: 0.5,
            },
        );
        let response = ChainResponse {
            output: "Final story".to_string(),
            latency_s: 1.2,
            cost_usd: 0.000143,
            calls,
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["output"], "Final story");
        assert_eq!(json["calls"]["masker"]["model"], "llama-3.1-8b");
        assert_eq!(json["calls"]["masker"]["input_tokens"], 1100);
    }
}
