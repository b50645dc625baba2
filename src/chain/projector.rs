//! Pre-flight cost projection and budget guard.
//!
//! Projects the dollar cost of the whole chain from the assembled prompts
//! before any stage runs, so an over-cap request is refused with zero side
//! effects. Projection only; billing always uses provider-reported counts.

use crate::chain::Stage;
use crate::error::{GhostwriterError, Result};
use crate::llm::Message;
use crate::pricing::PricingTable;
use crate::tokens::estimate_tokens;

/// Projected output tokens when neither the stage nor the request bounds it.
pub const DEFAULT_OUTPUT_TOKENS: u64 = 1024;

/// Tokens-per-word expansion used to turn a word target into a token bound.
const TOKENS_PER_WORD: f64 = 1.6;

/// Projected output tokens for one stage.
pub fn projected_output_tokens(max_output_tokens: Option<u32>, target_words: Option<u64>) -> u64 {
    let heuristic = match target_words {
        Some(words) => (words as f64 * TOKENS_PER_WORD).ceil() as u64,
        None => DEFAULT_OUTPUT_TOKENS,
    };
    let stage_cap = max_output_tokens.map(u64::from).unwrap_or(DEFAULT_OUTPUT_TOKENS);
    heuristic.min(stage_cap)
}

fn estimate_messages(messages: &[Message]) -> u64 {
    messages
        .iter()
        .map(|m| estimate_tokens(m.role.as_str()) + estimate_tokens(&m.content))
        .sum()
}

/// Project the total cost of running every stage.
///
/// The first stage is priced from its assembled prompt directly; each later
/// stage additionally carries the projected output of the stage before it,
/// standing in for the previous-output message it will receive at run time.
pub fn project_chain_cost(
    stages: &[Stage],
    planned_prompts: &[Vec<Message>],
    pricing: &PricingTable,
    target_words: Option<u64>,
) -> Result<f64> {
    let mut total = 0.0;
    let mut carried_output: u64 = 0;

    for (i, (stage, messages)) in stages.iter().zip(planned_prompts).enumerate() {
        let mut input_tokens = estimate_messages(messages);
        if i > 0 {
            input_tokens += carried_output;
        }

        let output_tokens =
            projected_output_tokens(stage.config.max_output_tokens, target_words);
        let model_pricing = pricing.lookup(&stage.config.model)?;
        total += model_pricing.cost_usd(input_tokens, output_tokens);
        carried_output = output_tokens;
    }

    Ok(total)
}

/// Refuse the request when the projection is over the cap.
pub fn check_budget(projected: f64, cost_cap_usd: f64) -> Result<()> {
    if projected > cost_cap_usd {
        return Err(GhostwriterError::BudgetExceeded {
            projected,
            cap: cost_cap_usd,
        });
    }
    Ok(())
}
