//! Model pricing table.
//!
//! Read-only mapping from model identifier to per-million-token USD rates.
//! A lookup miss is a configuration error: billing silently at $0 would let
//! requests through the budget guard unmetered.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{GhostwriterError, Result};

/// Per-million-token USD rates for one model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_usd_per_mtok: f64,
    pub output_usd_per_mtok: f64,
}

impl ModelPricing {
    pub const fn new(input_usd_per_mtok: f64, output_usd_per_mtok: f64) -> Self {
        Self {
            input_usd_per_mtok,
            output_usd_per_mtok,
        }
    }

    /// Cost of one call: `(in * p_in + out * p_out) / 1e6`.
    pub fn cost_usd(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 * self.input_usd_per_mtok
            + output_tokens as f64 * self.output_usd_per_mtok)
            / 1_000_000.0
    }
}

/// Pricing entries for the models the default pipeline runs on.
const BUILTIN_PRICING: &[(&str, ModelPricing)] = &[
    // Groq-hosted Llama
    ("llama-3.1-8b", ModelPricing::new(0.05, 0.08)),
    ("llama-3.3-70b", ModelPricing::new(0.59, 0.79)),
    ("mixtral-8x7b", ModelPricing::new(0.24, 0.24)),
    // OpenAI
    ("gpt-4o", ModelPricing::new(2.50, 10.0)),
    ("gpt-4o-mini", ModelPricing::new(0.15, 0.60)),
    ("gpt-4.1-mini", ModelPricing::new(0.40, 1.60)),
];

/// Immutable model -> pricing lookup, shared read-only across chains.
#[derive(Debug, Clone)]
pub struct PricingTable {
    prices: HashMap<String, ModelPricing>,
}

impl PricingTable {
    /// Table with the built-in entries only.
    pub fn builtin() -> Self {
        let prices = BUILTIN_PRICING
            .iter()
            .map(|(model, pricing)| (model.to_string(), *pricing))
            .collect();
        Self { prices }
    }

    /// Add or override one entry.
    pub fn insert(&mut self, model: impl Into<String>, pricing: ModelPricing) {
        self.prices.insert(model.into(), pricing);
    }

    /// Look up pricing for a model, stripping any `provider/` prefix
    /// (e.g. "groq/llama-3.1-8b" -> "llama-3.1-8b").
    pub fn lookup(&self, model: &str) -> Result<ModelPricing> {
        let name = model.rsplit_once('/').map(|(_, m)| m).unwrap_or(model);
        self.prices
            .get(name)
            .copied()
            .ok_or_else(|| GhostwriterError::UnknownModel(model.to_string()))
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::builtin()
    }
}
