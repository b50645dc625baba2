//! Service configuration.
//!
//! Loaded from ghostwriter.yml with serde defaults. Search order:
//! 1. Explicit path if provided
//! 2. ./ghostwriter.yml (project config)
//! 3. ~/.config/ghostwriter/ghostwriter.yml (user config)
//! 4. Default values
//!
//! Environment overrides (HISTORY_DIR, PERSONA_DIR, COST_LOG_PATH,
//! COST_CAP_USD) are resolved once at load time; nothing reads the
//! environment after startup.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use eyre::{Context, Result, bail};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::chain::{StageConfig, StageRole};
use crate::pricing::{ModelPricing, PricingTable};

/// Global configuration for Ghostwriter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// HTTP server settings.
    pub server: ServerConfig,

    /// Chain executor settings.
    pub chain: ChainSettings,

    /// Ordered stage list; the pipeline runs these top to bottom.
    pub stages: Vec<StageConfig>,

    /// Pricing overrides merged over the built-in table.
    pub pricing: HashMap<String, ModelPricing>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            server: ServerConfig::default(),
            chain: ChainSettings::default(),
            stages: default_stages(),
            pricing: HashMap::new(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address for the HTTP listener.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Settings threaded into the chain executor at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainSettings {
    /// Hard cap on projected per-request cost.
    pub cost_cap_usd: f64,
    /// Token budget for loaded conversation history.
    pub history_max_tokens: u64,
    /// Directory of per-conversation JSONL history files.
    pub history_dir: PathBuf,
    /// Directory of persona directive text files.
    pub persona_dir: PathBuf,
    /// Line-delimited JSON cost log.
    pub cost_log_path: PathBuf,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            cost_cap_usd: 0.05,
            history_max_tokens: 30_000,
            history_dir: PathBuf::from("data/history"),
            persona_dir: PathBuf::from("data/personas"),
            cost_log_path: PathBuf::from("data/costs.jsonl"),
        }
    }
}

/// The stock four-stage pipeline.
fn default_stages() -> Vec<StageConfig> {
    vec![
        StageConfig {
            role: StageRole::Analyzer,
            name: "analyzer".to_string(),
            provider: "groq".to_string(),
            model: "llama-3.1-8b".to_string(),
            temperature: 0.1,
            top_p: 0.9,
            max_output_tokens: None,
        },
        StageConfig {
            role: StageRole::Imitator,
            name: "imitator".to_string(),
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.75,
            top_p: 0.95,
            max_output_tokens: None,
        },
        StageConfig {
            role: StageRole::PostEditor,
            name: "post_editor".to_string(),
            provider: "groq".to_string(),
            model: "llama-3.3-70b".to_string(),
            temperature: 0.4,
            top_p: 0.9,
            max_output_tokens: None,
        },
        StageConfig {
            role: StageRole::Masker,
            name: "masker".to_string(),
            provider: "groq".to_string(),
            model: "llama-3.1-8b".to_string(),
            temperature: 0.65,
            top_p: 0.95,
            max_output_tokens: None,
        },
    ]
}

impl GlobalConfig {
    /// Load configuration with the fallback chain, apply environment
    /// overrides, and validate.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Self::load_file(config_path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn load_file(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            debug!("loading config from explicit path: {}", path.display());
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            return serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config: {}", path.display()));
        }

        let local = PathBuf::from("ghostwriter.yml");
        if local.exists() {
            let content = fs::read_to_string(&local).context("Failed to read ghostwriter.yml")?;
            return serde_yaml::from_str(&content).context("Failed to parse ghostwriter.yml");
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user = config_dir.join("ghostwriter").join("ghostwriter.yml");
            if user.exists() {
                let content = fs::read_to_string(&user)
                    .with_context(|| format!("Failed to read config: {}", user.display()))?;
                return serde_yaml::from_str(&content)
                    .with_context(|| format!("Failed to parse config: {}", user.display()));
            }
        }

        Ok(Self::default())
    }

    /// Fold startup environment into the chain settings.
    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("HISTORY_DIR") {
            self.chain.history_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("PERSONA_DIR") {
            self.chain.persona_dir = PathBuf::from(dir);
        }
        if let Ok(path) = std::env::var("COST_LOG_PATH") {
            self.chain.cost_log_path = PathBuf::from(path);
        }
        if let Ok(cap) = std::env::var("COST_CAP_USD")
            && let Ok(cap) = cap.parse::<f64>()
        {
            self.chain.cost_cap_usd = cap;
        }
    }

    /// Reject configurations the executor cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.stages.is_empty() {
            bail!("at least one stage must be configured");
        }
        if self.chain.cost_cap_usd < 0.0 {
            bail!("cost_cap_usd must be non-negative");
        }
        if self.chain.history_max_tokens == 0 {
            bail!("history_max_tokens must be positive");
        }

        let pricing = self.pricing_table();
        for stage in &self.stages {
            if !(0.0..=2.0).contains(&stage.temperature) {
                bail!(
                    "stage '{}': temperature {} outside [0, 2]",
                    stage.name,
                    stage.temperature
                );
            }
            if !(0.0..=1.0).contains(&stage.top_p) {
                bail!("stage '{}': top_p {} outside [0, 1]", stage.name, stage.top_p);
            }
            if pricing.lookup(&stage.model).is_err() {
                bail!("stage '{}': no pricing for model '{}'", stage.name, stage.model);
            }
        }
        Ok(())
    }

    /// Built-in pricing with config overrides merged in.
    pub fn pricing_table(&self) -> PricingTable {
        let mut table = PricingTable::builtin();
        for (model, pricing) in &self.pricing {
            table.insert(model.clone(), *pricing);
        }
        table
    }
}
