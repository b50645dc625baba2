use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use eyre::{Context, Result, bail};
use log::info;

use ghostwriter::chain::{MultiModelChain, Stage};
use ghostwriter::config::GlobalConfig;
use ghostwriter::llm::{LlmClient, OpenAiCompatClient};
use ghostwriter::server::{self, AppState};

#[derive(Parser)]
#[command(name = "ghostwriter", about = "Multi-stage LLM reply pipeline")]
struct Cli {
    /// Path to a config file (default: ghostwriter.yml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server (default)
    Serve {
        /// Bind address, overriding the config
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Print the resolved configuration and exit
    Config,
}

fn setup_logging(level: Option<&str>) {
    let mut builder = env_logger::Builder::from_default_env();
    if let Some(level) = level
        && std::env::var("RUST_LOG").is_err()
        && let Ok(filter) = level.parse()
    {
        builder.filter_level(filter);
    }
    builder.init();
}

/// Wire each configured stage to a provider client.
fn build_stages(config: &GlobalConfig) -> Result<Vec<Stage>> {
    config
        .stages
        .iter()
        .map(|stage_config| {
            let client: Arc<dyn LlmClient> = match stage_config.provider.as_str() {
                "openai" => Arc::new(OpenAiCompatClient::openai(&stage_config.model)?),
                "groq" => Arc::new(OpenAiCompatClient::groq(&stage_config.model)?),
                other => bail!(
                    "unknown provider '{}' for stage '{}'",
                    other,
                    stage_config.name
                ),
            };
            Ok(Stage::new(stage_config.clone(), client))
        })
        .collect()
}

async fn serve(config: GlobalConfig, bind_override: Option<String>) -> Result<()> {
    let stages = build_stages(&config)?;
    let pricing = config.pricing_table();
    let chain = MultiModelChain::new(stages, pricing, &config.chain);
    let state = Arc::new(AppState::new(chain));

    let bind = bind_override.unwrap_or_else(|| config.server.bind.clone());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("listening on {}", bind);

    axum::serve(listener, server::router(state))
        .await
        .context("server error")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = GlobalConfig::load(cli.config.as_ref())?;
    setup_logging(config.log_level.as_deref());

    match cli.command {
        Some(Command::Config) => {
            print!("{}", serde_yaml::to_string(&config)?);
            Ok(())
        }
        Some(Command::Serve { bind }) => serve(config, bind).await,
        None => serve(config, None).await,
    }
}
