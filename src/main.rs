use a2a_bridge::bridge::executor::BridgeExecutor;
use a2a_bridge::bridge::session::SessionRegistry;
use a2a_bridge::bridge::TaskBridge;
use a2a_bridge::card::build_agent_card;
use a2a_bridge::client::ClientConfig;
use a2a_bridge::config::BridgeConfig;
use a2a_bridge::orchestrator::{CallAgentTool, ListAgentsTool, Orchestrator};
use a2a_bridge::provider::{GeminiConfig, GeminiProvider};
use a2a_bridge::server::{run_server, ServerState};
use a2a_bridge::tools::{FirecrawlFetcher, ScrapeTool, ToolSet};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the scraping agent over A2A JSON-RPC
    Serve {
        /// Interface to bind
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
        /// URL advertised in the agent card
        #[arg(long)]
        public_url: Option<String>,
        /// Optional TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve {
            host,
            port,
            public_url,
            config,
        } => {
            let mut config = BridgeConfig::load(config.as_deref()).context("loading configuration")?;
            config.apply_cli(host, port, public_url);
            if let Err(e) = config.validate() {
                error!(error = %e, "Configuration error.");
                return Err(e.into());
            }
            serve(config).await
        }
    }
}

fn build_tools(config: &BridgeConfig) -> Result<ToolSet> {
    let firecrawl_key = config.fetch.firecrawl_api_key.as_deref().unwrap_or_default();
    let fetcher = FirecrawlFetcher::new(
        firecrawl_key,
        &config.fetch.base_url,
        Duration::from_secs(config.fetch.timeout_seconds),
    )
    .context("creating content fetcher")?;
    let mut tools = ToolSet::new().with_tool(Arc::new(ScrapeTool::new(Arc::new(fetcher))));

    if config.orchestrator.expose_tools {
        let orchestrator = Arc::new(Orchestrator::new(
            &config.orchestrator.registry_url,
            ClientConfig::with_timeout(config.orchestrator.timeout()),
        ));
        tools = tools
            .with_tool(Arc::new(ListAgentsTool::new(orchestrator.clone())))
            .with_tool(Arc::new(CallAgentTool::new(orchestrator)));
    }
    Ok(tools)
}

async fn serve(config: BridgeConfig) -> Result<()> {
    let mut gemini = GeminiConfig::new(config.llm.google_api_key.as_deref().unwrap_or_default());
    gemini.base_url = config.llm.base_url.clone();
    gemini.model = config.llm.model.clone();
    gemini.instruction = config.llm.instruction.clone();
    gemini.agent_name = config.agent.name.clone();
    gemini.max_tool_rounds = config.llm.max_tool_rounds;
    gemini.timeout = Duration::from_secs(config.llm.timeout_seconds);

    let provider = GeminiProvider::new(gemini, build_tools(&config)?).context("creating Gemini provider")?;
    let bridge = Arc::new(TaskBridge::new(Arc::new(provider), Arc::new(SessionRegistry::default())));
    let executor = Arc::new(BridgeExecutor::new(bridge));

    let host = config.server.resolved_host();
    let port = config.server.resolved_port();
    let card = build_agent_card(&config.agent, &config.server.resolved_public_url());
    info!(name = %card.name, url = %card.url, "Serving agent.");

    let state = Arc::new(ServerState::new(executor, card));
    let shutdown_token = CancellationToken::new();
    let handle = run_server(&host, port, state, shutdown_token.clone())
        .await
        .with_context(|| format!("starting server on {}:{}", host, port))?;

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C.");
            signal_token.cancel();
        }
    });

    handle.join_handle.await.context("server task panicked")??;
    info!("Server stopped.");
    Ok(())
}
