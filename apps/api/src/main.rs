mod config;
mod errors;
mod history;
mod llm_client;
mod routes;
mod state;
mod summary;
mod system_prompts;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{AppSettings, Config};
use crate::llm_client::BedrockClient;
use crate::routes::build_router;
use crate::state::AppState;
use crate::summary::SummaryRequest;

#[derive(Parser, Debug)]
#[command(
    name = "case-summary",
    about = "Case summary generator backed by history references",
    version
)]
struct Cli {
    /// Settings file (defaults to CASE_SUMMARY_CONFIG or ./config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    host: Option<String>,

    #[arg(short, long)]
    port: Option<u16>,

    /// Force debug logging
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP server (default)
    Serve,
    /// Summarize one case read from a file or stdin, then exit
    Summarize {
        #[arg(short, long)]
        file: Option<PathBuf>,

        #[arg(short, long)]
        model: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(path) = cli.config {
        config.settings_path = path;
    }
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if cli.debug {
        config.rust_log = "debug".to_string();
    }

    // Initialize structured logging
    let default_filter = format!(
        "{}={}",
        env!("CARGO_PKG_NAME").replace('-', "_"),
        &config.rust_log
    );
    let filter = if cli.debug {
        EnvFilter::new(default_filter)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Case Summary v{}", env!("CARGO_PKG_VERSION"));

    let settings = AppSettings::load(&config.settings_path)
        .with_context(|| format!("loading settings from {}", config.settings_path.display()))?;

    // Initialize model client
    let region = config
        .aws_region
        .clone()
        .unwrap_or_else(|| settings.bedrock.region.clone());
    let client = Arc::new(BedrockClient::new(region, config.bedrock_api_key.clone()));
    info!("Bedrock client initialized (region: {})", client.region());

    let state = AppState::new(settings, client).context("initializing system prompts")?;
    info!(
        "Active system prompt: {} (history: {})",
        state.prompts.active_name(),
        state.prompts.current_history_folder().display()
    );

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(state, &config).await,
        Command::Summarize { file, model } => summarize(state, file, model).await,
    }
}

async fn serve(state: AppState, config: &Config) -> Result<()> {
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn summarize(state: AppState, file: Option<PathBuf>, model: Option<String>) -> Result<()> {
    let case_input = match file {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading case from {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("reading case from stdin")?;
            buffer
        }
    };

    let request = SummaryRequest {
        case_input,
        model_id: model,
        system_prompt: None,
    };
    let outcome = state.summaries.process_case_summary(&request).await?;
    info!("Summary generated with {}", outcome.model_id);
    println!("{}", outcome.summary);
    Ok(())
}
