//! Bug Whisperer: a log-stream error watcher with a memory of past fixes.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use bugwhisper_core::BugWhisperConfig;
use bugwhisper_runtime::{Consumer, Producer};
use bugwhisper_server::{build_router, AppState};
use bugwhisper_store::SqliteStore;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bugwhisper")]
#[command(about = "Watches a log stream for errors and suggests fixes")]
#[command(version)]
struct Cli {
    /// Data directory (database, models, LLM config)
    #[arg(long, global = true, env = "BUGWHISPER_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the web dashboard (default)
    Serve,
    /// Diagnose every error posted to the log stream
    Consume,
    /// Post the demo errors to the log stream
    Produce,
    /// Check that the bug memory store is reachable
    Ping,
    /// Diagnose a single error and print the suggestion
    Diagnose {
        /// Error text; multiple words are joined with spaces
        #[arg(required = true)]
        error: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = BugWhisperConfig::from_env(&cli.data_dir)
        .with_context(|| format!("invalid configuration for {}", cli.data_dir.display()))?;
    info!("Data directory: {}", cli.data_dir.display());

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Consume => consume(config).await,
        Command::Produce => produce(config).await,
        Command::Ping => ping(&config),
        Command::Diagnose { error } => diagnose(config, &error.join(" ")).await,
    }
}

async fn serve(config: BugWhisperConfig) -> anyhow::Result<()> {
    let port = config.port;
    let state = Arc::new(AppState::open(config).context("failed to initialize")?);
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Bug Whisperer dashboard listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn consume(config: BugWhisperConfig) -> anyhow::Result<()> {
    let state = AppState::open(config).context("failed to initialize")?;
    let consumer = Consumer::from_config(&state.config, state.orchestrator.clone());

    tokio::select! {
        result = consumer.run() => result.context("consumer stopped")?,
        _ = tokio::signal::ctrl_c() => info!("Interrupted; resuming from last checkpoint on restart"),
    }
    Ok(())
}

async fn produce(config: BugWhisperConfig) -> anyhow::Result<()> {
    let store = Arc::new(SqliteStore::open(&config.data_paths.memory, config.embedding_dim)?);
    let producer = Producer::from_config(&config, store);
    producer.run().await?;
    Ok(())
}

fn ping(config: &BugWhisperConfig) -> anyhow::Result<()> {
    match bugwhisper_runtime::ping(&config.data_paths.memory, config.embedding_dim) {
        Ok(true) => {
            println!("PONG: true");
            Ok(())
        }
        Ok(false) => {
            println!("PONG: false");
            std::process::exit(1);
        }
        Err(e) => {
            println!("Connection failed: {}", e);
            std::process::exit(1);
        }
    }
}

async fn diagnose(config: BugWhisperConfig, error: &str) -> anyhow::Result<()> {
    let state = AppState::open(config).context("failed to initialize")?;
    let diagnosis = state.orchestrator.diagnose(error).await?;
    println!("{}", diagnosis.message());
    Ok(())
}
