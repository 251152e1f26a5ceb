//! Emoji tabletop web server.
//!
//! ```bash
//! cargo run -p tabletop -- --bind 127.0.0.1:5001 --log-level debug
//! ```

use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use tabletop::AppState;
use tabletop_core::{Engine, EngineConfig, SessionConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Command line arguments for the tabletop server.
#[derive(Parser, Debug)]
#[command(name = "tabletop")]
#[command(about = "Emoji tabletop adventure with an AI Dungeon Master")]
#[command(version)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:5001")]
    bind: SocketAddr,

    /// Claude model to use (defaults to the client's model)
    #[arg(long)]
    model: Option<String>,

    /// Seconds to wait for each model call
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    /// Number of game states kept for back/forward navigation
    #[arg(long, default_value_t = 10)]
    history_capacity: usize,

    /// Log level used when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn initialize_logging(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    initialize_logging(&args.log_level);

    let mut engine_config =
        EngineConfig::default().with_timeout(Duration::from_secs(args.timeout_secs));
    if let Some(model) = &args.model {
        engine_config = engine_config.with_model(model);
    }

    let engine = Engine::from_env()
        .context("ANTHROPIC_API_KEY must be set in the environment or a .env file")?
        .with_config(engine_config);
    info!(provider = engine.provider_name(), "engine ready");

    let session_config = SessionConfig::default().with_history_capacity(args.history_capacity);
    let state = AppState::new(engine, session_config)?;

    tabletop::serve(args.bind, state).await
}
