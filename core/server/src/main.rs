//! Study Desk HTTP service
//!
//! Usage:
//!   study-desk [--db-path <path>] [--addr <host:port>]
//!
//! Everything else is configured through the environment; see `AppConfig`.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use study_desk_engine::{ReviewScheduler, SystemClock};
use study_desk_server::{cors_layer, router, AppConfig, AppState, Database, OpenAICompatibleClient};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "study-desk")]
#[command(about = "Learning assistant backend: notes, reading, writing, practice and wellbeing tools")]
struct Args {
    /// Path to SQLite database file (overrides STUDY_DESK_DB_PATH)
    #[arg(long, short)]
    db_path: Option<PathBuf>,

    /// Address to listen on (overrides STUDY_DESK_ADDR)
    #[arg(long)]
    addr: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Study Desk v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    let mut config = AppConfig::from_env()?;
    if let Some(db_path) = args.db_path {
        config.db_path = db_path;
    }
    if let Some(addr) = args.addr {
        config.addr = addr;
    }

    if let Some(parent) = config.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    info!("Database: {}", config.db_path.display());
    let db = Database::new(&config.db_path)?;

    info!("LLM: {} ({})", config.llm.model, config.llm.base_url);
    if config.llm.api_key.is_none() {
        warn!("LLM_API_KEY is not set; model-backed endpoints will likely fail");
    }
    let llm = OpenAICompatibleClient::new(config.llm.clone())?;

    let scheduler = ReviewScheduler::new(config.review_intervals.clone(), Arc::new(SystemClock))
        .context("Invalid STUDY_DESK_REVIEW_INTERVALS")?;
    info!("Review intervals (days): {:?}", scheduler.intervals());

    let state = AppState::new(db, Arc::new(llm), scheduler);

    let app = router(state)
        .layer(cors_layer(&config.cors_origins)?)
        .layer(TraceLayer::new_for_http());

    info!("Starting HTTP server on {}", config.addr);

    let listener = tokio::net::TcpListener::bind(&config.addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
