//! StudyForge server binary

use anyhow::{Context, Result};
use std::net::SocketAddr;
use studyforge_study_service::{create_app, AppState};
use studyforge_utils::{init_logging, AppConfig};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration ({}), using defaults", e);
        AppConfig::default()
    });

    init_logging(&config.logging)?;
    info!("Starting StudyForge");

    if config.generation.api_key.is_empty() {
        warn!("No LLM API key configured; generation requests will fail");
    }

    config
        .extraction
        .ensure_dirs()
        .context("Failed to create temp directories")?;

    let state = AppState::from_config(&config)?;
    let app = create_app(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    let listener = TcpListener::bind(&addr).await?;
    info!("StudyForge listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
