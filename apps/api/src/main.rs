mod config;
mod errors;
mod job_description;
mod llm_client;
mod refinement;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::job_description::scraper::LlmScraper;
use crate::llm_client::{CompletionService, LlmClient};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Refiner API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize completion client
    let llm: Arc<dyn CompletionService> = Arc::new(LlmClient::new(&config)?);
    info!(
        "LLM client initialized (base: {}, default model: {})",
        config.completion_base_url, config.default_model
    );

    // Scraping goes through the same gateway with a browsing-capable model
    let scraper = Arc::new(LlmScraper::new(llm.clone(), config.scrape_model.clone()));
    info!("Job description scraper initialized (model: {})", config.scrape_model);

    info!(
        "Sanitizer: similarity threshold {}, bullet slack {}",
        config.sanitizer.similarity_threshold, config.sanitizer.bullet_slack
    );

    // Build app state
    let state = AppState {
        llm,
        scraper,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
