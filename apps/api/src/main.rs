mod auth;
mod config;
mod cv;
mod errors;
mod github;
mod jobs;
mod llm_client;
mod routes;
mod state;
mod storage;
mod users;
mod webhooks;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::cv::SummaryWriter;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::{CvStorage, MemoryStorage, S3Storage};

#[tokio::main]
async fn main() -> Result<()> {
    // Fails fast on missing required env vars
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={},tower_http=info",
                env!("CARGO_CRATE_NAME"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Borg-Tools API v{} ({})",
        env!("CARGO_PKG_VERSION"),
        config.environment
    );

    let storage: Arc<dyn CvStorage> = match &config.s3 {
        Some(s3) => Arc::new(S3Storage::connect(s3).await),
        None => {
            if config.is_production() {
                warn!("No S3 bucket configured; rendered CVs are kept in memory");
            }
            Arc::new(MemoryStorage::new())
        }
    };
    info!("CV storage initialized (backend: {})", storage.backend());

    let llm = config
        .anthropic_api_key
        .clone()
        .map(LlmClient::new)
        .transpose()?;
    let summaries = SummaryWriter::new(llm);
    if summaries.uses_llm() {
        info!("LLM summaries enabled (model: {})", llm_client::MODEL);
    } else {
        info!("ANTHROPIC_API_KEY not set; using heuristic summaries");
    }

    let cors = cors_layer(&config.cors_origins)?;
    let port = config.port;
    let state = AppState::new(config, storage, summaries)?;

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|o| {
            o.parse::<HeaderValue>()
                .with_context(|| format!("Invalid CORS origin: {o}"))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any))
}
