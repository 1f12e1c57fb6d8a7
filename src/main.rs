mod config;
mod error;
mod models;
mod routes;
mod services;
mod views;

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::Config::from_env()?;

    // Create the generation client and the one wizard session
    let generator = Arc::new(services::llm::GeminiClient::new(&config)?);
    let session = services::session::Session::new(generator);

    let app = routes::router(routes::AppState { session });

    let listener = TcpListener::bind(config.bind).await?;
    tracing::info!(model = %config.model, "Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
