use std::sync::Arc;

use agentbuilder::config::AppConfig;
use agentbuilder::engine::OpenAiBackend;
use agentbuilder::{logging, server, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load a local .env before reading configuration.
    let _ = dotenvy::dotenv();
    logging::init();

    let config = AppConfig::from_env();
    if config.openai_api_key.is_empty() {
        tracing::warn!("OPENAI_API_KEY is not set; upstream model calls will fail");
    }

    let backend = Arc::new(OpenAiBackend::new(&config)?);
    let bind_addr = config.bind_addr;
    let state = Arc::new(AppState::new(config, backend));

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("agentbuilder listening on http://{}", bind_addr);
    axum::serve(listener, server::router(state)).await?;

    Ok(())
}
