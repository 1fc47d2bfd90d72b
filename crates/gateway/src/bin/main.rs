// Authgate server

use anyhow::{Context, Result};

use authgate_core::telemetry::{init_tracing, DEFAULT_FILTER};
use authgate_core::GatewayConfig;
use authgate_gateway::{app, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    let dotenv = dotenvy::dotenv();

    init_tracing(DEFAULT_FILTER);
    if dotenv.is_err() {
        tracing::debug!(".env file not found, using process environment");
    }

    tracing::info!("authgate starting...");

    let config = GatewayConfig::from_env();
    tracing::debug!(?config, "configuration loaded");
    let addr = config.bind_addr.clone();

    let state = AppState::from_config(config).context("Failed to initialize gateway")?;
    let app = app(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
