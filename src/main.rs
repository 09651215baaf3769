mod config;
mod error;
mod gemini;
mod line;
mod relay;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::gemini::GeminiClient;
use crate::line::LineClient;
use crate::relay::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,line_gemini_relay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Outside production, secrets come from a local .env file
    if config::is_development() {
        dotenvy::dotenv().ok();
    }

    let config = Config::from_env().context("Failed to load configuration")?;

    info!("Configuration loaded");
    info!("  Model: {}", config.gemini.model);
    info!("  Port: {}", config.port);

    let generator = Arc::new(GeminiClient::new(config.gemini.clone()));
    let replies = Arc::new(LineClient::new(config.line.channel_access_token.clone()));
    let state = Arc::new(AppState::new(
        config.line.channel_secret.clone(),
        generator,
        replies,
    ));

    let app = relay::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    info!("Webhook relay listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("Server error")?;

    Ok(())
}
