//! Song Vocab - HTTP Server Entry Point
//!
//! Starts the HTTP server that exposes the lyrics agent.

use song_vocab::{api, config::Config};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "song_vocab=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    info!(
        "Loaded configuration: model={}, ollama={}",
        config.default_model, config.ollama_url
    );

    api::serve(config).await?;

    Ok(())
}
