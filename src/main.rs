use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use tours_api::auth::SystemClock;
use tours_api::config::AppConfig;
use tours_api::database::{MemoryStore, PgStore, Store};
use tours_api::services::LogMailer;
use tours_api::{build_app, models, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tours_api=info,tower_http=info")),
        )
        .init();

    let config = AppConfig::from_env();
    config.validate().context("invalid configuration")?;
    tracing::info!("Starting Tours API in {:?} mode", config.environment);

    let store: Arc<dyn Store> = match &config.database.url {
        Some(_) => Arc::new(PgStore::connect(&config.database).await?),
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            Arc::new(MemoryStore::new())
        }
    };
    models::register_all(store.as_ref()).await?;

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let state = AppState::new(config, store, Arc::new(SystemClock), Arc::new(LogMailer));
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Tours API listening on http://{}", bind_addr);
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
