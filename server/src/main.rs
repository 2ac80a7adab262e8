use std::sync::Arc;

use dotenvy::dotenv;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use eventhub_server::config::{Config, StorageBackend};
use eventhub_server::routes::create_app;
use eventhub_server::services::LoggingRenderer;
use eventhub_server::state::AppState;
use eventhub_server::store::{MemoryStore, PgStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("eventhub_server=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    let renderer = Arc::new(LoggingRenderer);

    let state = match config.storage {
        StorageBackend::Postgres => {
            let store = PgStore::connect(&config.database_url, config.max_connections).await?;
            store.migrate().await?;
            AppState::new(Arc::new(store), renderer, config.issuance_concurrency)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, data is lost on restart");
            AppState::new(
                Arc::new(MemoryStore::new()),
                renderer,
                config.issuance_concurrency,
            )
        }
    };

    let app = create_app(state, &config);

    tracing::info!("🚀 Server running at http://{}", config.bind_addr);
    let listener = TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
