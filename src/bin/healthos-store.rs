use healthos::storage::{load_store, resolve_store_path, seed_if_empty};
use healthos::{store_router, StoreConfig, StoreState};
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = StoreConfig::from_env()?;
    let data_path = resolve_store_path(&config.data_dir);
    tokio::fs::create_dir_all(&config.data_dir).await?;
    seed_if_empty(&data_path, &config.seed_path).await?;

    let entries = load_store(&data_path).await;
    info!("loaded {} entries from {}", entries.len(), data_path.display());
    let app = store_router(StoreState::new(data_path, entries));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("store listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
