use novelist::config::ServerConfig;
use novelist::server::{self, AppState, NovelStore};
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env();

    let store = NovelStore::open(config.novels_dir(), config.images_dir()).await?;
    let app_state = AppState::new(store, &config.public_url);
    let app = server::router(app_state, &config.dist_dir);

    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!("Novelist server listening on {}", listener.local_addr()?);
    tracing::info!("- Novels: {}", config.novels_dir().display());
    tracing::info!("- Images: {}", config.images_dir().display());
    axum::serve(listener, app).await?;

    Ok(())
}
