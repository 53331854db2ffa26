use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use matchdeck::api;
use matchdeck::config::ServerConfig;
use matchdeck::engine::Engine;
use matchdeck::store::MemoryStore;

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "matchdeck=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting matchdeck...");

    let config = ServerConfig::from_env();

    let store = Arc::new(MemoryStore::new());
    if let Some(ref path) = config.seed_path {
        match store.load_seed(path).await {
            Ok((users, collections)) => {
                tracing::info!(
                    "Seeded {} users and {} collections from {}",
                    users,
                    collections,
                    path.display()
                );
            }
            Err(e) => {
                tracing::warn!("Failed to load seed file: {}. Store starts empty.", e);
            }
        }
    }

    let engine = Arc::new(Engine::new(store));

    let app = api::router(engine)
        .fallback_service(ServeDir::new(&config.static_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
