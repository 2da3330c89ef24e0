mod handlers;
mod metrics;
mod routes;
mod store;
mod submission;

use anyhow::Context;
use axum::Router;
use crucible_engine::Executor;
use std::path::Path;
use std::sync::Arc;
use store::{MemoryStore, RedisStore, SubmissionStore};
use tokio::net::TcpListener;
use tracing::{info, warn};

const DEFAULT_CHALLENGES_PATH: &str = "config/challenges.json";

pub struct AppState {
    pub executor: Executor,
    pub store: Arc<dyn SubmissionStore>,
}

/// CRUCIBLE_STORE=memory runs without Redis, seeded from a challenges file
async fn build_store() -> anyhow::Result<Arc<dyn SubmissionStore>> {
    let kind = std::env::var("CRUCIBLE_STORE").unwrap_or_else(|_| "redis".to_string());

    if kind.eq_ignore_ascii_case("memory") {
        let path = std::env::var("CRUCIBLE_CHALLENGES")
            .unwrap_or_else(|_| DEFAULT_CHALLENGES_PATH.to_string());

        let store = match MemoryStore::from_file(Path::new(&path)) {
            Ok(store) => store,
            Err(e) => {
                warn!(path = %path, error = %e, "Starting with no challenges");
                MemoryStore::default()
            }
        };

        info!("Using in-memory submission store");
        return Ok(Arc::new(store));
    }

    let redis_url = std::env::var("REDIS_URL")
        .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    let store = RedisStore::connect(&redis_url).await?;

    info!("Connected to Redis: {}", redis_url);
    Ok(Arc::new(store))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
        )
        .with_target(false)
        .init();

    info!("Crucible API booting...");

    let executor = Executor::from_env();
    info!(
        languages = ?executor.registry().list_languages(),
        timeout_ms = executor.config().timeout_ms,
        scratch_root = %executor.config().scratch_root.display(),
        "Execution engine ready"
    );

    let state = Arc::new(AppState {
        executor,
        store: build_store().await?,
    });

    let app = Router::new()
        .merge(routes::routes())
        .with_state(state);

    let addr = std::env::var("CRUCIBLE_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
