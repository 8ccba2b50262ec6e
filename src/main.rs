//! CI push sync - Main entry point.
//!
//! Loads the configured repository, keeps it in sync with the backend and
//! logs every store event as a JSON line until interrupted.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::{Level, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use push_sync_lib::backend::{HttpBackend, InMemoryBackend, PushBackend};
use push_sync_lib::config::Config;
use push_sync_lib::error::AppResult;
use push_sync_lib::services::{SyncService, start_job_poller, start_push_poller};
use push_sync_lib::store::PushStore;

async fn build_backend(config: &Config) -> AppResult<Arc<dyn PushBackend>> {
    match &config.fixture_path {
        Some(path) => {
            info!("Serving data from fixture {}", path.display());
            Ok(Arc::new(InMemoryBackend::from_fixture(path).await?))
        }
        None => {
            info!("Using backend {}", config.backend_url);
            Ok(Arc::new(HttpBackend::new(
                &config.backend_url,
                config.request_timeout,
            )?))
        }
    }
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        std::process::exit(1);
    }

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            error!("");
            error!("Please check your environment variables:");
            error!("  - RUST_ENV must be set to 'development' or 'production'");
            error!("  - In production, PSYNC_BACKEND_URL must be set (or PSYNC_FIXTURE_PATH)");
            std::process::exit(1);
        }
    };

    info!("========================================");
    info!("  CI Push Sync");
    info!("  Environment: {}", config.environment);
    info!("  Repository: {}", config.repo);
    info!("========================================");

    if config.is_development() {
        warn!("Running in DEVELOPMENT mode - do not use in production!");
    }

    let backend = match build_backend(&config).await {
        Ok(backend) => backend,
        Err(e) => {
            error!("Failed to initialize backend: {}", e);
            std::process::exit(1);
        }
    };

    let service = SyncService::new(
        PushStore::new(config.repo.clone()),
        backend,
        config.sync.clone(),
        config.filters.clone(),
    );

    // Print every store event as one JSON line
    let mut events = service.subscribe().await;
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(msg) => match serde_json::to_string(&msg) {
                    Ok(line) => println!("{}", line),
                    Err(e) => warn!("Failed to serialize event: {}", e),
                },
                Err(RecvError::Lagged(skipped)) => warn!("Event printer lagged by {}", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });

    match service.load_next_pushes(config.sync.push_count).await {
        Ok(added) => info!("Initial load complete ({} pushes)", added.len()),
        Err(e) => warn!("Initial load failed, the push poller will retry: {}", e),
    }

    let job_poller = start_job_poller(service.clone());
    let push_poller = start_push_poller(service.clone());

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }

    info!("Shutting down");
    service.shutdown();
    job_poller.stop().await;
    push_poller.stop().await;
    printer.abort();
}
