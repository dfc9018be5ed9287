mod config;
mod errors;
mod fetch;
mod llm_client;
mod outreach;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::fetch::PageFetcher;
use crate::outreach::portfolio::{CatalogSource, CsvCatalog, PortfolioIndex};
use crate::routes::build_router;
use crate::state::{build_pipeline, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting coldmail API v{}", env!("CARGO_PKG_VERSION"));

    // Fail fast on a broken catalog; runs reload it per request
    let catalog: Arc<dyn CatalogSource> = Arc::new(CsvCatalog::new(&config.portfolio_csv));
    let startup_index = PortfolioIndex::from_source(catalog.as_ref())
        .with_context(|| format!("Failed to load portfolio catalog '{}'", config.portfolio_csv))?;
    info!(
        "Portfolio catalog ready: {} records from {}",
        startup_index.len(),
        catalog.describe()
    );

    let pipeline = build_pipeline(&config, &startup_index.vocabulary())?;
    info!("Pipeline options: {:?}", pipeline.options());

    let fetcher = PageFetcher::new(Duration::from_secs(config.fetch_timeout_secs))
        .context("Failed to build page fetch client")?;

    let shutdown = CancellationToken::new();

    let state = AppState {
        pipeline,
        catalog,
        fetcher,
        config: config.clone(),
        shutdown: shutdown.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C and cancels every in-flight run.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        return;
    }
    info!("Shutdown requested; cancelling in-flight runs");
    shutdown.cancel();
}
