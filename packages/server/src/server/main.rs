// Main entry point for the scrape API server

use anyhow::{Context, Result};
use scrape_server::{
    server::{build_app, AppState},
    Config,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,scrape_engine=debug,scrape_server=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting job scrape API");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(
        demo_mode = config.demo_mode,
        max_sessions = config.engine.max_sessions,
        "Configuration loaded"
    );
    if !config.demo_mode {
        tracing::warn!("DEMO_MODE is off and no site extractors are registered");
    }

    let state = AppState::from_config(&config);
    let app = build_app(state.clone(), &config.allowed_origins);

    // Periodically drop finished sessions past their TTL
    let shutdown = CancellationToken::new();
    let eviction = tokio::spawn(run_eviction(
        state.clone(),
        config.eviction_interval,
        shutdown.child_token(),
    ));

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
            signal.cancel();
        })
        .await
        .context("Server error")?;

    shutdown.cancel();
    let _ = eviction.await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn run_eviction(state: AppState, interval: std::time::Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval.max(std::time::Duration::from_secs(1)));
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let evicted = state.manager.evict_expired();
                if evicted > 0 {
                    tracing::info!(evicted, "Evicted expired sessions");
                }
            }
        }
    }
}
