use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use summary_gateway::cache::response_cache::MemoryResponseCache;
use summary_gateway::config::{Cli, Config};
use summary_gateway::server::openai_api::{build_router, AppState};
use summary_gateway::upstream::client::HttpUpstream;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "summary_gateway=debug,tower_http=debug"
    } else {
        "summary_gateway=info,tower_http=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .init();

    info!("summary-gateway v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration.
    let mut config = Config::load(&cli.config)?;
    config.apply_cli(&cli);
    config.validate()?;
    let config = Arc::new(config);

    info!(
        upstream = config.upstream.url,
        default_model = config.models.default_model,
        chunk_size = config.stream.chunk_size,
        delay_ms = config.stream.delay_ms,
        "Configuration loaded"
    );

    let upstream = Arc::new(HttpUpstream::new(config.upstream.clone())?);
    let cache = Arc::new(MemoryResponseCache::default());

    // Build application state.
    let state = Arc::new(AppState::new(config.clone(), upstream, cache));

    // Build the HTTP router.
    let app = build_router(state);

    // Start the server.
    let listen_addr = config.server.listen.clone();
    info!(addr = listen_addr, "Starting server");

    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Listening on {listen_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
