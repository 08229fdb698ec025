//! CDN Mirror - fetch-through cache for a content-delivery origin
//!
//! Serves previously fetched files from a local directory tree while they are
//! fresh, and otherwise fetches them from the origin, returns them, and
//! persists them in the background.

mod config;
mod error;
mod resolver;
mod response;
mod server;
mod types;

use crate::config::MirrorConfig;
use crate::error::{MirrorError, Result};
use crate::resolver::CacheResolver;
use crate::server::{start_server, ServerState, SharedState};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env()
        .add_directive("cdn_mirror=info".parse()?)
        .add_directive("tower_http=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting CDN mirror...");

    let config = MirrorConfig::from_env()?;
    info!("Port: {}", config.port);
    info!("Origin: {}", config.origin_base);
    info!("Cache dir: {:?}", config.storage_root);
    info!("Cache TTL: {} seconds", config.storage_ttl_secs);
    info!("Metadata TTL: {} seconds", config.metadata_ttl_secs);
    info!("Max file size: {} bytes", config.max_payload_bytes);

    tokio::fs::create_dir_all(&config.storage_root).await?;

    let (resolver, _writer_handle) = CacheResolver::from_config(&config)?;
    let writer = resolver.writer().clone();
    let port = config.port;

    let state: SharedState = Arc::new(ServerState::new(resolver, config));

    start_server(state, port, shutdown_signal())
        .await
        .map_err(|e| MirrorError::Config(format!("Server error: {}", e)))?;

    // Let queued writes land before exiting
    writer.flush().await;
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
