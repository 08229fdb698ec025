//! HTTP server for the CDN mirror
//!
//! Provides /health and /cache/stats; every other path is resolved through
//! the cache.

use crate::config::MirrorConfig;
use crate::resolver::CacheResolver;
use crate::response::CacheResponse;
use crate::types::{HealthResponse, StatsResponse};
use axum::{
    extract::State,
    http::Uri,
    response::Json,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{info, Level};

/// Shared state for the HTTP server
pub struct ServerState {
    pub resolver: CacheResolver,
    pub config: MirrorConfig,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(resolver: CacheResolver, config: MirrorConfig) -> Self {
        Self {
            resolver,
            config,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<ServerState>;

/// Create the HTTP router. Every request and response is logged at info.
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/cache/stats", get(cache_stats))
        .fallback(mirror)
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

/// Start the HTTP server, returning once `shutdown` resolves and in-flight
/// requests have finished
pub async fn start_server<F>(state: SharedState, port: u16, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let cache = state.resolver.store().stats().await;
    let uptime_secs = (Utc::now() - state.started_at).num_seconds() as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now(),
        uptime_secs,
        cache,
    })
}

async fn cache_stats(State(state): State<SharedState>) -> Json<StatsResponse> {
    let config = &state.config;

    Json(StatsResponse {
        cache: state.resolver.store().stats().await,
        writer: state.resolver.writer().stats(),
        cache_dir: state.resolver.storage_root().display().to_string(),
        cache_ttl_secs: config.storage_ttl_secs,
        metadata_ttl_secs: config.metadata_ttl_secs,
        max_payload_bytes: config.max_payload_bytes,
        origin: config.origin_base.clone(),
    })
}

/// Serve any other path through the cache
async fn mirror(State(state): State<SharedState>, uri: Uri) -> CacheResponse {
    state.resolver.resolve(uri.path()).await
}
