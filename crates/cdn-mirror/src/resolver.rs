//! Cache resolution and fetch-through

use crate::config::MirrorConfig;
use crate::error::{MirrorError, Result};
use crate::response::{self, CacheResponse};
use axum::body::Bytes;
use mirror_cache::{is_fresh, CacheKey, CacheWriter, MetadataStore, PersistJob};
use origin_client::{OriginConfig, OriginError, OriginFetcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Resolves request paths against local storage, falling back to the origin
pub struct CacheResolver {
    store: MetadataStore,
    fetcher: OriginFetcher,
    writer: CacheWriter,
    storage_root: PathBuf,
    storage_ttl: Duration,
    expose_error_details: bool,
}

impl CacheResolver {
    pub fn new(
        store: MetadataStore,
        fetcher: OriginFetcher,
        writer: CacheWriter,
        storage_root: PathBuf,
        storage_ttl: Duration,
    ) -> Self {
        Self {
            store,
            fetcher,
            writer,
            storage_root,
            storage_ttl,
            expose_error_details: false,
        }
    }

    /// Build the resolver and its collaborators from configuration.
    ///
    /// Spawns the cache writer task, so this must run inside a tokio runtime.
    pub fn from_config(config: &MirrorConfig) -> Result<(Self, JoinHandle<()>)> {
        let store = MetadataStore::new(Duration::from_secs(config.metadata_ttl_secs));
        let fetcher = OriginFetcher::new(OriginConfig {
            base_url: config.origin_base.clone(),
            max_payload_bytes: config.max_payload_bytes,
            timeout: Duration::from_secs(config.origin_timeout_secs),
            ..OriginConfig::default()
        })?;
        let (writer, handle) = CacheWriter::spawn(store.clone(), config.write_queue_capacity);

        let resolver = Self::new(
            store,
            fetcher,
            writer,
            config.storage_root.clone(),
            Duration::from_secs(config.storage_ttl_secs),
        )
        .with_error_details(config.expose_error_details);

        Ok((resolver, handle))
    }

    pub fn with_error_details(mut self, expose: bool) -> Self {
        self.expose_error_details = expose;
        self
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    pub fn writer(&self) -> &CacheWriter {
        &self.writer
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    /// Resolve a raw request path to a response. Never fails; errors become
    /// JSON error responses.
    pub async fn resolve(&self, path: &str) -> CacheResponse {
        match self.try_resolve(path).await {
            Ok(response) => response,
            Err(err) => {
                match &err {
                    MirrorError::Cache(_) => debug!(path, error = %err, "Rejected request path"),
                    MirrorError::Origin(OriginError::Rejected { .. })
                    | MirrorError::Origin(OriginError::PayloadTooLarge { .. }) => {}
                    _ => error!(path, error = %err, "Error processing request"),
                }
                response::error(&err, path, self.expose_error_details)
            }
        }
    }

    async fn try_resolve(&self, path: &str) -> Result<CacheResponse> {
        let key = CacheKey::from_request_path(path)?;
        let storage_path = key.storage_path(&self.storage_root);

        if let Some(storage_path) = &storage_path {
            if let Some(response) = self.read_cached(&key, storage_path).await {
                return Ok(response);
            }
        }

        debug!(key = %key, "Fetching from origin");
        let fetched = self.fetcher.fetch(&key).await?;

        match storage_path {
            Some(path) => self.writer.persist(PersistJob {
                key,
                path,
                data: fetched.data.clone(),
                content_type: fetched.content_type.clone(),
            }),
            None => debug!(key = %key, "Directory listing is not persisted"),
        }

        Ok(response::miss(fetched))
    }

    /// Serve a fresh stored object, or `None` if the origin must be asked
    async fn read_cached(&self, key: &CacheKey, path: &Path) -> Option<CacheResponse> {
        let entry = self.store.get(key).await;
        if !is_fresh(path, self.storage_ttl).await {
            return None;
        }

        // Files placed by hand are not bounded by the fetch limit
        let limit = self.fetcher.max_payload_bytes();
        match fs::metadata(path).await {
            Ok(meta) if meta.len() > limit => {
                warn!(
                    key = %key,
                    size = meta.len(),
                    limit,
                    "Cached object exceeds payload limit, refetching"
                );
                return None;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to stat cached object, refetching");
                return None;
            }
        }

        match fs::read(path).await {
            Ok(data) => {
                debug!(key = %key, "Serving from cache");
                Some(response::hit(key, Bytes::from(data), entry.as_ref()))
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to read cached object, refetching");
                None
            }
        }
    }
}
