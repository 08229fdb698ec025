//! Background write-through persistence
//!
//! Fetched objects are handed to a bounded queue and written by a single
//! dedicated task, so the request that fetched them never waits on disk.
//! Each processed job publishes a [`PersistEvent`]; failures are logged and
//! counted but never retried.

use crate::key::CacheKey;
use crate::metadata::MetadataStore;
use crate::types::{CacheEntry, WriterStats};
use bytes::Bytes;
use chrono::Utc;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 64;

/// Suffix counter for temporary files
static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// An object to persist under `path`
#[derive(Debug, Clone)]
pub struct PersistJob {
    pub key: CacheKey,
    pub path: PathBuf,
    pub data: Bytes,
    pub content_type: String,
}

/// Outcome of a processed [`PersistJob`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistEvent {
    Persisted { key: String, size: u64 },
    Failed { key: String, error: String },
}

enum Command {
    Persist(PersistJob),
    Flush(oneshot::Sender<()>),
}

#[derive(Default)]
struct Counters {
    persisted: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

/// Handle to the background writer task
///
/// Cloning shares the queue. The task stops once every handle is dropped
/// and the queue has drained.
#[derive(Clone)]
pub struct CacheWriter {
    tx: mpsc::Sender<Command>,
    events: broadcast::Sender<PersistEvent>,
    counters: Arc<Counters>,
}

impl CacheWriter {
    /// Spawn the writer task on the current tokio runtime
    pub fn spawn(store: MetadataStore, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let counters = Arc::new(Counters::default());

        let handle = tokio::spawn(run(rx, store, events.clone(), counters.clone()));

        (
            Self {
                tx,
                events,
                counters,
            },
            handle,
        )
    }

    /// Enqueue a job without waiting. Full or closed queues drop the job.
    pub fn persist(&self, job: PersistJob) {
        let key = job.key.as_str().to_string();
        if let Err(e) = self.tx.try_send(Command::Persist(job)) {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            let reason = match e {
                mpsc::error::TrySendError::Full(_) => "queue full",
                mpsc::error::TrySendError::Closed(_) => "writer stopped",
            };
            warn!(key = %key, reason, "Dropped cache write");
        }
    }

    /// Wait until every job enqueued before this call has been processed
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(ack_tx)).await.is_err() {
            return;
        }
        let _ = ack_rx.await;
    }

    /// Subscribe to outcomes of jobs processed from now on
    pub fn subscribe(&self) -> broadcast::Receiver<PersistEvent> {
        self.events.subscribe()
    }

    pub fn stats(&self) -> WriterStats {
        WriterStats {
            persisted: self.counters.persisted.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }
}

async fn run(
    mut rx: mpsc::Receiver<Command>,
    store: MetadataStore,
    events: broadcast::Sender<PersistEvent>,
    counters: Arc<Counters>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Persist(job) => {
                let event = persist_job(&job, &store).await;
                match &event {
                    PersistEvent::Persisted { .. } => {
                        counters.persisted.fetch_add(1, Ordering::Relaxed);
                    }
                    PersistEvent::Failed { .. } => {
                        counters.failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
                // No subscribers is fine
                let _ = events.send(event);
            }
            Command::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    debug!("Cache writer stopped");
}

async fn persist_job(job: &PersistJob, store: &MetadataStore) -> PersistEvent {
    let key = job.key.as_str().to_string();
    let size = job.data.len() as u64;

    if let Err(e) = write_atomically(&job.path, &job.data).await {
        warn!(key = %key, path = ?job.path, error = %e, "Failed to cache object");
        return PersistEvent::Failed {
            key,
            error: e.to_string(),
        };
    }

    store
        .insert(CacheEntry {
            key: key.clone(),
            content_type: job.content_type.clone(),
            size,
            cached_at: Utc::now(),
        })
        .await;

    info!(key = %key, size, "Cached object");
    PersistEvent::Persisted { key, size }
}

/// Write `data` to a sibling temp file, then rename it over `path`
async fn write_atomically(path: &Path, data: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
    fs::create_dir_all(parent).await?;

    let tmp = temp_path(path);
    if let Err(e) = fs::write(&tmp, data).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e);
    }
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

/// Fixed-width sibling name, so long target names still fit the filesystem limit
fn temp_path(path: &Path) -> PathBuf {
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{:08x}-{:016x}.tmp", std::process::id(), seq))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    fn job(root: &Path, raw: &str, data: &'static [u8], content_type: &str) -> PersistJob {
        let key = CacheKey::from_request_path(raw).unwrap();
        PersistJob {
            path: key.storage_path(root).unwrap(),
            key,
            data: Bytes::from_static(data),
            content_type: content_type.to_string(),
        }
    }

    fn store() -> MetadataStore {
        MetadataStore::new(Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn test_persist_writes_file_and_metadata() {
        let dir = tempdir().unwrap();
        let store = store();
        let (writer, _handle) = CacheWriter::spawn(store.clone(), 8);
        let mut events = writer.subscribe();

        let job = job(dir.path(), "/npm/pkg@1.0.0/dist/a.css", b"body{}", "text/css");
        let key = job.key.clone();
        let path = job.path.clone();
        writer.persist(job);

        let event = events.recv().await.unwrap();
        assert_eq!(
            event,
            PersistEvent::Persisted {
                key: "npm/pkg@1.0.0/dist/a.css".to_string(),
                size: 6
            }
        );
        assert_eq!(std::fs::read(&path).unwrap(), b"body{}");

        let entry = store.get(&key).await.unwrap();
        assert_eq!(entry.content_type, "text/css");
        assert_eq!(entry.size, 6);
        assert_eq!(writer.stats().persisted, 1);
    }

    #[tokio::test]
    async fn test_later_write_overwrites() {
        let dir = tempdir().unwrap();
        let (writer, _handle) = CacheWriter::spawn(store(), 8);

        writer.persist(job(dir.path(), "/gh/u/r/x.js", b"first", "application/javascript"));
        writer.persist(job(dir.path(), "/gh/u/r/x.js", b"second", "application/javascript"));
        writer.flush().await;

        let path = dir.path().join("gh/u/r/x.js");
        assert_eq!(std::fs::read(path).unwrap(), b"second");

        // no temp files left behind
        let leftovers = std::fs::read_dir(dir.path().join("gh/u/r"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_failure_is_reported_not_stored() {
        let dir = tempdir().unwrap();
        // a regular file where a directory is needed
        std::fs::write(dir.path().join("npm"), b"not a dir").unwrap();

        let store = store();
        let (writer, _handle) = CacheWriter::spawn(store.clone(), 8);
        let mut events = writer.subscribe();

        let job = job(dir.path(), "/npm/pkg/a.js", b"x", "application/javascript");
        let key = job.key.clone();
        writer.persist(job);

        match events.recv().await.unwrap() {
            PersistEvent::Failed { key, .. } => assert_eq!(key, "npm/pkg/a.js"),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(store.get(&key).await.is_none());
        assert_eq!(writer.stats().failed, 1);
    }

    #[tokio::test]
    async fn test_flush_without_jobs_returns() {
        let (writer, _handle) = CacheWriter::spawn(store(), 1);
        writer.flush().await;
        assert_eq!(writer.stats().persisted, 0);
    }

    #[tokio::test]
    async fn test_stopped_writer_drops_jobs() {
        let dir = tempdir().unwrap();
        let (writer, handle) = CacheWriter::spawn(store(), 1);
        handle.abort();
        let _ = handle.await;

        writer.persist(job(dir.path(), "/npm/a.js", b"x", "application/javascript"));
        assert_eq!(writer.stats().dropped, 1);
        assert!(!dir.path().join("npm/a.js").exists());
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        let dir = tempdir().unwrap();
        // the current-thread runtime does not run the writer until we yield
        let (writer, _handle) = CacheWriter::spawn(store(), 1);

        writer.persist(job(dir.path(), "/npm/a.js", b"a", "application/javascript"));
        writer.persist(job(dir.path(), "/npm/b.js", b"b", "application/javascript"));
        writer.persist(job(dir.path(), "/npm/c.js", b"c", "application/javascript"));
        assert_eq!(writer.stats().dropped, 2);

        writer.flush().await;
        let stats = writer.stats();
        assert_eq!(stats.persisted, 1);
        assert_eq!(stats.dropped, 2);
        assert!(dir.path().join("npm/a.js").is_file());
        assert!(!dir.path().join("npm/b.js").exists());
    }

    #[tokio::test]
    async fn test_long_file_name_is_persisted() {
        let dir = tempdir().unwrap();
        let (writer, _handle) = CacheWriter::spawn(store(), 4);
        let mut events = writer.subscribe();

        let name = format!("{}.js", "x".repeat(247));
        let job = job(dir.path(), &format!("/npm/{}", name), b"x", "application/javascript");
        writer.persist(job);

        assert!(matches!(
            events.recv().await.unwrap(),
            PersistEvent::Persisted { size: 1, .. }
        ));
        assert!(dir.path().join("npm").join(&name).is_file());
    }
}
