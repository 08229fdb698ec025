//! Lazy freshness checks for stored objects

use std::path::Path;
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::debug;

/// Whether an object last written at `modified` is still fresh at `now`.
///
/// A modification time in the future counts as age zero.
pub fn is_fresh_at(now: SystemTime, modified: SystemTime, ttl: Duration) -> bool {
    let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
    age <= ttl
}

/// Whether the regular file at `path` exists and is within `ttl`.
///
/// Missing files, directories and unreadable timestamps are all stale.
pub async fn is_fresh(path: &Path, ttl: Duration) -> bool {
    let metadata = match fs::metadata(path).await {
        Ok(m) if m.is_file() => m,
        Ok(_) => return false,
        Err(e) => {
            debug!(path = ?path, error = %e, "No stored object");
            return false;
        }
    };

    match metadata.modified() {
        Ok(modified) => is_fresh_at(SystemTime::now(), modified, ttl),
        Err(e) => {
            debug!(path = ?path, error = %e, "Modification time unavailable");
            false
        }
    }
}
