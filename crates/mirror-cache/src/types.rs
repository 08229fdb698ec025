//! Cache types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata remembered for a recently persisted object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub content_type: String,
    pub size: u64,
    pub cached_at: DateTime<Utc>,
}

/// Metadata store statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: u64,
    pub hits: u64,
    pub misses: u64,
}

/// Background writer statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WriterStats {
    pub persisted: u64,
    pub failed: u64,
    /// Jobs discarded because the queue was full or closed
    pub dropped: u64,
}
