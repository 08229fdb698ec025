//! Reporting types for the CDN mirror

use chrono::{DateTime, Utc};
use mirror_cache::{CacheStats, WriterStats};
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_secs: u64,
    pub cache: CacheStats,
}

/// Cache statistics response
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub cache: CacheStats,
    pub writer: WriterStats,
    pub cache_dir: String,
    pub cache_ttl_secs: u64,
    pub metadata_ttl_secs: u64,
    pub max_payload_bytes: u64,
    pub origin: String,
}
