use crate::error::{MirrorError, Result};
use std::env;
use std::path::PathBuf;

/// Mirror configuration parsed from environment variables
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    pub port: u16,
    pub origin_base: String,
    pub storage_root: PathBuf,
    pub storage_ttl_secs: u64,
    pub metadata_ttl_secs: u64,
    pub max_payload_bytes: u64,
    pub origin_timeout_secs: u64,
    pub write_queue_capacity: usize,
    /// Include underlying error messages in 500 responses
    pub expose_error_details: bool,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            origin_base: "https://cdn.jsdelivr.net".to_string(),
            storage_root: PathBuf::from("./cache"),
            storage_ttl_secs: 24 * 60 * 60, // 24 hours
            metadata_ttl_secs: 60 * 60,     // 1 hour
            max_payload_bytes: 10 * 1024 * 1024, // 10MB
            origin_timeout_secs: 30,
            write_queue_capacity: 256,
            expose_error_details: false,
        }
    }
}

impl MirrorConfig {
    /// Parse configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Parse configuration from an arbitrary variable source.
    ///
    /// Unparseable or zero numbers fall back to defaults; an invalid origin URL
    /// is an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let number = |name: &str, default: u64| {
            lookup(name)
                .and_then(|s| s.trim().parse::<u64>().ok())
                .filter(|&n| n > 0)
                .unwrap_or(default)
        };

        let port = lookup("PORT")
            .and_then(|s| s.trim().parse::<u16>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(defaults.port);

        let origin_base = lookup("BASE_URL").unwrap_or(defaults.origin_base);
        url::Url::parse(&origin_base)
            .map_err(|e| MirrorError::Config(format!("BASE_URL {:?}: {}", origin_base, e)))?;

        let storage_root = lookup("CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.storage_root);

        let expose_error_details = lookup("EXPOSE_ERROR_DETAILS")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(defaults.expose_error_details);

        Ok(Self {
            port,
            origin_base,
            storage_root,
            storage_ttl_secs: number("CACHE_TTL", defaults.storage_ttl_secs),
            metadata_ttl_secs: number("MEMORY_CACHE_TTL", defaults.metadata_ttl_secs),
            max_payload_bytes: number("MAX_FILE_SIZE", defaults.max_payload_bytes),
            origin_timeout_secs: number("ORIGIN_TIMEOUT_SECS", defaults.origin_timeout_secs),
            write_queue_capacity: number(
                "WRITE_QUEUE_CAPACITY",
                defaults.write_queue_capacity as u64,
            ) as usize,
            expose_error_details,
        })
    }
}
