//! Origin client types

use bytes::Bytes;
use std::time::Duration;

/// Identifies this mirror to the origin
pub const USER_AGENT: &str = "jsDelivr-Proxy/1.0.0";

/// Configuration for [`crate::OriginFetcher`]
#[derive(Debug, Clone)]
pub struct OriginConfig {
    pub base_url: String,
    pub max_payload_bytes: u64,
    /// Total deadline for one fetch, body included
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            base_url: "https://cdn.jsdelivr.net".to_string(),
            max_payload_bytes: 10 * 1024 * 1024, // 10MB
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: USER_AGENT.to_string(),
        }
    }
}

/// A fully buffered object retrieved from the origin
#[derive(Debug, Clone)]
pub struct FetchedObject {
    pub data: Bytes,
    pub content_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OriginConfig::default();
        assert_eq!(config.base_url, "https://cdn.jsdelivr.net");
        assert_eq!(config.max_payload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.user_agent, "jsDelivr-Proxy/1.0.0");
    }
}
