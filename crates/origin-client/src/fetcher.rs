//! Size-bounded origin fetching

use crate::error::{OriginError, Result};
use crate::types::{FetchedObject, OriginConfig};
use bytes::Bytes;
use mirror_cache::{mime, CacheKey};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

/// HTTP client for the single upstream origin
pub struct OriginFetcher {
    client: Client,
    base_url: Url,
    max_payload_bytes: u64,
}

impl OriginFetcher {
    pub fn new(config: OriginConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)?;
        if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
            return Err(OriginError::InvalidUrl(format!(
                "{} is not an http(s) base URL",
                config.base_url
            )));
        }

        let client = Client::builder()
            .user_agent(config.user_agent)
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| OriginError::Client(Box::new(e)))?;

        Ok(Self {
            client,
            base_url,
            max_payload_bytes: config.max_payload_bytes,
        })
    }

    pub fn max_payload_bytes(&self) -> u64 {
        self.max_payload_bytes
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Origin URL for `key`, with each key segment encoded as a path segment.
    /// Directory keys keep their trailing slash.
    pub fn url_for(&self, key: &CacheKey) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| OriginError::InvalidUrl(self.base_url.to_string()))?;
            segments.pop_if_empty().extend(key.segments());
            if key.is_directory() {
                segments.push("");
            }
        }
        Ok(url)
    }

    /// Fetch `key` from the origin in a single attempt.
    ///
    /// The body is buffered in memory and never exceeds the payload limit.
    pub async fn fetch(&self, key: &CacheKey) -> Result<FetchedObject> {
        let url = self.url_for(key)?;
        let url_str = url.to_string();
        debug!(url = %url_str, "Fetching from origin");

        let unreachable = |e: reqwest::Error| OriginError::Unreachable {
            url: url_str.clone(),
            message: e.to_string(),
        };

        let mut response = self.client.get(url).send().await.map_err(&unreachable)?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, url = %url_str, "Origin rejected request");
            return Err(OriginError::Rejected {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
                url: url_str.clone(),
            });
        }

        let advertised = response.content_length();
        if let Some(len) = advertised {
            if len > self.max_payload_bytes {
                warn!(
                    url = %url_str,
                    size = len,
                    limit = self.max_payload_bytes,
                    "Advertised payload too large"
                );
                return Err(OriginError::PayloadTooLarge {
                    limit: self.max_payload_bytes,
                    actual: len,
                });
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .unwrap_or_else(|| mime::infer(key.file_name()).to_string());

        let capacity = advertised.unwrap_or(0).min(self.max_payload_bytes) as usize;
        let mut data = Vec::with_capacity(capacity);
        while let Some(chunk) = response.chunk().await.map_err(&unreachable)? {
            let received = (data.len() + chunk.len()) as u64;
            if received > self.max_payload_bytes {
                warn!(
                    url = %url_str,
                    received,
                    limit = self.max_payload_bytes,
                    "Payload exceeded limit while reading"
                );
                return Err(OriginError::PayloadTooLarge {
                    limit: self.max_payload_bytes,
                    actual: received,
                });
            }
            data.extend_from_slice(&chunk);
        }

        debug!(
            url = %url_str,
            size = data.len(),
            content_type = %content_type,
            "Fetched from origin"
        );

        Ok(FetchedObject {
            data: Bytes::from(data),
            content_type,
        })
    }
}
