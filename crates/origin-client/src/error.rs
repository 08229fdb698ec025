//! Error types for origin fetching

use std::fmt;

#[derive(Debug)]
pub enum OriginError {
    /// Origin answered with a non-success status
    Rejected {
        status: u16,
        reason: String,
        url: String,
    },
    /// Advertised or received payload exceeds the configured limit
    PayloadTooLarge { limit: u64, actual: u64 },
    /// Network-level failure: DNS, connect, timeout, reset
    Unreachable { url: String, message: String },
    InvalidUrl(String),
    Client(Box<reqwest::Error>),
}

impl fmt::Display for OriginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OriginError::Rejected {
                status,
                reason,
                url,
            } => write!(f, "Origin returned {} {} for {}", status, reason, url),
            OriginError::PayloadTooLarge { limit, actual } => write!(
                f,
                "Payload too large: {} bytes exceeds limit of {} bytes",
                actual, limit
            ),
            OriginError::Unreachable { url, message } => {
                write!(f, "Origin unreachable at {}: {}", url, message)
            }
            OriginError::InvalidUrl(msg) => write!(f, "Invalid origin URL: {}", msg),
            OriginError::Client(err) => write!(f, "HTTP client error: {}", err),
        }
    }
}

impl std::error::Error for OriginError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OriginError::Client(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<url::ParseError> for OriginError {
    fn from(err: url::ParseError) -> Self {
        OriginError::InvalidUrl(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OriginError>;
