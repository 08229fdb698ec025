//! Error types for the CDN mirror

use std::fmt;

#[derive(Debug)]
pub enum MirrorError {
    Cache(mirror_cache::CacheError),
    Origin(origin_client::OriginError),
    Io(Box<std::io::Error>),
    Config(String),
}

impl fmt::Display for MirrorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MirrorError::Cache(err) => write!(f, "Cache error: {}", err),
            MirrorError::Origin(err) => write!(f, "Origin error: {}", err),
            MirrorError::Io(err) => write!(f, "IO error: {}", err),
            MirrorError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for MirrorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MirrorError::Cache(err) => Some(err),
            MirrorError::Origin(err) => Some(err),
            MirrorError::Io(err) => Some(err.as_ref()),
            MirrorError::Config(_) => None,
        }
    }
}

impl From<mirror_cache::CacheError> for MirrorError {
    fn from(err: mirror_cache::CacheError) -> Self {
        MirrorError::Cache(err)
    }
}

impl From<origin_client::OriginError> for MirrorError {
    fn from(err: origin_client::OriginError) -> Self {
        MirrorError::Origin(err)
    }
}

impl From<std::io::Error> for MirrorError {
    fn from(err: std::io::Error) -> Self {
        MirrorError::Io(Box::new(err))
    }
}

impl From<tracing_subscriber::filter::ParseError> for MirrorError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        MirrorError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MirrorError>;
