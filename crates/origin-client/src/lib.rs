//! Origin client for the CDN mirror
//!
//! Fetches objects from a single upstream origin with a fixed user agent,
//! a total request timeout and an enforced maximum payload size.

pub mod error;
pub mod fetcher;
pub mod types;

pub use error::{OriginError, Result};
pub use fetcher::OriginFetcher;
pub use types::{FetchedObject, OriginConfig};
