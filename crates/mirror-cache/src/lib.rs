//! Path-mirrored file cache with lazy TTL freshness
//!
//! Cached objects are stored under a root directory that mirrors the request
//! path hierarchy. Freshness is decided from the stored file's modification
//! time on access; an in-memory metadata table remembers content types for a
//! shorter period. Writes happen on a dedicated background task.

mod error;
mod freshness;
mod key;
mod metadata;
pub mod mime;
mod types;
mod writer;

pub use error::{CacheError, Result};
pub use freshness::{is_fresh, is_fresh_at};
pub use key::CacheKey;
pub use metadata::MetadataStore;
pub use types::{CacheEntry, CacheStats, WriterStats};
pub use writer::{CacheWriter, PersistEvent, PersistJob};
