//! Cache key derivation from request paths

use crate::error::{CacheError, Result};
use std::fmt;
use std::path::{Path, PathBuf};

/// Normalized, percent-decoded request sub-path
///
/// The key mirrors the request hierarchy directly onto storage; there is no
/// hashing. Construction guarantees that every segment is a plain file name,
/// so [`CacheKey::storage_path`] can never leave the storage root.
///
/// A trailing slash is significant: `pkg@1.0.0/` names a directory listing
/// on the origin, a different resource from `pkg@1.0.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    segments: Vec<String>,
    key: String,
    directory: bool,
}

impl CacheKey {
    /// Derive a key from a raw (still percent-encoded) request path.
    ///
    /// Decodes exactly once, drops empty and `.` segments, and rejects `..`,
    /// backslashes, NUL bytes and paths that normalize to nothing. A trailing
    /// `/` marks the key as a directory.
    pub fn from_request_path(raw: &str) -> Result<Self> {
        let decoded = urlencoding::decode(raw)
            .map_err(|_| CacheError::InvalidKey("path is not valid UTF-8".to_string()))?;

        let mut segments = Vec::new();
        for segment in decoded.split('/') {
            match segment {
                "" | "." => continue,
                ".." => {
                    return Err(CacheError::InvalidKey(
                        "parent directory segments are not allowed".to_string(),
                    ))
                }
                s if s.contains('\\') || s.contains('\0') => {
                    return Err(CacheError::InvalidKey(format!(
                        "segment {:?} contains a forbidden character",
                        s
                    )))
                }
                s => segments.push(s.to_string()),
            }
        }

        if segments.is_empty() {
            return Err(CacheError::InvalidKey("empty path".to_string()));
        }

        let directory = decoded.ends_with('/');
        let mut key = segments.join("/");
        if directory {
            key.push('/');
        }

        Ok(Self {
            segments,
            key,
            directory,
        })
    }

    /// Normalized key, e.g. `npm/jquery@3.6.0/dist/jquery.min.js`
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// Path segments in request order
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Whether the request path ended with `/`
    pub fn is_directory(&self) -> bool {
        self.directory
    }

    /// Last segment, used for suffix-based MIME inference
    pub fn file_name(&self) -> &str {
        // segments is never empty after construction
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// Location of the stored object under `root`.
    ///
    /// Directory keys have no location; they share their segments with a
    /// file key and are always fetched from the origin.
    pub fn storage_path(&self, root: &Path) -> Option<PathBuf> {
        if self.directory {
            return None;
        }
        let mut path = root.to_path_buf();
        path.extend(&self.segments);
        Some(path)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizes_slashes_and_dots() {
        let key = CacheKey::from_request_path("//npm/./jquery@3.6.0//dist/jquery.min.js").unwrap();
        assert_eq!(key.as_str(), "npm/jquery@3.6.0/dist/jquery.min.js");
        assert_eq!(key.file_name(), "jquery.min.js");
        assert_eq!(key.segments().len(), 4);
    }

    #[test]
    fn test_decodes_exactly_once() {
        let key = CacheKey::from_request_path("/gh/user/repo/file%20name.css").unwrap();
        assert_eq!(key.as_str(), "gh/user/repo/file name.css");

        // %2520 decodes to a literal "%20", not a space
        let key = CacheKey::from_request_path("/gh/a%2520b.js").unwrap();
        assert_eq!(key.as_str(), "gh/a%20b.js");
    }

    #[test]
    fn test_rejects_parent_segments() {
        assert!(CacheKey::from_request_path("/npm/../../etc/passwd").is_err());
        // encoded traversal is decoded before validation
        assert!(CacheKey::from_request_path("/npm/%2e%2e/%2e%2e/etc/passwd").is_err());
        assert!(CacheKey::from_request_path("/npm/..%2f..%2fetc").is_err());
    }

    #[test]
    fn test_rejects_backslash_and_nul() {
        assert!(CacheKey::from_request_path("/npm/..%5c..%5cetc").is_err());
        assert!(CacheKey::from_request_path("/npm/a%00b.js").is_err());
    }

    #[test]
    fn test_rejects_empty_and_invalid_utf8() {
        assert!(CacheKey::from_request_path("/").is_err());
        assert!(CacheKey::from_request_path("/./").is_err());
        assert!(CacheKey::from_request_path("/npm/%ff%fe.js").is_err());
    }

    #[test]
    fn test_storage_path_stays_under_root() {
        let root = Path::new("/var/cache/mirror");
        let key = CacheKey::from_request_path("/npm/vue@3/dist/vue.js").unwrap();
        let path = key.storage_path(root).unwrap();
        assert_eq!(path, PathBuf::from("/var/cache/mirror/npm/vue@3/dist/vue.js"));
        assert!(path.starts_with(root));
    }

    #[test]
    fn test_trailing_slash_is_a_distinct_key() {
        let file = CacheKey::from_request_path("/npm/pkg@1.0.0").unwrap();
        let listing = CacheKey::from_request_path("/npm/pkg@1.0.0/").unwrap();

        assert_ne!(file, listing);
        assert_eq!(file.as_str(), "npm/pkg@1.0.0");
        assert_eq!(listing.as_str(), "npm/pkg@1.0.0/");
        assert!(!file.is_directory());
        assert!(listing.is_directory());
        assert_eq!(file.segments(), listing.segments());

        // an encoded slash decodes to the same marker
        let encoded = CacheKey::from_request_path("/npm/pkg@1.0.0%2f").unwrap();
        assert_eq!(encoded, listing);
    }

    #[test]
    fn test_directory_key_has_no_storage_path() {
        let root = Path::new("/var/cache/mirror");
        let listing = CacheKey::from_request_path("/npm/pkg@1.0.0/").unwrap();
        assert!(listing.storage_path(root).is_none());
    }
}
