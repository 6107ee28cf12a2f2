//! Backend-facing storage API
//!
//! This module defines the trait every storage backend implements, together
//! with the shared configuration, metadata and key handling used by the
//! adapter and the backends.

use crate::error::{StorageError, StorageResult};
use crate::storage::constants;
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

#[cfg(feature = "serde_support")]
use serde::{Deserialize, Serialize};

/// Generic storage configuration shared by all backends
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Maximum retry attempts for transient failures
    pub max_retries: u32,
    /// Chunk size used by streaming reads
    pub chunk_size: usize,
    /// Backend-specific settings that no typed field claimed
    pub backend_config: HashMap<String, String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_retries: constants::DEFAULT_MAX_RETRIES,
            chunk_size: constants::DEFAULT_CHUNK_SIZE,
            backend_config: HashMap::new(),
        }
    }
}

/// Storage metadata for objects
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct StorageMetadata {
    /// Content type guessed from the key's extension
    pub content_type: Option<String>,
    /// Content length
    pub content_length: u64,
    /// Last modified timestamp
    pub last_modified: Option<chrono::DateTime<chrono::Utc>>,
    /// Hex SHA-256 of the content, when checksums are enabled
    pub etag: Option<String>,
}

/// Storage schemes with a registered backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde_support", serde(rename_all = "lowercase"))]
pub enum Scheme {
    /// Local filesystem storage
    Fs,
    /// Process-local in-memory storage
    Memory,
}

impl Scheme {
    /// Canonical scheme name
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Fs => "fs",
            Scheme::Memory => "memory",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fs" => Ok(Scheme::Fs),
            "memory" => Ok(Scheme::Memory),
            _ => Err(StorageError::UnsupportedScheme {
                scheme: s.to_string(),
            }),
        }
    }
}

/// Kind of a listed entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EntryKind {
    /// A stored object
    File,
    /// A directory implied by the keys below it
    Directory,
}

/// Listed entry, keyed relative to the storage root
///
/// Directory keys end with `/`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Entry {
    /// Key relative to the root
    pub key: String,
    /// Entry kind
    pub kind: EntryKind,
}

impl Entry {
    /// Create a file entry
    pub fn file(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: EntryKind::File,
        }
    }

    /// Create a directory entry, appending the trailing `/` if missing
    pub fn directory(key: impl Into<String>) -> Self {
        let mut key = key.into();
        if !key.ends_with('/') {
            key.push('/');
        }
        Self {
            key,
            kind: EntryKind::Directory,
        }
    }

    /// Whether this entry is a directory
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Synchronous storage backend trait
///
/// Keys handed to a backend are already normalized by [`utils::normalize_key`].
pub trait StorageApiSync: Send + Sync {
    /// Put an object into storage, replacing any previous content
    fn put(&self, key: &str, data: Bytes) -> StorageResult<()>;

    /// Get an object from storage
    fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Open a sequential reader over an object
    fn reader(&self, key: &str) -> StorageResult<Box<dyn Read + Send>>;

    /// Delete an object from storage
    fn delete(&self, key: &str) -> StorageResult<()>;

    /// Check if an object or directory exists
    fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Recursively list entries below a directory (`""` for the root)
    fn list(&self, prefix: &str) -> StorageResult<Vec<Entry>>;

    /// Get object metadata only
    fn head(&self, key: &str) -> StorageResult<StorageMetadata>;

    /// Get storage scheme
    fn scheme(&self) -> Scheme;

    /// Root directory, for backends that live on the local filesystem
    fn root(&self) -> Option<&Path> {
        None
    }

    /// Get storage configuration
    fn config(&self) -> &StorageConfig;
}

/// Utility functions for storage operations
pub mod utils {
    use super::*;

    /// Validate storage key
    pub fn validate_key(key: &str) -> StorageResult<()> {
        let invalid = |reason: &str| StorageError::InvalidKey {
            key: key.to_string(),
            reason: reason.to_string(),
        };

        if key.is_empty() {
            return Err(invalid("Key cannot be empty"));
        }

        if key.len() > constants::MAX_KEY_LENGTH {
            return Err(invalid("Key too long (max 1024 characters)"));
        }

        if key.contains('\0') || key.contains('\n') || key.contains('\r') {
            return Err(invalid("Key contains invalid characters"));
        }

        if key.starts_with('/') {
            return Err(invalid("Key must be relative to the storage root"));
        }

        if key.split('/').any(|segment| segment == "." || segment == "..") {
            return Err(invalid("Key cannot contain '.' or '..' segments"));
        }

        if key.split('/').next() == Some(constants::STAGING_DIR) {
            return Err(invalid("Key is inside the reserved staging directory"));
        }

        Ok(())
    }

    /// Normalize and validate a key naming an object
    pub fn object_key(key: &str) -> StorageResult<String> {
        let normalized = normalize_key(key);
        if normalized.is_empty() {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
                reason: "Key cannot be empty".to_string(),
            });
        }
        validate_key(&normalized)?;
        Ok(normalized)
    }

    /// Normalize a directory path; the root is `""`
    pub fn dir_key(path: &str) -> StorageResult<String> {
        let normalized = normalize_key(path);
        if !normalized.is_empty() {
            validate_key(&normalized)?;
        }
        Ok(normalized)
    }

    /// Extract filename from key
    pub fn extract_filename(key: &str) -> &str {
        key.rfind('/').map(|pos| &key[pos + 1..]).unwrap_or(key)
    }

    /// Normalize key path: drop leading, trailing and repeated separators
    pub fn normalize_key(key: &str) -> String {
        key.split('/')
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Guess a content type from the key's extension
    pub fn guess_content_type(key: &str) -> Option<String> {
        let filename = extract_filename(key);
        let (_, ext) = filename.rsplit_once('.')?;
        let content_type = match ext.to_lowercase().as_str() {
            "txt" => "text/plain",
            "json" => "application/json",
            "xml" => "application/xml",
            "html" | "htm" => "text/html",
            "css" => "text/css",
            "js" => "application/javascript",
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "pdf" => "application/pdf",
            "zip" => "application/zip",
            _ => return None,
        };
        Some(content_type.to_string())
    }

    /// Hex SHA-256 digest used as an etag
    pub fn checksum(data: &[u8]) -> String {
        use sha2::{Digest, Sha256};
        hex::encode(Sha256::digest(data))
    }
}

/// Retry wrapper for blocking operations
///
/// Only [`StorageError::Transient`] failures are retried, with exponential
/// backoff starting at [`constants::RETRY_BASE_DELAY_MS`].
pub fn with_retry<T, F>(operation: &str, max_retries: u32, mut f: F) -> StorageResult<T>
where
    F: FnMut() -> StorageResult<T>,
{
    let mut attempt = 0u32;
    loop {
        match f() {
            Err(e) if e.is_transient() && attempt < max_retries => {
                let delay =
                    Duration::from_millis(constants::RETRY_BASE_DELAY_MS << attempt.min(10));
                tracing::warn!(
                    operation,
                    attempt = attempt + 1,
                    max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "retrying transient storage failure"
                );
                std::thread::sleep(delay);
                attempt += 1;
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_storage_config_default() {
        let config = StorageConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.chunk_size, 4096);
        assert!(config.backend_config.is_empty());
    }

    #[test]
    fn test_scheme_parse() {
        assert_eq!("fs".parse::<Scheme>().unwrap(), Scheme::Fs);
        assert_eq!(" FS ".parse::<Scheme>().unwrap(), Scheme::Fs);
        assert_eq!("memory".parse::<Scheme>().unwrap(), Scheme::Memory);
        assert!(matches!(
            "s3".parse::<Scheme>(),
            Err(StorageError::UnsupportedScheme { .. })
        ));
        assert_eq!(Scheme::Fs.to_string(), "fs");
    }

    #[test]
    fn test_validate_key() {
        assert!(utils::validate_key("valid/key").is_ok());
        assert!(utils::validate_key("").is_err());
        assert!(utils::validate_key("key\0with\0nulls").is_err());
        assert!(utils::validate_key("key\nwith\nnewlines").is_err());
        assert!(utils::validate_key("../escape").is_err());
        assert!(utils::validate_key("a/./b").is_err());
        assert!(utils::validate_key(&"k".repeat(1025)).is_err());
        assert!(utils::validate_key(".storage-tmp").is_err());
        assert!(utils::validate_key(".storage-tmp/partial").is_err());
        assert!(utils::validate_key("backup.storage-tmp").is_ok());
        assert!(utils::validate_key("nested/.storage-tmp").is_ok());
    }

    #[test]
    fn test_object_key() {
        assert_eq!(utils::object_key("/prefix//file.txt").unwrap(), "prefix/file.txt");
        assert!(utils::object_key("/").is_err());
        assert!(utils::object_key("a/../../b").is_err());
    }

    #[test]
    fn test_dir_key() {
        assert_eq!(utils::dir_key("").unwrap(), "");
        assert_eq!(utils::dir_key("/").unwrap(), "");
        assert_eq!(utils::dir_key("docs/").unwrap(), "docs");
        assert!(utils::dir_key("..").is_err());
    }

    #[test]
    fn test_extract_filename() {
        assert_eq!(utils::extract_filename("prefix/file.txt"), "file.txt");
        assert_eq!(utils::extract_filename("file.txt"), "file.txt");
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(utils::normalize_key("/prefix//file.txt"), "prefix/file.txt");
        assert_eq!(utils::normalize_key("prefix/file.txt"), "prefix/file.txt");
        assert_eq!(utils::normalize_key("dir/"), "dir");
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(utils::guess_content_type("a/b.JSON").as_deref(), Some("application/json"));
        assert_eq!(utils::guess_content_type("notes.txt").as_deref(), Some("text/plain"));
        assert_eq!(utils::guess_content_type("archive.tar.unknown"), None);
        assert_eq!(utils::guess_content_type("README"), None);
    }

    #[test]
    fn test_checksum() {
        assert_eq!(
            utils::checksum(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_entry_directory_suffix() {
        let entry = Entry::directory("docs");
        assert_eq!(entry.key, "docs/");
        assert!(entry.is_dir());
        assert!(!Entry::file("docs/a.txt").is_dir());
    }

    #[test]
    fn test_with_retry_transient_then_success() {
        let calls = Cell::new(0);
        let result = with_retry("test", 3, || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(StorageError::Transient {
                    operation: "test".to_string(),
                    reason: "interrupted".to_string(),
                })
            } else {
                Ok(calls.get())
            }
        });
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_with_retry_gives_up_on_permanent_failure() {
        let calls = Cell::new(0);
        let result: StorageResult<()> = with_retry("test", 3, || {
            calls.set(calls.get() + 1);
            Err(StorageError::NotFound {
                key: "a".to_string(),
            })
        });
        assert!(matches!(result, Err(StorageError::NotFound { .. })));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_with_retry_exhausts_budget() {
        let calls = Cell::new(0);
        let result: StorageResult<()> = with_retry("test", 1, || {
            calls.set(calls.get() + 1);
            Err(StorageError::Transient {
                operation: "test".to_string(),
                reason: "timed out".to_string(),
            })
        });
        assert!(result.unwrap_err().is_transient());
        assert_eq!(calls.get(), 2);
    }
}
