//! Storage module for keyed byte persistence
//!
//! This module provides a scheme-selected storage adapter with pluggable backends:
//! - **Local filesystem storage** (`fs`) - Files below a root directory
//! - **Memory storage** (`memory`) - Process-local map, for tests and scratch data
//!
//! The adapter resolves its root from explicit [`StorageOptions`], creates it
//! on construction, and forwards keyed reads and writes to the backend
//! selected by the scheme.
//!
//! # Examples
//!
//! ```rust
//! use storage_adapter::storage::{Storage, StorageOptions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let dir = tempfile::tempdir()?;
//! let options = StorageOptions::new().with_root_path(dir.path().join("storage"));
//! let storage = Storage::new("fs", options)?;
//!
//! storage.save("greeting.txt", &b"hello"[..])?;
//! assert_eq!(storage.load_once("greeting.txt")?, &b"hello"[..]);
//!
//! assert!(storage.exists("greeting.txt")?);
//! storage.delete("greeting.txt")?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod memory_adapter;
pub mod options;
pub mod storage_api;
pub mod storage_local;

#[cfg(feature = "async")]
pub mod storage_async;

pub use adapter::{ChunkStream, Storage};
pub use memory_adapter::MemoryStorage;
pub use options::StorageOptions;
pub use storage_api::{
    Entry, EntryKind, Scheme, StorageApiSync, StorageConfig, StorageMetadata,
};
pub use storage_local::{LocalConfig, LocalStorage};

#[cfg(feature = "async")]
pub use storage_async::AsyncStorage;

pub use crate::error::StorageError;
use crate::error::{Result, StorageResult};

/// Storage constants
pub mod constants {
    //! Constants used throughout the storage module

    /// Maximum storage key length
    pub const MAX_KEY_LENGTH: usize = 1024;

    /// Maximum storage value size (1GB)
    pub const MAX_VALUE_SIZE: usize = 1024 * 1024 * 1024;

    /// Default retry attempts
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    /// Base delay of the retry backoff, doubled on every attempt
    pub const RETRY_BASE_DELAY_MS: u64 = 100;

    /// Default chunk size for streaming reads
    pub const DEFAULT_CHUNK_SIZE: usize = 4096;

    /// Root directory used when none is configured, relative to the working directory
    pub const DEFAULT_ROOT: &str = "storage";

    /// Prefix of configuration environment variables
    pub const ENV_PREFIX: &str = "OPENDAL";

    /// Directory below the root holding in-flight atomic writes; reserved as a key segment
    pub const STAGING_DIR: &str = ".storage-tmp";
}

/// Storage factory for creating backends
pub struct StorageFactory;

impl StorageFactory {
    /// Create a local storage instance
    pub fn create_local(
        local_config: LocalConfig,
        storage_config: StorageConfig,
    ) -> StorageResult<LocalStorage> {
        LocalStorage::new(local_config, storage_config)
    }

    /// Create a memory storage instance
    pub fn create_memory(storage_config: StorageConfig) -> MemoryStorage {
        MemoryStorage::new(storage_config)
    }

    /// Create the backend registered for `scheme`
    pub fn create(scheme: Scheme, options: &StorageOptions) -> Result<Box<dyn StorageApiSync>> {
        let storage_config = options.storage_config()?;

        match scheme {
            Scheme::Fs => {
                let root = options.resolve_root()?;
                let local_config = options.local_config(&root)?;
                Ok(Box::new(Self::create_local(local_config, storage_config)?))
            }
            Scheme::Memory => Ok(Box::new(Self::create_memory(storage_config))),
        }
    }
}

/// High-level storage utilities
pub mod utils {
    use super::*;

    /// Copy one object between adapters
    pub fn copy_between_storages(
        source: &Storage,
        source_key: &str,
        destination: &Storage,
        dest_key: &str,
    ) -> Result<()> {
        let data = source.load_once(source_key)?;
        destination.save(dest_key, data)
    }

    /// Copy every file below `prefix` from `source` to `destination`, keeping keys
    pub fn sync_storage(source: &Storage, destination: &Storage, prefix: &str) -> Result<Vec<String>> {
        let keys = source.scan(prefix, true, false)?;
        for key in &keys {
            destination.save(key, source.load_once(key)?)?;
        }
        Ok(keys)
    }

    /// Total size in bytes of the files below `prefix`
    pub fn calculate_storage_usage(storage: &Storage, prefix: &str) -> Result<u64> {
        storage
            .scan(prefix, true, false)?
            .iter()
            .map(|key| storage.metadata(key).map(|metadata| metadata.content_length))
            .sum()
    }
}
