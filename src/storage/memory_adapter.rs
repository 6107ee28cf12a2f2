//! Memory storage backend

use crate::error::{StorageError, StorageResult};
use crate::storage::storage_api::{
    utils, Entry, Scheme, StorageApiSync, StorageConfig, StorageMetadata,
};
use bytes::Bytes;
use std::collections::{BTreeSet, HashMap};
use std::io::{Cursor, Read};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    last_modified: chrono::DateTime<chrono::Utc>,
}

/// In-memory storage backend
///
/// Clones share the same underlying map. Directories are implied by keys
/// containing `/`.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    data: Arc<RwLock<HashMap<String, StoredObject>>>,
    storage_config: StorageConfig,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new(StorageConfig::default())
    }
}

impl MemoryStorage {
    /// Create a new memory backend
    pub fn new(storage_config: StorageConfig) -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
            storage_config,
        }
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.read().map(|map| map.len()).unwrap_or(0)
    }

    /// Whether no object is stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, HashMap<String, StoredObject>>> {
        self.data.read().map_err(|_| lock_poisoned())
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, HashMap<String, StoredObject>>> {
        self.data.write().map_err(|_| lock_poisoned())
    }

    fn lookup(&self, key: &str) -> StorageResult<StoredObject> {
        utils::validate_key(key)?;
        self.read()?
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })
    }
}

fn lock_poisoned() -> StorageError {
    StorageError::OperationFailed {
        operation: "lock".to_string(),
        reason: "memory storage lock poisoned".to_string(),
    }
}

fn is_below(key: &str, dir: &str) -> bool {
    dir.is_empty()
        || key
            .strip_prefix(dir)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Proper ancestors of a key, shortest first: `a/b/c` yields `a`, `a/b`
fn ancestors(key: &str) -> impl Iterator<Item = &str> {
    key.match_indices('/').map(move |(pos, _)| &key[..pos])
}

impl StorageApiSync for MemoryStorage {
    fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        utils::validate_key(key)?;

        let mut map = self.write()?;
        if map.keys().any(|existing| is_below(existing, key)) {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
                reason: "Key names an existing directory".to_string(),
            });
        }
        if let Some(ancestor) = ancestors(key).find(|ancestor| map.contains_key(*ancestor)) {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
                reason: format!("Parent {} is an object, not a directory", ancestor),
            });
        }
        map.insert(
            key.to_string(),
            StoredObject {
                data,
                last_modified: chrono::Utc::now(),
            },
        );
        Ok(())
    }

    fn get(&self, key: &str) -> StorageResult<Bytes> {
        Ok(self.lookup(key)?.data)
    }

    fn reader(&self, key: &str) -> StorageResult<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(self.lookup(key)?.data)))
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        utils::validate_key(key)?;

        self.write()?
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })
    }

    fn exists(&self, key: &str) -> StorageResult<bool> {
        if key.is_empty() {
            return Ok(true);
        }
        utils::validate_key(key)?;

        let map = self.read()?;
        Ok(map.contains_key(key) || map.keys().any(|existing| is_below(existing, key)))
    }

    fn list(&self, prefix: &str) -> StorageResult<Vec<Entry>> {
        if !prefix.is_empty() {
            utils::validate_key(prefix)?;
        }

        let map = self.read()?;
        let mut entries = BTreeSet::new();
        for key in map.keys().filter(|key| is_below(key, prefix)) {
            let mut start = if prefix.is_empty() { 0 } else { prefix.len() + 1 };
            while let Some(pos) = key[start..].find('/') {
                let end = start + pos;
                entries.insert(Entry::directory(&key[..end]));
                start = end + 1;
            }
            entries.insert(Entry::file(key.as_str()));
        }

        Ok(entries.into_iter().collect())
    }

    fn head(&self, key: &str) -> StorageResult<StorageMetadata> {
        let object = self.lookup(key)?;
        Ok(StorageMetadata {
            content_type: utils::guess_content_type(key),
            content_length: object.data.len() as u64,
            last_modified: Some(object.last_modified),
            etag: Some(utils::checksum(&object.data)),
        })
    }

    fn scheme(&self) -> Scheme {
        Scheme::Memory
    }

    fn config(&self) -> &StorageConfig {
        &self.storage_config
    }
}
