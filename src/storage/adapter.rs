//! Scheme-selected storage adapter
//!
//! [`Storage`] is the entry point of the crate: it picks a backend from a
//! scheme name, makes sure the backend's root exists, and forwards keyed
//! reads and writes to it.

use crate::error::{Error, Result, StorageError};
use crate::storage::options::StorageOptions;
use crate::storage::storage_api::{utils, with_retry, Scheme, StorageApiSync, StorageMetadata};
use crate::storage::StorageFactory;
use bytes::{Bytes, BytesMut};
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

/// Storage adapter over a scheme-selected backend
pub struct Storage {
    backend: Box<dyn StorageApiSync>,
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("scheme", &self.backend.scheme())
            .field("root", &self.backend.root())
            .finish()
    }
}

impl Storage {
    /// Create an adapter for `scheme`
    ///
    /// For `fs`, the root defaults to `./storage` and is created, including
    /// missing parents, before this returns.
    pub fn new(scheme: &str, options: StorageOptions) -> Result<Self> {
        let scheme = scheme.parse::<Scheme>()?;
        let backend = StorageFactory::create(scheme, &options)?;

        tracing::info!(
            scheme = %scheme,
            root = ?backend.root(),
            "storage initialized"
        );

        Ok(Self::with_backend(backend))
    }

    /// Create an adapter configured from `OPENDAL_<SCHEME>_*` variables
    pub fn from_env(scheme: &str) -> Result<Self> {
        let parsed = scheme.parse::<Scheme>()?;
        Self::new(scheme, StorageOptions::from_env(parsed))
    }

    /// Wrap an already constructed backend
    pub fn with_backend(backend: Box<dyn StorageApiSync>) -> Self {
        Self { backend }
    }

    /// Scheme of the backing store
    pub fn scheme(&self) -> Scheme {
        self.backend.scheme()
    }

    /// Root directory, if the backend has one
    pub fn root(&self) -> Option<&Path> {
        self.backend.root()
    }

    /// Write `data` under `key`, replacing any existing object
    pub fn save(&self, key: &str, data: impl Into<Bytes>) -> Result<()> {
        let data = data.into();
        let write_error = |reason: String| StorageError::Write {
            key: key.to_string(),
            reason,
        };

        let normalized = utils::object_key(key).map_err(|e| write_error(e.to_string()))?;
        tracing::debug!(key = %normalized, size = data.len(), "saving object");

        self.retry("save", || self.backend.put(&normalized, data.clone()))
            .map_err(|e| write_error(e.to_string()))?;
        Ok(())
    }

    /// Read the whole object stored under `key`
    ///
    /// This is a plain read: the object stays in place.
    pub fn load_once(&self, key: &str) -> Result<Bytes> {
        let normalized = utils::object_key(key)?;
        let data = self.retry("load_once", || self.backend.get(&normalized))?;
        tracing::debug!(key = %normalized, size = data.len(), "loaded object");
        Ok(data)
    }

    /// Read the object under `key` as a sequence of chunks
    ///
    /// Chunks are `chunk_size` bytes long except for the last one. A missing
    /// key fails here, before any chunk is produced.
    pub fn load_stream(&self, key: &str) -> Result<ChunkStream> {
        let normalized = utils::object_key(key)?;
        let reader = self.retry("load_stream", || self.backend.reader(&normalized))?;
        tracing::debug!(key = %normalized, "streaming object");

        Ok(ChunkStream::new(normalized, reader, self.backend.config().chunk_size))
    }

    /// Copy the object under `key` into a local file, replacing it if present
    pub fn download(&self, key: &str, target: impl AsRef<Path>) -> Result<()> {
        let target = target.as_ref();
        let normalized = utils::object_key(key)?;
        let mut reader = self.retry("download", || self.backend.reader(&normalized))?;

        let mut writer = BufWriter::new(File::create(target)?);
        let copied = io::copy(&mut reader, &mut writer)?;
        writer.flush()?;

        tracing::debug!(key = %normalized, target = %target.display(), size = copied, "downloaded object");
        Ok(())
    }

    /// Whether an object (or directory) exists under `key`
    pub fn exists(&self, key: &str) -> Result<bool> {
        let normalized = utils::dir_key(key)?;
        Ok(self.retry("exists", || self.backend.exists(&normalized))?)
    }

    /// Delete the object under `key`; deleting a missing key succeeds
    pub fn delete(&self, key: &str) -> Result<()> {
        let normalized = utils::object_key(key)?;
        if !self.retry("exists", || self.backend.exists(&normalized))? {
            tracing::debug!(key = %normalized, "delete skipped, object absent");
            return Ok(());
        }

        match self.retry("delete", || self.backend.delete(&normalized)) {
            Ok(()) | Err(StorageError::NotFound { .. }) => {
                tracing::debug!(key = %normalized, "deleted object");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Recursively list keys under `path` (`""` for the root)
    ///
    /// Files are reported without a trailing `/`, directories with one.
    pub fn scan(&self, path: &str, files: bool, directories: bool) -> Result<Vec<String>> {
        if !files && !directories {
            return Err(Error::InvalidInput {
                message: "At least one of files or directories must be requested".to_string(),
            });
        }

        let dir = utils::dir_key(path)?;
        if !self.retry("exists", || self.backend.exists(&dir))? {
            return Err(StorageError::NotFound {
                key: path.to_string(),
            }
            .into());
        }

        let entries = self.retry("scan", || self.backend.list(&dir))?;
        Ok(entries
            .into_iter()
            .filter(|entry| if entry.is_dir() { directories } else { files })
            .map(|entry| entry.key)
            .collect())
    }

    /// Metadata of the object under `key`
    pub fn metadata(&self, key: &str) -> Result<StorageMetadata> {
        let normalized = utils::object_key(key)?;
        Ok(self.retry("metadata", || self.backend.head(&normalized))?)
    }

    fn retry<T, F>(&self, operation: &str, f: F) -> crate::error::StorageResult<T>
    where
        F: FnMut() -> crate::error::StorageResult<T>,
    {
        with_retry(operation, self.backend.config().max_retries, f)
    }
}

/// Chunked reader returned by [`Storage::load_stream`]
pub struct ChunkStream {
    key: String,
    reader: Box<dyn Read + Send>,
    chunk_size: usize,
    done: bool,
}

impl fmt::Debug for ChunkStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkStream")
            .field("key", &self.key)
            .field("chunk_size", &self.chunk_size)
            .field("done", &self.done)
            .finish()
    }
}

impl ChunkStream {
    fn new(key: String, reader: Box<dyn Read + Send>, chunk_size: usize) -> Self {
        Self {
            key,
            reader,
            chunk_size: chunk_size.max(1),
            done: false,
        }
    }

    /// Key being streamed
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Fill one chunk, stopping early only at end of data
    fn read_chunk(&mut self) -> io::Result<Bytes> {
        let mut buffer = BytesMut::zeroed(self.chunk_size);
        let mut filled = 0;
        while filled < self.chunk_size {
            match self.reader.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        buffer.truncate(filled);
        Ok(buffer.freeze())
    }
}

impl Iterator for ChunkStream {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.read_chunk() {
            Ok(chunk) if chunk.is_empty() => {
                self.done = true;
                None
            }
            Ok(chunk) => {
                if chunk.len() < self.chunk_size {
                    self.done = true;
                }
                Some(Ok(chunk))
            }
            Err(e) => {
                self.done = true;
                Some(Err(StorageError::from_io("load_stream", &self.key, e).into()))
            }
        }
    }
}
