//! Async wrapper around the blocking storage adapter
//!
//! Every call runs on tokio's blocking pool, so the adapter can be used from
//! async code without stalling the runtime.

use crate::error::{Error, Result, StorageError};
use crate::storage::adapter::Storage;
use crate::storage::options::StorageOptions;
use crate::storage::storage_api::{Scheme, StorageMetadata};
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Number of chunks buffered between the reading thread and the stream consumer
const STREAM_BUFFER: usize = 4;

/// Async storage adapter
#[derive(Debug, Clone)]
pub struct AsyncStorage {
    inner: Arc<Storage>,
}

impl AsyncStorage {
    /// Wrap an existing adapter
    pub fn new(storage: Storage) -> Self {
        Self {
            inner: Arc::new(storage),
        }
    }

    /// Construct the adapter off the runtime threads
    pub async fn open(scheme: &str, options: StorageOptions) -> Result<Self> {
        let scheme = scheme.to_string();
        let storage = spawn(move || Storage::new(&scheme, options)).await?;
        Ok(Self::new(storage))
    }

    /// Borrow the blocking adapter
    pub fn blocking(&self) -> &Storage {
        &self.inner
    }

    /// Scheme of the backing store
    pub fn scheme(&self) -> Scheme {
        self.inner.scheme()
    }

    /// See [`Storage::save`]
    pub async fn save(&self, key: &str, data: impl Into<Bytes>) -> Result<()> {
        let key = key.to_string();
        let data = data.into();
        self.run(move |storage| storage.save(&key, data)).await
    }

    /// See [`Storage::load_once`]
    pub async fn load_once(&self, key: &str) -> Result<Bytes> {
        let key = key.to_string();
        self.run(move |storage| storage.load_once(&key)).await
    }

    /// See [`Storage::load_stream`]
    ///
    /// A missing key fails here; read errors later show up as stream items.
    pub async fn load_stream(&self, key: &str) -> Result<BoxStream<'static, Result<Bytes>>> {
        let key = key.to_string();
        let chunks = self.run(move |storage| storage.load_stream(&key)).await?;

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        tokio::task::spawn_blocking(move || {
            for chunk in chunks {
                if tx.blocking_send(chunk).is_err() {
                    // Receiver dropped; stop reading.
                    break;
                }
            }
        });

        Ok(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|chunk| (chunk, rx))
        })
        .boxed())
    }

    /// See [`Storage::download`]
    pub async fn download(&self, key: &str, target: impl Into<PathBuf>) -> Result<()> {
        let key = key.to_string();
        let target = target.into();
        self.run(move |storage| storage.download(&key, &target)).await
    }

    /// See [`Storage::exists`]
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let key = key.to_string();
        self.run(move |storage| storage.exists(&key)).await
    }

    /// See [`Storage::delete`]
    pub async fn delete(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.run(move |storage| storage.delete(&key)).await
    }

    /// See [`Storage::scan`]
    pub async fn scan(&self, path: &str, files: bool, directories: bool) -> Result<Vec<String>> {
        let path = path.to_string();
        self.run(move |storage| storage.scan(&path, files, directories))
            .await
    }

    /// See [`Storage::metadata`]
    pub async fn metadata(&self, key: &str) -> Result<StorageMetadata> {
        let key = key.to_string();
        self.run(move |storage| storage.metadata(&key)).await
    }

    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Storage) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        spawn(move || f(&inner)).await
    }
}

async fn spawn<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        Error::Storage(StorageError::OperationFailed {
            operation: "spawn_blocking".to_string(),
            reason: e.to_string(),
        })
    })?
}
