//! Local filesystem storage backend implementation
//!
//! This module provides the `fs` scheme backend with support for:
//! - Keyed file operations (put, get, delete, exists) below a root directory
//! - Recursive directory listing
//! - Atomic writes with temporary files
//! - File metadata, permissions and optional checksums

use crate::error::{StorageError, StorageResult};
use crate::storage::constants;
use crate::storage::storage_api::{
    utils, Entry, Scheme, StorageApiSync, StorageConfig, StorageMetadata,
};
use bytes::Bytes;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Local storage configuration
#[derive(Debug, Clone)]
pub struct LocalConfig {
    /// Base directory for storage
    pub base_path: PathBuf,
    /// Create directories if they don't exist
    pub create_dirs: bool,
    /// Use atomic writes (write to temp file, then rename)
    pub atomic_writes: bool,
    /// File permissions (Unix only)
    pub file_permissions: Option<u32>,
    /// Directory permissions (Unix only)
    pub dir_permissions: Option<u32>,
    /// Maximum file size (bytes)
    pub max_file_size: u64,
    /// Compute SHA-256 etags in metadata
    pub enable_checksums: bool,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from(constants::DEFAULT_ROOT),
            create_dirs: true,
            atomic_writes: true,
            file_permissions: Some(0o644),
            dir_permissions: Some(0o755),
            max_file_size: constants::MAX_VALUE_SIZE as u64,
            enable_checksums: false,
        }
    }
}

/// Local filesystem storage backend
#[derive(Debug)]
pub struct LocalStorage {
    config: LocalConfig,
    storage_config: StorageConfig,
}

impl LocalStorage {
    /// Create a new local storage backend, creating the base directory if needed
    pub fn new(local_config: LocalConfig, storage_config: StorageConfig) -> StorageResult<Self> {
        let root = local_config.base_path.display().to_string();
        let init_error = |reason: String| StorageError::Initialization {
            root: root.clone(),
            reason,
        };

        if local_config.create_dirs && !local_config.base_path.exists() {
            fs::create_dir_all(&local_config.base_path)
                .map_err(|e| init_error(format!("Failed to create base directory: {}", e)))?;

            #[cfg(unix)]
            if let Some(perms) = local_config.dir_permissions {
                use std::os::unix::fs::PermissionsExt;
                let permissions = fs::Permissions::from_mode(perms);
                fs::set_permissions(&local_config.base_path, permissions).map_err(|e| {
                    init_error(format!("Failed to set directory permissions: {}", e))
                })?;
            }
        }

        if !local_config.base_path.exists() {
            return Err(init_error(
                "Base directory does not exist and create_dirs is disabled".to_string(),
            ));
        }

        if !local_config.base_path.is_dir() {
            return Err(init_error(
                "Base path exists but is not a directory".to_string(),
            ));
        }

        Ok(Self {
            config: local_config,
            storage_config,
        })
    }

    /// Get the full path for a key
    fn get_full_path(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.config.base_path.clone(), |path, segment| path.join(segment))
    }

    /// Ensure parent directory exists
    fn ensure_parent_dir(&self, key: &str, path: &Path) -> StorageResult<()> {
        let Some(parent) = path.parent() else {
            return Ok(());
        };
        if parent.exists() || !self.config.create_dirs {
            return Ok(());
        }

        fs::create_dir_all(parent)
            .map_err(|e| StorageError::from_io("create_parent_directory", key, e))?;

        #[cfg(unix)]
        if let Some(perms) = self.config.dir_permissions {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(perms))
                .map_err(|e| StorageError::from_io("set_directory_permissions", key, e))?;
        }

        Ok(())
    }

    /// Write data to file with optional atomic operation
    fn write_file(&self, key: &str, path: &Path, data: &[u8]) -> StorageResult<()> {
        if data.len() as u64 > self.config.max_file_size {
            return Err(StorageError::OperationFailed {
                operation: "write_file".to_string(),
                reason: format!(
                    "File size {} exceeds maximum {}",
                    data.len(),
                    self.config.max_file_size
                ),
            });
        }

        if path.is_dir() {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
                reason: "Key names an existing directory".to_string(),
            });
        }

        self.ensure_parent_dir(key, path)?;

        if self.config.atomic_writes {
            let temp_path = self.staging_path(key)?;
            let written = write_all(&temp_path, data)
                .map_err(|e| StorageError::from_io("write_temp_file", key, e))
                .and_then(|_| {
                    fs::rename(&temp_path, path)
                        .map_err(|e| StorageError::from_io("atomic_rename", key, e))
                });
            if written.is_err() {
                // Best effort cleanup; the write error is what gets reported.
                let _ = fs::remove_file(&temp_path);
            }
            written?;
        } else {
            write_all(path, data).map_err(|e| StorageError::from_io("write_file", key, e))?;
        }

        #[cfg(unix)]
        if let Some(perms) = self.config.file_permissions {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(perms))
                .map_err(|e| StorageError::from_io("set_file_permissions", key, e))?;
        }

        Ok(())
    }

    /// Fresh temp file path inside the staging directory, created on first use
    fn staging_path(&self, key: &str) -> StorageResult<PathBuf> {
        let staging = self.config.base_path.join(constants::STAGING_DIR);
        fs::create_dir_all(&staging)
            .map_err(|e| StorageError::from_io("create_staging_directory", key, e))?;
        Ok(staging.join(uuid::Uuid::new_v4().to_string()))
    }

    /// Open an object file, rejecting directories
    fn open_file(&self, key: &str, path: &Path) -> StorageResult<File> {
        if path.is_dir() {
            return Err(StorageError::NotFound {
                key: key.to_string(),
            });
        }
        File::open(path).map_err(|e| StorageError::from_io("open_file", key, e))
    }

    /// Get file metadata
    fn get_file_metadata(&self, key: &str, path: &Path) -> StorageResult<StorageMetadata> {
        let metadata =
            fs::metadata(path).map_err(|e| StorageError::from_io("get_metadata", key, e))?;
        if metadata.is_dir() {
            return Err(StorageError::NotFound {
                key: key.to_string(),
            });
        }

        let last_modified = metadata
            .modified()
            .ok()
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .and_then(|duration| {
                chrono::DateTime::from_timestamp(duration.as_secs() as i64, duration.subsec_nanos())
            });

        let etag = if self.config.enable_checksums {
            let data = fs::read(path).map_err(|e| StorageError::from_io("read_file", key, e))?;
            Some(utils::checksum(&data))
        } else {
            None
        };

        Ok(StorageMetadata {
            content_type: utils::guess_content_type(key),
            content_length: metadata.len(),
            last_modified,
            etag,
        })
    }

    /// Recursively collect entries below `dir_path`, keyed relative to the base path
    fn list_files_in_dir(&self, dir_path: &Path, entries: &mut Vec<Entry>) -> StorageResult<()> {
        let resource = dir_path.display().to_string();
        let read_dir =
            fs::read_dir(dir_path).map_err(|e| StorageError::from_io("read_directory", &resource, e))?;

        for dir_entry in read_dir {
            let dir_entry = dir_entry
                .map_err(|e| StorageError::from_io("read_directory_entry", &resource, e))?;
            let path = dir_entry.path();

            let Some(key) = self.relative_key(&path) else {
                continue;
            };
            if key == constants::STAGING_DIR {
                continue;
            }

            if path.is_dir() {
                entries.push(Entry::directory(key));
                self.list_files_in_dir(&path, entries)?;
            } else if path.is_file() {
                entries.push(Entry::file(key));
            }
        }

        Ok(())
    }

    /// Key of `path` relative to the base path; `None` for non UTF-8 names
    fn relative_key(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.config.base_path).ok()?;
        let segments = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()?;
        Some(segments.join("/"))
    }
}

fn write_all(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(data)?;
    writer.flush()?;
    writer.get_ref().sync_all()
}

impl StorageApiSync for LocalStorage {
    fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        utils::validate_key(key)?;

        let path = self.get_full_path(key);
        self.write_file(key, &path, &data)
    }

    fn get(&self, key: &str) -> StorageResult<Bytes> {
        utils::validate_key(key)?;

        let path = self.get_full_path(key);
        let mut reader = BufReader::new(self.open_file(key, &path)?);
        let mut buffer = Vec::new();
        reader
            .read_to_end(&mut buffer)
            .map_err(|e| StorageError::from_io("read_file", key, e))?;

        Ok(Bytes::from(buffer))
    }

    fn reader(&self, key: &str) -> StorageResult<Box<dyn Read + Send>> {
        utils::validate_key(key)?;

        let path = self.get_full_path(key);
        let file = self.open_file(key, &path)?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        utils::validate_key(key)?;

        let path = self.get_full_path(key);
        if path.is_dir() {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
                reason: "Key names a directory".to_string(),
            });
        }

        fs::remove_file(&path).map_err(|e| StorageError::from_io("delete_file", key, e))
    }

    fn exists(&self, key: &str) -> StorageResult<bool> {
        if key.is_empty() {
            return Ok(self.config.base_path.is_dir());
        }
        utils::validate_key(key)?;

        Ok(self.get_full_path(key).exists())
    }

    fn list(&self, prefix: &str) -> StorageResult<Vec<Entry>> {
        let dir_path = if prefix.is_empty() {
            self.config.base_path.clone()
        } else {
            utils::validate_key(prefix)?;
            self.get_full_path(prefix)
        };

        let mut entries = Vec::new();
        if dir_path.is_dir() {
            self.list_files_in_dir(&dir_path, &mut entries)?;
        }
        entries.sort();
        Ok(entries)
    }

    fn head(&self, key: &str) -> StorageResult<StorageMetadata> {
        utils::validate_key(key)?;

        let path = self.get_full_path(key);
        self.get_file_metadata(key, &path)
    }

    fn scheme(&self) -> Scheme {
        Scheme::Fs
    }

    fn root(&self) -> Option<&Path> {
        Some(&self.config.base_path)
    }

    fn config(&self) -> &StorageConfig {
        &self.storage_config
    }
}
