//! Explicit adapter configuration
//!
//! [`StorageOptions`] carries the root path and free-form string settings.
//! Environment lookups are opt-in through [`StorageOptions::from_env`];
//! nothing else in the crate reads the process environment.

use crate::error::{Error, Result, StorageError};
use crate::storage::constants;
use crate::storage::storage_api::{Scheme, StorageConfig};
use crate::storage::storage_local::LocalConfig;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[cfg(feature = "serde_support")]
use serde::{Deserialize, Serialize};

/// Setting keys understood by the adapter and its backends
pub mod keys {
    /// Root directory (also accepted through `root_path`)
    pub const ROOT: &str = "root";
    /// Write through a temporary file and rename
    pub const ATOMIC_WRITE: &str = "atomic_write";
    /// Compute SHA-256 etags
    pub const ENABLE_CHECKSUMS: &str = "enable_checksums";
    /// Largest accepted object, in bytes
    pub const MAX_FILE_SIZE: &str = "max_file_size";
    /// Retry budget for transient failures
    pub const MAX_RETRIES: &str = "max_retries";
    /// Streaming chunk size, in bytes
    pub const CHUNK_SIZE: &str = "chunk_size";
}

/// Adapter configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde_support", serde(default))]
pub struct StorageOptions {
    /// Root directory; `None` means `./storage` under the current directory
    pub root_path: Option<PathBuf>,
    /// Backend settings keyed by lower-case name
    pub settings: BTreeMap<String, String>,
}

impl StorageOptions {
    /// Options with no root and no settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the root directory
    pub fn with_root_path(mut self, root: impl Into<PathBuf>) -> Self {
        self.root_path = Some(root.into());
        self
    }

    /// Add a setting; the key is lower-cased
    pub fn with_setting(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.insert_setting(key.as_ref(), value.into());
        self
    }

    fn insert_setting(&mut self, key: &str, value: String) {
        let key = key.to_ascii_lowercase();
        if key == keys::ROOT {
            if !value.is_empty() {
                self.root_path = Some(PathBuf::from(value));
            }
        } else {
            self.settings.insert(key, value);
        }
    }

    /// Build options from `OPENDAL_<SCHEME>_<KEY>` pairs
    ///
    /// `<KEY>` is lower-cased; `ROOT` populates [`StorageOptions::root_path`].
    /// Pairs with any other prefix are ignored.
    pub fn from_vars<I, K, V>(scheme: Scheme, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let prefix = env_prefix(scheme);
        let mut options = Self::new();
        for (name, value) in vars {
            if let Some(key) = name.as_ref().strip_prefix(&prefix) {
                if !key.is_empty() {
                    options.insert_setting(key, value.into());
                }
            }
        }
        options
    }

    /// Build options from the process environment
    pub fn from_env(scheme: Scheme) -> Self {
        Self::from_vars(scheme, std::env::vars())
    }

    /// Parse options from JSON
    #[cfg(feature = "serde_support")]
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Configuration {
            message: format!("Invalid storage options JSON: {}", e),
        })
    }

    /// Look up a raw setting
    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }

    /// Root directory as an absolute path
    ///
    /// Relative roots, including the default, are resolved against the
    /// current working directory at call time.
    pub fn resolve_root(&self) -> Result<PathBuf> {
        let root = self
            .root_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(constants::DEFAULT_ROOT));
        if root.is_absolute() {
            return Ok(root);
        }

        let cwd = std::env::current_dir().map_err(|e| StorageError::Initialization {
            root: root.display().to_string(),
            reason: format!("Failed to resolve current directory: {}", e),
        })?;
        Ok(cwd.join(root))
    }

    /// Generic storage configuration derived from the settings
    pub fn storage_config(&self) -> Result<StorageConfig> {
        let mut config = StorageConfig::default();
        if let Some(max_retries) = self.parse_setting::<u32>(keys::MAX_RETRIES)? {
            config.max_retries = max_retries;
        }
        if let Some(chunk_size) = self.parse_setting::<usize>(keys::CHUNK_SIZE)? {
            if chunk_size == 0 {
                return Err(Error::Configuration {
                    message: "chunk_size must be greater than zero".to_string(),
                });
            }
            config.chunk_size = chunk_size;
        }
        config.backend_config = self
            .settings
            .iter()
            .filter(|(key, _)| !matches!(key.as_str(), keys::MAX_RETRIES | keys::CHUNK_SIZE))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Ok(config)
    }

    /// Filesystem backend configuration rooted at `root`
    pub fn local_config(&self, root: &Path) -> Result<LocalConfig> {
        let mut config = LocalConfig {
            base_path: root.to_path_buf(),
            ..Default::default()
        };
        if let Some(atomic) = self.parse_bool(keys::ATOMIC_WRITE)? {
            config.atomic_writes = atomic;
        }
        if let Some(checksums) = self.parse_bool(keys::ENABLE_CHECKSUMS)? {
            config.enable_checksums = checksums;
        }
        if let Some(max_file_size) = self.parse_setting::<u64>(keys::MAX_FILE_SIZE)? {
            config.max_file_size = max_file_size;
        }
        Ok(config)
    }

    fn parse_setting<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.setting(key)
            .map(|raw| {
                raw.trim().parse::<T>().map_err(|e| Error::Configuration {
                    message: format!("Invalid value {:?} for {}: {}", raw, key, e),
                })
            })
            .transpose()
    }

    fn parse_bool(&self, key: &str) -> Result<Option<bool>> {
        self.setting(key)
            .map(|raw| match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                _ => Err(Error::Configuration {
                    message: format!("Invalid boolean {:?} for {}", raw, key),
                }),
            })
            .transpose()
    }
}

/// Environment variable prefix for a scheme, e.g. `OPENDAL_FS_`
pub fn env_prefix(scheme: Scheme) -> String {
    format!(
        "{}_{}_",
        constants::ENV_PREFIX,
        scheme.as_str().to_ascii_uppercase()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_prefix() {
        assert_eq!(env_prefix(Scheme::Fs), "OPENDAL_FS_");
        assert_eq!(env_prefix(Scheme::Memory), "OPENDAL_MEMORY_");
    }

    #[test]
    fn test_from_vars() {
        let vars = vec![
            ("OPENDAL_FS_ROOT", "/data/files"),
            ("OPENDAL_FS_ATOMIC_WRITE", "false"),
            ("OPENDAL_S3_BUCKET", "ignored"),
            ("PATH", "/usr/bin"),
            ("OPENDAL_FS_", "empty key"),
        ];
        let options = StorageOptions::from_vars(Scheme::Fs, vars);

        assert_eq!(options.root_path, Some(PathBuf::from("/data/files")));
        assert_eq!(options.setting("atomic_write"), Some("false"));
        assert_eq!(options.settings.len(), 1);
    }

    #[test]
    fn test_from_vars_without_root() {
        let options = StorageOptions::from_vars(Scheme::Fs, vec![("HOME", "/root")]);
        assert_eq!(options, StorageOptions::default());

        let options = StorageOptions::from_vars(Scheme::Fs, vec![("OPENDAL_FS_ROOT", "")]);
        assert!(options.root_path.is_none());
    }

    #[test]
    fn test_resolve_root() {
        let options = StorageOptions::new().with_root_path("/srv/storage");
        assert_eq!(options.resolve_root().unwrap(), PathBuf::from("/srv/storage"));

        let resolved = StorageOptions::new().resolve_root().unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("storage"));
    }

    #[test]
    fn test_storage_config() {
        let options = StorageOptions::new()
            .with_setting("MAX_RETRIES", "5")
            .with_setting("chunk_size", "1024")
            .with_setting("custom", "value");
        let config = options.storage_config().unwrap();

        assert_eq!(config.max_retries, 5);
        assert_eq!(config.chunk_size, 1024);
        assert_eq!(config.backend_config.get("custom").map(String::as_str), Some("value"));
        assert!(!config.backend_config.contains_key("max_retries"));
    }

    #[test]
    fn test_invalid_settings() {
        let options = StorageOptions::new().with_setting("chunk_size", "0");
        assert!(matches!(
            options.storage_config(),
            Err(Error::Configuration { .. })
        ));

        let options = StorageOptions::new().with_setting("max_retries", "many");
        assert!(matches!(
            options.storage_config(),
            Err(Error::Configuration { .. })
        ));

        let options = StorageOptions::new().with_setting("atomic_write", "maybe");
        assert!(matches!(
            options.local_config(Path::new("/tmp")),
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    fn test_local_config() {
        let options = StorageOptions::new()
            .with_setting("atomic_write", "no")
            .with_setting("enable_checksums", "TRUE")
            .with_setting("max_file_size", "2048");
        let config = options.local_config(Path::new("/tmp/root")).unwrap();

        assert_eq!(config.base_path, PathBuf::from("/tmp/root"));
        assert!(!config.atomic_writes);
        assert!(config.enable_checksums);
        assert_eq!(config.max_file_size, 2048);
    }

    #[cfg(feature = "serde_support")]
    #[test]
    fn test_from_json() {
        let options = StorageOptions::from_json(
            r#"{"root_path": "/var/lib/storage", "settings": {"chunk_size": "8192"}}"#,
        )
        .unwrap();
        assert_eq!(options.root_path, Some(PathBuf::from("/var/lib/storage")));
        assert_eq!(options.setting("chunk_size"), Some("8192"));

        let options = StorageOptions::from_json("{}").unwrap();
        assert_eq!(options, StorageOptions::default());

        assert!(StorageOptions::from_json("not json").is_err());
    }
}
