//! Integration tests for the storage adapter

use bytes::Bytes;
use storage_adapter::prelude::*;
use storage_adapter::storage::{LocalConfig, LocalStorage, MemoryStorage, StorageConfig};
use tempfile::TempDir;

#[test]
fn test_library_version() {
    assert!(!storage_adapter::VERSION.is_empty());
    assert_eq!(storage_adapter::CRATE_NAME, "storage-adapter");
}

#[test]
fn test_fs_round_trip_and_overwrite() -> color_eyre::Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path().join("nested").join("storage");
    let storage = Storage::new("fs", StorageOptions::new().with_root_path(&root))?;

    assert!(root.is_dir());
    assert_eq!(storage.root(), Some(root.as_path()));

    storage.save("docs/a.bin", vec![0u8, 1, 2, 255])?;
    assert_eq!(storage.load_once("docs/a.bin")?, Bytes::from(vec![0u8, 1, 2, 255]));

    storage.save("docs/a.bin", "replaced")?;
    assert_eq!(storage.load_once("docs/a.bin")?, Bytes::from("replaced"));
    Ok(())
}

#[test]
fn test_missing_key_is_not_found() -> color_eyre::Result<()> {
    let temp_dir = TempDir::new()?;
    let storage = Storage::new("fs", StorageOptions::new().with_root_path(temp_dir.path()))?;

    match storage.load_once("never-saved.txt") {
        Err(Error::Storage(StorageError::NotFound { key })) => {
            assert_eq!(key, "never-saved.txt")
        }
        other => panic!("expected NotFound, got {:?}", other),
    }
    Ok(())
}

#[test]
fn test_memory_storage_adapter() -> color_eyre::Result<()> {
    let storage = Storage::with_backend(Box::new(MemoryStorage::default()));
    assert_eq!(storage.scheme(), Scheme::Memory);
    assert!(storage.root().is_none());

    storage.save("test_key", &b"test_data"[..])?;
    assert_eq!(storage.load_once("test_key")?, &b"test_data"[..]);
    assert!(storage.exists("test_key")?);

    storage.delete("test_key")?;
    assert!(!storage.exists("test_key")?);
    Ok(())
}

#[test]
fn test_scan_download_and_settings() -> color_eyre::Result<()> {
    let temp_dir = TempDir::new()?;
    let options = StorageOptions::new()
        .with_root_path(temp_dir.path().join("root"))
        .with_setting("enable_checksums", "true")
        .with_setting("chunk_size", "5");
    let storage = Storage::new("FS", options)?;

    storage.save("reports/2024/q1.txt", "first quarter")?;
    storage.save("reports/2024/q2.txt", "second quarter")?;
    storage.save("index.html", "<html></html>")?;

    assert_eq!(
        storage.scan("reports", true, true)?,
        vec![
            "reports/2024/",
            "reports/2024/q1.txt",
            "reports/2024/q2.txt",
        ]
    );

    let metadata = storage.metadata("index.html")?;
    assert_eq!(metadata.content_type.as_deref(), Some("text/html"));
    assert_eq!(metadata.content_length, 13);
    assert!(metadata.etag.is_some());

    let chunks = storage
        .load_stream("reports/2024/q1.txt")?
        .collect::<Result<Vec<_>>>()?;
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks.concat(), b"first quarter");

    let target = temp_dir.path().join("q2.txt");
    storage.download("reports/2024/q2.txt", &target)?;
    assert_eq!(std::fs::read_to_string(&target)?, "second quarter");
    Ok(())
}

#[test]
fn test_custom_backend() -> color_eyre::Result<()> {
    let temp_dir = TempDir::new()?;
    let local = LocalStorage::new(
        LocalConfig {
            base_path: temp_dir.path().to_path_buf(),
            atomic_writes: false,
            ..Default::default()
        },
        StorageConfig::default(),
    )?;
    let storage = Storage::with_backend(Box::new(local));

    storage.save("plain.txt", "direct write")?;
    assert_eq!(std::fs::read_to_string(temp_dir.path().join("plain.txt"))?, "direct write");
    Ok(())
}

#[test]
fn test_error_types() {
    let error = Error::from(StorageError::Write {
        key: "k".to_string(),
        reason: "disk full".to_string(),
    });

    assert!(error.to_string().contains("Storage error"));
    assert!(error.to_string().contains("disk full"));
}
