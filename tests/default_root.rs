//! Default root resolution against the process working directory
//!
//! This binary changes the current directory and environment, so it holds a
//! single test.

use std::env;
use storage_adapter::{Storage, StorageOptions};

#[test]
fn test_init_defaults_root_when_missing() -> color_eyre::Result<()> {
    let temp_dir = tempfile::tempdir()?;
    env::set_current_dir(temp_dir.path())?;
    env::remove_var("OPENDAL_FS_ROOT");

    let storage = Storage::from_env("fs")?;

    assert!(temp_dir.path().join("storage").is_dir());

    storage.save("test.txt", &b"hello"[..])?;
    assert_eq!(storage.load_once("test.txt")?, &b"hello"[..]);
    assert!(temp_dir.path().join("storage").join("test.txt").is_file());

    // Explicit options without a root behave the same way.
    let explicit = Storage::new("fs", StorageOptions::new())?;
    assert_eq!(explicit.load_once("test.txt")?, &b"hello"[..]);

    // A configured root wins over the default.
    env::set_var("OPENDAL_FS_ROOT", "custom/root");
    let configured = Storage::from_env("fs")?;
    assert!(temp_dir.path().join("custom").join("root").is_dir());
    assert!(configured.load_once("test.txt").unwrap_err().is_not_found());
    env::remove_var("OPENDAL_FS_ROOT");

    Ok(())
}
