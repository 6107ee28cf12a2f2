//! # Storage Adapter
//!
//! Keyed byte storage behind a scheme-selected backend. A [`Storage`] is
//! created from a scheme name (`"fs"`, `"memory"`) and explicit
//! [`StorageOptions`]; for the filesystem scheme it resolves a root
//! directory (`./storage` unless configured), creates it, and stores every
//! object as a file below it.
//!
//! ## Features
//!
//! - **Storage Module**: the adapter, the backend trait and the `fs` / `memory` backends
//! - **Logging**: `tracing` events from every operation, with an optional subscriber setup
//!
//! ## Optional Features
//!
//! - `async`: tokio-based async wrapper ([`storage::AsyncStorage`])
//! - `serde_support`: Serde support for options and metadata
//!
//! ## Example
//!
//! ```rust
//! use storage_adapter::{Storage, StorageOptions};
//!
//! let storage = Storage::new("memory", StorageOptions::new())?;
//! storage.save("test.txt", &b"hello"[..])?;
//! assert_eq!(storage.load_once("test.txt")?, &b"hello"[..]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export core error types
pub use error::{Error, Result};

// Core modules
pub mod error;
pub mod logging;
pub mod storage;

pub use storage::{Storage, StorageOptions};

// Re-export commonly used types
pub mod prelude {
    //! Common types and traits for convenient importing

    pub use crate::error::{Error, Result, StorageError};
    pub use crate::storage::{
        Scheme, Storage, StorageApiSync, StorageMetadata, StorageOptions,
    };

    #[cfg(feature = "async")]
    pub use crate::storage::AsyncStorage;
}

// Version information
/// The version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of this crate
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
