// round-core/src/storage/async_traits.rs

//! Async storage abstraction traits.
//!
//! The round server only needs to stream the shared checkpoint out and
//! stage per-client updates on disk; these traits cover exactly that so a
//! different backend can be dropped in without touching the session handlers.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;

/// A handle for async reading from storage.
pub trait AsyncStorageReader: AsyncRead + Send + Sync + Unpin {
    /// Returns the total size of the object in bytes.
    fn size(&self) -> u64;
}

/// A handle for async writing to storage.
///
/// This trait extends `AsyncWrite` with a method to finalize the write.
#[async_trait]
pub trait AsyncStorageWriter: AsyncWrite + Send + Sync + Unpin {
    /// Finishes the write operation, ensuring all data is persisted.
    ///
    /// This method must be called to complete the write. After calling
    /// `finish`, the writer should not be used again.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing or syncing fails.
    async fn finish(self: Box<Self>) -> Result<()>;
}

/// The core async storage backend trait.
#[async_trait]
pub trait AsyncStorageBackend: Send + Sync {
    /// Checks if an object exists at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the existence check fails.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Opens an object for async reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the object doesn't exist or cannot be opened.
    async fn open_read(&self, path: &Path) -> Result<Box<dyn AsyncStorageReader>>;

    /// Opens an object for async writing.
    ///
    /// If the object already exists, it will be overwritten.
    /// Parent directories will be created if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the object cannot be created or opened.
    async fn open_write(&self, path: &Path) -> Result<Box<dyn AsyncStorageWriter>>;

    /// Deletes an object.
    ///
    /// # Errors
    ///
    /// Returns an error if the object doesn't exist or cannot be deleted.
    async fn delete(&self, path: &Path) -> Result<()>;

    /// Location handed to collaborators outside the backend (the aggregation
    /// process reads update files by this path).
    fn full_path(&self, path: &Path) -> PathBuf;

    /// Returns the backend type name (e.g., "local").
    fn backend_type(&self) -> &'static str;
}
