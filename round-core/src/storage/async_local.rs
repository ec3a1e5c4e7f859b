// round-core/src/storage/async_local.rs

//! Async local filesystem storage backend implementation.
//!
//! This module provides an async storage backend that uses the local filesystem
//! via tokio's async filesystem operations.

use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter, ReadBuf};

use super::async_traits::{AsyncStorageBackend, AsyncStorageReader, AsyncStorageWriter};
use crate::config::StorageConfig;
use crate::error::{Result, RoundError};

/// Async local filesystem storage backend.
///
/// This backend stores objects as files on the local filesystem using
/// tokio's async filesystem operations.
pub struct AsyncLocalStorage {
    /// Base path for all storage operations.
    base_path: PathBuf,
    /// Buffer size for buffered I/O operations.
    buffer_size: usize,
}

impl AsyncLocalStorage {
    /// Creates a new `AsyncLocalStorage` instance from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base path cannot be created.
    pub async fn new(config: &StorageConfig) -> Result<Self> {
        let base_path = config.base_path.clone();

        // Create base directory if it doesn't exist
        if !base_path.exists() {
            fs::create_dir_all(&base_path).await.map_err(|e| {
                RoundError::storage_with_source(&base_path, "failed to create base directory", e)
            })?;
        }

        Ok(Self {
            base_path,
            buffer_size: config.buffer_size,
        })
    }

    /// Resolves a path relative to the base path.
    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }
}

#[async_trait]
impl AsyncStorageBackend for AsyncLocalStorage {
    async fn exists(&self, path: &Path) -> Result<bool> {
        let full_path = self.resolve_path(path);
        Ok(fs::try_exists(&full_path).await.unwrap_or(false))
    }

    async fn open_read(&self, path: &Path) -> Result<Box<dyn AsyncStorageReader>> {
        let full_path = self.resolve_path(path);
        let file = File::open(&full_path).await.map_err(|e| {
            RoundError::storage_with_source(&full_path, "failed to open file", e)
        })?;

        let meta = file.metadata().await.map_err(|e| {
            RoundError::storage_with_source(&full_path, "failed to read file metadata", e)
        })?;

        Ok(Box::new(AsyncLocalReader::new(file, meta.len(), self.buffer_size)))
    }

    async fn open_write(&self, path: &Path) -> Result<Box<dyn AsyncStorageWriter>> {
        let full_path = self.resolve_path(path);

        // Create parent directories if needed
        if let Some(parent) = full_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    RoundError::storage_with_source(
                        parent,
                        "failed to create parent directories",
                        e,
                    )
                })?;
            }
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&full_path)
            .await
            .map_err(|e| {
                RoundError::storage_with_source(&full_path, "failed to create file", e)
            })?;

        Ok(Box::new(AsyncLocalWriter::new(file, full_path, self.buffer_size)))
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let full_path = self.resolve_path(path);
        fs::remove_file(&full_path).await.map_err(|e| {
            RoundError::storage_with_source(&full_path, "failed to delete file", e)
        })
    }

    fn full_path(&self, path: &Path) -> PathBuf {
        self.resolve_path(path)
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}

/// Async buffered file reader for local storage.
pub struct AsyncLocalReader {
    reader: BufReader<File>,
    size: u64,
}

impl AsyncLocalReader {
    fn new(file: File, size: u64, buffer_size: usize) -> Self {
        Self {
            reader: BufReader::with_capacity(buffer_size, file),
            size,
        }
    }
}

impl AsyncRead for AsyncLocalReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.reader).poll_read(cx, buf)
    }
}

impl AsyncStorageReader for AsyncLocalReader {
    fn size(&self) -> u64 {
        self.size
    }
}

/// Async buffered file writer for local storage.
pub struct AsyncLocalWriter {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl AsyncLocalWriter {
    fn new(file: File, path: PathBuf, buffer_size: usize) -> Self {
        Self {
            writer: BufWriter::with_capacity(buffer_size, file),
            path,
        }
    }
}

impl AsyncWrite for AsyncLocalWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.writer).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.writer).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.writer).poll_shutdown(cx)
    }
}

#[async_trait]
impl AsyncStorageWriter for AsyncLocalWriter {
    async fn finish(mut self: Box<Self>) -> Result<()> {
        self.writer.flush().await.map_err(|e| {
            RoundError::storage_with_source(&self.path, "failed to flush writer", e)
        })?;

        // Sync to disk
        self.writer.get_ref().sync_all().await.map_err(|e| {
            RoundError::storage_with_source(&self.path, "failed to sync file to disk", e)
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn create_test_storage() -> (AsyncLocalStorage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = StorageConfig {
            base_path: temp_dir.path().to_path_buf(),
            buffer_size: 4096,
        };
        let storage = AsyncLocalStorage::new(&config).await.unwrap();
        (storage, temp_dir)
    }

    #[tokio::test]
    async fn test_new_creates_base_dir() {
        let temp_dir = TempDir::new().unwrap();
        let new_base = temp_dir.path().join("new_subdir");

        let config = StorageConfig {
            base_path: new_base.clone(),
            ..Default::default()
        };

        let _storage = AsyncLocalStorage::new(&config).await.unwrap();
        assert!(new_base.exists());
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let (storage, _temp) = create_test_storage().await;
        let path = Path::new("fl_checkpoint");

        assert!(!storage.exists(path).await.unwrap());

        let mut writer = storage.open_write(path).await.unwrap();
        writer.write_all(b"model weights").await.unwrap();
        writer.finish().await.unwrap();

        assert!(storage.exists(path).await.unwrap());

        let mut reader = storage.open_read(path).await.unwrap();
        assert_eq!(reader.size(), 13);
        let mut content = Vec::new();
        reader.read_to_end(&mut content).await.unwrap();
        assert_eq!(content, b"model weights");
    }

    #[tokio::test]
    async fn test_open_write_truncates_existing() {
        let (storage, _temp) = create_test_storage().await;
        let path = Path::new("fl_checkpoint_update_1");

        let mut writer = storage.open_write(path).await.unwrap();
        writer.write_all(b"a much longer previous round").await.unwrap();
        writer.finish().await.unwrap();

        let mut writer = storage.open_write(path).await.unwrap();
        writer.write_all(b"short").await.unwrap();
        writer.finish().await.unwrap();

        let reader = storage.open_read(path).await.unwrap();
        assert_eq!(reader.size(), 5);
    }

    #[tokio::test]
    async fn test_open_write_creates_parent_dirs() {
        let (storage, temp) = create_test_storage().await;
        let path = Path::new("updates/round/client_1");

        let writer = storage.open_write(path).await.unwrap();
        writer.finish().await.unwrap();

        assert!(temp.path().join("updates/round/client_1").exists());
    }

    #[tokio::test]
    async fn test_open_read_missing_file() {
        let (storage, _temp) = create_test_storage().await;
        let result = storage.open_read(Path::new("missing")).await;
        assert!(matches!(result, Err(RoundError::Storage { .. })));
    }

    #[tokio::test]
    async fn test_delete_file() {
        let (storage, _temp) = create_test_storage().await;
        let path = Path::new("to_delete");

        let writer = storage.open_write(path).await.unwrap();
        writer.finish().await.unwrap();
        assert!(storage.exists(path).await.unwrap());

        storage.delete(path).await.unwrap();
        assert!(!storage.exists(path).await.unwrap());
        assert!(storage.delete(path).await.is_err());
    }

    #[tokio::test]
    async fn test_full_path() {
        let (storage, temp) = create_test_storage().await;

        assert_eq!(
            storage.full_path(Path::new("fl_checkpoint")),
            temp.path().join("fl_checkpoint")
        );
        assert_eq!(
            storage.full_path(Path::new("/abs/model.h5")),
            PathBuf::from("/abs/model.h5")
        );
    }

    #[tokio::test]
    async fn test_backend_type() {
        let (storage, _temp) = create_test_storage().await;
        assert_eq!(storage.backend_type(), "local");
    }
}
