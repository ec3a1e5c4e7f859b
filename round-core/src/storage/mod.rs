// round-core/src/storage/mod.rs

//! Storage abstraction for the round server.
//!
//! Session handlers read the shared checkpoint and write per-client update
//! artifacts through [`AsyncStorageBackend`], so the on-disk layout stays an
//! external concern.
//!
//! # Example
//!
//! ```no_run
//! use round_core::config::StorageConfig;
//! use round_core::storage::{AsyncLocalStorage, AsyncStorageBackend};
//! use round_core::transfer::ChunkAssembler;
//! use std::path::Path;
//!
//! # async fn example() -> round_core::Result<()> {
//! let config = StorageConfig::default();
//! let storage = AsyncLocalStorage::new(&config).await?;
//!
//! let writer = storage.open_write(Path::new("fl_checkpoint_update_1")).await?;
//! let mut assembler = ChunkAssembler::new(writer);
//! assembler.append(b"weights").await?;
//! let (writer, _stats) = assembler.finish().await?;
//! writer.finish().await?;
//! # Ok(())
//! # }
//! ```

mod async_local;
mod async_traits;

pub use async_local::{AsyncLocalReader, AsyncLocalStorage, AsyncLocalWriter};
pub use async_traits::{AsyncStorageBackend, AsyncStorageReader, AsyncStorageWriter};
