// round-core/src/transfer.rs

//! Chunked artifact transfer.
//!
//! Both session handlers move files over message streams in fixed-size
//! pieces: [`read_chunks`] splits a source into chunks of exactly
//! `chunk_size` bytes (only the last one may be shorter), and
//! [`ChunkAssembler`] appends received chunks to a destination in arrival
//! order. There is no reordering and no integrity check beyond what the
//! transport provides.

use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Result, RoundError};

/// Chunk size used when none is configured.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// A stream of chunk payloads.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Counters for one transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    pub chunks: u64,
    pub bytes: u64,
}

impl TransferStats {
    pub(crate) fn record(&mut self, len: usize) {
        self.chunks += 1;
        self.bytes += len as u64;
    }
}

/// Splits `reader` into chunks of `chunk_size` bytes.
///
/// Short reads from the source are coalesced, so every chunk except the
/// final one is exactly `chunk_size` bytes. An empty source yields no chunks.
/// A `chunk_size` of zero is treated as one.
pub fn read_chunks<R>(reader: R, chunk_size: usize) -> ChunkStream
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let chunk_size = chunk_size.max(1);

    Box::pin(futures::stream::try_unfold(
        Some(reader),
        move |state| async move {
            let mut reader = match state {
                Some(reader) => reader,
                None => return Ok(None),
            };

            let mut buf = vec![0u8; chunk_size];
            let mut filled = 0;
            while filled < chunk_size {
                let n = reader.read(&mut buf[filled..]).await.map_err(|e| {
                    RoundError::storage_with_source("<stream>", "failed to read chunk", e)
                })?;
                if n == 0 {
                    break;
                }
                filled += n;
            }

            if filled == 0 {
                return Ok(None);
            }

            // A short chunk means the source is exhausted.
            let next = if filled == chunk_size { Some(reader) } else { None };
            buf.truncate(filled);
            Ok::<_, RoundError>(Some((Bytes::from(buf), next)))
        },
    ))
}

/// Appends received chunks to a destination in arrival order.
pub struct ChunkAssembler<W> {
    writer: W,
    stats: TransferStats,
}

impl<W> ChunkAssembler<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            stats: TransferStats::default(),
        }
    }

    /// Appends one chunk payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the destination write fails.
    pub async fn append(&mut self, chunk: &[u8]) -> Result<()> {
        self.writer.write_all(chunk).await.map_err(|e| {
            RoundError::storage_with_source("<destination>", "failed to append chunk", e)
        })?;
        self.stats.record(chunk.len());
        Ok(())
    }

    /// Flushes the destination and hands it back together with the counters.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub async fn finish(mut self) -> Result<(W, TransferStats)> {
        self.writer.flush().await.map_err(|e| {
            RoundError::storage_with_source("<destination>", "failed to flush chunks", e)
        })?;
        Ok((self.writer, self.stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    async fn collect_chunks(data: Vec<u8>, chunk_size: usize) -> Vec<Bytes> {
        let mut stream = read_chunks(std::io::Cursor::new(data), chunk_size);
        let mut chunks = Vec::new();
        while let Some(chunk) = stream.next().await {
            chunks.push(chunk.unwrap());
        }
        chunks
    }

    /// Yields at most one byte per read.
    struct TrickleReader {
        data: Vec<u8>,
        pos: usize,
    }

    impl AsyncRead for TrickleReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            if self.pos < self.data.len() && buf.remaining() > 0 {
                let byte = self.data[self.pos];
                buf.put_slice(&[byte]);
                self.pos += 1;
            }
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_empty_source_yields_no_chunks() {
        let chunks = collect_chunks(Vec::new(), 16).await;
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn test_chunks_are_fixed_size() {
        let chunks = collect_chunks(sample(10), 4).await;
        let sizes: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
    }

    #[tokio::test]
    async fn test_exact_multiple_has_no_trailing_empty_chunk() {
        let chunks = collect_chunks(sample(12), 4).await;
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() == 4));
    }

    #[tokio::test]
    async fn test_default_chunk_size() {
        let chunks = collect_chunks(sample(DEFAULT_CHUNK_SIZE * 2 + 100), DEFAULT_CHUNK_SIZE).await;
        let sizes: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_SIZE, 100]);
    }

    #[tokio::test]
    async fn test_short_reads_are_coalesced() {
        let data = sample(9);
        let reader = TrickleReader {
            data: data.clone(),
            pos: 0,
        };
        let mut stream = read_chunks(reader, 4);
        let mut sizes = Vec::new();
        let mut joined = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.unwrap();
            sizes.push(chunk.len());
            joined.extend_from_slice(&chunk);
        }
        assert_eq!(sizes, vec![4, 4, 1]);
        assert_eq!(joined, data);
    }

    #[tokio::test]
    async fn test_zero_chunk_size_is_treated_as_one() {
        let chunks = collect_chunks(sample(3), 0).await;
        assert_eq!(chunks.len(), 3);
    }

    #[tokio::test]
    async fn test_assembler_reproduces_source() {
        for (len, chunk_size) in [(0, 1), (1, 1), (5, 1), (7, 3), (4096, 1000), (100, 4096)] {
            let data = sample(len);
            let chunks = collect_chunks(data.clone(), chunk_size).await;

            let mut assembler = ChunkAssembler::new(Vec::new());
            for chunk in &chunks {
                assembler.append(chunk).await.unwrap();
            }
            let (assembled, stats) = assembler.finish().await.unwrap();

            assert_eq!(assembled, data, "len={} chunk_size={}", len, chunk_size);
            assert_eq!(stats.bytes, len as u64);
            assert_eq!(stats.chunks, chunks.len() as u64);
        }
    }

    #[tokio::test]
    async fn test_assembler_stats_track_appends() {
        let mut assembler = ChunkAssembler::new(Vec::new());
        assembler.append(b"abc").await.unwrap();
        assembler.append(b"").await.unwrap();
        assembler.append(b"de").await.unwrap();

        let (written, stats) = assembler.finish().await.unwrap();
        assert_eq!(written, b"abcde");
        assert_eq!(
            stats,
            TransferStats {
                chunks: 3,
                bytes: 5
            }
        );
    }
}
