// round-core/src/session/update.rs

//! Update session: admission, chunked upload, weight submission, completion.

use std::path::Path;

use futures::{Stream, StreamExt};

use super::protocol::{ServerMessage, UpdateMessage};
use super::SessionContext;
use crate::error::{Result, RoundError};
use crate::round::{ClientResult, UpdateSlot};
use crate::storage::AsyncStorageWriter;
use crate::transfer::{ChunkAssembler, TransferStats};

/// How an update session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Not admitted because the round is aggregating.
    Rejected,
    /// Stored as part of the current round.
    Recorded {
        client_index: u64,
        weight: i64,
        stats: TransferStats,
    },
    /// Uploaded completely, but the round it started in is over.
    Discarded { client_index: u64 },
}

/// Result of a completed session together with the single reply to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    pub outcome: UpdateOutcome,
    pub reply: ServerMessage,
}

/// Drives one client through an update session.
pub struct UpdateHandler {
    ctx: SessionContext,
}

impl UpdateHandler {
    pub fn new(ctx: SessionContext) -> Self {
        Self { ctx }
    }

    /// Runs the session until the client closes its stream.
    ///
    /// # Errors
    ///
    /// Fails if storage or the inbound stream fails, or if the stream closes
    /// without a weight. A partially written artifact is removed; the client
    /// slot stays unfinished for the rest of the round.
    pub async fn run<S>(&self, inbound: S) -> Result<UpdateReport>
    where
        S: Stream<Item = Result<UpdateMessage>> + Send + Unpin,
    {
        let reply = ServerMessage::ReconnectAfter(self.ctx.settings.post_update_reconnection_secs);

        let slot = match self.ctx.coordinator.start_update().await? {
            Some(slot) => slot,
            None => {
                tracing::info!("Update rejected while aggregating");
                return Ok(UpdateReport {
                    outcome: UpdateOutcome::Rejected,
                    reply,
                });
            }
        };

        let path = self.ctx.settings.artifacts.update_path(slot.client_index);
        let (weight, stats) = match self.receive(&path, inbound).await {
            Ok(received) => received,
            Err(e) => {
                self.discard_partial(slot, &path).await;
                return Err(e);
            }
        };

        let result = ClientResult {
            weight,
            artifact_path: self.ctx.storage.full_path(&path),
        };
        let outcome = if self.ctx.coordinator.finish_update(slot, result).await? {
            tracing::info!(
                "Received update {} for round {} ({} bytes, weight {})",
                slot.client_index,
                slot.round,
                stats.bytes,
                weight
            );
            UpdateOutcome::Recorded {
                client_index: slot.client_index,
                weight,
                stats,
            }
        } else {
            UpdateOutcome::Discarded {
                client_index: slot.client_index,
            }
        };

        Ok(UpdateReport { outcome, reply })
    }

    async fn receive<S>(&self, path: &Path, mut inbound: S) -> Result<(i64, TransferStats)>
    where
        S: Stream<Item = Result<UpdateMessage>> + Send + Unpin,
    {
        let writer = self.ctx.storage.open_write(path).await?;
        let mut assembler = ChunkAssembler::new(writer);
        let mut weight = None;

        while let Some(message) = inbound.next().await {
            match message? {
                UpdateMessage::CheckpointUpdate(chunk) => {
                    assembler.append(&chunk).await?;
                    tracing::trace!("Appended {} bytes to {}", chunk.len(), path.display());
                }
                UpdateMessage::CheckpointWeight(value) => weight = Some(value),
            }
        }

        let (writer, stats): (Box<dyn AsyncStorageWriter>, _) = assembler.finish().await?;
        writer.finish().await?;

        let weight = weight
            .ok_or_else(|| RoundError::protocol("update stream closed without a weight"))?;
        Ok((weight, stats))
    }

    async fn discard_partial(&self, slot: UpdateSlot, path: &Path) {
        tracing::warn!(
            "Update {} of round {} failed; removing partial artifact",
            slot.client_index,
            slot.round
        );
        match self.ctx.storage.exists(path).await {
            Ok(true) => {
                if let Err(e) = self.ctx.storage.delete(path).await {
                    tracing::warn!("Failed to remove {}: {}", path.display(), e);
                }
            }
            Ok(false) => {}
            Err(e) => tracing::warn!("Failed to check {}: {}", path.display(), e),
        }
    }
}
