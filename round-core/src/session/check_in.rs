// round-core/src/session/check_in.rs

//! Check-in session: identification, admission, selection wait, and
//! checkpoint download.

use futures::{Stream, StreamExt};

use super::protocol::{CheckInRequest, ServerMessage, ServerSink};
use super::SessionContext;
use crate::error::{Result, RoundError};
use crate::round::Admission;
use crate::transfer::{read_chunks, TransferStats};

/// How a check-in session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckInOutcome {
    /// Over the check-in limit; told to reconnect.
    Rejected,
    /// Admitted but the round was abandoned; told to reconnect.
    NotSelected,
    /// Selected; the checkpoint was streamed.
    Selected(TransferStats),
}

/// Drives one client through a check-in session.
pub struct CheckInHandler {
    ctx: SessionContext,
}

impl CheckInHandler {
    pub fn new(ctx: SessionContext) -> Self {
        Self { ctx }
    }

    /// Runs the session to completion.
    ///
    /// Only the first inbound message is read. The session ends when the
    /// returned future resolves; closing the outbound stream signals the end
    /// of the checkpoint to the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the client closes before identifying itself, the
    /// coordinator is gone, the checkpoint cannot be read, or the client
    /// disconnects mid-transfer. None of these touch round state.
    pub async fn run<S, K>(&self, mut inbound: S, sink: &mut K) -> Result<CheckInOutcome>
    where
        S: Stream<Item = Result<CheckInRequest>> + Send + Unpin,
        K: ServerSink + ?Sized,
    {
        let request = match inbound.next().await {
            Some(request) => request?,
            None => {
                return Err(RoundError::protocol(
                    "check-in stream closed before identification",
                ))
            }
        };

        let ticket = match self.ctx.coordinator.check_in().await? {
            Admission::Rejected { round } => {
                tracing::info!("Check-in from '{}' rejected in round {}", request.name, round);
                self.reconnect(sink).await?;
                return Ok(CheckInOutcome::Rejected);
            }
            Admission::Waiting(ticket) => ticket,
        };

        let round = ticket.round();
        tracing::debug!(
            "'{}' waiting for selection in round {} (position {})",
            request.name,
            round,
            ticket.position()
        );

        if !ticket.await? {
            tracing::info!("'{}' not selected in round {}", request.name, round);
            self.reconnect(sink).await?;
            return Ok(CheckInOutcome::NotSelected);
        }

        let stats = self.stream_checkpoint(sink).await?;
        tracing::info!(
            "Sent checkpoint to '{}' for round {} ({} bytes in {} chunks)",
            request.name,
            round,
            stats.bytes,
            stats.chunks
        );
        Ok(CheckInOutcome::Selected(stats))
    }

    async fn reconnect<K>(&self, sink: &mut K) -> Result<()>
    where
        K: ServerSink + ?Sized,
    {
        let secs = self.ctx.settings.post_checkin_reconnection_secs;
        sink.send(ServerMessage::ReconnectAfter(secs)).await
    }

    async fn stream_checkpoint<K>(&self, sink: &mut K) -> Result<TransferStats>
    where
        K: ServerSink + ?Sized,
    {
        let path = &self.ctx.settings.artifacts.checkpoint_path;
        let reader = self.ctx.storage.open_read(path).await?;
        tracing::debug!("Streaming {} ({} bytes)", path.display(), reader.size());
        let mut chunks = read_chunks(reader, self.ctx.settings.artifacts.chunk_size);

        let mut stats = TransferStats::default();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            stats.record(chunk.len());
            sink.send(ServerMessage::Checkpoint(chunk)).await?;
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::round::RoundPhase;
    use crate::session::test_support::{harness, CollectingAggregator, RECONNECT_SECS};
    use bytes::Bytes;
    use tokio::sync::mpsc;

    fn hello(name: &str) -> impl Stream<Item = Result<CheckInRequest>> + Send + Unpin {
        tokio_stream::iter(vec![Ok(CheckInRequest {
            name: name.to_string(),
        })])
    }

    async fn drain(mut rx: mpsc::Receiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Some(message) = rx.recv().await {
            messages.push(message);
        }
        messages
    }

    fn joined(messages: &[ServerMessage]) -> Vec<u8> {
        let mut out = Vec::new();
        for message in messages {
            match message {
                ServerMessage::Checkpoint(chunk) => out.extend_from_slice(chunk),
                other => panic!("unexpected message {:?}", other),
            }
        }
        out
    }

    async fn session(
        handler: CheckInHandler,
        name: &'static str,
    ) -> (Result<CheckInOutcome>, Vec<ServerMessage>) {
        let (mut tx, rx) = mpsc::channel(64);
        let outcome = handler.run(hello(name), &mut tx).await;
        drop(tx);
        (outcome, drain(rx).await)
    }

    #[tokio::test]
    async fn test_quorum_streams_checkpoint_and_rejects_late_client() {
        let checkpoint = b"0123456789";
        let h = harness(2, 1, Some(checkpoint), CollectingAggregator::default()).await;

        let a = tokio::spawn(session(CheckInHandler::new(h.ctx.clone()), "a"));
        let b = tokio::spawn(session(CheckInHandler::new(h.ctx.clone()), "b"));

        for task in [a, b] {
            let (outcome, messages) = task.await.unwrap();
            assert_eq!(
                outcome.unwrap(),
                CheckInOutcome::Selected(TransferStats {
                    chunks: 3,
                    bytes: 10
                })
            );
            assert_eq!(messages.len(), 3);
            assert_eq!(joined(&messages), checkpoint);
        }

        let (outcome, messages) = session(CheckInHandler::new(h.ctx.clone()), "c").await;
        assert_eq!(outcome.unwrap(), CheckInOutcome::Rejected);
        assert_eq!(messages, vec![ServerMessage::ReconnectAfter(RECONNECT_SECS)]);

        let status = h.ctx.coordinator.status().await.unwrap();
        assert_eq!(status.phase, RoundPhase::Selected);
        assert_eq!(status.check_ins, 3);
    }

    #[tokio::test]
    async fn test_many_concurrent_sessions_select_only_the_limit() {
        let checkpoint = b"shared model";
        let h = harness(3, 1, Some(checkpoint), CollectingAggregator::default()).await;

        const NAMES: [&str; 10] = ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"];
        let sessions: Vec<_> = NAMES
            .into_iter()
            .map(|name| tokio::spawn(session(CheckInHandler::new(h.ctx.clone()), name)))
            .collect();

        let mut selected = 0;
        let mut rejected = 0;
        for task in sessions {
            let (outcome, messages) = task.await.unwrap();
            match outcome.unwrap() {
                CheckInOutcome::Selected(_) => {
                    selected += 1;
                    assert_eq!(joined(&messages), checkpoint);
                }
                CheckInOutcome::Rejected => {
                    rejected += 1;
                    assert_eq!(messages, vec![ServerMessage::ReconnectAfter(RECONNECT_SECS)]);
                }
                CheckInOutcome::NotSelected => panic!("round must not be abandoned"),
            }
        }
        assert_eq!((selected, rejected), (3, 7));

        let status = h.ctx.coordinator.status().await.unwrap();
        assert_eq!(status.phase, RoundPhase::Selected);
        assert_eq!(status.check_ins, 10);
        assert_eq!(status.waiting, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_round_tells_client_to_reconnect() {
        let h = harness(2, 1, None, CollectingAggregator::default()).await;

        let (outcome, messages) = session(CheckInHandler::new(h.ctx.clone()), "lonely").await;

        assert_eq!(outcome.unwrap(), CheckInOutcome::NotSelected);
        assert_eq!(messages, vec![ServerMessage::ReconnectAfter(RECONNECT_SECS)]);
        assert_eq!(h.ctx.coordinator.status().await.unwrap().round, 1);
    }

    #[tokio::test]
    async fn test_empty_checkpoint_sends_no_chunks() {
        let h = harness(1, 1, Some(b""), CollectingAggregator::default()).await;

        let (outcome, messages) = session(CheckInHandler::new(h.ctx.clone()), "a").await;

        assert_eq!(
            outcome.unwrap(),
            CheckInOutcome::Selected(TransferStats::default())
        );
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn test_missing_identification_is_protocol_error() {
        let h = harness(1, 1, Some(b"ckpt"), CollectingAggregator::default()).await;
        let (mut tx, _rx) = mpsc::channel(4);

        let inbound = tokio_stream::iter(Vec::<Result<CheckInRequest>>::new());
        let result = CheckInHandler::new(h.ctx.clone()).run(inbound, &mut tx).await;

        assert!(matches!(result, Err(RoundError::Protocol { .. })));
        assert_eq!(h.ctx.coordinator.status().await.unwrap().check_ins, 0);
    }

    #[tokio::test]
    async fn test_inbound_error_is_propagated() {
        let h = harness(1, 1, Some(b"ckpt"), CollectingAggregator::default()).await;
        let (mut tx, _rx) = mpsc::channel(4);

        let inbound = tokio_stream::iter(vec![Err(RoundError::transport("reset by peer"))]);
        let result = CheckInHandler::new(h.ctx.clone()).run(inbound, &mut tx).await;

        assert!(matches!(result, Err(RoundError::Transport { .. })));
        assert_eq!(h.ctx.coordinator.status().await.unwrap().check_ins, 0);
    }

    #[tokio::test]
    async fn test_missing_checkpoint_fails_session_only() {
        let h = harness(1, 1, None, CollectingAggregator::default()).await;

        let (outcome, messages) = session(CheckInHandler::new(h.ctx.clone()), "a").await;

        assert!(matches!(outcome, Err(RoundError::Storage { .. })));
        assert!(messages.is_empty());

        let status = h.ctx.coordinator.status().await.unwrap();
        assert_eq!(status.phase, RoundPhase::Selected);
        assert_eq!(status.check_ins, 1);
    }

    #[tokio::test]
    async fn test_client_gone_mid_transfer() {
        let h = harness(1, 1, Some(b"0123456789"), CollectingAggregator::default()).await;
        let (mut tx, rx) = mpsc::channel(1);
        drop(rx);

        let result = CheckInHandler::new(h.ctx.clone())
            .run(hello("a"), &mut tx)
            .await;
        assert!(matches!(result, Err(RoundError::Transport { .. })));
    }

    #[tokio::test]
    async fn test_chunks_match_configured_size() {
        let h = harness(1, 1, Some(b"abcdefgh"), CollectingAggregator::default()).await;

        let (_, messages) = session(CheckInHandler::new(h.ctx.clone()), "a").await;
        assert_eq!(
            messages,
            vec![
                ServerMessage::Checkpoint(Bytes::from_static(b"abcd")),
                ServerMessage::Checkpoint(Bytes::from_static(b"efgh")),
            ]
        );
    }
}
