// round-core/src/session/protocol.rs

//! Transport-independent session messages.
//!
//! These are the messages the session handlers exchange with a client. The
//! RPC layer converts its wire types to and from them; nothing in here knows
//! about the wire format.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{Result, RoundError};

/// Identification message opening a check-in session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckInRequest {
    /// Free-form client name, used for logging only.
    pub name: String,
}

/// Messages sent from the server to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// One chunk of the shared checkpoint.
    Checkpoint(Bytes),
    /// Seconds the client should wait before reconnecting.
    ReconnectAfter(u64),
}

/// Messages a client sends during an update session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateMessage {
    /// One chunk of the client's updated checkpoint.
    CheckpointUpdate(Bytes),
    /// Contribution weight of the update; the last one received wins.
    CheckpointWeight(i64),
}

/// Outbound half of a session.
#[async_trait]
pub trait ServerSink: Send {
    /// Sends one message, waiting for transport capacity.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the client has gone away.
    async fn send(&mut self, message: ServerMessage) -> Result<()>;
}

#[async_trait]
impl ServerSink for mpsc::Sender<ServerMessage> {
    async fn send(&mut self, message: ServerMessage) -> Result<()> {
        mpsc::Sender::send(self, message)
            .await
            .map_err(|_| RoundError::transport("client stream closed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_sink_delivers_in_order() {
        let (mut tx, mut rx) = mpsc::channel(4);

        ServerSink::send(&mut tx, ServerMessage::Checkpoint(Bytes::from_static(b"ab")))
            .await
            .unwrap();
        ServerSink::send(&mut tx, ServerMessage::ReconnectAfter(8))
            .await
            .unwrap();

        assert_eq!(
            rx.recv().await,
            Some(ServerMessage::Checkpoint(Bytes::from_static(b"ab")))
        );
        assert_eq!(rx.recv().await, Some(ServerMessage::ReconnectAfter(8)));
    }

    #[tokio::test]
    async fn test_channel_sink_reports_closed_client() {
        let (mut tx, rx) = mpsc::channel(1);
        drop(rx);

        let result = ServerSink::send(&mut tx, ServerMessage::ReconnectAfter(8)).await;
        assert!(matches!(result, Err(RoundError::Transport { .. })));
    }
}
