//! Conversions between the wire messages and the session messages.
//!
//! The handlers in `round_core` work on [`ServerMessage`], [`UpdateMessage`]
//! and [`CheckInRequest`]; this module maps them to and from the generated
//! protobuf types in both directions, so the server and the test client share
//! one definition of the wire layout.

use round_core::session::{CheckInRequest, ServerMessage, UpdateMessage};
use round_core::RoundError;
use tonic::Status;

use crate::proto;

impl From<proto::CheckInRequest> for CheckInRequest {
    fn from(request: proto::CheckInRequest) -> Self {
        Self {
            name: request.message,
        }
    }
}

impl From<CheckInRequest> for proto::CheckInRequest {
    fn from(request: CheckInRequest) -> Self {
        Self {
            message: request.name,
        }
    }
}

impl From<ServerMessage> for proto::FlData {
    fn from(message: ServerMessage) -> Self {
        match message {
            ServerMessage::Checkpoint(content) => Self {
                message: Some(proto::Chunk { content }),
                r#type: proto::Type::FlCheckpoint as i32,
                int_val: 0,
            },
            ServerMessage::ReconnectAfter(secs) => Self {
                message: None,
                r#type: proto::Type::FlReconnTime as i32,
                int_val: i64::try_from(secs).unwrap_or(i64::MAX),
            },
        }
    }
}

impl TryFrom<proto::FlData> for ServerMessage {
    type Error = RoundError;

    fn try_from(data: proto::FlData) -> Result<Self, Self::Error> {
        match message_type(&data)? {
            proto::Type::FlCheckpoint => Ok(Self::Checkpoint(chunk_content(data))),
            proto::Type::FlReconnTime => u64::try_from(data.int_val)
                .map(Self::ReconnectAfter)
                .map_err(|_| {
                    RoundError::protocol(format!("negative reconnection time {}", data.int_val))
                }),
            other => Err(RoundError::protocol(format!(
                "unexpected {} message from server",
                other.as_str_name()
            ))),
        }
    }
}

impl From<UpdateMessage> for proto::FlData {
    fn from(message: UpdateMessage) -> Self {
        match message {
            UpdateMessage::CheckpointUpdate(content) => Self {
                message: Some(proto::Chunk { content }),
                r#type: proto::Type::FlCheckpointUpdate as i32,
                int_val: 0,
            },
            UpdateMessage::CheckpointWeight(weight) => Self {
                message: None,
                r#type: proto::Type::FlCheckpointWeight as i32,
                int_val: weight,
            },
        }
    }
}

impl TryFrom<proto::FlData> for UpdateMessage {
    type Error = RoundError;

    fn try_from(data: proto::FlData) -> Result<Self, Self::Error> {
        match message_type(&data)? {
            proto::Type::FlCheckpointUpdate => Ok(Self::CheckpointUpdate(chunk_content(data))),
            proto::Type::FlCheckpointWeight => Ok(Self::CheckpointWeight(data.int_val)),
            other => Err(RoundError::protocol(format!(
                "unexpected {} message in update stream",
                other.as_str_name()
            ))),
        }
    }
}

fn message_type(data: &proto::FlData) -> Result<proto::Type, RoundError> {
    proto::Type::try_from(data.r#type)
        .map_err(|_| RoundError::protocol(format!("unknown message type {}", data.r#type)))
}

// A chunk message without a payload carries zero bytes.
fn chunk_content(data: proto::FlData) -> bytes::Bytes {
    data.message.map(|chunk| chunk.content).unwrap_or_default()
}

/// Maps a session error onto the status returned to the client.
pub fn to_status(error: &RoundError) -> Status {
    match error {
        RoundError::Protocol { message } => Status::invalid_argument(message.clone()),
        RoundError::CoordinatorUnavailable => Status::unavailable(error.to_string()),
        _ => Status::internal(error.to_string()),
    }
}

/// Wraps a failure on an inbound gRPC stream.
pub fn inbound_error(status: Status) -> RoundError {
    RoundError::transport_with_source("inbound stream failed", status)
}
