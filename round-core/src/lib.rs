// round-core/src/lib.rs

//! Federated Learning Round Server - Core Library
//!
//! This crate provides the round coordinator and the per-client session
//! handlers of a federated-learning server, together with error handling,
//! configuration, storage abstractions, and chunked artifact transfer. It is
//! transport-agnostic: the RPC layer lives in the server crate and talks to
//! the handlers through plain streams and sinks.

pub mod config;
pub mod error;
pub mod storage;
pub mod transfer;

// Re-export commonly used types for convenience
pub use config::ServerConfig;
pub use error::{Result, RoundError};
pub use storage::{AsyncLocalStorage, AsyncStorageBackend};

pub mod round;
pub use round::{
    Admission, Aggregator, CoordinatorHandle, CoordinatorSettings, ProcessAggregator,
    RoundCoordinator, RoundPhase, RoundState, RoundStatus,
};

pub mod session;
pub use session::{
    CheckInHandler, CheckInRequest, ServerMessage, ServerSink, SessionContext, SessionSettings,
    UpdateHandler, UpdateMessage,
};
