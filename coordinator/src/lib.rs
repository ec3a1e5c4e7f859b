//! Federated Learning Round Server - gRPC adapter
//!
//! Exposes the `fl.round.FlRound` service on top of the transport-agnostic
//! session handlers in `round_core`, plus the conversions the `fl-client`
//! test client shares with the server.

pub mod proto {
    include!("proto/fl.round.rs");
}

pub mod protocol;
pub mod service;

pub use service::FlRoundService;
