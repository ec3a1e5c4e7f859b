//! gRPC service implementation for the round server.

use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::{wrappers::ReceiverStream, Stream, StreamExt};
use tonic::{Request, Response, Status, Streaming};

use round_core::round::{Aggregator, CoordinatorSettings, RoundCoordinator, RoundState};
use round_core::session::{
    CheckInHandler, CheckInOutcome, CheckInRequest, ServerMessage, ServerSink, SessionContext,
    SessionSettings, UpdateHandler, UpdateMessage, UpdateOutcome,
};
use round_core::storage::{AsyncLocalStorage, AsyncStorageBackend};
use round_core::{RoundError, ServerConfig};

use crate::proto::fl_round_server::{FlRound, FlRoundServer};
use crate::proto::{self, FlData};
use crate::protocol::{inbound_error, to_status};

/// Outbound messages buffered per check-in stream.
const OUTBOUND_BUFFER: usize = 16;

pub struct FlRoundService {
    ctx: SessionContext,
}

impl FlRoundService {
    pub fn new(ctx: SessionContext) -> Self {
        Self { ctx }
    }

    /// Builds storage, starts the round coordinator, and wires both into a
    /// service. The returned task ends once the service (and every session it
    /// spawned) has been dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage directory cannot be created.
    pub async fn from_config(
        config: &ServerConfig,
        aggregator: Arc<dyn Aggregator>,
    ) -> round_core::Result<(Self, JoinHandle<()>)> {
        let storage = AsyncLocalStorage::new(&config.storage).await?;
        tracing::info!(
            "Using {} storage at {}",
            storage.backend_type(),
            config.storage.base_path.display()
        );

        let settings = CoordinatorSettings::from_config(
            &config.round,
            storage.full_path(&config.artifacts.checkpoint_path),
            config.artifacts.model_path.clone(),
        );
        let (coordinator, task) =
            RoundCoordinator::new(settings, RoundState::new(), aggregator).spawn();

        let ctx = SessionContext::new(
            coordinator,
            Arc::new(storage),
            SessionSettings::from_config(config),
        );
        Ok((Self::new(ctx), task))
    }

    pub fn into_server(self) -> FlRoundServer<Self> {
        FlRoundServer::new(self)
    }
}

/// Sends session messages down a gRPC response stream.
struct GrpcSink {
    tx: mpsc::Sender<Result<FlData, Status>>,
}

#[tonic::async_trait]
impl ServerSink for GrpcSink {
    async fn send(&mut self, message: ServerMessage) -> round_core::Result<()> {
        self.tx
            .send(Ok(message.into()))
            .await
            .map_err(|_| RoundError::transport("client stream closed"))
    }
}

#[tonic::async_trait]
impl FlRound for FlRoundService {
    type CheckInStream = Pin<Box<dyn Stream<Item = Result<FlData, Status>> + Send>>;

    async fn check_in(
        &self,
        request: Request<Streaming<proto::CheckInRequest>>,
    ) -> Result<Response<Self::CheckInStream>, Status> {
        let peer = peer_name(&request);
        let inbound = request
            .into_inner()
            .map(|item| item.map(CheckInRequest::from).map_err(inbound_error));

        let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
        let handler = CheckInHandler::new(self.ctx.clone());

        // The session outlives this call: the response stream stays open until
        // the handler drops its sink.
        tokio::spawn(async move {
            let mut sink = GrpcSink { tx };
            match handler.run(inbound, &mut sink).await {
                Ok(CheckInOutcome::Selected(stats)) => {
                    tracing::debug!("Check-in from {} done ({} bytes)", peer, stats.bytes)
                }
                Ok(outcome) => tracing::debug!("Check-in from {} ended: {:?}", peer, outcome),
                Err(e) => {
                    tracing::warn!("Check-in session from {} failed: {}", peer, e);
                    let _ = sink.tx.send(Err(to_status(&e))).await;
                }
            }
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
    }

    async fn update(&self, request: Request<Streaming<FlData>>) -> Result<Response<FlData>, Status> {
        let peer = peer_name(&request);
        let inbound = request
            .into_inner()
            .map(|item| item.map_err(inbound_error).and_then(UpdateMessage::try_from));

        // Run detached so a vanished client still gets its partial upload
        // cleaned up.
        let handler = UpdateHandler::new(self.ctx.clone());
        let report = tokio::spawn(async move { handler.run(inbound).await })
            .await
            .map_err(|e| Status::internal(format!("update session aborted: {}", e)))?
            .map_err(|e| {
                tracing::warn!("Update session from {} failed: {}", peer, e);
                to_status(&e)
            })?;

        if let UpdateOutcome::Discarded { client_index } = report.outcome {
            tracing::info!("Update {} from {} arrived after its round ended", client_index, peer);
        }

        Ok(Response::new(report.reply.into()))
    }
}

fn peer_name<T>(request: &Request<T>) -> String {
    request
        .remote_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|| "unknown peer".to_string())
}
