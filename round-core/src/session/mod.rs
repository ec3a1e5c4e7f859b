// round-core/src/session/mod.rs

//! Per-client session handlers.
//!
//! Each client connection runs one handler on its own task. Handlers never
//! touch round state directly: they ask the coordinator through a
//! [`CoordinatorHandle`] and move artifacts through the storage backend.

pub mod check_in;
pub mod protocol;
pub mod update;

use std::sync::Arc;

use crate::config::{ArtifactConfig, ServerConfig};
use crate::round::CoordinatorHandle;
use crate::storage::AsyncStorageBackend;

pub use check_in::{CheckInHandler, CheckInOutcome};
pub use protocol::{CheckInRequest, ServerMessage, ServerSink, UpdateMessage};
pub use update::{UpdateHandler, UpdateOutcome, UpdateReport};

/// Session-level settings shared by every handler.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Artifact locations (relative to the storage base) and chunk size.
    pub artifacts: ArtifactConfig,
    pub post_checkin_reconnection_secs: u64,
    pub post_update_reconnection_secs: u64,
}

impl SessionSettings {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            artifacts: config.artifacts.clone(),
            post_checkin_reconnection_secs: config.round.post_checkin_reconnection_secs,
            post_update_reconnection_secs: config.round.post_update_reconnection_secs,
        }
    }
}

/// Everything a session handler needs, cheap to clone per connection.
#[derive(Clone)]
pub struct SessionContext {
    pub coordinator: CoordinatorHandle,
    pub storage: Arc<dyn AsyncStorageBackend>,
    pub settings: Arc<SessionSettings>,
}

impl SessionContext {
    pub fn new(
        coordinator: CoordinatorHandle,
        storage: Arc<dyn AsyncStorageBackend>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            coordinator,
            storage,
            settings: Arc::new(settings),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use tempfile::TempDir;
    use tokio::sync::Notify;

    use super::{SessionContext, SessionSettings};
    use crate::config::{ArtifactConfig, StorageConfig};
    use crate::error::Result;
    use crate::round::{
        AggregationJob, Aggregator, CoordinatorHandle, CoordinatorSettings, RoundCoordinator,
        RoundState, RoundStatus,
    };
    use crate::storage::{AsyncLocalStorage, AsyncStorageBackend};

    pub(crate) const CHUNK_SIZE: usize = 4;
    pub(crate) const RECONNECT_SECS: u64 = 8;

    #[derive(Default)]
    pub(crate) struct CollectingAggregator {
        pub(crate) jobs: Mutex<Vec<AggregationJob>>,
        pub(crate) gate: Option<Notify>,
    }

    impl CollectingAggregator {
        pub(crate) fn jobs(&self) -> Vec<AggregationJob> {
            self.jobs.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Aggregator for CollectingAggregator {
        async fn aggregate(&self, job: AggregationJob) -> Result<()> {
            self.jobs.lock().unwrap().push(job);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            Ok(())
        }
    }

    pub(crate) struct Harness {
        pub(crate) ctx: SessionContext,
        pub(crate) aggregator: Arc<CollectingAggregator>,
        pub(crate) temp: TempDir,
    }

    impl Harness {
        pub(crate) fn path(&self, relative: &str) -> std::path::PathBuf {
            self.temp.path().join(relative)
        }

        pub(crate) async fn wait_for_round(&self, round: u64) -> RoundStatus {
            wait_for_round(&self.ctx.coordinator, round).await
        }
    }

    pub(crate) async fn wait_for_round(handle: &CoordinatorHandle, round: u64) -> RoundStatus {
        loop {
            let status = handle.status().await.unwrap();
            if status.round == round {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    /// Builds a session context over a temporary directory. The checkpoint
    /// file is written before the coordinator (and its timer) starts.
    pub(crate) async fn harness(
        checkin_limit: u64,
        update_limit: u64,
        checkpoint: Option<&[u8]>,
        aggregator: CollectingAggregator,
    ) -> Harness {
        let temp = TempDir::new().unwrap();
        if let Some(content) = checkpoint {
            std::fs::write(temp.path().join("fl_checkpoint"), content).unwrap();
        }

        let storage = AsyncLocalStorage::new(&StorageConfig {
            base_path: temp.path().to_path_buf(),
            buffer_size: 1024,
        })
        .await
        .unwrap();

        let aggregator = Arc::new(aggregator);
        let (coordinator, _task) = RoundCoordinator::new(
            CoordinatorSettings {
                checkin_limit,
                update_limit,
                round_timeout: Duration::from_secs(8),
                checkpoint_path: storage.full_path(Path::new("fl_checkpoint")),
                model_path: temp.path().join("model.h5"),
            },
            RoundState::new(),
            aggregator.clone(),
        )
        .spawn();

        let settings = SessionSettings {
            artifacts: ArtifactConfig {
                chunk_size: CHUNK_SIZE,
                ..Default::default()
            },
            post_checkin_reconnection_secs: RECONNECT_SECS,
            post_update_reconnection_secs: RECONNECT_SECS,
        };

        Harness {
            ctx: SessionContext::new(coordinator, Arc::new(storage), settings),
            aggregator,
            temp,
        }
    }
}
