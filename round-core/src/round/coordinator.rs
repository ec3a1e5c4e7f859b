// round-core/src/round/coordinator.rs

//! The round coordinator actor.
//!
//! A single task owns the [`RoundState`] and processes requests from session
//! handlers strictly in arrival order. Handlers talk to it through a cloneable
//! [`CoordinatorHandle`]; every request carries a oneshot reply channel.
//!
//! The coordinator also owns:
//! - the round timer, which abandons the round if the check-in quorum has not
//!   formed within the configured window;
//! - the selection broadcast, which releases every admitted check-in session
//!   in the same step that admits the quorum-forming one;
//! - the aggregation hand-off, which runs on a separate task and reports back
//!   through the coordinator's own mailbox.
//!
//! ```text
//! COLLECTING --quorum--> SELECTED --update limit--> AGGREGATING --done--> COLLECTING
//!     |                                                                     ^
//!     +------------------------timeout (abandon)----------------------------+
//! ```

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::aggregation::{AggregationJob, Aggregator};
use super::state::{ClientResult, RoundState, VarType};
use crate::config::RoundConfig;
use crate::error::{Result, RoundError};

const MAILBOX_CAPACITY: usize = 256;

/// Fixed parameters of every round.
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Check-ins that form the selection quorum.
    pub checkin_limit: u64,
    /// Finished updates that trigger aggregation.
    pub update_limit: u64,
    /// Window for the quorum to form, measured from round start.
    pub round_timeout: Duration,
    /// Checkpoint path handed to the aggregator.
    pub checkpoint_path: PathBuf,
    /// Model path handed to the aggregator.
    pub model_path: PathBuf,
}

impl CoordinatorSettings {
    pub fn from_config(
        config: &RoundConfig,
        checkpoint_path: impl Into<PathBuf>,
        model_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            checkin_limit: config.checkin_limit,
            update_limit: config.update_limit,
            round_timeout: config.round_timeout(),
            checkpoint_path: checkpoint_path.into(),
            model_path: model_path.into(),
        }
    }
}

/// Where the round currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    /// Accepting check-ins until the quorum forms or the timer fires.
    Collecting,
    /// Quorum formed; waiting for updates.
    Selected,
    /// Updates handed to the aggregator; nothing is admitted.
    Aggregating,
}

/// Point-in-time view of the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundStatus {
    pub round: u64,
    pub phase: RoundPhase,
    pub check_ins: u64,
    pub update_starts: u64,
    pub update_finishes: u64,
    pub results: usize,
    /// Admitted check-in sessions still waiting for selection.
    pub waiting: usize,
}

/// Reply to a check-in request.
#[derive(Debug)]
pub enum Admission {
    /// Over the limit (or aggregating); the client should come back later.
    Rejected { round: u64 },
    /// Admitted; resolve the ticket to learn whether the client was selected.
    Waiting(SelectionTicket),
}

/// Pending selection outcome for an admitted check-in.
///
/// Resolves to `true` once the quorum forms, `false` if the round is
/// abandoned, or [`RoundError::CoordinatorUnavailable`] if the coordinator
/// shut down first.
#[derive(Debug)]
pub struct SelectionTicket {
    round: u64,
    position: u64,
    outcome: oneshot::Receiver<bool>,
}

impl SelectionTicket {
    pub fn round(&self) -> u64 {
        self.round
    }

    /// 1-based admission position within the round.
    pub fn position(&self) -> u64 {
        self.position
    }
}

impl Future for SelectionTicket {
    type Output = Result<bool>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.outcome)
            .poll(cx)
            .map(|res| res.map_err(|_| RoundError::CoordinatorUnavailable))
    }
}

/// An admitted update session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateSlot {
    /// Round the slot was issued in.
    pub round: u64,
    /// 1-based client index, unique within the round.
    pub client_index: u64,
}

enum Request {
    Read {
        var: VarType,
        reply: oneshot::Sender<u64>,
    },
    CheckIn {
        reply: oneshot::Sender<Admission>,
    },
    UpdateStart {
        reply: oneshot::Sender<Option<UpdateSlot>>,
    },
    UpdateFinish {
        slot: UpdateSlot,
        result: ClientResult,
        reply: oneshot::Sender<bool>,
    },
    Status {
        reply: oneshot::Sender<RoundStatus>,
    },
}

struct AggregationDone {
    round: u64,
    outcome: Result<()>,
}

/// Cloneable front door to the coordinator task.
///
/// The coordinator stops once every handle has been dropped.
#[derive(Clone)]
pub struct CoordinatorHandle {
    sender: mpsc::Sender<Request>,
}

impl CoordinatorHandle {
    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Request) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(build(reply))
            .await
            .map_err(|_| RoundError::CoordinatorUnavailable)?;
        response.await.map_err(|_| RoundError::CoordinatorUnavailable)
    }

    /// Current value of a counter.
    pub async fn read(&self, var: VarType) -> Result<u64> {
        self.request(|reply| Request::Read { var, reply }).await
    }

    /// Registers a check-in attempt.
    pub async fn check_in(&self) -> Result<Admission> {
        self.request(|reply| Request::CheckIn { reply }).await
    }

    /// Admits an update session and assigns its client index.
    ///
    /// Returns `None` while the round is aggregating.
    pub async fn start_update(&self) -> Result<Option<UpdateSlot>> {
        self.request(|reply| Request::UpdateStart { reply }).await
    }

    /// Records a completed update. Returns `false` if the slot is stale or
    /// the round is aggregating; the result is not stored in that case.
    pub async fn finish_update(&self, slot: UpdateSlot, result: ClientResult) -> Result<bool> {
        self.request(|reply| Request::UpdateFinish {
            slot,
            result,
            reply,
        })
        .await
    }

    pub async fn status(&self) -> Result<RoundStatus> {
        self.request(|reply| Request::Status { reply }).await
    }
}

/// Serialized owner of the round state.
pub struct RoundCoordinator {
    settings: CoordinatorSettings,
    state: RoundState,
    aggregator: Arc<dyn Aggregator>,
    phase: RoundPhase,
    deadline: Option<Instant>,
    waiters: Vec<oneshot::Sender<bool>>,
    done_tx: mpsc::Sender<AggregationDone>,
    done_rx: mpsc::Receiver<AggregationDone>,
}

impl RoundCoordinator {
    pub fn new(
        settings: CoordinatorSettings,
        state: RoundState,
        aggregator: Arc<dyn Aggregator>,
    ) -> Self {
        let (done_tx, done_rx) = mpsc::channel(1);
        Self {
            settings,
            state,
            aggregator,
            phase: RoundPhase::Collecting,
            deadline: None,
            waiters: Vec::new(),
            done_tx,
            done_rx,
        }
    }

    /// Starts the coordinator on the current runtime.
    pub fn spawn(self) -> (CoordinatorHandle, JoinHandle<()>) {
        let (sender, requests) = mpsc::channel(MAILBOX_CAPACITY);
        let task = tokio::spawn(self.run(requests));
        (CoordinatorHandle { sender }, task)
    }

    async fn run(mut self, mut requests: mpsc::Receiver<Request>) {
        self.deadline = Some(Instant::now() + self.settings.round_timeout);
        tracing::info!(
            "Round {} started (checkin_limit={}, update_limit={}, window={:?})",
            self.state.round(),
            self.settings.checkin_limit,
            self.settings.update_limit,
            self.settings.round_timeout
        );

        loop {
            tokio::select! {
                request = requests.recv() => match request {
                    Some(request) => self.handle(request),
                    None => break,
                },
                Some(done) = self.done_rx.recv() => self.on_aggregation_done(done),
                _ = wait_until(self.deadline) => self.on_timeout(),
            }
        }

        tracing::info!("Round coordinator stopped in round {}", self.state.round());
    }

    fn handle(&mut self, request: Request) {
        match request {
            Request::Read { var, reply } => {
                let _ = reply.send(self.state.counter(var));
            }
            Request::CheckIn { reply } => self.on_check_in(reply),
            Request::UpdateStart { reply } => {
                let _ = reply.send(self.on_update_start());
            }
            Request::UpdateFinish {
                slot,
                result,
                reply,
            } => {
                let _ = reply.send(self.on_update_finish(slot, result));
            }
            Request::Status { reply } => {
                let _ = reply.send(self.status());
            }
        }
    }

    fn on_check_in(&mut self, reply: oneshot::Sender<Admission>) {
        let round = self.state.round();
        let count = self.state.record_check_in();

        if self.phase == RoundPhase::Aggregating || count > self.settings.checkin_limit {
            tracing::debug!("Check-in {} rejected in round {} ({:?})", count, round, self.phase);
            let _ = reply.send(Admission::Rejected { round });
            return;
        }

        let (tx, rx) = oneshot::channel();
        self.waiters.push(tx);
        let ticket = SelectionTicket {
            round,
            position: count,
            outcome: rx,
        };
        if reply.send(Admission::Waiting(ticket)).is_err() {
            // The slot still counts toward the quorum.
            tracing::debug!("Check-in {} of round {} went away before admission", count, round);
        }
        tracing::info!(
            "Check-in {}/{} admitted in round {}",
            count,
            self.settings.checkin_limit,
            round
        );

        if count == self.settings.checkin_limit {
            self.select();
        }
    }

    fn select(&mut self) {
        self.phase = RoundPhase::Selected;
        self.deadline = None;

        let released = self.release_waiters(true);
        tracing::info!(
            "Quorum reached in round {}: {} client(s) selected",
            self.state.round(),
            released
        );
    }

    fn on_update_start(&mut self) -> Option<UpdateSlot> {
        if self.phase == RoundPhase::Aggregating {
            tracing::debug!("Update start rejected while aggregating round {}", self.state.round());
            return None;
        }

        let client_index = self.state.record_update_start();
        tracing::info!(
            "Update session {} started in round {}",
            client_index,
            self.state.round()
        );
        Some(UpdateSlot {
            round: self.state.round(),
            client_index,
        })
    }

    fn on_update_finish(&mut self, slot: UpdateSlot, result: ClientResult) -> bool {
        if slot.round != self.state.round() || self.phase == RoundPhase::Aggregating {
            tracing::warn!(
                "Discarding update {} from round {} (current round {}, {:?})",
                slot.client_index,
                slot.round,
                self.state.round(),
                self.phase
            );
            return false;
        }

        let weight = result.weight;
        if !self.state.record_update_finish(slot.client_index, result) {
            tracing::warn!(
                "Update {} finished twice in round {}; keeping the latest",
                slot.client_index,
                slot.round
            );
        }

        let finished = self.state.counter(VarType::UpdateFinish);
        tracing::info!(
            "Update {} finished in round {} (weight={}, {}/{})",
            slot.client_index,
            slot.round,
            weight,
            finished,
            self.settings.update_limit
        );

        if finished == self.settings.update_limit {
            self.start_aggregation();
        }
        true
    }

    fn start_aggregation(&mut self) {
        self.phase = RoundPhase::Aggregating;
        self.deadline = None;

        let job = AggregationJob {
            round: self.state.round(),
            checkpoint_path: self.settings.checkpoint_path.clone(),
            model_path: self.settings.model_path.clone(),
            updates: self
                .state
                .results()
                .values()
                .map(|r| (r.weight, r.artifact_path.clone()))
                .collect(),
        };

        let aggregator = Arc::clone(&self.aggregator);
        let done_tx = self.done_tx.clone();
        tokio::spawn(async move {
            let round = job.round;
            // A panicking aggregator must still end the round.
            let task = tokio::spawn(async move { aggregator.aggregate(job).await });
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) => Err(RoundError::aggregation(format!(
                    "aggregation task aborted: {}",
                    e
                ))),
            };
            let _ = done_tx.send(AggregationDone { round, outcome }).await;
        });
    }

    fn on_aggregation_done(&mut self, done: AggregationDone) {
        if done.round != self.state.round() || self.phase != RoundPhase::Aggregating {
            tracing::warn!("Ignoring aggregation result for round {}", done.round);
            return;
        }

        match done.outcome {
            Ok(()) => tracing::info!("Aggregation for round {} complete", done.round),
            Err(e) => tracing::error!("Aggregation for round {} failed: {}", done.round, e),
        }
        self.reset();
    }

    fn on_timeout(&mut self) {
        self.deadline = None;
        if self.phase != RoundPhase::Collecting {
            return;
        }

        let check_ins = self.state.counter(VarType::CheckIn);
        if check_ins > 0 {
            tracing::warn!(
                "Round {} abandoned: {}/{} check-ins before timeout",
                self.state.round(),
                check_ins,
                self.settings.checkin_limit
            );
        } else {
            tracing::debug!("Round {} expired with no check-ins", self.state.round());
        }
        self.reset();
    }

    /// Ends the round. Sessions still waiting for selection are told they
    /// were not selected.
    fn reset(&mut self) {
        let released = self.release_waiters(false);
        if released > 0 {
            tracing::info!("Released {} unselected check-in(s)", released);
        }

        self.state.reset();
        self.phase = RoundPhase::Collecting;
        self.deadline = Some(Instant::now() + self.settings.round_timeout);
        tracing::info!("Round {} started", self.state.round());
    }

    fn release_waiters(&mut self, selected: bool) -> usize {
        let waiters = std::mem::take(&mut self.waiters);
        let count = waiters.len();
        for waiter in waiters {
            // A closed receiver means the session already left.
            let _ = waiter.send(selected);
        }
        count
    }

    fn status(&self) -> RoundStatus {
        RoundStatus {
            round: self.state.round(),
            phase: self.phase,
            check_ins: self.state.counter(VarType::CheckIn),
            update_starts: self.state.counter(VarType::UpdateStart),
            update_finishes: self.state.counter(VarType::UpdateFinish),
            results: self.state.results().len(),
            waiting: self.waiters.len(),
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
