// round-core/src/round/mod.rs

//! Round lifecycle: state, the coordinator actor that serializes every
//! mutation of it, and the aggregation call-out that ends a round.

pub mod aggregation;
pub mod coordinator;
pub mod state;

pub use aggregation::{AggregationJob, Aggregator, ProcessAggregator};
pub use coordinator::{
    Admission, CoordinatorHandle, CoordinatorSettings, RoundCoordinator, RoundPhase, RoundStatus,
    SelectionTicket, UpdateSlot,
};
pub use state::{ClientResult, RoundState, VarType};
