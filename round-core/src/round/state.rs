// round-core/src/round/state.rs

//! Mutable round data owned by the coordinator.
//!
//! `RoundState` is plain data: it is constructed once and mutated only from
//! inside the coordinator's message loop, so none of these methods need to
//! synchronize.

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Counter discriminator used by coordinator reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarType {
    CheckIn,
    UpdateStart,
    UpdateFinish,
}

/// Outcome of one completed update session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientResult {
    /// Client-reported contribution weight (e.g. local sample count).
    pub weight: i64,
    /// Location of the staged update file.
    pub artifact_path: PathBuf,
}

/// Counters and results for the round in flight.
#[derive(Debug, Default)]
pub struct RoundState {
    round: u64,
    check_in_count: u64,
    update_start_count: u64,
    update_finish_count: u64,
    results: BTreeMap<u64, ClientResult>,
}

impl RoundState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of the round in flight, starting at 0.
    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn counter(&self, var: VarType) -> u64 {
        match var {
            VarType::CheckIn => self.check_in_count,
            VarType::UpdateStart => self.update_start_count,
            VarType::UpdateFinish => self.update_finish_count,
        }
    }

    /// Counts a check-in attempt and returns the new count.
    pub fn record_check_in(&mut self) -> u64 {
        self.check_in_count += 1;
        self.check_in_count
    }

    /// Counts an admitted update session and returns its client index.
    pub fn record_update_start(&mut self) -> u64 {
        self.update_start_count += 1;
        self.update_start_count
    }

    /// Stores the result for `client_index`.
    ///
    /// Returns `false` if the index already had a result; the entry is
    /// replaced but the finish count is left alone so it keeps matching the
    /// number of stored results.
    pub fn record_update_finish(&mut self, client_index: u64, result: ClientResult) -> bool {
        let fresh = self.results.insert(client_index, result).is_none();
        if fresh {
            self.update_finish_count += 1;
        }
        fresh
    }

    /// Results ordered by client index.
    pub fn results(&self) -> &BTreeMap<u64, ClientResult> {
        &self.results
    }

    /// Clears counters and results together and moves on to the next round.
    pub fn reset(&mut self) {
        self.check_in_count = 0;
        self.update_start_count = 0;
        self.update_finish_count = 0;
        self.results.clear();
        self.round += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(weight: i64, path: &str) -> ClientResult {
        ClientResult {
            weight,
            artifact_path: PathBuf::from(path),
        }
    }

    #[test]
    fn test_new_state_is_empty() {
        let state = RoundState::new();
        assert_eq!(state.round(), 0);
        assert_eq!(state.counter(VarType::CheckIn), 0);
        assert_eq!(state.counter(VarType::UpdateStart), 0);
        assert_eq!(state.counter(VarType::UpdateFinish), 0);
        assert!(state.results().is_empty());
    }

    #[test]
    fn test_counters_increase_independently() {
        let mut state = RoundState::new();

        assert_eq!(state.record_check_in(), 1);
        assert_eq!(state.record_check_in(), 2);
        assert_eq!(state.record_update_start(), 1);

        assert_eq!(state.counter(VarType::CheckIn), 2);
        assert_eq!(state.counter(VarType::UpdateStart), 1);
        assert_eq!(state.counter(VarType::UpdateFinish), 0);
    }

    #[test]
    fn test_finish_count_matches_results() {
        let mut state = RoundState::new();
        let first = state.record_update_start();
        let second = state.record_update_start();

        assert!(state.record_update_finish(second, result(296, "u2")));
        assert!(state.record_update_finish(first, result(281, "u1")));
        assert_eq!(state.counter(VarType::UpdateFinish), 2);
        assert_eq!(state.results().len(), 2);

        // Ordered by index, not by arrival
        let weights: Vec<i64> = state.results().values().map(|r| r.weight).collect();
        assert_eq!(weights, vec![281, 296]);
    }

    #[test]
    fn test_duplicate_finish_keeps_invariant() {
        let mut state = RoundState::new();
        let index = state.record_update_start();

        assert!(state.record_update_finish(index, result(1, "a")));
        assert!(!state.record_update_finish(index, result(2, "b")));

        assert_eq!(state.counter(VarType::UpdateFinish), 1);
        assert_eq!(state.results().len(), 1);
        assert_eq!(state.results()[&index].weight, 2);
    }

    #[test]
    fn test_reset_clears_everything_and_advances_round() {
        let mut state = RoundState::new();
        state.record_check_in();
        let index = state.record_update_start();
        state.record_update_finish(index, result(10, "x"));

        state.reset();

        assert_eq!(state.round(), 1);
        assert_eq!(state.counter(VarType::CheckIn), 0);
        assert_eq!(state.counter(VarType::UpdateStart), 0);
        assert_eq!(state.counter(VarType::UpdateFinish), 0);
        assert!(state.results().is_empty());

        // Indexes restart after a reset
        assert_eq!(state.record_update_start(), 1);
    }
}
