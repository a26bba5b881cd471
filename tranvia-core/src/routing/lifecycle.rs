//! Worker life-cycle: round bookkeeping, callback fan-out and interruption
//!
//! Subsystems never reach into globals; everything a worker exposes about its
//! progress flows through a [`WorkerLifeCycle`] handed to it at construction.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::model::transit::types::Time;

/// Why a search stopped before completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    Cancelled,
    TimedOut,
}

/// Cancellation flag and wall-clock deadline, checked at iteration and round
/// boundaries. Interruption surfaces the partial result, never an error.
#[derive(Debug, Clone, Default)]
pub struct SearchLimits {
    cancelled: Option<Arc<AtomicBool>>,
    deadline: Option<Instant>,
}

impl SearchLimits {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancelled = Some(flag);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn interruption(&self) -> Option<Interrupted> {
        if let Some(flag) = &self.cancelled {
            if flag.load(Ordering::Relaxed) {
                return Some(Interrupted::Cancelled);
            }
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Some(Interrupted::TimedOut);
            }
        }
        None
    }
}

/// Observes worker progress. All methods have empty defaults.
pub trait WorkerListener {
    fn setup_iteration(&mut self, _departure: Time) {}
    fn round_start(&mut self, _round: usize) {}
    fn transits_for_round_complete(&mut self, _round: usize) {}
    fn transfers_for_round_complete(&mut self, _round: usize) {}
    fn iteration_complete(&mut self, _departure: Time) {}
}

/// Fan-out of life-cycle callbacks to registered listeners.
#[derive(Default)]
pub struct WorkerLifeCycle {
    listeners: Vec<Box<dyn WorkerListener + Send>>,
}

impl WorkerLifeCycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, listener: Box<dyn WorkerListener + Send>) {
        self.listeners.push(listener);
    }

    pub fn setup_iteration(&mut self, departure: Time) {
        for listener in &mut self.listeners {
            listener.setup_iteration(departure);
        }
    }

    pub fn round_start(&mut self, round: usize) {
        for listener in &mut self.listeners {
            listener.round_start(round);
        }
    }

    pub fn transits_for_round_complete(&mut self, round: usize) {
        for listener in &mut self.listeners {
            listener.transits_for_round_complete(round);
        }
    }

    pub fn transfers_for_round_complete(&mut self, round: usize) {
        for listener in &mut self.listeners {
            listener.transfers_for_round_complete(round);
        }
    }

    pub fn iteration_complete(&mut self, departure: Time) {
        for listener in &mut self.listeners {
            listener.iteration_complete(departure);
        }
    }
}

impl std::fmt::Debug for WorkerLifeCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerLifeCycle")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Tracks the current round and the round upper bound.
///
/// Whenever a destination arrival is accepted in round `r`, the bound
/// tightens to `min(bound, r + max_additional_transfers)`: the search is
/// allowed a few more transfers after first reaching the destination, then
/// stops.
#[derive(Debug, Clone)]
pub struct RoundTracker {
    round: usize,
    bound: usize,
}

impl RoundTracker {
    pub fn new(max_rounds: usize) -> Self {
        RoundTracker {
            round: 0,
            bound: max_rounds,
        }
    }

    pub fn current_round(&self) -> usize {
        self.round
    }

    pub fn has_more_rounds(&self) -> bool {
        self.round < self.bound
    }

    pub fn next_round(&mut self) -> usize {
        self.round += 1;
        self.round
    }

    /// Restart the round counter for a new minute iteration; the tightened
    /// bound carries over, since destination arrivals persist across
    /// iterations.
    pub fn reset_for_iteration(&mut self) {
        self.round = 0;
    }

    /// A destination arrival was accepted in `round`.
    pub fn destination_reached(&mut self, round: usize, max_additional_transfers: usize) {
        self.bound = self.bound.min(round + max_additional_transfers);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_bound_tightens_once_destination_reached() {
        let mut tracker = RoundTracker::new(8);
        tracker.next_round();
        tracker.next_round();
        assert!(tracker.has_more_rounds());
        tracker.destination_reached(2, 1);
        // Bound is now 3: round 3 may still run, round 4 may not.
        tracker.next_round();
        assert!(!tracker.has_more_rounds());
    }

    #[test]
    fn later_destination_arrivals_do_not_loosen_bound() {
        let mut tracker = RoundTracker::new(8);
        tracker.destination_reached(1, 0);
        tracker.destination_reached(5, 3);
        tracker.next_round();
        tracker.next_round();
        assert!(!tracker.has_more_rounds());
    }

    #[test]
    fn cancelled_flag_interrupts() {
        let flag = Arc::new(AtomicBool::new(false));
        let limits = SearchLimits::none().with_cancel_flag(flag.clone());
        assert_eq!(limits.interruption(), None);
        flag.store(true, Ordering::Relaxed);
        assert_eq!(limits.interruption(), Some(Interrupted::Cancelled));
    }
}
