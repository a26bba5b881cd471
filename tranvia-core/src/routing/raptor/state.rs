//! Flyweight stop-arrival store for the single-criterion worker
//!
//! Parallel arrays indexed by round and stop hold best arrival times and
//! predecessor records for path reconstruction. Transit arrivals are kept
//! separately from overall arrivals: transfers relax from the transit
//! arrays, which prevents transfer chaining, and egress legs leave from
//! transit arrivals only.
//!
//! The store is reused across departure minutes: new, earlier departures
//! progressively refine existing arrivals.

use fixedbitset::FixedBitSet;

use crate::model::transit::types::{PatternId, StopId, Time, UNREACHED};
use crate::routing::SearchError;

/// How a plain arrival was produced, for reconstruction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum PlainPredecessor {
    #[default]
    None,
    /// Reached directly by an access leg.
    Access { leg: usize },
    Transit {
        pattern: PatternId,
        trip: usize,
        board_stop: StopId,
        board_time: Time,
    },
    Transfer {
        from_stop: StopId,
        duration: Time,
    },
}

#[derive(Debug)]
pub(crate) struct PlainState {
    /// Best arrival per round and stop, by any means.
    pub arrivals: Vec<Vec<Time>>,
    pub predecessors: Vec<Vec<PlainPredecessor>>,
    /// Best arrival per round and stop that ended with a transit ride.
    pub transit_arrivals: Vec<Vec<Time>>,
    pub transit_predecessors: Vec<Vec<PlainPredecessor>>,
    /// Stops whose overall arrival improved during each round.
    pub marked_stops: Vec<FixedBitSet>,
    pub best_arrival: Vec<Time>,
    pub best_transit_arrival: Vec<Time>,
}

impl PlainState {
    pub fn new(num_stops: usize, max_rounds: usize) -> Self {
        PlainState {
            arrivals: vec![vec![UNREACHED; num_stops]; max_rounds],
            predecessors: vec![vec![PlainPredecessor::None; num_stops]; max_rounds],
            transit_arrivals: vec![vec![UNREACHED; num_stops]; max_rounds],
            transit_predecessors: vec![vec![PlainPredecessor::None; num_stops]; max_rounds],
            marked_stops: (0..max_rounds)
                .map(|_| FixedBitSet::with_capacity(num_stops))
                .collect(),
            best_arrival: vec![UNREACHED; num_stops],
            best_transit_arrival: vec![UNREACHED; num_stops],
        }
    }

    pub fn max_rounds(&self) -> usize {
        self.arrivals.len()
    }

    fn check_bounds(&self, round: usize, stop: StopId) -> Result<(), SearchError> {
        if round >= self.arrivals.len() {
            Err(SearchError::MaxRoundsExceeded)
        } else if stop >= self.best_arrival.len() {
            Err(SearchError::InvalidStop)
        } else {
            Ok(())
        }
    }

    /// Record an arrival in the overall arrays (access, transfer, or the
    /// overall side of a transit arrival).
    pub fn update_overall(
        &mut self,
        round: usize,
        stop: StopId,
        arrival: Time,
        predecessor: PlainPredecessor,
    ) -> Result<bool, SearchError> {
        self.check_bounds(round, stop)?;
        if arrival < self.arrivals[round][stop] {
            self.arrivals[round][stop] = arrival;
            self.predecessors[round][stop] = predecessor;
            self.best_arrival[stop] = self.best_arrival[stop].min(arrival);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Record a transit arrival; also enters the overall arrays when it
    /// improves them.
    pub fn update_transit(
        &mut self,
        round: usize,
        stop: StopId,
        arrival: Time,
        predecessor: PlainPredecessor,
    ) -> Result<(bool, bool), SearchError> {
        self.check_bounds(round, stop)?;
        let mut improved_transit = false;
        if arrival < self.transit_arrivals[round][stop] {
            self.transit_arrivals[round][stop] = arrival;
            self.transit_predecessors[round][stop] = predecessor;
            self.best_transit_arrival[stop] = self.best_transit_arrival[stop].min(arrival);
            improved_transit = true;
        }
        let improved_overall = self.update_overall(round, stop, arrival, predecessor)?;
        Ok((improved_transit, improved_overall))
    }
}
