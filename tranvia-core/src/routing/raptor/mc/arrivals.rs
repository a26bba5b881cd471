//! Arrival arena, per-stop pareto stores and the destination sink
//!
//! Arrival records form a DAG rooted at access arrivals; the previous edge is
//! a back reference into an arena, not ownership, so frontiers stay cheap to
//! clone and no reference cycles arise. Records are created during a minute
//! iteration and never mutated after the iteration commits.

use fixedbitset::FixedBitSet;

use crate::fares::{RideLeg, TransferAllowance};
use crate::model::transit::types::{
    AccessEgress, Cost, FareAmount, PatternId, StopId, Time,
};
use crate::routing::pareto::{Dominance, ParetoFrontier};

pub type ArrivalId = u32;

/// How an arrival was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrivedBy {
    Access {
        leg: usize,
    },
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

/// Fare state attached to an arrival when a fare calculator is wired in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FareState {
    pub cumulative: FareAmount,
    pub allowance: TransferAllowance,
}

#[derive(Debug, Clone)]
pub struct ArrivalRecord {
    pub stop: StopId,
    pub round: usize,
    pub arrival_time: Time,
    pub arrived_by: ArrivedBy,
    pub previous: Option<ArrivalId>,
    /// Cumulative travel duration since leaving the origin.
    pub duration: Time,
    pub cost: Cost,
    pub fare: Option<FareState>,
}

impl ArrivalRecord {
    pub fn is_transit(&self) -> bool {
        matches!(self.arrived_by, ArrivedBy::Transit { .. })
    }
}

/// Append-only arena of arrival records for one worker.
#[derive(Debug, Default)]
pub struct ArrivalArena {
    records: Vec<ArrivalRecord>,
}

impl ArrivalArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ArrivalRecord) -> ArrivalId {
        self.records.push(record);
        (self.records.len() - 1) as ArrivalId
    }

    pub fn get(&self, id: ArrivalId) -> &ArrivalRecord {
        &self.records[id as usize]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Transit rides along the chain ending at `id`, in journey order.
    pub fn collect_rides(&self, id: ArrivalId) -> Vec<RideLeg> {
        let mut rides = Vec::new();
        let mut current = Some(id);
        while let Some(record_id) = current {
            let record = self.get(record_id);
            if let ArrivedBy::Transit {
                pattern,
                board_stop,
                board_time,
                ..
            } = record.arrived_by
            {
                rides.push(RideLeg {
                    pattern,
                    board_stop,
                    alight_stop: record.stop,
                    board_time,
                    alight_time: record.arrival_time,
                });
            }
            current = record.previous;
        }
        rides.reverse();
        rides
    }
}

/// Pareto label for one stop arrival: the comparison dimensions plus a back
/// reference into the arena. `arrived_by` style probes are pre-computed into
/// the `transit` flag so the comparison path never chases the arena.
#[derive(Debug, Clone)]
pub struct McLabel {
    pub arrival_time: Time,
    pub round: usize,
    pub duration: Time,
    pub cost: Cost,
    pub fare: Option<FareAmount>,
    pub allowance: Option<TransferAllowance>,
    pub transit: bool,
    pub id: ArrivalId,
}

impl McLabel {
    pub fn from_record(id: ArrivalId, record: &ArrivalRecord) -> Self {
        McLabel {
            arrival_time: record.arrival_time,
            round: record.round,
            duration: record.duration,
            cost: record.cost,
            fare: record.fare.as_ref().map(|f| f.cumulative),
            allowance: record.fare.as_ref().map(|f| f.allowance.clone()),
            transit: record.is_transit(),
            id,
        }
    }
}

fn fare_dominates(
    a_fare: Option<FareAmount>,
    a_allowance: &Option<TransferAllowance>,
    b_fare: Option<FareAmount>,
    b_allowance: &Option<TransferAllowance>,
) -> bool {
    match (a_fare, b_fare) {
        (None, _) | (_, None) => true,
        (Some(a), Some(b)) => {
            if a > b {
                return false;
            }
            let blank = TransferAllowance::default();
            let mine = a_allowance.as_ref().unwrap_or(&blank);
            let theirs = b_allowance.as_ref().unwrap_or(&blank);
            mine.at_least_as_good_for_all_future(theirs)
        }
    }
}

/// Dominance over per-stop arrival labels:
/// `{arrival_time, round, travel_duration, cost[, fare]}`.
#[derive(Debug, Clone, Copy)]
pub struct StopDominance {
    pub use_fare: bool,
}

impl Dominance<McLabel> for StopDominance {
    fn dominates_weakly(&self, a: &McLabel, b: &McLabel) -> bool {
        a.arrival_time <= b.arrival_time
            && a.round <= b.round
            && a.duration <= b.duration
            && a.cost <= b.cost
            && (!self.use_fare
                || fare_dominates(a.fare, &a.allowance, b.fare, &b.allowance))
    }
}

/// An arrival at the destination: a terminal stop arrival plus its egress
/// tail.
#[derive(Debug, Clone)]
pub struct DestinationArrival {
    pub arrival_time: Time,
    /// Departure minute of the iteration that produced this arrival.
    pub departure_time: Time,
    pub rides: usize,
    pub transfers: usize,
    /// Travel duration including access and egress.
    pub total_duration: Time,
    pub cost: Cost,
    pub fare: Option<FareAmount>,
    pub egress: AccessEgress,
    pub terminal: ArrivalId,
}

/// Destination dominance adds `total_travel_duration` (otherwise later
/// minutes trivially dominate earlier ones) and relaxes the cost dimension
/// by the request's factor.
#[derive(Debug, Clone, Copy)]
pub struct DestinationDominance {
    pub use_fare: bool,
    pub relax_cost: f32,
}

impl Dominance<DestinationArrival> for DestinationDominance {
    fn dominates_weakly(&self, a: &DestinationArrival, b: &DestinationArrival) -> bool {
        // An arrival within the relax band of the incumbent cost is not
        // dominated; equal costs always are, so equal candidates stay
        // rejected under any relax factor.
        let cost_dominates = a.cost == b.cost
            || f64::from(a.cost) * f64::from(self.relax_cost) <= f64::from(b.cost);
        a.arrival_time <= b.arrival_time
            && a.rides <= b.rides
            && a.total_duration <= b.total_duration
            && cost_dominates
            && (!self.use_fare
                || match (a.fare, b.fare) {
                    (None, _) | (_, None) => true,
                    (Some(fa), Some(fb)) => fa <= fb,
                })
    }
}

/// Per-stop pareto frontiers plus the touched-stop bitset maintained by the
/// round commit.
#[derive(Debug)]
pub struct StopArrivals {
    frontiers: Vec<ParetoFrontier<McLabel, StopDominance>>,
    pub touched: FixedBitSet,
}

impl StopArrivals {
    pub fn new(num_stops: usize, dominance: StopDominance) -> Self {
        StopArrivals {
            frontiers: (0..num_stops)
                .map(|_| ParetoFrontier::new(dominance))
                .collect(),
            touched: FixedBitSet::with_capacity(num_stops),
        }
    }

    pub fn frontier(&self, stop: StopId) -> &ParetoFrontier<McLabel, StopDominance> {
        &self.frontiers[stop]
    }

    pub fn frontier_mut(&mut self, stop: StopId) -> &mut ParetoFrontier<McLabel, StopDominance> {
        &mut self.frontiers[stop]
    }

    /// Swap out the touched set, leaving an empty one of the same size.
    pub fn take_touched(&mut self) -> FixedBitSet {
        let empty = FixedBitSet::with_capacity(self.touched.len());
        std::mem::replace(&mut self.touched, empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(time: Time, round: usize, cost: Cost) -> McLabel {
        McLabel {
            arrival_time: time,
            round,
            duration: time,
            cost,
            fare: None,
            allowance: None,
            transit: true,
            id: 0,
        }
    }

    #[test]
    fn stop_dominance_is_componentwise() {
        let dominance = StopDominance { use_fare: false };
        assert!(dominance.dominates_weakly(&label(100, 1, 10), &label(100, 2, 10)));
        assert!(!dominance.dominates_weakly(&label(100, 2, 10), &label(100, 1, 20)));
    }

    #[test]
    fn fare_dimension_respects_allowance() {
        let dominance = StopDominance { use_fare: true };
        let mut cheap = label(100, 1, 10);
        cheap.fare = Some(200);
        let mut rich = label(100, 1, 10);
        rich.fare = Some(300);
        rich.allowance = Some(TransferAllowance {
            leg_rule: Some(4),
            as_route: None,
        });
        // The cheaper label has a different (empty) allowance, so it cannot
        // dominate the one holding a live transfer allowance.
        assert!(!dominance.dominates_weakly(&cheap, &rich));
    }

    #[test]
    fn destination_relax_admits_slightly_costlier_arrivals() {
        let dominance = DestinationDominance {
            use_fare: false,
            relax_cost: 1.2,
        };
        let best = DestinationArrival {
            arrival_time: 100,
            departure_time: 0,
            rides: 1,
            transfers: 0,
            total_duration: 100,
            cost: 100,
            fare: None,
            egress: AccessEgress::new(0, 0),
            terminal: 0,
        };
        let mut slightly_worse = best.clone();
        slightly_worse.cost = 115;
        // Within the relax factor: not dominated.
        assert!(!dominance.dominates_weakly(&best, &slightly_worse));
        let mut much_worse = best.clone();
        much_worse.cost = 130;
        assert!(dominance.dominates_weakly(&best, &much_worse));
    }

    #[test]
    fn collect_rides_walks_the_chain() {
        let mut arena = ArrivalArena::new();
        let access = arena.push(ArrivalRecord {
            stop: 0,
            round: 0,
            arrival_time: 0,
            arrived_by: ArrivedBy::Access { leg: 0 },
            previous: None,
            duration: 0,
            cost: 0,
            fare: None,
        });
        let first = arena.push(ArrivalRecord {
            stop: 2,
            round: 1,
            arrival_time: 600,
            arrived_by: ArrivedBy::Transit {
                pattern: 0,
                trip: 0,
                board_stop: 0,
                board_time: 60,
            },
            previous: Some(access),
            duration: 600,
            cost: 600,
            fare: None,
        });
        let second = arena.push(ArrivalRecord {
            stop: 3,
            round: 2,
            arrival_time: 1200,
            arrived_by: ArrivedBy::Transit {
                pattern: 1,
                trip: 0,
                board_stop: 2,
                board_time: 700,
            },
            previous: Some(first),
            duration: 1200,
            cost: 1200,
            fare: None,
        });
        let rides = arena.collect_rides(second);
        assert_eq!(rides.len(), 2);
        assert_eq!(rides[0].board_stop, 0);
        assert_eq!(rides[0].alight_stop, 2);
        assert_eq!(rides[1].board_stop, 2);
        assert_eq!(rides[1].alight_stop, 3);
    }
}
