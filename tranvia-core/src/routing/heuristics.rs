//! Reverse best-case bounds for destination pruning
//!
//! A rounds-based sweep from the egress stops over schedule-free minimum hop
//! times yields, per stop, a lower bound on the travel duration, rides and
//! cost still needed to reach the destination. A stop the sweep never
//! reaches has no bound and never prunes.

use crate::model::TransitData;
use crate::model::transit::types::{AccessEgress, Cost, StopId, Time};
use crate::routing::raptor::mc::cost::CostModel;

/// Lower bound on completing a journey from a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopBound {
    pub duration: Time,
    pub rides: usize,
    pub cost: Cost,
}

impl StopBound {
    fn merge_min(&mut self, other: StopBound) -> bool {
        let mut improved = false;
        if other.duration < self.duration {
            self.duration = other.duration;
            improved = true;
        }
        if other.rides < self.rides {
            self.rides = other.rides;
            improved = true;
        }
        if other.cost < self.cost {
            self.cost = other.cost;
            improved = true;
        }
        improved
    }
}

#[derive(Debug)]
pub struct Heuristics {
    pub bounds: Vec<Option<StopBound>>,
}

impl Heuristics {
    pub fn bound_for(&self, stop: StopId) -> Option<&StopBound> {
        self.bounds.get(stop).and_then(Option::as_ref)
    }
}

fn relax(bounds: &mut [Option<StopBound>], stop: StopId, candidate: StopBound) -> bool {
    match &mut bounds[stop] {
        Some(existing) => existing.merge_min(candidate),
        slot @ None => {
            *slot = Some(candidate);
            true
        }
    }
}

/// Minimum scheduled hop time between consecutive positions, per pattern.
/// Patterns without scheduled trips yield no hops.
fn minimum_hops(data: &TransitData) -> Vec<Option<Vec<Time>>> {
    data.patterns
        .iter()
        .map(|pattern| {
            let scheduled: Vec<_> = pattern
                .trips
                .iter()
                .filter(|trip| trip.frequency.is_none())
                .collect();
            if scheduled.is_empty() || pattern.len() < 2 {
                return None;
            }
            Some(
                (0..pattern.len() - 1)
                    .map(|position| {
                        scheduled
                            .iter()
                            .map(|trip| {
                                trip.arrivals[position + 1]
                                    .saturating_sub(trip.departures[position])
                            })
                            .min()
                            .unwrap_or(0)
                    })
                    .collect(),
            )
        })
        .collect()
}

/// Compute reverse lower bounds from the egress stops.
pub fn reverse_bounds(
    data: &TransitData,
    egress: &[AccessEgress],
    cost_model: &CostModel,
    max_rounds: usize,
) -> Heuristics {
    let num_stops = data.stops.len();
    let mut bounds: Vec<Option<StopBound>> = vec![None; num_stops];
    let min_hops = minimum_hops(data);

    for leg in egress {
        relax(
            &mut bounds,
            leg.stop,
            StopBound {
                duration: leg.total_duration(),
                rides: 0,
                cost: cost_model.walk_cost(leg.total_duration()),
            },
        );
    }

    for _ in 0..max_rounds {
        let mut improved = false;

        // Transit pass: scan each pattern tail-first, carrying the cheapest
        // completion reachable by riding onward from the current position.
        for (pattern_id, pattern) in data.patterns.iter().enumerate() {
            let Some(hops) = &min_hops[pattern_id] else {
                continue;
            };
            let mut onward: Option<StopBound> = None;
            for position in (0..pattern.len()).rev() {
                let stop = pattern.stops[position];
                if let Some(riding) = onward {
                    improved |= relax(&mut bounds, stop, riding);
                }
                if let Some(alight_here) = bounds[stop] {
                    let boarding = StopBound {
                        duration: alight_here.duration,
                        rides: alight_here.rides + 1,
                        cost: alight_here.cost.saturating_add(cost_model.ride_penalty),
                    };
                    onward = Some(match onward {
                        None => boarding,
                        Some(mut current) => {
                            current.merge_min(boarding);
                            current
                        }
                    });
                }
                if position > 0 {
                    if let Some(riding) = &mut onward {
                        let hop = hops[position - 1];
                        riding.duration = riding.duration.saturating_add(hop);
                        riding.cost = riding.cost.saturating_add(cost_model.ride_cost(hop));
                    }
                }
            }
        }

        // Transfer pass: walking towards any bounded stop.
        for stop in 0..num_stops {
            let Ok(transfers) = data.transfers_from(stop) else {
                continue;
            };
            for transfer in transfers {
                if let Some(target) = bounds[transfer.target_stop] {
                    let candidate = StopBound {
                        duration: target.duration.saturating_add(transfer.duration),
                        rides: target.rides,
                        cost: target
                            .cost
                            .saturating_add(cost_model.walk_cost(transfer.duration)),
                    };
                    improved |= relax(&mut bounds, stop, candidate);
                }
            }
        }

        if !improved {
            break;
        }
    }

    Heuristics { bounds }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TransitDataBuilder;

    #[test]
    fn bounds_decrease_towards_the_destination() {
        let mut builder = TransitDataBuilder::new();
        let a = builder.add_stop("a");
        let b = builder.add_stop("b");
        let c = builder.add_stop("c");
        let route = builder.add_route("r");
        builder
            .add_pattern(route, vec![a, b, c])
            .add_trip("t", vec![0, 300, 600], vec![0, 300, 600]);
        let data = builder.build().unwrap();

        let heuristics = reverse_bounds(
            &data,
            &[AccessEgress::new(c, 0)],
            &CostModel::default(),
            4,
        );
        let at_a = heuristics.bound_for(a).unwrap();
        let at_b = heuristics.bound_for(b).unwrap();
        assert_eq!(at_a.duration, 600);
        assert_eq!(at_b.duration, 300);
        assert_eq!(at_a.rides, 1);
        assert_eq!(heuristics.bound_for(c).unwrap().duration, 0);
    }

    #[test]
    fn unreached_stops_have_no_bound() {
        let mut builder = TransitDataBuilder::new();
        let a = builder.add_stop("a");
        let b = builder.add_stop("b");
        let isolated = builder.add_stop("isolated");
        let route = builder.add_route("r");
        builder
            .add_pattern(route, vec![a, b])
            .add_trip("t", vec![0, 300], vec![0, 300]);
        let data = builder.build().unwrap();

        let heuristics = reverse_bounds(
            &data,
            &[AccessEgress::new(b, 0)],
            &CostModel::default(),
            4,
        );
        assert!(heuristics.bound_for(isolated).is_none());
    }

    #[test]
    fn bounds_never_exceed_true_completion() {
        // Walking shortcut b -> c is cheaper than riding onward.
        let mut builder = TransitDataBuilder::new();
        let a = builder.add_stop("a");
        let b = builder.add_stop("b");
        let c = builder.add_stop("c");
        let route = builder.add_route("r");
        builder
            .add_pattern(route, vec![a, b, c])
            .add_trip("t", vec![0, 300, 1200], vec![0, 300, 1200]);
        builder.add_transfer(b, c, 100);
        let data = builder.build().unwrap();

        let heuristics = reverse_bounds(
            &data,
            &[AccessEgress::new(c, 0)],
            &CostModel::default(),
            4,
        );
        assert_eq!(heuristics.bound_for(b).unwrap().duration, 100);
    }
}
