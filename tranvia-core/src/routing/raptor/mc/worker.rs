//! Multi-criteria (pareto) range-RAPTOR worker
//!
//! Same control skeleton as the single-criterion worker, but each stop holds
//! a pareto frontier over `{arrival_time, round, travel_duration, cost
//! [, fare]}`. Candidates produced during a round are staged in an arrivals
//! cache and committed at the end of the transit and transfer steps, so
//! arrivals added in a round cannot chain onto each other mid-round. A
//! destination tap on each egress stop's frontier feeds the destination
//! pareto set, whose comparator carries the extra total-travel-duration
//! dimension.

use fixedbitset::FixedBitSet;
use hashbrown::HashMap;
use log::debug;

use super::arrivals::{
    ArrivalArena, ArrivalId, ArrivalRecord, ArrivedBy, DestinationArrival, DestinationDominance,
    FareState, McLabel, StopArrivals, StopDominance,
};
use super::cost::CostModel;
use crate::fares::{InRoutingFareCalculator, RideLeg, TransferAllowance};
use crate::model::TransitData;
use crate::model::transit::types::{AccessEgress, FareAmount, StopId, Time};
use crate::routing::SearchError;
use crate::routing::raptor::board::earliest_boardable_trip;
use crate::routing::heuristics::{self, Heuristics};
use crate::routing::lifecycle::{Interrupted, RoundTracker, SearchLimits, WorkerLifeCycle};
use crate::routing::pareto::{FrontierListener, ParetoFrontier};
use crate::routing::path::{self, Journey, SearchDirection};
use crate::routing::request::Request;

#[derive(Debug)]
pub struct McRangeRaptorResult {
    pub journeys: Vec<Journey>,
    pub arrivals: Vec<DestinationArrival>,
    pub interrupted: Option<Interrupted>,
}

/// A trip currently being ridden while scanning a pattern, together with the
/// arrival that boarded it.
struct Rider {
    trip: usize,
    board_stop: StopId,
    board_time: Time,
    source: ArrivalId,
    source_arrival: Time,
    source_duration: Time,
    source_cost: u32,
}

/// Listener on an egress stop's frontier that forwards accepted transit
/// arrivals, extended by the egress leg, into the destination frontier.
struct DestinationTap<'a> {
    destination: &'a mut ParetoFrontier<DestinationArrival, DestinationDominance>,
    egress: &'a [AccessEgress],
    cost_model: CostModel,
    round: usize,
    departure: Time,
    accepted_any: bool,
}

impl FrontierListener<McLabel> for DestinationTap<'_> {
    fn accepted(&mut self, label: &McLabel) {
        if !label.transit {
            return;
        }
        for egress in self.egress {
            let tail = egress.total_duration();
            let arrival = DestinationArrival {
                arrival_time: label.arrival_time.saturating_add(tail),
                departure_time: self.departure,
                rides: self.round,
                transfers: self.round.saturating_sub(1),
                total_duration: label.duration.saturating_add(tail),
                cost: label.cost.saturating_add(self.cost_model.walk_cost(tail)),
                fare: label.fare,
                egress: *egress,
                terminal: label.id,
            };
            if self.destination.try_add(arrival).accepted {
                self.accepted_any = true;
            }
        }
    }
}

pub struct McRangeRaptorWorker<'a> {
    data: &'a TransitData,
    request: &'a Request,
    service_mask: FixedBitSet,
    stop_filter: Option<FixedBitSet>,
    cost_model: CostModel,
    fare_calculator: Option<Box<dyn InRoutingFareCalculator>>,
    heuristics: Option<Heuristics>,
    arena: ArrivalArena,
    stops: StopArrivals,
    destination: ParetoFrontier<DestinationArrival, DestinationDominance>,
    egress_by_stop: HashMap<StopId, Vec<AccessEgress>>,
    /// Arrivals staged during the current step, committed at step end.
    arrivals_cache: Vec<(StopId, ArrivalId)>,
    /// Stops whose frontier mark was already advanced this round.
    round_marked: FixedBitSet,
    tracker: RoundTracker,
    lifecycle: WorkerLifeCycle,
    limits: SearchLimits,
}

impl<'a> McRangeRaptorWorker<'a> {
    pub fn new(
        data: &'a TransitData,
        request: &'a Request,
        cost_model: CostModel,
        fare_calculator: Option<Box<dyn InRoutingFareCalculator>>,
        lifecycle: WorkerLifeCycle,
        limits: SearchLimits,
    ) -> Result<Self, SearchError> {
        request.validate(data)?;
        let service_mask = data.service_mask_for(request.date);
        let stop_filter = request
            .optimizations
            .transfers_stop_filter
            .then(|| data.stops_with_patterns());
        let use_fare = fare_calculator.is_some();
        let max_rounds = request.max_rounds();
        let heuristics = request.optimizations.prune_against_destination.then(|| {
            heuristics::reverse_bounds(data, &request.egress, &cost_model, max_rounds)
        });

        let mut egress_by_stop: HashMap<StopId, Vec<AccessEgress>> = HashMap::new();
        for egress in &request.egress {
            egress_by_stop.entry(egress.stop).or_default().push(*egress);
        }

        Ok(McRangeRaptorWorker {
            data,
            request,
            service_mask,
            stop_filter,
            cost_model,
            fare_calculator,
            heuristics,
            arena: ArrivalArena::new(),
            stops: StopArrivals::new(data.stops.len(), StopDominance { use_fare }),
            destination: ParetoFrontier::new(DestinationDominance {
                use_fare,
                relax_cost: request.relax_cost_at_destination,
            }),
            egress_by_stop,
            arrivals_cache: Vec::new(),
            round_marked: FixedBitSet::with_capacity(data.stops.len()),
            tracker: RoundTracker::new(max_rounds - 1),
            lifecycle,
            limits,
        })
    }

    pub fn route(&mut self) -> Result<McRangeRaptorResult, SearchError> {
        let mut interrupted = None;

        'minutes: for departure in self.request.departure_minutes() {
            if let Some(reason) = self.limits.interruption() {
                interrupted = Some(reason);
                break;
            }
            self.lifecycle.setup_iteration(departure);
            self.tracker.reset_for_iteration();
            self.round_marked.clear();
            self.relax_access(departure);
            self.commit_cache(0, departure);

            while self.tracker.has_more_rounds() {
                if self.stops.touched.is_clear() {
                    break;
                }
                if let Some(reason) = self.limits.interruption() {
                    interrupted = Some(reason);
                    break 'minutes;
                }
                let round = self.tracker.next_round();
                self.lifecycle.round_start(round);
                self.round_marked.clear();

                let previous_touched = self.stops.take_touched();
                self.transit_step(round, &previous_touched, departure);
                self.lifecycle.transits_for_round_complete(round);
                let accepted_transit = self.commit_cache(round, departure);

                self.transfer_step(round, &accepted_transit)?;
                self.commit_cache(round, departure);
                self.lifecycle.transfers_for_round_complete(round);
            }

            self.lifecycle.iteration_complete(departure);
        }

        let mut journeys = Vec::with_capacity(self.destination.len());
        for arrival in self.destination.iter() {
            journeys.push(path::map_mc_journey(
                &self.arena,
                arrival,
                &self.request.access,
                self.request.board_slack,
                SearchDirection::DepartAfter,
            )?);
        }
        journeys.sort_by_key(|journey| (journey.departure_time, journey.arrival_time));

        Ok(McRangeRaptorResult {
            journeys,
            arrivals: self.destination.iter().cloned().collect(),
            interrupted,
        })
    }

    fn relax_access(&mut self, departure: Time) {
        for (leg, access) in self.request.access.iter().enumerate() {
            let arrival = departure.saturating_add(access.total_duration());
            let record = ArrivalRecord {
                stop: access.stop,
                round: 0,
                arrival_time: arrival,
                arrived_by: ArrivedBy::Access { leg },
                previous: None,
                duration: access.total_duration(),
                cost: self.cost_model.walk_cost(access.total_duration()),
                fare: self.fare_calculator.as_ref().map(|_| FareState {
                    cumulative: 0,
                    allowance: TransferAllowance::default(),
                }),
            };
            let id = self.arena.push(record);
            self.arrivals_cache.push((access.stop, id));
        }
    }

    /// Scan touched patterns. Unlike the single-criterion worker, every
    /// frontier label added at a stop during the previous round may board
    /// its own trip, so a pattern carries a set of riders.
    fn transit_step(&mut self, round: usize, previous_touched: &FixedBitSet, departure: Time) {
        let data = self.data;
        let patterns_touched = data.patterns_touching(previous_touched);

        for pattern_id in patterns_touched.ones() {
            let pattern = &data.patterns[pattern_id];
            let mut riders: Vec<Rider> = Vec::new();

            for (position, &stop) in pattern.stops.iter().enumerate() {
                if pattern.dropoffs[position].is_scheduled() {
                    for rider_index in 0..riders.len() {
                        let rider = &riders[rider_index];
                        let alight_time = pattern.trips[rider.trip].arrivals[position];
                        if alight_time.saturating_add(self.request.board_slack)
                            > self.request.max_clock_time
                        {
                            continue;
                        }
                        let cost = rider.source_cost.saturating_add(
                            self.cost_model.transit_arrival_cost(
                                round,
                                rider.source_arrival,
                                rider.board_time,
                                alight_time,
                            ),
                        );
                        let duration = rider
                            .source_duration
                            .saturating_add(alight_time.saturating_sub(rider.source_arrival));
                        let fare = self.price_ride(
                            rider.source,
                            pattern_id,
                            rider.board_stop,
                            rider.board_time,
                            stop,
                            alight_time,
                        );
                        if self.pruned(stop, alight_time, round, duration, cost, &fare) {
                            continue;
                        }
                        let rider = &riders[rider_index];
                        let record = ArrivalRecord {
                            stop,
                            round,
                            arrival_time: alight_time,
                            arrived_by: ArrivedBy::Transit {
                                pattern: pattern_id,
                                trip: rider.trip,
                                board_stop: rider.board_stop,
                                board_time: rider.board_time,
                            },
                            previous: Some(rider.source),
                            duration,
                            cost,
                            fare,
                        };
                        let id = self.arena.push(record);
                        self.arrivals_cache.push((stop, id));
                        if self.request.debug.traces(stop) {
                            debug!(
                                "stop {stop} candidate in round {round} at {alight_time} (departure {departure})"
                            );
                        }
                    }
                }

                if previous_touched.contains(stop) && pattern.pickups[position].is_scheduled() {
                    for label in self.stops.frontier(stop).iter_since_mark() {
                        let earliest_board =
                            label.arrival_time.saturating_add(self.request.board_slack);
                        let Some(trip) = earliest_boardable_trip(
                            pattern,
                            position,
                            earliest_board,
                            None,
                            &self.service_mask,
                        ) else {
                            continue;
                        };
                        if riders
                            .iter()
                            .any(|rider| rider.trip == trip && rider.source == label.id)
                        {
                            continue;
                        }
                        riders.push(Rider {
                            trip,
                            board_stop: stop,
                            board_time: pattern.trips[trip].departures[position],
                            source: label.id,
                            source_arrival: label.arrival_time,
                            source_duration: label.duration,
                            source_cost: label.cost,
                        });
                    }
                }
            }
        }
    }

    fn transfer_step(
        &mut self,
        round: usize,
        accepted_transit: &[(StopId, ArrivalId)],
    ) -> Result<(), SearchError> {
        for &(stop, id) in accepted_transit {
            let (arrival_time, source_duration, source_cost, fare) = {
                let record = self.arena.get(id);
                (
                    record.arrival_time,
                    record.duration,
                    record.cost,
                    record.fare.clone(),
                )
            };
            for transfer in self.data.transfers_from(stop)? {
                if let Some(filter) = &self.stop_filter {
                    if !filter.contains(transfer.target_stop) {
                        continue;
                    }
                }
                let arrival = arrival_time.saturating_add(transfer.duration);
                if arrival > self.request.max_clock_time {
                    continue;
                }
                let cost = source_cost.saturating_add(self.cost_model.walk_cost(transfer.duration));
                let duration = source_duration.saturating_add(transfer.duration);
                if self.pruned(transfer.target_stop, arrival, round, duration, cost, &fare) {
                    continue;
                }
                let record = ArrivalRecord {
                    stop: transfer.target_stop,
                    round,
                    arrival_time: arrival,
                    arrived_by: ArrivedBy::Transfer {
                        from_stop: stop,
                        duration: transfer.duration,
                    },
                    previous: Some(id),
                    duration,
                    cost,
                    fare: fare.clone(),
                };
                let record_id = self.arena.push(record);
                self.arrivals_cache.push((transfer.target_stop, record_id));
            }
        }
        Ok(())
    }

    /// Commit the staged arrivals into the stop frontiers. Returns the
    /// transit arrivals that were accepted, for the transfer step.
    fn commit_cache(&mut self, round: usize, departure: Time) -> Vec<(StopId, ArrivalId)> {
        let mut accepted_transit = Vec::new();
        let mut destination_accepted = false;

        for (stop, id) in std::mem::take(&mut self.arrivals_cache) {
            let label = McLabel::from_record(id, self.arena.get(id));
            if !self.round_marked.contains(stop) {
                self.stops.frontier_mut(stop).mark_end_of_frontier();
                self.round_marked.insert(stop);
            }
            let transit = label.transit;
            let accepted = match self.egress_by_stop.get(&stop) {
                Some(egress) => {
                    let mut tap = DestinationTap {
                        destination: &mut self.destination,
                        egress,
                        cost_model: self.cost_model,
                        round,
                        departure,
                        accepted_any: false,
                    };
                    let outcome = self.stops.frontier_mut(stop).try_add_with(label, &mut tap);
                    destination_accepted |= tap.accepted_any;
                    outcome.accepted
                }
                None => self.stops.frontier_mut(stop).try_add(label).accepted,
            };
            if accepted {
                self.stops.touched.insert(stop);
                if transit {
                    accepted_transit.push((stop, id));
                }
            }
        }

        if destination_accepted {
            self.tracker
                .destination_reached(round, self.request.max_additional_transfers);
        }
        accepted_transit
    }

    fn price_ride(
        &mut self,
        source: ArrivalId,
        pattern: usize,
        board_stop: StopId,
        board_time: Time,
        alight_stop: StopId,
        alight_time: Time,
    ) -> Option<FareState> {
        let calculator = self.fare_calculator.as_mut()?;
        let mut rides = self.arena.collect_rides(source);
        rides.push(RideLeg {
            pattern,
            board_stop,
            alight_stop,
            board_time,
            alight_time,
        });
        match calculator.price(self.data, &rides) {
            Ok(price) => Some(FareState {
                cumulative: price.cumulative,
                allowance: price.allowance,
            }),
            Err(error) => {
                // Unpriceable: the journey continues with an infinite fare,
                // which can never enter the destination frontier.
                debug!("journey unpriceable: {error}");
                Some(FareState {
                    cumulative: FareAmount::MAX,
                    allowance: TransferAllowance::default(),
                })
            }
        }
    }

    /// Whether an optimistic completion of this candidate is already
    /// dominated at the destination. Stops without a heuristic bound never
    /// prune.
    fn pruned(
        &self,
        stop: StopId,
        arrival: Time,
        round: usize,
        duration: Time,
        cost: u32,
        fare: &Option<FareState>,
    ) -> bool {
        let Some(heuristics) = &self.heuristics else {
            return false;
        };
        let Some(bound) = heuristics.bound_for(stop) else {
            return false;
        };
        let optimistic = DestinationArrival {
            arrival_time: arrival.saturating_add(bound.duration),
            departure_time: 0,
            rides: round + bound.rides,
            transfers: (round + bound.rides).saturating_sub(1),
            total_duration: duration.saturating_add(bound.duration),
            cost: cost.saturating_add(bound.cost),
            fare: fare.as_ref().map(|f| f.cumulative),
            egress: AccessEgress::new(stop, 0),
            terminal: 0,
        };
        self.destination.would_dominate(&optimistic)
    }
}
