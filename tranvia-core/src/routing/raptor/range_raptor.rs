//! Single-criterion range-RAPTOR worker
//!
//! Iterates departure minutes from the end of the window backwards. Each
//! minute runs rounds that alternate a transit step (scan touched patterns,
//! board and alight) and a transfer step (relax walking edges). Arrival data
//! is not cleared between minutes: new, earlier departures progressively
//! refine existing arrivals, which is sound because arriving no later when
//! departing no later.

use fixedbitset::FixedBitSet;
use log::debug;

use super::board::earliest_boardable_trip;
use super::state::{PlainPredecessor, PlainState};
use crate::model::TransitData;
use crate::model::transit::types::{StopId, Time, UNREACHED};
use crate::routing::lifecycle::{Interrupted, RoundTracker, SearchLimits, WorkerLifeCycle};
use crate::routing::path::{self, Journey, SearchDirection};
use crate::routing::request::Request;
use crate::routing::SearchError;

/// Journey found for one departure minute.
#[derive(Debug)]
pub struct MinuteJourney {
    pub departure: Time,
    pub journey: Option<Journey>,
}

#[derive(Debug)]
pub struct RangeRaptorResult {
    /// One entry per departure minute, latest first.
    pub journeys: Vec<MinuteJourney>,
    /// Best arrival per stop over the whole window.
    pub best_arrivals: Vec<Time>,
    /// Best arrival per stop that ended with a transit ride.
    pub best_transit_arrivals: Vec<Time>,
    pub interrupted: Option<Interrupted>,
}

pub struct RangeRaptorWorker<'a> {
    data: &'a TransitData,
    request: &'a Request,
    service_mask: FixedBitSet,
    stop_filter: Option<FixedBitSet>,
    state: PlainState,
    tracker: RoundTracker,
    lifecycle: WorkerLifeCycle,
    limits: SearchLimits,
}

impl<'a> RangeRaptorWorker<'a> {
    pub fn new(
        data: &'a TransitData,
        request: &'a Request,
        lifecycle: WorkerLifeCycle,
        limits: SearchLimits,
    ) -> Result<Self, SearchError> {
        request.validate(data)?;
        let service_mask = data.service_mask_for(request.date);
        let stop_filter = request
            .optimizations
            .transfers_stop_filter
            .then(|| data.stops_with_patterns());
        let max_rounds = request.max_rounds();
        Ok(RangeRaptorWorker {
            data,
            request,
            service_mask,
            stop_filter,
            state: PlainState::new(data.stops.len(), max_rounds),
            // Round indices run 1..max_rounds; round 0 is the access round.
            tracker: RoundTracker::new(max_rounds - 1),
            lifecycle,
            limits,
        })
    }

    pub fn route(&mut self) -> Result<RangeRaptorResult, SearchError> {
        let mut journeys = Vec::new();
        let mut interrupted = None;

        'minutes: for departure in self.request.departure_minutes() {
            if let Some(reason) = self.limits.interruption() {
                interrupted = Some(reason);
                break;
            }
            self.lifecycle.setup_iteration(departure);
            self.tracker.reset_for_iteration();

            for (leg, access) in self.request.access.iter().enumerate() {
                let arrival = departure.saturating_add(access.total_duration());
                if self.state.update_overall(
                    0,
                    access.stop,
                    arrival,
                    PlainPredecessor::Access { leg },
                )? {
                    self.state.marked_stops[0].insert(access.stop);
                }
            }

            while self.tracker.has_more_rounds() {
                let round = self.tracker.current_round();
                if self.state.marked_stops[round].is_clear() {
                    break;
                }
                if let Some(reason) = self.limits.interruption() {
                    interrupted = Some(reason);
                    break 'minutes;
                }
                let round = self.tracker.next_round();
                self.lifecycle.round_start(round);

                let marked_transit = self.transit_step(round)?;
                self.lifecycle.transits_for_round_complete(round);

                if self.destination_reached(&marked_transit) {
                    self.tracker
                        .destination_reached(round, self.request.max_additional_transfers);
                }

                self.transfer_step(round, &marked_transit)?;
                self.state.marked_stops[round].union_with(&marked_transit);
                self.lifecycle.transfers_for_round_complete(round);
            }

            journeys.push(MinuteJourney {
                departure,
                journey: self.best_journey_for_iteration()?,
            });
            self.lifecycle.iteration_complete(departure);
        }

        Ok(RangeRaptorResult {
            journeys,
            best_arrivals: self.state.best_arrival.clone(),
            best_transit_arrivals: self.state.best_transit_arrival.clone(),
            interrupted,
        })
    }

    /// Scan every pattern touching a stop marked in the previous round.
    /// Alighting is attempted before boarding at the same position so a trip
    /// is never boarded just to be immediately alighted.
    fn transit_step(&mut self, round: usize) -> Result<FixedBitSet, SearchError> {
        let previous_round = round - 1;
        let mut marked_transit = FixedBitSet::with_capacity(self.data.stops.len());

        let previous_marks = std::mem::replace(
            &mut self.state.marked_stops[previous_round],
            FixedBitSet::with_capacity(self.data.stops.len()),
        );
        let patterns_touched = self.data.patterns_touching(&previous_marks);

        for pattern_id in patterns_touched.ones() {
            let pattern = &self.data.patterns[pattern_id];
            let mut on_trip: Option<usize> = None;
            let mut board_stop = 0;
            let mut board_time = 0;

            for (position, &stop) in pattern.stops.iter().enumerate() {
                if let Some(trip_idx) = on_trip {
                    if pattern.dropoffs[position].is_scheduled() {
                        let alight_time = pattern.trips[trip_idx].arrivals[position];
                        if alight_time.saturating_add(self.request.board_slack)
                            <= self.request.max_clock_time
                        {
                            let (improved, _) = self.state.update_transit(
                                round,
                                stop,
                                alight_time,
                                PlainPredecessor::Transit {
                                    pattern: pattern_id,
                                    trip: trip_idx,
                                    board_stop,
                                    board_time,
                                },
                            )?;
                            if improved {
                                marked_transit.insert(stop);
                                self.trace_stop(stop, round, alight_time);
                            }
                        }
                    }
                }

                if previous_marks.contains(stop) && pattern.pickups[position].is_scheduled() {
                    let at_stop = self.state.arrivals[previous_round][stop];
                    if at_stop == UNREACHED {
                        continue;
                    }
                    let earliest_board = at_stop.saturating_add(self.request.board_slack);
                    if let Some(trip_idx) = earliest_boardable_trip(
                        pattern,
                        position,
                        earliest_board,
                        on_trip,
                        &self.service_mask,
                    ) {
                        // Either boarding for the first time, or backing up
                        // to a now-reachable earlier trip.
                        on_trip = Some(trip_idx);
                        board_stop = stop;
                        board_time = pattern.trips[trip_idx].departures[position];
                    }
                }
            }
        }

        Ok(marked_transit)
    }

    /// Relax walking edges from every stop the transit step improved. Loop
    /// transfers are unnecessary because the source stop was already
    /// reached.
    fn transfer_step(
        &mut self,
        round: usize,
        marked_transit: &FixedBitSet,
    ) -> Result<(), SearchError> {
        // Snapshot source times first so the relaxation order cannot chain
        // transfers within the round.
        let sources: Vec<(StopId, Time)> = marked_transit
            .ones()
            .map(|stop| (stop, self.state.transit_arrivals[round][stop]))
            .collect();

        for (stop, at_stop) in sources {
            for transfer in self.data.transfers_from(stop)? {
                if let Some(filter) = &self.stop_filter {
                    if !filter.contains(transfer.target_stop) {
                        continue;
                    }
                }
                let arrival = at_stop.saturating_add(transfer.duration);
                if arrival > self.request.max_clock_time {
                    continue;
                }
                if self.state.update_overall(
                    round,
                    transfer.target_stop,
                    arrival,
                    PlainPredecessor::Transfer {
                        from_stop: stop,
                        duration: transfer.duration,
                    },
                )? {
                    self.state.marked_stops[round].insert(transfer.target_stop);
                    self.trace_stop(transfer.target_stop, round, arrival);
                }
            }
        }
        Ok(())
    }

    fn destination_reached(&self, marked_transit: &FixedBitSet) -> bool {
        self.request
            .egress
            .iter()
            .any(|egress| marked_transit.contains(egress.stop))
    }

    /// Best journey over all rounds and egress legs for the current state.
    fn best_journey_for_iteration(&self) -> Result<Option<Journey>, SearchError> {
        let mut best: Option<(Time, usize, usize)> = None;
        for (leg, egress) in self.request.egress.iter().enumerate() {
            for round in 1..self.state.max_rounds() {
                let at_stop = self.state.transit_arrivals[round][egress.stop];
                if at_stop == UNREACHED {
                    continue;
                }
                let arrival = at_stop.saturating_add(egress.total_duration());
                if best.is_none_or(|(t, _, _)| arrival < t) {
                    best = Some((arrival, round, leg));
                }
            }
        }
        match best {
            None => Ok(None),
            Some((_, round, leg)) => {
                let egress = self.request.egress[leg];
                path::map_plain_journey(
                    &self.state,
                    round,
                    egress.stop,
                    Some(egress),
                    &self.request.access,
                    self.request.board_slack,
                    SearchDirection::DepartAfter,
                )
                .map(Some)
            }
        }
    }

    fn trace_stop(&self, stop: StopId, round: usize, arrival: Time) {
        if self.request.debug.traces(stop) {
            debug!("stop {stop} reached in round {round} at {arrival}");
        }
    }
}
