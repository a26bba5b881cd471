//! Path mapper: reconstruct journeys from arrival chains
//!
//! Walks a terminal arrival back to its access arrival and emits legs in
//! forward order: one access leg, alternating transit/transfer legs, one
//! egress leg. The reported origin departure is shifted so the first transit
//! boarding aligns exactly with `board_time - board_slack`.

use itertools::Itertools;

use super::SearchError;
use super::raptor::mc::arrivals::{ArrivalArena, ArrivedBy, DestinationArrival};
use super::raptor::state::{PlainPredecessor, PlainState};
use crate::model::transit::types::{
    AccessEgress, Cost, FareAmount, PatternId, StopId, Time,
};

/// Search direction. Reverse (latest-departure) searches flip what the
/// departure and arrival fields mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchDirection {
    #[default]
    DepartAfter,
    ArriveBy,
}

/// One leg of a reconstructed journey.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JourneyLeg {
    Access {
        stop: StopId,
        start_time: Time,
        duration: Time,
    },
    Transit {
        pattern: PatternId,
        trip: usize,
        board_stop: StopId,
        board_time: Time,
        alight_stop: StopId,
        alight_time: Time,
    },
    Transfer {
        from_stop: StopId,
        to_stop: StopId,
        start_time: Time,
        duration: Time,
    },
    Egress {
        stop: StopId,
        start_time: Time,
        duration: Time,
    },
}

/// Complete journey from origin to destination.
#[derive(Debug, Clone, PartialEq)]
pub struct Journey {
    pub legs: Vec<JourneyLeg>,
    pub departure_time: Time,
    pub arrival_time: Time,
    pub rides: usize,
    pub transfers: usize,
    pub cost: Option<Cost>,
    pub fare: Option<FareAmount>,
}

impl Journey {
    /// Wait between arriving somewhere and the next boarding, per boarding.
    pub fn waits(&self) -> Vec<(StopId, Time)> {
        self.legs
            .iter()
            .tuple_windows()
            .filter_map(|(previous, next)| {
                let at = match *previous {
                    JourneyLeg::Access {
                        start_time,
                        duration,
                        ..
                    }
                    | JourneyLeg::Transfer {
                        start_time,
                        duration,
                        ..
                    } => start_time.saturating_add(duration),
                    JourneyLeg::Transit { alight_time, .. } => alight_time,
                    JourneyLeg::Egress { .. } => return None,
                };
                if let JourneyLeg::Transit {
                    board_stop,
                    board_time,
                    ..
                } = next
                {
                    Some((*board_stop, board_time.saturating_sub(at)))
                } else {
                    None
                }
            })
            .collect()
    }

    /// Flip departure/arrival semantics for a reverse search.
    fn orient(mut self, direction: SearchDirection) -> Journey {
        if direction == SearchDirection::ArriveBy {
            std::mem::swap(&mut self.departure_time, &mut self.arrival_time);
        }
        self
    }
}

/// Assemble the final journey from reversed inner legs plus the access and
/// egress tails, shifting the origin departure to the first boarding.
fn assemble(
    mut legs_reversed: Vec<JourneyLeg>,
    access: AccessEgress,
    egress: Option<(AccessEgress, Time)>,
    board_slack: Time,
    cost: Option<Cost>,
    fare: Option<FareAmount>,
    direction: SearchDirection,
) -> Result<Journey, SearchError> {
    legs_reversed.reverse();
    let mut legs = legs_reversed;

    let first_board_time = legs
        .iter()
        .find_map(|leg| match leg {
            JourneyLeg::Transit { board_time, .. } => Some(*board_time),
            _ => None,
        })
        .ok_or(SearchError::InvalidJourney)?;

    // Leave the origin as late as possible: the access leg lands at the
    // first boarding stop exactly board_slack before boarding.
    let access_arrival = first_board_time.saturating_sub(board_slack);
    let departure_time = access_arrival.saturating_sub(access.total_duration());
    legs.insert(
        0,
        JourneyLeg::Access {
            stop: access.stop,
            start_time: departure_time,
            duration: access.total_duration(),
        },
    );

    let rides = legs
        .iter()
        .filter(|leg| matches!(leg, JourneyLeg::Transit { .. }))
        .count();

    let arrival_time = match egress {
        Some((egress_leg, terminal_arrival)) => {
            let arrival = terminal_arrival.saturating_add(egress_leg.total_duration());
            legs.push(JourneyLeg::Egress {
                stop: egress_leg.stop,
                start_time: terminal_arrival,
                duration: egress_leg.total_duration(),
            });
            arrival
        }
        None => match legs.last() {
            Some(JourneyLeg::Transit { alight_time, .. }) => *alight_time,
            Some(JourneyLeg::Transfer {
                start_time,
                duration,
                ..
            }) => start_time.saturating_add(*duration),
            _ => return Err(SearchError::InvalidJourney),
        },
    };

    Ok(Journey {
        legs,
        departure_time,
        arrival_time,
        rides,
        transfers: rides.saturating_sub(1),
        cost,
        fare,
    }
    .orient(direction))
}

/// Reconstruct a journey from the plain worker's per-round arrays, ending
/// with a transit arrival at `stop` in `round`.
pub(crate) fn map_plain_journey(
    state: &PlainState,
    round: usize,
    stop: StopId,
    egress: Option<AccessEgress>,
    access_legs: &[AccessEgress],
    board_slack: Time,
    direction: SearchDirection,
) -> Result<Journey, SearchError> {
    let mut legs_reversed = Vec::new();
    let mut current_round = round;
    let mut current_stop = stop;
    let terminal_arrival = state.transit_arrivals[round][stop];
    let mut current_arrival = terminal_arrival;
    let mut predecessor = state.transit_predecessors[round][stop];
    let mut guard = state.max_rounds() * state.best_arrival.len() + 1;

    let access = loop {
        guard = guard.checked_sub(1).ok_or(SearchError::InvalidJourney)?;
        match predecessor {
            PlainPredecessor::None => return Err(SearchError::InvalidJourney),
            PlainPredecessor::Access { leg } => {
                break *access_legs.get(leg).ok_or(SearchError::InvalidJourney)?;
            }
            PlainPredecessor::Transit {
                pattern,
                trip,
                board_stop,
                board_time,
            } => {
                legs_reversed.push(JourneyLeg::Transit {
                    pattern,
                    trip,
                    board_stop,
                    board_time,
                    alight_stop: current_stop,
                    alight_time: current_arrival,
                });
                current_round = current_round
                    .checked_sub(1)
                    .ok_or(SearchError::InvalidJourney)?;
                current_stop = board_stop;
                // Boarding read the overall arrival of the previous round.
                current_arrival = state.arrivals[current_round][current_stop];
                predecessor = state.predecessors[current_round][current_stop];
            }
            PlainPredecessor::Transfer {
                from_stop,
                duration,
            } => {
                // Transfers always leave from a transit arrival.
                let start_time = state.transit_arrivals[current_round][from_stop];
                legs_reversed.push(JourneyLeg::Transfer {
                    from_stop,
                    to_stop: current_stop,
                    start_time,
                    duration,
                });
                current_stop = from_stop;
                current_arrival = start_time;
                predecessor = state.transit_predecessors[current_round][current_stop];
            }
        }
    };

    assemble(
        legs_reversed,
        access,
        egress.map(|leg| (leg, terminal_arrival)),
        board_slack,
        None,
        None,
        direction,
    )
}

/// Reconstruct a journey from a destination arrival's arena chain.
pub fn map_mc_journey(
    arena: &ArrivalArena,
    destination: &DestinationArrival,
    access_legs: &[AccessEgress],
    board_slack: Time,
    direction: SearchDirection,
) -> Result<Journey, SearchError> {
    let mut legs_reversed = Vec::new();
    let mut current = Some(destination.terminal);
    let terminal = arena.get(destination.terminal);
    let mut access = None;

    let mut guard = arena.len() + 1;
    while let Some(id) = current {
        guard = guard.checked_sub(1).ok_or(SearchError::InvalidJourney)?;
        let record = arena.get(id);
        match record.arrived_by {
            ArrivedBy::Access { leg } => {
                access = Some(*access_legs.get(leg).ok_or(SearchError::InvalidJourney)?);
            }
            ArrivedBy::Transit {
                pattern,
                trip,
                board_stop,
                board_time,
            } => {
                legs_reversed.push(JourneyLeg::Transit {
                    pattern,
                    trip,
                    board_stop,
                    board_time,
                    alight_stop: record.stop,
                    alight_time: record.arrival_time,
                });
            }
            ArrivedBy::Transfer {
                from_stop,
                duration,
            } => {
                legs_reversed.push(JourneyLeg::Transfer {
                    from_stop,
                    to_stop: record.stop,
                    start_time: record.arrival_time.saturating_sub(duration),
                    duration,
                });
            }
        }
        current = record.previous;
    }

    let access = access.ok_or(SearchError::InvalidJourney)?;
    assemble(
        legs_reversed,
        access,
        Some((destination.egress, terminal.arrival_time)),
        board_slack,
        Some(destination.cost),
        destination.fare,
        direction,
    )
}
