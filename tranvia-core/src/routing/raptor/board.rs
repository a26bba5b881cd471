//! Trip-schedule board search
//!
//! Given a boarding time and a stop position, find the earliest trip of a
//! pattern that can be boarded. Frequency entries and trips whose service is
//! not running are skipped. Sorted timetables use binary search; timetables
//! with crossings fall back to a linear scan over departure times.

use fixedbitset::FixedBitSet;

use crate::model::transit::types::{Pattern, Time, TripSchedule};

fn boardable(trip: &TripSchedule, service_mask: &FixedBitSet) -> bool {
    trip.frequency.is_none()
        && trip.service < service_mask.len()
        && service_mask.contains(trip.service)
}

/// Earliest trip `j < upper_bound` on `pattern` with
/// `departures[position] >= earliest_board`, or `None`.
///
/// `upper_bound` restricts the search to trips strictly earlier than an
/// already-boarded trip, letting the caller back up to a now-reachable
/// earlier trip.
pub fn earliest_boardable_trip(
    pattern: &Pattern,
    position: usize,
    earliest_board: Time,
    upper_bound: Option<usize>,
    service_mask: &FixedBitSet,
) -> Option<usize> {
    let upper = upper_bound.unwrap_or(pattern.trips.len());
    if pattern.timetable_sorted {
        sorted_search(pattern, position, earliest_board, upper, service_mask)
    } else {
        linear_search(pattern, position, earliest_board, upper, service_mask)
    }
}

fn sorted_search(
    pattern: &Pattern,
    position: usize,
    earliest_board: Time,
    upper: usize,
    service_mask: &FixedBitSet,
) -> Option<usize> {
    let mut low = 0;
    let mut high = upper;
    while low < high {
        let mid = (low + high) / 2;
        if pattern.trips[mid].departures[position] >= earliest_board {
            high = mid;
        } else {
            low = mid + 1;
        }
    }
    // Every trip before `low` departs too early; skip filtered trips forward.
    (low..upper).find(|&trip| boardable(&pattern.trips[trip], service_mask))
}

fn linear_search(
    pattern: &Pattern,
    position: usize,
    earliest_board: Time,
    upper: usize,
    service_mask: &FixedBitSet,
) -> Option<usize> {
    let mut best: Option<(usize, Time)> = None;
    for (trip_idx, trip) in pattern.trips[..upper].iter().enumerate() {
        if !boardable(trip, service_mask) {
            continue;
        }
        let departure = trip.departures[position];
        if departure >= earliest_board && best.is_none_or(|(_, t)| departure < t) {
            best = Some((trip_idx, departure));
        }
    }
    best.map(|(trip_idx, _)| trip_idx)
}
