//! Core types for the transit network

use chrono::{Datelike, NaiveDate};
use fixedbitset::FixedBitSet;
use serde::{Deserialize, Serialize};

/// Seconds past midnight of the service day.
pub type Time = u32;
/// Sentinel for a stop that has not been reached.
pub const UNREACHED: Time = Time::MAX;

/// Generalized cost in hundredths of equivalent seconds.
pub type Cost = u32;
pub const UNREACHED_COST: Cost = Cost::MAX;

/// Monetary amount in currency cents. Transfer discounts may be negative.
pub type FareAmount = i32;

pub type StopId = usize;
pub type PatternId = usize;
pub type RouteId = usize;

/// A transit stop. Adjacency (patterns and transfers) is stored as
/// offset/len windows into the shared vectors on [`super::data::TransitData`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub stop_id: String,
    pub transfers_start: usize,
    pub transfers_len: usize,
    pub patterns_start: usize,
    pub patterns_len: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub route_id: String,
}

/// Whether passengers may board or alight at a stop position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PickupDropoff {
    Scheduled,
    NotAvailable,
}

impl PickupDropoff {
    pub fn is_scheduled(self) -> bool {
        matches!(self, PickupDropoff::Scheduled)
    }
}

/// An ordered sequence of stop positions visited by a fixed set of trips.
///
/// Every trip has exactly `stops.len()` arrivals and departures, with
/// `arrivals[i] <= departures[i] <= arrivals[i + 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub route: RouteId,
    pub stops: Vec<StopId>,
    pub pickups: Vec<PickupDropoff>,
    pub dropoffs: Vec<PickupDropoff>,
    /// One bit per stop position.
    pub wheelchair_accessible: FixedBitSet,
    pub trips: Vec<TripSchedule>,
    /// True when no two trips cross at any position, so the board search may
    /// use binary search. Detected at build time.
    pub timetable_sorted: bool,
}

impl Pattern {
    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }
}

/// Schedule of a single trip on a pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripSchedule {
    pub trip_id: String,
    pub arrivals: Vec<Time>,
    pub departures: Vec<Time>,
    pub service: usize,
    /// Present on frequency-based entries, which the scheduled board search
    /// skips.
    pub frequency: Option<Frequency>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frequency {
    pub start: Time,
    pub end: Time,
    pub headway: Time,
}

/// A walking edge between two stops. Self-transfers are excluded at build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub target_stop: StopId,
    pub duration: Time,
}

/// An access or egress leg connecting the origin/destination to a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEgress {
    pub stop: StopId,
    pub duration: Time,
    /// Fixed wait incurred before the leg starts (e.g. picking up a hired
    /// vehicle), independent of the schedule.
    pub wait: Option<Time>,
}

impl AccessEgress {
    pub fn new(stop: StopId, duration: Time) -> Self {
        AccessEgress {
            stop,
            duration,
            wait: None,
        }
    }

    /// Total duration including the fixed wait.
    pub fn total_duration(&self) -> Time {
        self.duration.saturating_add(self.wait.unwrap_or(0))
    }
}

/// Calendar entry controlling on which dates a set of trips runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub service_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Monday-first weekday mask.
    pub weekdays: [bool; 7],
    pub added: Vec<NaiveDate>,
    pub removed: Vec<NaiveDate>,
}

impl Service {
    pub fn runs_on(&self, date: NaiveDate) -> bool {
        if self.removed.contains(&date) {
            return false;
        }
        if self.added.contains(&date) {
            return true;
        }
        date >= self.start_date
            && date <= self.end_date
            && self.weekdays[date.weekday().num_days_from_monday() as usize]
    }
}
