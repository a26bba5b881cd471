//! Read-only transit data surface consumed by the routing workers

use chrono::NaiveDate;
use fixedbitset::FixedBitSet;
use serde::{Deserialize, Serialize};

use super::types::{
    Pattern, PatternId, Route, RouteId, Service, Stop, StopId, Transfer, TripSchedule,
};
use crate::model::fares::FareTables;
use crate::routing::SearchError;

/// The transit network: stops, patterns with their trip schedules, walking
/// transfers, calendar services and fare tables.
///
/// Workers only ever read from this structure; a request may fan out many
/// workers over one shared instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitData {
    pub stops: Vec<Stop>,
    pub routes: Vec<Route>,
    pub patterns: Vec<Pattern>,
    /// Patterns through each stop, windowed by `Stop::patterns_start/len`.
    pub stop_patterns: Vec<PatternId>,
    /// Transfers from each stop, windowed by `Stop::transfers_start/len`.
    pub transfers: Vec<Transfer>,
    pub services: Vec<Service>,
    pub fares: FareTables,
}

impl TransitData {
    /// check if such stop exists
    pub(crate) fn validate_stop(&self, stop: StopId) -> Result<(), SearchError> {
        if stop >= self.stops.len() {
            Err(SearchError::InvalidStop)
        } else {
            Ok(())
        }
    }

    pub fn pattern(&self, pattern: PatternId) -> Result<&Pattern, SearchError> {
        self.patterns.get(pattern).ok_or(SearchError::InvalidPattern)
    }

    pub fn trip(&self, pattern: PatternId, trip: usize) -> Result<&TripSchedule, SearchError> {
        self.pattern(pattern)?
            .trips
            .get(trip)
            .ok_or(SearchError::InvalidTrip)
    }

    /// Patterns through the specified stop.
    pub fn patterns_for_stop(&self, stop: StopId) -> &[PatternId] {
        let s = &self.stops[stop];
        &self.stop_patterns[s.patterns_start..s.patterns_start + s.patterns_len]
    }

    /// Returns transfers from the specified stop.
    pub fn transfers_from(&self, stop: StopId) -> Result<&[Transfer], SearchError> {
        self.validate_stop(stop)?;
        let s = &self.stops[stop];
        let end = s.transfers_start + s.transfers_len;
        if end > self.transfers.len() {
            Err(SearchError::InvalidStop)
        } else {
            Ok(&self.transfers[s.transfers_start..end])
        }
    }

    /// Every pattern visiting at least one set stop, as a bitset whose
    /// ascending `ones()` yield each pattern at most once.
    ///
    /// The input view is borrowed for the duration of the call and never
    /// mutated; the result is an owned copy.
    pub fn patterns_touching(&self, stops: &FixedBitSet) -> FixedBitSet {
        let mut touched = FixedBitSet::with_capacity(self.patterns.len());
        for stop in stops.ones() {
            if stop >= self.stops.len() {
                continue;
            }
            for &pattern in self.patterns_for_stop(stop) {
                touched.insert(pattern);
            }
        }
        touched
    }

    /// Bitset of services active on the given date, consulted by
    /// [`TransitData::trip_is_in_service`]. `None` activates every service.
    pub fn service_mask_for(&self, date: Option<NaiveDate>) -> FixedBitSet {
        let mut mask = FixedBitSet::with_capacity(self.services.len());
        match date {
            Some(date) => {
                for (id, service) in self.services.iter().enumerate() {
                    if service.runs_on(date) {
                        mask.insert(id);
                    }
                }
            }
            None => mask.insert_range(..),
        }
        mask
    }

    pub fn trip_is_in_service(&self, trip: &TripSchedule, service_mask: &FixedBitSet) -> bool {
        trip.service < service_mask.len() && service_mask.contains(trip.service)
    }

    /// Bitset of stops served by at least one pattern, used by the
    /// transfers-stop-filter optimization.
    pub fn stops_with_patterns(&self) -> FixedBitSet {
        let mut served = FixedBitSet::with_capacity(self.stops.len());
        for (id, stop) in self.stops.iter().enumerate() {
            if stop.patterns_len > 0 {
                served.insert(id);
            }
        }
        served
    }

    /// Fare networks the route belongs to.
    pub fn fare_networks_for_route(&self, route: RouteId) -> &[u32] {
        self.fares
            .route_networks
            .get(route)
            .map_or(&[], Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use crate::model::TransitDataBuilder;

    #[test]
    fn patterns_touching_yields_each_pattern_once() {
        let mut builder = TransitDataBuilder::new();
        let a = builder.add_stop("a");
        let b = builder.add_stop("b");
        let c = builder.add_stop("c");
        let route = builder.add_route("r1");
        builder
            .add_pattern(route, vec![a, b, c])
            .add_trip("t1", vec![0, 100, 200], vec![0, 110, 200]);
        let data = builder.build().unwrap();

        let mut stops = fixedbitset::FixedBitSet::with_capacity(3);
        stops.insert(a);
        stops.insert(b);
        let touched = data.patterns_touching(&stops);
        assert_eq!(touched.ones().collect::<Vec<_>>(), vec![0]);
    }
}
