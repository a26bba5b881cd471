//! In-memory assembly of a validated [`TransitData`]
//!
//! The engine assumes a precomputed transit layer; this builder is how such a
//! layer is put together programmatically (or re-indexed after a scenario
//! modification rewrites patterns).

use chrono::NaiveDate;
use fixedbitset::FixedBitSet;
use hashbrown::HashMap;
use log::{info, warn};

use super::data::TransitData;
use super::types::{
    Frequency, Pattern, PatternId, PickupDropoff, Route, RouteId, Service, Stop, StopId, Time,
    Transfer, TripSchedule,
};
use crate::Error;
use crate::model::fares::{FareLegRule, FareNetwork, FareTables, FareTransferRule};

#[derive(Debug, Default)]
struct PatternDraft {
    route: RouteId,
    stops: Vec<StopId>,
    pickups: Vec<PickupDropoff>,
    dropoffs: Vec<PickupDropoff>,
    wheelchair_accessible: FixedBitSet,
    trips: Vec<TripSchedule>,
}

/// Builder for [`TransitData`].
#[derive(Debug, Default)]
pub struct TransitDataBuilder {
    stop_ids: Vec<String>,
    routes: Vec<Route>,
    patterns: Vec<PatternDraft>,
    transfers: Vec<(StopId, Transfer)>,
    services: Vec<Service>,
    fares: FareTables,
}

/// Handle for populating one pattern's trips.
pub struct PatternBuilder<'a> {
    draft: &'a mut PatternDraft,
}

impl TransitDataBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_stop(&mut self, stop_id: &str) -> StopId {
        self.stop_ids.push(stop_id.to_string());
        self.stop_ids.len() - 1
    }

    pub fn add_route(&mut self, route_id: &str) -> RouteId {
        self.routes.push(Route {
            route_id: route_id.to_string(),
        });
        self.routes.len() - 1
    }

    pub fn add_service(&mut self, service: Service) -> usize {
        self.services.push(service);
        self.services.len() - 1
    }

    /// New pattern on `route` visiting `stops` in order, with scheduled
    /// pickup/dropoff and wheelchair access at every position.
    pub fn add_pattern(&mut self, route: RouteId, stops: Vec<StopId>) -> PatternBuilder<'_> {
        let len = stops.len();
        let mut wheelchair_accessible = FixedBitSet::with_capacity(len);
        wheelchair_accessible.insert_range(..);
        self.patterns.push(PatternDraft {
            route,
            stops,
            pickups: vec![PickupDropoff::Scheduled; len],
            dropoffs: vec![PickupDropoff::Scheduled; len],
            wheelchair_accessible,
            trips: Vec::new(),
        });
        PatternBuilder {
            draft: self.patterns.last_mut().unwrap(),
        }
    }

    /// Walking edge between two distinct stops. Self-transfers are dropped
    /// with a warning.
    pub fn add_transfer(&mut self, from: StopId, to: StopId, duration: Time) {
        if from == to {
            warn!("Dropping self-transfer at stop {from}");
            return;
        }
        self.transfers.push((
            from,
            Transfer {
                target_stop: to,
                duration,
            },
        ));
    }

    pub fn add_fare_network(&mut self, network_id: &str, as_route: bool) -> u32 {
        self.fares.networks.push(FareNetwork {
            network_id: network_id.to_string(),
            as_route,
        });
        (self.fares.networks.len() - 1) as u32
    }

    pub fn add_route_to_network(&mut self, route: RouteId, network: u32) {
        if self.fares.route_networks.len() <= route {
            self.fares.route_networks.resize(route + 1, Vec::new());
        }
        self.fares.route_networks[route].push(network);
    }

    pub fn add_fare_leg_rule(&mut self, rule: FareLegRule) -> u32 {
        self.fares.leg_rules.push(rule);
        (self.fares.leg_rules.len() - 1) as u32
    }

    pub fn add_fare_transfer_rule(&mut self, rule: FareTransferRule) -> u32 {
        self.fares.transfer_rules.push(rule);
        (self.fares.transfer_rules.len() - 1) as u32
    }

    /// Validate, index and produce the final data structure.
    pub fn build(mut self) -> Result<TransitData, Error> {
        if self.services.is_empty() {
            self.services.push(all_days_service());
        }

        let num_stops = self.stop_ids.len();
        self.transfers.retain(|(from, transfer)| {
            let valid = *from < num_stops && transfer.target_stop < num_stops;
            if !valid {
                warn!(
                    "Dropping transfer with invalid endpoint {} -> {}",
                    from, transfer.target_stop
                );
            }
            valid
        });
        let mut patterns = Vec::with_capacity(self.patterns.len());
        for (id, mut draft) in self.patterns.into_iter().enumerate() {
            validate_pattern(id, &draft, num_stops, self.services.len())?;
            // Sort by first departure so binary board search applies whenever
            // the timetable has no crossings.
            draft
                .trips
                .sort_by_key(|trip| trip.departures.first().copied().unwrap_or(0));
            let timetable_sorted = timetable_is_sorted(&draft.trips);
            if !timetable_sorted {
                warn!("Pattern {id} has crossing trips, board search degrades to scan");
            }
            patterns.push(Pattern {
                route: draft.route,
                stops: draft.stops,
                pickups: draft.pickups,
                dropoffs: draft.dropoffs,
                wheelchair_accessible: draft.wheelchair_accessible,
                trips: draft.trips,
                timetable_sorted,
            });
        }

        let (stops, stop_patterns, transfers) =
            index_stops(self.stop_ids, &patterns, self.transfers);

        self.fares.rebuild_indices(self.routes.len());

        info!(
            "Built transit data: {} stops, {} patterns, {} transfers",
            stops.len(),
            patterns.len(),
            transfers.len()
        );

        Ok(TransitData {
            stops,
            routes: self.routes,
            patterns,
            stop_patterns,
            transfers,
            services: self.services,
            fares: self.fares,
        })
    }
}

impl PatternBuilder<'_> {
    /// Scheduled trip on the default (first) service.
    pub fn add_trip(
        &mut self,
        trip_id: &str,
        arrivals: Vec<Time>,
        departures: Vec<Time>,
    ) -> &mut Self {
        self.add_trip_on_service(trip_id, arrivals, departures, 0)
    }

    pub fn add_trip_on_service(
        &mut self,
        trip_id: &str,
        arrivals: Vec<Time>,
        departures: Vec<Time>,
        service: usize,
    ) -> &mut Self {
        self.draft.trips.push(TripSchedule {
            trip_id: trip_id.to_string(),
            arrivals,
            departures,
            service,
            frequency: None,
        });
        self
    }

    /// Frequency-based entry; skipped by the scheduled board search.
    pub fn add_frequency_trip(
        &mut self,
        trip_id: &str,
        arrivals: Vec<Time>,
        departures: Vec<Time>,
        frequency: Frequency,
    ) -> &mut Self {
        self.draft.trips.push(TripSchedule {
            trip_id: trip_id.to_string(),
            arrivals,
            departures,
            service: 0,
            frequency: Some(frequency),
        });
        self
    }

    pub fn set_pickup(&mut self, position: usize, pickup: PickupDropoff) -> &mut Self {
        self.draft.pickups[position] = pickup;
        self
    }

    pub fn set_dropoff(&mut self, position: usize, dropoff: PickupDropoff) -> &mut Self {
        self.draft.dropoffs[position] = dropoff;
        self
    }

    pub fn set_wheelchair_accessible(&mut self, position: usize, accessible: bool) -> &mut Self {
        self.draft.wheelchair_accessible.set(position, accessible);
        self
    }
}

fn all_days_service() -> Service {
    Service {
        service_id: "default".to_string(),
        start_date: NaiveDate::from_ymd_opt(1970, 1, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2099, 12, 31).unwrap(),
        weekdays: [true; 7],
        added: Vec::new(),
        removed: Vec::new(),
    }
}

fn validate_pattern(
    id: PatternId,
    draft: &PatternDraft,
    num_stops: usize,
    num_services: usize,
) -> Result<(), Error> {
    let k = draft.stops.len();
    if k < 2 {
        return Err(Error::InvalidData(format!(
            "Pattern {id} visits fewer than two stops"
        )));
    }
    if let Some(&stop) = draft.stops.iter().find(|&&stop| stop >= num_stops) {
        return Err(Error::InvalidData(format!(
            "Pattern {id} references unknown stop {stop}"
        )));
    }
    for trip in &draft.trips {
        if trip.arrivals.len() != k || trip.departures.len() != k {
            return Err(Error::InvalidData(format!(
                "Trip {} on pattern {id} has {} arrivals and {} departures for {k} stops",
                trip.trip_id,
                trip.arrivals.len(),
                trip.departures.len()
            )));
        }
        if trip.service >= num_services {
            return Err(Error::InvalidData(format!(
                "Trip {} references unknown service {}",
                trip.trip_id, trip.service
            )));
        }
        for i in 0..k {
            if trip.arrivals[i] > trip.departures[i]
                || (i + 1 < k && trip.departures[i] > trip.arrivals[i + 1])
            {
                return Err(Error::InvalidData(format!(
                    "Trip {} on pattern {id} has non-monotonic times at position {i}",
                    trip.trip_id
                )));
            }
        }
    }
    Ok(())
}

/// True when every pair of adjacent trips is weakly ordered at every
/// position, i.e. the timetable has no crossings.
fn timetable_is_sorted(trips: &[TripSchedule]) -> bool {
    trips.windows(2).all(|pair| {
        pair[0]
            .departures
            .iter()
            .zip(&pair[1].departures)
            .all(|(a, b)| a <= b)
            && pair[0]
                .arrivals
                .iter()
                .zip(&pair[1].arrivals)
                .all(|(a, b)| a <= b)
    })
}

fn index_stops(
    stop_ids: Vec<String>,
    patterns: &[Pattern],
    transfer_edges: Vec<(StopId, Transfer)>,
) -> (Vec<Stop>, Vec<PatternId>, Vec<Transfer>) {
    let num_stops = stop_ids.len();

    let mut patterns_at_stop: Vec<Vec<PatternId>> = vec![Vec::new(); num_stops];
    for (pattern_id, pattern) in patterns.iter().enumerate() {
        for &stop in &pattern.stops {
            // A loop pattern may visit a stop twice; record it once.
            if patterns_at_stop[stop].last() != Some(&pattern_id) {
                patterns_at_stop[stop].push(pattern_id);
            }
        }
    }

    let mut transfers_at_stop: HashMap<StopId, Vec<Transfer>> = HashMap::new();
    for (from, transfer) in transfer_edges {
        transfers_at_stop.entry(from).or_default().push(transfer);
    }

    let mut stops = Vec::with_capacity(num_stops);
    let mut stop_patterns = Vec::new();
    let mut transfers = Vec::new();
    for (stop_id, name) in stop_ids.into_iter().enumerate() {
        let patterns_start = stop_patterns.len();
        stop_patterns.extend(&patterns_at_stop[stop_id]);
        let transfers_start = transfers.len();
        if let Some(edges) = transfers_at_stop.get(&stop_id) {
            transfers.extend(edges.iter().copied());
        }
        stops.push(Stop {
            stop_id: name,
            transfers_start,
            transfers_len: transfers.len() - transfers_start,
            patterns_start,
            patterns_len: stop_patterns.len() - patterns_start,
        });
    }

    (stops, stop_patterns, transfers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_indexes_transfers_and_patterns() {
        let mut builder = TransitDataBuilder::new();
        let a = builder.add_stop("a");
        let b = builder.add_stop("b");
        let route = builder.add_route("r");
        builder
            .add_pattern(route, vec![a, b])
            .add_trip("t", vec![0, 60], vec![10, 60]);
        builder.add_transfer(a, b, 120);
        builder.add_transfer(b, b, 5);

        let data = builder.build().unwrap();
        assert_eq!(data.patterns_for_stop(a), &[0]);
        let from_a = data.transfers_from(a).unwrap();
        assert_eq!(from_a.len(), 1);
        assert_eq!(from_a[0].target_stop, b);
        // Self-transfer was dropped.
        assert!(data.transfers_from(b).unwrap().is_empty());
    }

    #[test]
    fn crossing_trips_disable_sorted_flag() {
        let mut builder = TransitDataBuilder::new();
        let a = builder.add_stop("a");
        let b = builder.add_stop("b");
        let route = builder.add_route("r");
        {
            let mut pattern = builder.add_pattern(route, vec![a, b]);
            pattern.add_trip("t1", vec![0, 300], vec![0, 300]);
            // Departs later but overtakes at the second stop.
            pattern.add_trip("t2", vec![60, 240], vec![60, 240]);
        }
        let data = builder.build().unwrap();
        assert!(!data.patterns[0].timetable_sorted);
    }

    #[test]
    fn non_monotonic_trip_is_rejected() {
        let mut builder = TransitDataBuilder::new();
        let a = builder.add_stop("a");
        let b = builder.add_stop("b");
        let route = builder.add_route("r");
        builder
            .add_pattern(route, vec![a, b])
            .add_trip("t", vec![100, 50], vec![100, 50]);
        assert!(builder.build().is_err());
    }
}
