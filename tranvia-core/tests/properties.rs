//! Seeded property tests over randomly generated networks

use fastrand::Rng;

use tranvia_core::fares::{FaresV2Calculator, InRoutingFareCalculator, RideLeg};
use tranvia_core::model::fares::{BLANK_FARE_ID, FareLegRule, FareTransferRule, FareTransferType};
use tranvia_core::prelude::*;
use tranvia_core::routing::pareto::{Dominance, ParetoFrontier};
use tranvia_core::routing::raptor::earliest_boardable_trip;
use tranvia_core::routing::SearchOutcome;

const NUM_STOPS: usize = 14;

/// Random network: a handful of patterns over a shared stop pool, plus
/// random walking transfers.
fn random_network(rng: &mut Rng) -> TransitData {
    let mut builder = TransitDataBuilder::new();
    let stops: Vec<StopId> = (0..NUM_STOPS)
        .map(|i| builder.add_stop(&format!("s{i}")))
        .collect();

    for route_index in 0..5 {
        let route = builder.add_route(&format!("r{route_index}"));
        let length = rng.usize(3..=5);
        let mut sequence = stops.clone();
        rng.shuffle(&mut sequence);
        sequence.truncate(length);

        let mut pattern = builder.add_pattern(route, sequence.clone());
        let trips = rng.usize(2..=4);
        let mut start = 8 * 3600 + rng.u32(0..1800);
        for trip_index in 0..trips {
            let mut arrivals = Vec::with_capacity(length);
            let mut departures = Vec::with_capacity(length);
            let mut time = start;
            for position in 0..length {
                arrivals.push(time);
                if position + 1 < length {
                    time += rng.u32(0..=60); // dwell
                }
                departures.push(time);
                time += rng.u32(60..=600); // hop
            }
            pattern.add_trip(
                &format!("r{route_index}t{trip_index}"),
                arrivals,
                departures,
            );
            start += rng.u32(300..=900);
        }
    }

    for _ in 0..8 {
        let from = stops[rng.usize(0..NUM_STOPS)];
        let to = stops[rng.usize(0..NUM_STOPS)];
        if from != to {
            builder.add_transfer(from, to, rng.u32(30..=300));
        }
    }

    builder.build().unwrap()
}

fn single_minute_request(departure: Time, origin: StopId, destination: StopId) -> Request {
    Request {
        from_time: departure,
        to_time: departure,
        board_slack: 60,
        access: vec![AccessEgress::new(origin, 0)],
        egress: vec![AccessEgress::new(destination, 0)],
        ..Request::default()
    }
}

/// Property 1: departing earlier never arrives later, so range-raptor reuse
/// is sound.
#[test]
fn arrival_times_are_monotone_over_departure_minutes() {
    let mut rng = Rng::with_seed(7);
    for _ in 0..10 {
        let data = random_network(&mut rng);
        let origin = rng.usize(0..NUM_STOPS);
        let base = 8 * 3600 + rng.u32(0..600);

        let mut previous: Option<Vec<Time>> = None;
        for minute in (0..4u32).rev() {
            let departure = base + minute * 60;
            let mut request = single_minute_request(departure, origin, (origin + 1) % NUM_STOPS);
            request.profile = Profile::RangeRaptor;
            let SearchOutcome::Plain(result) =
                run_request(&data, &request, SearchLimits::none()).unwrap()
            else {
                unreachable!()
            };
            if let Some(later) = &previous {
                for (earlier_arrival, later_arrival) in
                    result.best_arrivals.iter().zip(later)
                {
                    assert!(earlier_arrival <= later_arrival);
                }
            }
            previous = Some(result.best_arrivals);
        }
    }
}

struct TripleDominance;

impl Dominance<(u32, u32, u32)> for TripleDominance {
    fn dominates_weakly(&self, a: &(u32, u32, u32), b: &(u32, u32, u32)) -> bool {
        a.0 <= b.0 && a.1 <= b.1 && a.2 <= b.2
    }
}

/// Property 2: inserting a dominated or equal candidate leaves the frontier
/// unchanged.
#[test]
fn pareto_insertion_is_idempotent() {
    let mut rng = Rng::with_seed(11);
    for _ in 0..50 {
        let mut frontier = ParetoFrontier::new(TripleDominance);
        let mut elements = Vec::new();
        for _ in 0..40 {
            let candidate = (rng.u32(0..50), rng.u32(0..50), rng.u32(0..50));
            frontier.try_add(candidate);
            elements.push(candidate);
        }
        let size = frontier.len();
        let snapshot: Vec<_> = frontier.iter().copied().collect();

        for element in snapshot.clone() {
            let outcome = frontier.try_add(element);
            assert!(!outcome.accepted);
        }
        for element in elements {
            let dominated = (element.0 + 1, element.1 + 1, element.2 + 1);
            let outcome = frontier.try_add(dominated);
            assert!(!outcome.accepted);
        }
        assert_eq!(frontier.len(), size);
        assert_eq!(frontier.iter().copied().collect::<Vec<_>>(), snapshot);
    }
}

/// Property 3: with `max_additional_transfers = k`, every destination
/// arrival uses at most `first_reach_round + k` rides.
#[test]
fn destination_rounds_stay_within_additional_transfer_budget() {
    let mut rng = Rng::with_seed(13);
    let k = 1;
    let mut checked = 0;
    for _ in 0..30 {
        let data = random_network(&mut rng);
        let origin = rng.usize(0..NUM_STOPS);
        let destination = rng.usize(0..NUM_STOPS);
        if origin == destination {
            continue;
        }
        let mut request = single_minute_request(8 * 3600, origin, destination);
        request.max_additional_transfers = k;
        let SearchOutcome::MultiCriteria(result) =
            run_request(&data, &request, SearchLimits::none()).unwrap()
        else {
            unreachable!()
        };
        if result.arrivals.is_empty() {
            continue;
        }
        let first_reach = result.arrivals.iter().map(|a| a.rides).min().unwrap();
        for arrival in &result.arrivals {
            assert!(arrival.rides <= first_reach + k);
        }
        checked += 1;
    }
    assert!(checked > 0);
}

/// Property 4: re-simulating a mapped path against the transit data yields
/// the same arrival time, cost and round.
#[test]
fn mapped_paths_survive_re_simulation() {
    let mut rng = Rng::with_seed(17);
    let mut checked = 0;
    for _ in 0..30 {
        let data = random_network(&mut rng);
        let origin = rng.usize(0..NUM_STOPS);
        let destination = rng.usize(0..NUM_STOPS);
        if origin == destination {
            continue;
        }
        let request = single_minute_request(8 * 3600, origin, destination);
        let SearchOutcome::MultiCriteria(result) =
            run_request(&data, &request, SearchLimits::none()).unwrap()
        else {
            unreachable!()
        };
        for journey in &result.journeys {
            re_simulate(&data, &request, journey);
            checked += 1;
        }
    }
    assert!(checked > 0);
}

fn re_simulate(data: &TransitData, request: &Request, journey: &Journey) {
    let mut time = journey.departure_time;
    let mut rides = 0;
    let mut cost: Cost = 0;
    let mut previous_arrival = 0;
    let mut at_stop = usize::MAX;

    for leg in &journey.legs {
        match *leg {
            JourneyLeg::Access {
                stop,
                start_time,
                duration,
            } => {
                assert_eq!(start_time, journey.departure_time);
                time = start_time + duration;
                previous_arrival = time;
                cost += request.cost_model.walk_cost(duration);
                at_stop = stop;
            }
            JourneyLeg::Transit {
                pattern,
                trip,
                board_stop,
                board_time,
                alight_stop,
                alight_time,
            } => {
                rides += 1;
                assert_eq!(board_stop, at_stop);
                // Board slack was honored.
                assert!(previous_arrival + request.board_slack <= board_time);
                // Times match the schedule.
                let schedule = &data.patterns[pattern].trips[trip];
                let board_position = data.patterns[pattern]
                    .stops
                    .iter()
                    .position(|&s| s == board_stop)
                    .unwrap();
                let alight_position = board_position
                    + data.patterns[pattern].stops[board_position..]
                        .iter()
                        .position(|&s| s == alight_stop)
                        .unwrap();
                assert_eq!(schedule.departures[board_position], board_time);
                assert_eq!(schedule.arrivals[alight_position], alight_time);
                cost += request.cost_model.transit_arrival_cost(
                    rides,
                    previous_arrival,
                    board_time,
                    alight_time,
                );
                time = alight_time;
                previous_arrival = alight_time;
                at_stop = alight_stop;
            }
            JourneyLeg::Transfer {
                from_stop,
                to_stop,
                start_time,
                duration,
            } => {
                assert_eq!(from_stop, at_stop);
                assert_eq!(start_time, time);
                // The edge exists with this duration.
                assert!(
                    data.transfers_from(from_stop)
                        .unwrap()
                        .iter()
                        .any(|t| t.target_stop == to_stop && t.duration == duration)
                );
                time = start_time + duration;
                previous_arrival = time;
                cost += request.cost_model.walk_cost(duration);
                at_stop = to_stop;
            }
            JourneyLeg::Egress {
                start_time,
                duration,
                ..
            } => {
                assert_eq!(start_time, time);
                time = start_time + duration;
                cost += request.cost_model.walk_cost(duration);
            }
        }
    }

    assert_eq!(time, journey.arrival_time);
    assert_eq!(rides, journey.rides);
    assert_eq!(Some(cost), journey.cost);
}

/// Property 5: the fare calculator is deterministic regardless of LRU state.
#[test]
fn fare_calculation_is_deterministic() {
    let mut rng = Rng::with_seed(19);
    for _ in 0..20 {
        let mut builder = TransitDataBuilder::new();
        let stops: Vec<StopId> = (0..6).map(|i| builder.add_stop(&format!("s{i}"))).collect();
        let mut patterns = Vec::new();
        for route_index in 0..3 {
            let route = builder.add_route(&format!("r{route_index}"));
            let a = stops[rng.usize(0..6)];
            let b = stops[(rng.usize(0..5) + a + 1) % 6];
            builder
                .add_pattern(route, vec![a, b])
                .add_trip("t", vec![0, 600], vec![0, 600]);
            patterns.push((a, b));
            let network = builder.add_fare_network(&format!("n{route_index}"), rng.bool());
            builder.add_route_to_network(route, network);
        }
        for _ in 0..6 {
            builder.add_fare_leg_rule(FareLegRule {
                network: if rng.bool() { rng.u32(0..3) } else { BLANK_FARE_ID },
                from_stop: if rng.bool() { rng.u32(0..6) } else { BLANK_FARE_ID },
                to_stop: if rng.bool() { rng.u32(0..6) } else { BLANK_FARE_ID },
                order: rng.u32(0..4),
                amount: rng.i32(100..800),
                leg_group: rng.u32(0..3),
            });
        }
        for _ in 0..4 {
            builder.add_fare_transfer_rule(FareTransferRule {
                from_leg_group: if rng.bool() { rng.u32(0..3) } else { BLANK_FARE_ID },
                to_leg_group: if rng.bool() { rng.u32(0..3) } else { BLANK_FARE_ID },
                transfer_type: if rng.bool() {
                    FareTransferType::TotalCostPlusAmount
                } else {
                    FareTransferType::FirstLegPlusAmount
                },
                amount: rng.i32(-200..200),
                order: rng.u32(0..4),
            });
        }
        let data = builder.build().unwrap();

        let journey: Vec<RideLeg> = (0..rng.usize(1..=3))
            .map(|i| {
                let (a, b) = patterns[i % patterns.len()];
                RideLeg {
                    pattern: i % patterns.len(),
                    board_stop: a,
                    alight_stop: b,
                    board_time: 0,
                    alight_time: 600,
                }
            })
            .collect();

        let mut fresh = FaresV2Calculator::new(false);
        let mut warmed = FaresV2Calculator::new(false);
        // Warm the cache with unrelated journeys first.
        for (index, (a, b)) in patterns.iter().enumerate() {
            let _ = warmed.price(
                &data,
                &[RideLeg {
                    pattern: index,
                    board_stop: *a,
                    alight_stop: *b,
                    board_time: 0,
                    alight_time: 600,
                }],
            );
        }
        assert_eq!(fresh.price(&data, &journey), warmed.price(&data, &journey));
    }
}

/// Property 6: after a reroute, every trip keeps its arrival time at the
/// fixed-point stop and stays time-monotone.
#[test]
fn reroute_preserves_fixed_point_on_random_patterns() {
    let mut rng = Rng::with_seed(23);
    let mut checked = 0;
    for _ in 0..30 {
        let data = random_network(&mut rng);
        let pattern_id = rng.usize(0..data.patterns.len());
        let pattern = &data.patterns[pattern_id];
        if pattern.len() < 3 {
            continue;
        }
        let from_position = rng.usize(0..pattern.len() - 2);
        let to_position = from_position + 1 + rng.usize(0..pattern.len() - from_position - 1);
        let from_stop = pattern.stops[from_position];
        let to_stop = pattern.stops[to_position];
        let route = pattern.route;

        // One brand-new stop between from and to.
        let mut builder_data = data.clone();
        let new_stop = builder_data.stops.len();
        builder_data.stops.push(builder_data.stops[0].clone());
        builder_data.stops[new_stop].stop_id = "inserted".to_string();
        builder_data.stops[new_stop].patterns_start = 0;
        builder_data.stops[new_stop].patterns_len = 0;
        builder_data.stops[new_stop].transfers_start = 0;
        builder_data.stops[new_stop].transfers_len = 0;

        let reroute = Reroute {
            target: RerouteTarget::Routes(vec![route]),
            from_stop: Some(from_stop),
            to_stop: Some(to_stop),
            new_stops: vec![new_stop],
            dwell_times: vec![rng.u32(0..60), rng.u32(0..60), rng.u32(0..60)],
            hop_times: vec![rng.u32(60..300), rng.u32(60..300)],
        };
        let Ok(modified) = reroute.apply(&builder_data) else {
            continue;
        };

        for (original, rewritten) in data.patterns[pattern_id]
            .trips
            .iter()
            .zip(&modified.patterns[pattern_id].trips)
        {
            // Fixed point: the first rewritten stop present in the original
            // pattern keeps its arrival.
            let (new_position, old_position) = modified.patterns[pattern_id]
                .stops
                .iter()
                .enumerate()
                .find_map(|(new_position, stop)| {
                    data.patterns[pattern_id]
                        .stops
                        .iter()
                        .position(|s| s == stop)
                        .map(|old| (new_position, old))
                })
                .unwrap();
            assert_eq!(
                rewritten.arrivals[new_position],
                original.arrivals[old_position]
            );
            // Time monotonicity holds on the rewritten schedule.
            for position in 0..rewritten.arrivals.len() {
                assert!(rewritten.arrivals[position] <= rewritten.departures[position]);
                if position + 1 < rewritten.arrivals.len() {
                    assert!(
                        rewritten.departures[position] <= rewritten.arrivals[position + 1]
                    );
                }
            }
            checked += 1;
        }
    }
    assert!(checked > 0);
}

/// Property 7: the board search returns the earliest eligible trip.
#[test]
fn board_search_matches_brute_force() {
    let mut rng = Rng::with_seed(29);
    for _ in 0..50 {
        let data = random_network(&mut rng);
        let service_mask = data.service_mask_for(None);
        for pattern in &data.patterns {
            for position in 0..pattern.len() {
                let earliest = 8 * 3600 + rng.u32(0..3600);
                let upper = if rng.bool() {
                    Some(rng.usize(0..=pattern.trips.len()))
                } else {
                    None
                };
                let found =
                    earliest_boardable_trip(pattern, position, earliest, upper, &service_mask);

                let limit = upper.unwrap_or(pattern.trips.len());
                let expected = pattern.trips[..limit]
                    .iter()
                    .enumerate()
                    .filter(|(_, trip)| trip.frequency.is_none())
                    .filter(|(_, trip)| trip.departures[position] >= earliest)
                    .min_by_key(|(index, trip)| (trip.departures[position], *index))
                    .map(|(index, _)| index);

                match (found, expected) {
                    (Some(found), Some(expected)) => {
                        let found_departure = pattern.trips[found].departures[position];
                        let expected_departure = pattern.trips[expected].departures[position];
                        assert_eq!(found_departure, expected_departure);
                        assert!(found_departure >= earliest);
                    }
                    (None, None) => {}
                    other => panic!("board search mismatch: {other:?}"),
                }
            }
        }
    }
}
