//! Route reroute: splice a new stop sequence into existing patterns
//!
//! Rewrites each matching pattern and all of its trip schedules. Within the
//! inserted segment, dwells and hops are consumed in lockstep (one more
//! dwell than hops); outside it, each source hop duration and source stop
//! dwell is preserved. The whole trip is then shifted so its arrival at the
//! fixed-point stop (first stop present in both patterns) is unchanged,
//! preserving timed transfers anchored there.

use fixedbitset::FixedBitSet;
use log::warn;

use super::ModificationError;
use crate::model::TransitData;
use crate::model::transit::types::{
    Pattern, PickupDropoff, RouteId, StopId, Time, TripSchedule,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RerouteTarget {
    /// Apply to every pattern of the named routes; unmatched patterns warn.
    Routes(Vec<RouteId>),
    /// Apply to the patterns containing the named trips; unmatched patterns
    /// are an error.
    Trips(Vec<String>),
}

/// The modification itself is immutable and reusable; all apply-scoped
/// scratch lives in [`SpliceContext`].
#[derive(Debug, Clone)]
pub struct Reroute {
    pub target: RerouteTarget,
    /// Splice begins after this stop; absent means the pattern start.
    pub from_stop: Option<StopId>,
    /// Splice ends at this stop; absent means the pattern end.
    pub to_stop: Option<StopId>,
    pub new_stops: Vec<StopId>,
    pub dwell_times: Vec<Time>,
    pub hop_times: Vec<Time>,
}

/// Splice positions for one pattern, computed once and shared by every trip
/// rewrite.
struct SpliceContext {
    /// Position after `from_stop` (0 when absent).
    insert_begin: usize,
    /// Position of `to_stop` (pattern length when absent).
    insert_end: usize,
    new_stop_count: usize,
}

impl Reroute {
    /// `dwell_times` covers the boundary stops when present plus every new
    /// stop; `hop_times` connects consecutive entries.
    fn validate(&self) -> Result<(), ModificationError> {
        let expected_dwells = self.new_stops.len()
            + usize::from(self.from_stop.is_some())
            + usize::from(self.to_stop.is_some());
        if self.dwell_times.len() != expected_dwells
            || self.hop_times.len() + 1 != self.dwell_times.len()
        {
            return Err(ModificationError::InconsistentTimings {
                stops: self.new_stops.len(),
                dwells: self.dwell_times.len(),
                hops: self.hop_times.len(),
            });
        }
        Ok(())
    }

    fn matches(&self, pattern: &Pattern) -> bool {
        match &self.target {
            RerouteTarget::Routes(routes) => routes.contains(&pattern.route),
            RerouteTarget::Trips(trip_ids) => pattern
                .trips
                .iter()
                .any(|trip| trip_ids.contains(&trip.trip_id)),
        }
    }

    /// Apply the reroute, producing a new network. The input is not
    /// modified.
    pub fn apply(&self, data: &TransitData) -> Result<TransitData, ModificationError> {
        self.validate()?;
        if let RerouteTarget::Routes(routes) = &self.target {
            if let Some(&route) = routes.iter().find(|&&route| route >= data.routes.len()) {
                return Err(ModificationError::UnknownRoute { route });
            }
        }
        if let Some(&stop) = self.new_stops.iter().find(|&&stop| stop >= data.stops.len()) {
            return Err(ModificationError::UnknownStop { stop });
        }

        let mut result = data.clone();
        let mut matched_any = false;
        for (pattern_id, pattern) in result.patterns.iter_mut().enumerate() {
            if !self.matches(pattern) {
                continue;
            }
            matched_any = true;
            match self.splice_context(pattern) {
                Some(context) => *pattern = self.rewrite_pattern(pattern, &context),
                None => {
                    // Neither boundary stop appears on this pattern.
                    if matches!(self.target, RerouteTarget::Trips(_)) {
                        return Err(ModificationError::UnmatchedStop {
                            pattern: pattern_id,
                        });
                    }
                    warn!(
                        "Reroute boundary stops not found on pattern {pattern_id}, leaving it unchanged"
                    );
                }
            }
        }
        if !matched_any {
            warn!("Reroute matched no patterns");
        }

        reindex_stops(&mut result);
        Ok(result)
    }

    fn splice_context(&self, pattern: &Pattern) -> Option<SpliceContext> {
        let insert_begin = match self.from_stop {
            None => 0,
            Some(stop) => pattern.stops.iter().position(|&s| s == stop)? + 1,
        };
        let insert_end = match self.to_stop {
            None => pattern.len(),
            Some(stop) => pattern.stops[insert_begin.saturating_sub(1)..]
                .iter()
                .position(|&s| s == stop)
                .map(|offset| offset + insert_begin.saturating_sub(1))?,
        };
        if insert_end < insert_begin {
            return None;
        }
        Some(SpliceContext {
            insert_begin,
            insert_end,
            new_stop_count: self.new_stops.len(),
        })
    }

    fn rewrite_pattern(&self, pattern: &Pattern, context: &SpliceContext) -> Pattern {
        let begin = context.insert_begin;
        let end = context.insert_end;
        let new_len = pattern.len() + context.new_stop_count - (end - begin);

        let mut stops = Vec::with_capacity(new_len);
        let mut pickups = Vec::with_capacity(new_len);
        let mut dropoffs = Vec::with_capacity(new_len);
        let mut wheelchair = FixedBitSet::with_capacity(new_len);

        let mut copy_position = |position: usize,
                                 stops: &mut Vec<StopId>,
                                 pickups: &mut Vec<PickupDropoff>,
                                 dropoffs: &mut Vec<PickupDropoff>,
                                 wheelchair: &mut FixedBitSet| {
            stops.push(pattern.stops[position]);
            pickups.push(pattern.pickups[position]);
            dropoffs.push(pattern.dropoffs[position]);
            wheelchair.set(stops.len() - 1, pattern.wheelchair_accessible.contains(position));
        };

        for position in 0..begin {
            copy_position(position, &mut stops, &mut pickups, &mut dropoffs, &mut wheelchair);
        }
        for &stop in &self.new_stops {
            stops.push(stop);
            pickups.push(PickupDropoff::Scheduled);
            dropoffs.push(PickupDropoff::Scheduled);
            wheelchair.insert(stops.len() - 1);
        }
        for position in end..pattern.len() {
            copy_position(position, &mut stops, &mut pickups, &mut dropoffs, &mut wheelchair);
        }

        let trips = pattern
            .trips
            .iter()
            .map(|trip| self.rewrite_schedule(pattern, trip, context, &stops))
            .collect();

        Pattern {
            route: pattern.route,
            stops,
            pickups,
            dropoffs,
            wheelchair_accessible: wheelchair,
            trips,
            timetable_sorted: pattern.timetable_sorted,
        }
    }

    /// Build the new arrivals/departures for one trip, then shift the whole
    /// trip so the fixed-point stop keeps its original arrival.
    fn rewrite_schedule(
        &self,
        pattern: &Pattern,
        trip: &TripSchedule,
        context: &SpliceContext,
        new_stops: &[StopId],
    ) -> TripSchedule {
        let begin = context.insert_begin;
        let end = context.insert_end;
        let new_len = new_stops.len();

        let mut arrivals = Vec::with_capacity(new_len);
        let mut departures = Vec::with_capacity(new_len);

        for position in 0..begin {
            arrivals.push(trip.arrivals[position]);
            departures.push(trip.departures[position]);
        }

        // Inserted segment: dwells and hops consumed in lockstep. When the
        // splice continues an existing prefix, the first dwell extends the
        // boundary departure; otherwise times accumulate from zero and the
        // fixed-point shift below re-anchors them.
        let mut dwells = self.dwell_times.iter().copied();
        let mut hops = self.hop_times.iter().copied();
        let mut cursor: Time;
        let mut first_element = begin == 0;
        if begin > 0 {
            cursor = trip.departures[begin - 1].saturating_add(dwells.next().unwrap_or(0));
        } else {
            cursor = 0;
        }
        let chain_elements = self.new_stops.len() + usize::from(self.to_stop.is_some());
        for _ in 0..chain_elements {
            if first_element {
                first_element = false;
            } else {
                cursor = cursor.saturating_add(hops.next().unwrap_or(0));
            }
            cursor = cursor.saturating_add(dwells.next().unwrap_or(0));
            arrivals.push(cursor);
            departures.push(cursor);
        }

        // Preserved tail: source hop durations and source stop dwells.
        let tail_start = if self.to_stop.is_some() { end + 1 } else { end };
        for position in tail_start..pattern.len() {
            let hop = trip.arrivals[position].saturating_sub(trip.departures[position - 1]);
            let dwell = trip.departures[position].saturating_sub(trip.arrivals[position]);
            cursor = cursor.saturating_add(hop);
            arrivals.push(cursor);
            cursor = cursor.saturating_add(dwell);
            departures.push(cursor);
        }

        shift_to_fixed_point(pattern, trip, new_stops, &mut arrivals, &mut departures);

        TripSchedule {
            trip_id: trip.trip_id.clone(),
            arrivals,
            departures,
            service: trip.service,
            frequency: trip.frequency,
        }
    }
}

/// Shift the rewritten trip so that the first stop present in both patterns
/// keeps its original arrival time.
fn shift_to_fixed_point(
    pattern: &Pattern,
    trip: &TripSchedule,
    new_stops: &[StopId],
    arrivals: &mut [Time],
    departures: &mut [Time],
) {
    let fixed_point = new_stops.iter().enumerate().find_map(|(new_position, stop)| {
        pattern
            .stops
            .iter()
            .position(|s| s == stop)
            .map(|old_position| (new_position, old_position))
    });
    let Some((new_position, old_position)) = fixed_point else {
        return;
    };
    let shift = i64::from(trip.arrivals[old_position]) - i64::from(arrivals[new_position]);
    if shift == 0 {
        return;
    }
    let apply = |time: &mut Time| {
        *time = (i64::from(*time) + shift).clamp(0, i64::from(Time::MAX)) as Time;
    };
    arrivals.iter_mut().for_each(apply);
    departures.iter_mut().for_each(apply);
}

/// Pattern rewrites change which stops serve which patterns; rebuild the
/// per-stop adjacency windows.
fn reindex_stops(data: &mut TransitData) {
    let mut patterns_at_stop: Vec<Vec<usize>> = vec![Vec::new(); data.stops.len()];
    for (pattern_id, pattern) in data.patterns.iter().enumerate() {
        for &stop in &pattern.stops {
            if patterns_at_stop[stop].last() != Some(&pattern_id) {
                patterns_at_stop[stop].push(pattern_id);
            }
        }
    }
    let mut stop_patterns = Vec::new();
    for (stop_id, stop) in data.stops.iter_mut().enumerate() {
        stop.patterns_start = stop_patterns.len();
        stop_patterns.extend(&patterns_at_stop[stop_id]);
        stop.patterns_len = stop_patterns.len() - stop.patterns_start;
    }
    data.stop_patterns = stop_patterns;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TransitDataBuilder;

    const H8: Time = 8 * 3600;

    /// Pattern a -> b -> c, one trip with a 60s dwell at b.
    fn fixture() -> (TransitData, [StopId; 4]) {
        let mut builder = TransitDataBuilder::new();
        let a = builder.add_stop("a");
        let b = builder.add_stop("b");
        let c = builder.add_stop("c");
        let x = builder.add_stop("x");
        let route = builder.add_route("r");
        builder.add_pattern(route, vec![a, b, c]).add_trip(
            "t",
            vec![H8, H8 + 300, H8 + 600],
            vec![H8, H8 + 360, H8 + 600],
        );
        (builder.build().unwrap(), [a, b, c, x])
    }

    #[test]
    fn insert_between_preserves_fixed_point() {
        let (data, [a, b, c, x]) = fixture();
        let reroute = Reroute {
            target: RerouteTarget::Routes(vec![0]),
            from_stop: Some(b),
            to_stop: Some(c),
            new_stops: vec![x],
            dwell_times: vec![0, 30, 0],
            hop_times: vec![120, 90],
        };
        let modified = reroute.apply(&data).unwrap();
        let pattern = &modified.patterns[0];
        assert_eq!(pattern.stops, vec![a, b, x, c]);
        let trip = &pattern.trips[0];
        assert_eq!(
            trip.arrivals,
            vec![H8, H8 + 300, H8 + 510, H8 + 600],
        );
        // Fixed point a keeps its arrival; c happens to as well.
        assert_eq!(trip.arrivals[0], H8);
        assert!(pattern.wheelchair_accessible.contains(2));
        assert_eq!(pattern.pickups[2], PickupDropoff::Scheduled);
    }

    #[test]
    fn timing_count_mismatch_is_fatal() {
        let (data, [_, b, c, x]) = fixture();
        let reroute = Reroute {
            target: RerouteTarget::Routes(vec![0]),
            from_stop: Some(b),
            to_stop: Some(c),
            new_stops: vec![x],
            dwell_times: vec![0, 30],
            hop_times: vec![120, 90],
        };
        assert!(matches!(
            reroute.apply(&data),
            Err(ModificationError::InconsistentTimings { .. })
        ));
    }

    #[test]
    fn unmatched_stop_errors_for_named_trips() {
        let (data, [_, _, _, x]) = fixture();
        let reroute = Reroute {
            target: RerouteTarget::Trips(vec!["t".to_string()]),
            from_stop: Some(x),
            to_stop: Some(x),
            new_stops: vec![],
            dwell_times: vec![0, 0],
            hop_times: vec![60],
        };
        assert!(matches!(
            reroute.apply(&data),
            Err(ModificationError::UnmatchedStop { .. })
        ));
    }

    #[test]
    fn replace_tail_extends_pattern() {
        let (data, [a, b, _, x]) = fixture();
        // Truncate after b and continue to x instead of c.
        let reroute = Reroute {
            target: RerouteTarget::Routes(vec![0]),
            from_stop: Some(b),
            to_stop: None,
            new_stops: vec![x],
            dwell_times: vec![0, 0],
            hop_times: vec![180],
        };
        let modified = reroute.apply(&data).unwrap();
        let pattern = &modified.patterns[0];
        assert_eq!(pattern.stops, vec![a, b, x]);
        let trip = &pattern.trips[0];
        assert_eq!(trip.arrivals, vec![H8, H8 + 300, H8 + 540]);
        // The old tail stop no longer lists the pattern.
        assert!(modified.patterns_for_stop(2).is_empty());
        assert_eq!(modified.patterns_for_stop(x), &[0]);
    }

    #[test]
    fn insert_at_head_anchors_on_first_shared_stop() {
        let (data, [a, b, c, x]) = fixture();
        // New leading stop x before a.
        let reroute = Reroute {
            target: RerouteTarget::Routes(vec![0]),
            from_stop: None,
            to_stop: Some(a),
            new_stops: vec![x],
            dwell_times: vec![0, 0],
            hop_times: vec![240],
        };
        let modified = reroute.apply(&data).unwrap();
        let pattern = &modified.patterns[0];
        assert_eq!(pattern.stops, vec![x, a, b, c]);
        let trip = &pattern.trips[0];
        // Fixed point is a: its arrival is preserved, x precedes it.
        assert_eq!(trip.arrivals[1], H8);
        assert_eq!(trip.arrivals[0], H8 - 240);
        assert_eq!(trip.arrivals[3], H8 + 600);
    }
}
