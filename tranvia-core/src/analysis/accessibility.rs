//! One-to-many accessibility driver
//!
//! Fans independent workers out over origins. Workers share nothing but the
//! immutable transit data, so the fan-out is embarrassingly parallel.

use rayon::prelude::*;

use super::distribution::ArrivalDistribution;
use crate::Error;
use crate::model::TransitData;
use crate::model::transit::types::{AccessEgress, Time, UNREACHED};
use crate::routing::lifecycle::SearchLimits;
use crate::routing::request::Request;
use crate::routing::{Profile, WorkerLifeCycle};
use crate::routing::raptor::range_raptor::RangeRaptorWorker;

/// Travel times from one origin.
#[derive(Debug)]
pub struct OriginResult {
    /// Best arrival per stop over the departure window.
    pub best_arrivals: Vec<Time>,
    /// Travel time to each requested destination, `None` when unreachable.
    pub travel_times: Vec<Option<Time>>,
    /// Arrival times at the destination, mixed over the departure minutes of
    /// the window.
    pub arrival_distribution: Option<ArrivalDistribution>,
}

/// Run one single-criterion worker per origin access set, computing travel
/// times to every destination. The `parallel` optimization toggle selects
/// the thread pool fan-out.
pub fn one_to_many(
    data: &TransitData,
    base_request: &Request,
    origins: &[Vec<AccessEgress>],
    destinations: &[AccessEgress],
    limits: &SearchLimits,
) -> Result<Vec<OriginResult>, Error> {
    let route_one = |access: &Vec<AccessEgress>| -> Result<OriginResult, Error> {
        let request = Request {
            access: access.clone(),
            egress: destinations.to_vec(),
            profile: Profile::RangeRaptor,
            ..base_request.clone()
        };
        let mut worker =
            RangeRaptorWorker::new(data, &request, WorkerLifeCycle::new(), limits.clone())?;
        let result = worker.route()?;

        let earliest_departure = request
            .departure_minutes()
            .last()
            .copied()
            .unwrap_or(request.from_time);
        let travel_times = destinations
            .iter()
            .map(|destination| {
                let at_stop = result.best_transit_arrivals[destination.stop];
                if at_stop == UNREACHED {
                    None
                } else {
                    Some(
                        at_stop
                            .saturating_add(destination.total_duration())
                            .saturating_sub(earliest_departure),
                    )
                }
            })
            .collect();

        let minute_arrivals: Vec<ArrivalDistribution> = result
            .journeys
            .iter()
            .filter_map(|minute| minute.journey.as_ref())
            .map(|journey| ArrivalDistribution::point(journey.arrival_time))
            .collect();

        Ok(OriginResult {
            best_arrivals: result.best_arrivals,
            travel_times,
            arrival_distribution: ArrivalDistribution::sum(&minute_arrivals),
        })
    };

    if base_request.optimizations.parallel {
        origins.par_iter().map(route_one).collect()
    } else {
        origins.iter().map(route_one).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TransitDataBuilder;

    #[test]
    fn travel_times_are_computed_per_origin() {
        let mut builder = TransitDataBuilder::new();
        let a = builder.add_stop("a");
        let b = builder.add_stop("b");
        let c = builder.add_stop("c");
        let route = builder.add_route("r");
        builder.add_pattern(route, vec![a, b, c]).add_trip(
            "t",
            vec![1000, 1300, 1600],
            vec![1000, 1300, 1600],
        );
        let data = builder.build().unwrap();

        let request = Request {
            from_time: 600,
            to_time: 660,
            board_slack: 0,
            ..Request::default()
        };
        let results = one_to_many(
            &data,
            &request,
            &[vec![AccessEgress::new(a, 0)], vec![AccessEgress::new(b, 0)]],
            &[AccessEgress::new(c, 60)],
            &SearchLimits::none(),
        )
        .unwrap();

        assert_eq!(results.len(), 2);
        // From a: depart 600, arrive c 1600, egress 60.
        assert_eq!(results[0].travel_times[0], Some(1060));
        assert_eq!(results[1].travel_times[0], Some(1060));
        let distribution = results[0].arrival_distribution.as_ref().unwrap();
        assert_eq!(distribution.min_time(), 1660);
        assert!((distribution.density_at(1660) - 1.0).abs() < 1e-9);
    }
}
