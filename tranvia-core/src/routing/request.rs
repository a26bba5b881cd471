//! Request configuration and worker wiring

use serde::{Deserialize, Serialize};

use super::SearchError;
use super::lifecycle::{Interrupted, SearchLimits, WorkerLifeCycle};
use super::path::Journey;
use super::raptor::mc::cost::CostModel;
use super::raptor::mc::worker::{McRangeRaptorResult, McRangeRaptorWorker};
use super::raptor::range_raptor::{RangeRaptorResult, RangeRaptorWorker};
use crate::ABSOLUTE_MAX_ROUNDS;
use crate::Error;
use crate::fares::{FaresV2Calculator, InRoutingFareCalculator, PerRideFareCalculator};
use crate::model::TransitData;
use crate::model::transit::types::{AccessEgress, FareAmount, StopId, Time, UNREACHED};

const TWO_DAYS: Time = 86_400 * 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Profile {
    RangeRaptor,
    #[default]
    MultiCriteriaRangeRaptor,
}

/// Heuristic toggles. All default off.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Optimizations {
    /// Fan accessibility workers out over a thread pool.
    pub parallel: bool,
    /// Prune candidates whose optimistic completion cannot enter the
    /// destination frontier.
    pub prune_against_destination: bool,
    /// Skip transfers to stops no pattern serves.
    pub transfers_stop_filter: bool,
}

/// Tracing options; no semantic effect on the search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebugOptions {
    pub stops: Vec<StopId>,
    pub path: Vec<StopId>,
    pub logger: bool,
}

impl DebugOptions {
    pub fn traces(&self, stop: StopId) -> bool {
        self.logger && (self.stops.contains(&stop) || self.path.contains(&stop))
    }
}

/// Which fare calculator to wire into a multi-criteria search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FareProfile {
    FaresV2,
    PerRide { amount: FareAmount },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Start of the departure window, seconds past midnight.
    pub from_time: Time,
    /// End of the departure window, exclusive.
    pub to_time: Time,
    /// Minute granularity of the range-raptor outer loop.
    pub departure_step: Time,
    /// Minimum seconds between arriving at a stop and boarding.
    pub board_slack: Time,
    pub max_rides: usize,
    /// Rounds allowed after the destination is first reached.
    pub max_additional_transfers: usize,
    /// Clamp on arrival clock times.
    pub max_clock_time: Time,
    pub access: Vec<AccessEgress>,
    pub egress: Vec<AccessEgress>,
    pub profile: Profile,
    pub optimizations: Optimizations,
    pub fare: Option<FareProfile>,
    pub use_all_stops_when_calculating_as_route_fare_network: bool,
    /// Multiplier >= 1.0 on the cost dimension at the destination frontier.
    pub relax_cost_at_destination: f32,
    pub cost_model: CostModel,
    /// Service day; `None` treats every service as active.
    pub date: Option<chrono::NaiveDate>,
    pub debug: DebugOptions,
}

impl Default for Request {
    fn default() -> Self {
        Request {
            from_time: 0,
            to_time: 0,
            departure_step: 60,
            board_slack: 60,
            max_rides: 8,
            max_additional_transfers: 2,
            max_clock_time: UNREACHED,
            access: Vec::new(),
            egress: Vec::new(),
            profile: Profile::default(),
            optimizations: Optimizations::default(),
            fare: None,
            use_all_stops_when_calculating_as_route_fare_network: false,
            relax_cost_at_destination: 1.0,
            cost_model: CostModel::default(),
            date: None,
            debug: DebugOptions::default(),
        }
    }
}

impl Request {
    /// Departure minutes, latest first. A degenerate window yields a single
    /// departure at its start.
    pub fn departure_minutes(&self) -> Vec<Time> {
        let step = self.departure_step.max(1);
        let mut minutes = Vec::new();
        let mut minute = self.to_time.saturating_sub(step);
        while minute >= self.from_time {
            minutes.push(minute);
            if minute < self.from_time.saturating_add(step) {
                break;
            }
            minute -= step;
        }
        if minutes.is_empty() {
            minutes.push(self.from_time);
        }
        minutes
    }

    /// Rounds including round zero (access).
    pub fn max_rounds(&self) -> usize {
        self.max_rides.min(ABSOLUTE_MAX_ROUNDS) + 1
    }

    pub fn validate(&self, data: &TransitData) -> Result<(), SearchError> {
        if self.from_time > self.to_time || self.to_time > TWO_DAYS {
            return Err(SearchError::InvalidTime);
        }
        if self.relax_cost_at_destination < 1.0 {
            return Err(SearchError::InvalidTime);
        }
        for leg in self.access.iter().chain(&self.egress) {
            data.validate_stop(leg.stop)?;
        }
        Ok(())
    }

    fn build_fare_calculator(&self) -> Option<Box<dyn InRoutingFareCalculator>> {
        match self.fare? {
            FareProfile::FaresV2 => Some(Box::new(FaresV2Calculator::new(
                self.use_all_stops_when_calculating_as_route_fare_network,
            ))),
            FareProfile::PerRide { amount } => Some(Box::new(PerRideFareCalculator::new(amount))),
        }
    }
}

#[derive(Debug)]
pub enum SearchOutcome {
    Plain(RangeRaptorResult),
    MultiCriteria(McRangeRaptorResult),
}

impl SearchOutcome {
    pub fn journeys(&self) -> Vec<&Journey> {
        match self {
            SearchOutcome::Plain(result) => result
                .journeys
                .iter()
                .filter_map(|minute| minute.journey.as_ref())
                .collect(),
            SearchOutcome::MultiCriteria(result) => result.journeys.iter().collect(),
        }
    }

    pub fn interrupted(&self) -> Option<Interrupted> {
        match self {
            SearchOutcome::Plain(result) => result.interrupted,
            SearchOutcome::MultiCriteria(result) => result.interrupted,
        }
    }
}

/// Assemble and run the worker the request asks for.
pub fn run_request(
    data: &TransitData,
    request: &Request,
    limits: SearchLimits,
) -> Result<SearchOutcome, Error> {
    match request.profile {
        Profile::RangeRaptor => {
            let mut worker =
                RangeRaptorWorker::new(data, request, WorkerLifeCycle::new(), limits)?;
            Ok(SearchOutcome::Plain(worker.route()?))
        }
        Profile::MultiCriteriaRangeRaptor => {
            let mut worker = McRangeRaptorWorker::new(
                data,
                request,
                request.cost_model,
                request.build_fare_calculator(),
                WorkerLifeCycle::new(),
                limits,
            )?;
            Ok(SearchOutcome::MultiCriteria(worker.route()?))
        }
    }
}
