//! Core routing engine for public-transport accessibility analysis.
//!
//! The engine computes, for an origin and a departure-time window, the set of
//! Pareto-optimal journeys to every reachable transit stop, optionally
//! extended to geographic destinations through egress legs. Journeys chain
//! access walking, scheduled transit rides, stop-to-stop transfers and egress
//! walking, and can be compared on arrival time, rides taken, travel
//! duration, monetary fare and generalized cost.

pub mod analysis;
pub mod error;
pub mod fares;
pub mod model;
pub mod modification;
pub mod prelude;
pub mod routing;
pub mod storage;

pub use error::Error;
pub use model::transit::data::TransitData;
pub use model::transit::types::{
    Cost, FareAmount, PatternId, RouteId, StopId, Time, UNREACHED, UNREACHED_COST,
};

/// Hard ceiling on rounds a worker will ever run, regardless of the request.
pub const ABSOLUTE_MAX_ROUNDS: usize = 16;
