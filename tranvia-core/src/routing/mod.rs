//! Routing workers and their supporting structures

pub mod heuristics;
pub mod lifecycle;
pub mod pareto;
pub mod path;
pub mod raptor;
pub mod request;

use thiserror::Error;

pub use lifecycle::{Interrupted, RoundTracker, SearchLimits, WorkerLifeCycle, WorkerListener};
pub use path::{Journey, JourneyLeg};
pub use raptor::mc::worker::McRangeRaptorWorker;
pub use raptor::range_raptor::RangeRaptorWorker;
pub use request::{Optimizations, Profile, Request, SearchOutcome, run_request};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SearchError {
    #[error("Invalid stop ID")]
    InvalidStop,
    #[error("Invalid pattern ID")]
    InvalidPattern,
    #[error("Invalid trip index")]
    InvalidTrip,
    #[error("Invalid time value")]
    InvalidTime,
    #[error("Invalid journey")]
    InvalidJourney,
    #[error("Maximum rounds exceeded")]
    MaxRoundsExceeded,
}
