//! Scenario modifications applied to a copy of the transit network

pub mod reroute;

use thiserror::Error;

pub use reroute::{Reroute, RerouteTarget};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ModificationError {
    /// Neither boundary stop was found on a pattern named explicitly by the
    /// modification. Route-wide applications only warn.
    #[error("Pattern {pattern} contains neither boundary stop of the reroute")]
    UnmatchedStop { pattern: usize },
    #[error("Reroute has {dwells} dwell times and {hops} hop times for {stops} inserted stops")]
    InconsistentTimings {
        stops: usize,
        dwells: usize,
        hops: usize,
    },
    #[error("Reroute targets unknown route {route}")]
    UnknownRoute { route: usize },
    #[error("Reroute inserts unknown stop {stop}")]
    UnknownStop { stop: usize },
}
