// Re-export key components

pub use crate::analysis::{ArrivalDistribution, one_to_many};
pub use crate::error::Error;
pub use crate::fares::{FaresV2Calculator, InRoutingFareCalculator, PerRideFareCalculator};
pub use crate::model::{TransitData, TransitDataBuilder, VersionedBundle};
pub use crate::modification::{Reroute, RerouteTarget};
pub use crate::routing::{
    Journey, JourneyLeg, McRangeRaptorWorker, Optimizations, Profile, RangeRaptorWorker, Request,
    SearchOutcome, run_request,
};
pub use crate::routing::lifecycle::{Interrupted, SearchLimits};
pub use crate::storage::{FileStore, LocalFileStore, StorageCategory, StorageKey};

// Core types for transit routing
pub use crate::model::transit::types::{AccessEgress, Cost, PatternId, StopId, Time, UNREACHED};
