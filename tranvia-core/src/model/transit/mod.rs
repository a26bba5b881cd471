//! Transit network model

pub mod builder;
pub mod data;
pub mod types;

pub use builder::TransitDataBuilder;
pub use data::TransitData;
pub use types::{Pattern, Stop, Transfer, TripSchedule};
