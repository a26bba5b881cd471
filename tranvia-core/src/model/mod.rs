//! Data model for the transit routing engine
//!
//! Contains the transit network, fare tables and persisted-bundle support.

pub mod fares;
pub mod persist;
pub mod transit;

pub use fares::{
    BLANK_FARE_ID, FareLegRule, FareNetwork, FareTables, FareTransferRule, FareTransferType,
};
pub use persist::VersionedBundle;
pub use transit::builder::TransitDataBuilder;
pub use transit::data::TransitData;
pub use transit::types::{
    AccessEgress, Frequency, Pattern, PickupDropoff, Route, Service, Stop, Transfer, TripSchedule,
};
