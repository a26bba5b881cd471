//! Accessibility analysis over routing results

pub mod accessibility;
pub mod distribution;

pub use accessibility::{OriginResult, one_to_many};
pub use distribution::ArrivalDistribution;
