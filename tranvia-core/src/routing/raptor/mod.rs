// RAPTOR (Round-bAsed Public Transit Optimized Router) workers

pub mod board;
pub mod mc;
pub mod range_raptor;
pub mod state;

pub use board::earliest_boardable_trip;
pub use range_raptor::{RangeRaptorResult, RangeRaptorWorker};
