// Multi-criteria (pareto) range-RAPTOR

pub mod arrivals;
pub mod cost;
pub mod worker;

pub use arrivals::{ArrivalArena, ArrivalId, ArrivalRecord, ArrivedBy, DestinationArrival};
pub use cost::CostModel;
pub use worker::McRangeRaptorWorker;
