//! In-routing fare calculation
//!
//! A fare calculator prices an ordered sequence of rides and emits a
//! [`TransferAllowance`]: the state needed to price the *next* ride given the
//! rides already taken. The multi-criteria worker treats the cumulative fare
//! as a pareto dimension and compares allowances so that a cheaper partial
//! journey with a worse allowance does not wrongly dominate.

pub mod fares_v2;
pub mod per_ride;

use arrayvec::ArrayVec;
use thiserror::Error;

use crate::model::fares::FareTransferType;
use crate::model::transit::types::{FareAmount, PatternId, StopId, Time};
use crate::model::TransitData;

pub use fares_v2::FaresV2Calculator;
pub use per_ride::PerRideFareCalculator;

/// Upper bound on fare networks a single route participates in.
pub const MAX_FARE_NETWORKS: usize = 8;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FareError {
    /// The journey is unpriceable; fatal to the journey, not to the search.
    #[error("No fare leg rule matches boarding {from_stop} to alighting {to_stop}")]
    NoLegRuleMatch { from_stop: StopId, to_stop: StopId },
    #[error("Unsupported fare transfer rule type {0:?}")]
    UnsupportedFareRule(FareTransferType),
}

/// One transit ride of a journey, as priced by a fare calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RideLeg {
    pub pattern: PatternId,
    pub board_stop: StopId,
    pub alight_stop: StopId,
    pub board_time: Time,
    pub alight_time: Time,
}

/// As-route state carried forward when the last priced leg was part of an
/// as-route fare network, letting the calculator splice the next ride onto
/// the ongoing effective trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsRouteAllowance {
    /// Fare networks still active along the spliced trajectory.
    pub networks: ArrayVec<u32, MAX_FARE_NETWORKS>,
    /// Boarding stop of the spliced effective trip.
    pub board_stop: StopId,
    /// Equal-order leg rules that may yet price the extended trip.
    pub potential_leg_rules: ArrayVec<u32, MAX_FARE_NETWORKS>,
}

/// State needed to price the next ride given the previous one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferAllowance {
    /// Fare leg rule that priced the previous leg.
    pub leg_rule: Option<u32>,
    pub as_route: Option<AsRouteAllowance>,
}

impl TransferAllowance {
    /// Whether this allowance is worth at least as much as `other` for every
    /// possible future redemption. Differing previous leg rules are
    /// incomparable, as are as-route trajectories from different boarding
    /// stops.
    pub fn at_least_as_good_for_all_future(&self, other: &TransferAllowance) -> bool {
        if other.leg_rule.is_some() && self.leg_rule != other.leg_rule {
            return false;
        }
        match (&self.as_route, &other.as_route) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(mine), Some(theirs)) => {
                mine.board_stop == theirs.board_stop
                    && theirs.networks.iter().all(|n| mine.networks.contains(n))
                    && theirs
                        .potential_leg_rules
                        .iter()
                        .all(|r| mine.potential_leg_rules.contains(r))
            }
        }
    }
}

/// Price of a (partial) journey plus the allowance for extending it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FarePrice {
    pub cumulative: FareAmount,
    pub allowance: TransferAllowance,
}

/// Prices journeys incrementally during routing.
///
/// `&mut self` accommodates per-worker caches; implementations must stay
/// deterministic regardless of cache state.
pub trait InRoutingFareCalculator: Send {
    fn price(&mut self, data: &TransitData, rides: &[RideLeg]) -> Result<FarePrice, FareError>;
}
