//! Flat per-boarding fare

use super::{FareError, FarePrice, InRoutingFareCalculator, RideLeg, TransferAllowance};
use crate::model::TransitData;
use crate::model::transit::types::FareAmount;

/// Charges a fixed amount for every boarding. No transfer allowances.
#[derive(Debug, Clone, Copy)]
pub struct PerRideFareCalculator {
    pub amount: FareAmount,
}

impl PerRideFareCalculator {
    pub fn new(amount: FareAmount) -> Self {
        PerRideFareCalculator { amount }
    }
}

impl InRoutingFareCalculator for PerRideFareCalculator {
    fn price(&mut self, _data: &TransitData, rides: &[RideLeg]) -> Result<FarePrice, FareError> {
        let cumulative = i64::from(self.amount) * rides.len() as i64;
        Ok(FarePrice {
            cumulative: cumulative.clamp(i64::from(FareAmount::MIN), i64::from(FareAmount::MAX))
                as FareAmount,
            allowance: TransferAllowance::default(),
        })
    }
}
