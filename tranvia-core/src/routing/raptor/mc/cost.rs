//! Generalized cost model for the multi-criteria worker
//!
//! Costs are in hundredths of equivalent in-vehicle seconds. Weights are
//! integer percentages; the wait weight may be discounted per completed
//! round to avoid over-penalizing waits deep into a journey.

use serde::{Deserialize, Serialize};

use crate::model::transit::types::{Cost, Time};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CostModel {
    /// Percent weight of walking seconds.
    pub walk_weight: u32,
    /// Percent weight of waiting seconds.
    pub wait_weight: u32,
    /// Percent weight of in-vehicle seconds.
    pub ride_weight: u32,
    /// Flat cost per boarding.
    pub ride_penalty: Cost,
    /// Percent multiplier applied to the wait weight once per completed
    /// round; 100 disables discounting.
    pub wait_round_discount: u32,
}

impl Default for CostModel {
    fn default() -> Self {
        CostModel {
            walk_weight: 150,
            wait_weight: 100,
            ride_weight: 100,
            ride_penalty: 0,
            wait_round_discount: 100,
        }
    }
}

fn scaled(duration: Time, weight: u32) -> Cost {
    ((u64::from(duration) * u64::from(weight)).min(u64::from(Cost::MAX))) as Cost
}

impl CostModel {
    pub fn walk_cost(&self, duration: Time) -> Cost {
        scaled(duration, self.walk_weight)
    }

    /// In-vehicle cost alone, without boarding penalty or waiting. Used for
    /// best-case bounds.
    pub fn ride_cost(&self, duration: Time) -> Cost {
        scaled(duration, self.ride_weight)
    }

    /// Cost of waiting from the previous arrival until boarding, then riding
    /// until alighting, in round `round`.
    pub fn transit_arrival_cost(
        &self,
        round: usize,
        previous_arrival: Time,
        board_time: Time,
        alight_time: Time,
    ) -> Cost {
        let wait = board_time.saturating_sub(previous_arrival);
        let ride = alight_time.saturating_sub(board_time);
        let mut wait_weight = self.wait_weight;
        for _ in 1..round {
            wait_weight = wait_weight * self.wait_round_discount / 100;
        }
        scaled(wait, wait_weight)
            .saturating_add(scaled(ride, self.ride_weight))
            .saturating_add(self.ride_penalty)
    }
}
