//! Fares-V2 tables: leg rules, transfer rules and fare networks
//!
//! Rules reference stops and networks through packed integer indices with a
//! [`BLANK_FARE_ID`] sentinel standing for a wildcard match. Lookup indices
//! are rebuilt whenever the tables change.

use fixedbitset::FixedBitSet;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use super::transit::types::FareAmount;

/// Wildcard sentinel in packed fare indices.
pub const BLANK_FARE_ID: u32 = u32::MAX;

/// Cost processing method when transferring between two priced legs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FareTransferType {
    /// Both leg amounts are charged, plus the rule amount.
    TotalCostPlusAmount,
    /// Only the first leg's amount was charged; the rule amount covers the
    /// rest of the journey leg.
    FirstLegPlusAmount,
    /// The rule amount replaces both legs. Not evaluated by the in-routing
    /// calculator.
    TransferOnly,
}

/// A set of routes priced together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FareNetwork {
    pub network_id: String,
    /// Consecutive rides within an as-route network are spliced onto a
    /// single effective trip before rule matching.
    pub as_route: bool,
}

/// Prices a single (possibly spliced) ride.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FareLegRule {
    /// Fare network the rule applies to, or [`BLANK_FARE_ID`].
    pub network: u32,
    /// Boarding stop constraint, or [`BLANK_FARE_ID`].
    pub from_stop: u32,
    /// Alighting stop constraint, or [`BLANK_FARE_ID`].
    pub to_stop: u32,
    /// Lower order is preferred; among as-route candidates lower order means
    /// more extensive.
    pub order: u32,
    pub amount: FareAmount,
    /// Leg group referenced by transfer rules, or [`BLANK_FARE_ID`].
    pub leg_group: u32,
}

/// Prices the transition between two consecutive priced legs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FareTransferRule {
    /// Leg group of the previous leg rule, or [`BLANK_FARE_ID`].
    pub from_leg_group: u32,
    /// Leg group of the current leg rule, or [`BLANK_FARE_ID`].
    pub to_leg_group: u32,
    pub transfer_type: FareTransferType,
    pub amount: FareAmount,
    pub order: u32,
}

/// All fare data for a network, with lookup indices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FareTables {
    pub networks: Vec<FareNetwork>,
    pub leg_rules: Vec<FareLegRule>,
    pub transfer_rules: Vec<FareTransferRule>,
    /// Fare networks per route, parallel to `TransitData::routes`.
    pub route_networks: Vec<Vec<u32>>,
    /// Networks flagged as-route, one bit per network.
    pub as_route_networks: FixedBitSet,
    rules_by_network: HashMap<u32, Vec<u32>>,
    rules_by_from_stop: HashMap<u32, Vec<u32>>,
    rules_by_to_stop: HashMap<u32, Vec<u32>>,
    transfer_rules_by_from_group: HashMap<u32, Vec<u32>>,
    transfer_rules_by_to_group: HashMap<u32, Vec<u32>>,
}

impl FareTables {
    /// Rebuild every lookup index from the rule tables. Must be called after
    /// the tables are populated or mutated.
    pub fn rebuild_indices(&mut self, num_routes: usize) {
        self.route_networks.resize(num_routes, Vec::new());
        self.as_route_networks = FixedBitSet::with_capacity(self.networks.len());
        for (id, network) in self.networks.iter().enumerate() {
            if network.as_route {
                self.as_route_networks.insert(id);
            }
        }

        self.rules_by_network.clear();
        self.rules_by_from_stop.clear();
        self.rules_by_to_stop.clear();
        for (id, rule) in self.leg_rules.iter().enumerate() {
            self.rules_by_network
                .entry(rule.network)
                .or_default()
                .push(id as u32);
            self.rules_by_from_stop
                .entry(rule.from_stop)
                .or_default()
                .push(id as u32);
            self.rules_by_to_stop
                .entry(rule.to_stop)
                .or_default()
                .push(id as u32);
        }

        self.transfer_rules_by_from_group.clear();
        self.transfer_rules_by_to_group.clear();
        for (id, rule) in self.transfer_rules.iter().enumerate() {
            self.transfer_rules_by_from_group
                .entry(rule.from_leg_group)
                .or_default()
                .push(id as u32);
            self.transfer_rules_by_to_group
                .entry(rule.to_leg_group)
                .or_default()
                .push(id as u32);
        }
    }

    pub fn leg_rules_for_network(&self, network: u32) -> &[u32] {
        self.rules_by_network
            .get(&network)
            .map_or(&[], Vec::as_slice)
    }

    pub fn leg_rules_for_from_stop(&self, stop: u32) -> &[u32] {
        self.rules_by_from_stop
            .get(&stop)
            .map_or(&[], Vec::as_slice)
    }

    pub fn leg_rules_for_to_stop(&self, stop: u32) -> &[u32] {
        self.rules_by_to_stop.get(&stop).map_or(&[], Vec::as_slice)
    }

    pub fn transfer_rules_from_leg_group(&self, group: u32) -> &[u32] {
        self.transfer_rules_by_from_group
            .get(&group)
            .map_or(&[], Vec::as_slice)
    }

    pub fn transfer_rules_to_leg_group(&self, group: u32) -> &[u32] {
        self.transfer_rules_by_to_group
            .get(&group)
            .map_or(&[], Vec::as_slice)
    }

    pub fn has_rules(&self) -> bool {
        !self.leg_rules.is_empty()
    }
}
