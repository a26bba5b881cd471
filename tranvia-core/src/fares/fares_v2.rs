//! Fares-V2 calculator with as-route splicing
//!
//! Walks the journey's rides left to right. Consecutive rides whose patterns
//! share an as-route fare network are spliced onto one effective trip before
//! a leg rule is matched; transfer rules then price the transition from the
//! previous leg rule, with a bounded cache over rule-pair lookups.

use arrayvec::ArrayVec;
use log::warn;
use lru::LruCache;
use std::num::NonZeroUsize;

use super::{
    AsRouteAllowance, FareError, FarePrice, InRoutingFareCalculator, MAX_FARE_NETWORKS, RideLeg,
    TransferAllowance,
};
use crate::model::TransitData;
use crate::model::fares::{BLANK_FARE_ID, FareTransferType};
use crate::model::transit::types::{FareAmount, StopId};

const TRANSFER_RULE_CACHE_SIZE: usize = 1024;

type NetworkSet = ArrayVec<u32, MAX_FARE_NETWORKS>;

pub struct FaresV2Calculator {
    /// Option B: match leg rules over every stop touched by the spliced
    /// trajectory instead of only its endpoints.
    use_all_stops: bool,
    transfer_rule_cache: LruCache<(u32, u32), Option<u32>>,
}

impl FaresV2Calculator {
    pub fn new(use_all_stops_when_calculating_as_route_fare_network: bool) -> Self {
        FaresV2Calculator {
            use_all_stops: use_all_stops_when_calculating_as_route_fare_network,
            transfer_rule_cache: LruCache::new(
                NonZeroUsize::new(TRANSFER_RULE_CACHE_SIZE).unwrap(),
            ),
        }
    }

    fn as_route_networks_of(&self, data: &TransitData, pattern: usize) -> NetworkSet {
        let route = data.patterns[pattern].route;
        let mut networks = NetworkSet::new();
        for &network in data.fare_networks_for_route(route) {
            if data.fares.as_route_networks.contains(network as usize)
                && networks.try_push(network).is_err()
            {
                warn!("Route {route} exceeds {MAX_FARE_NETWORKS} as-route fare networks");
            }
        }
        networks
    }

    /// Transfer rule from one leg rule to the next, preferring the lowest
    /// order and falling back to blank-wildcard leg groups. Memoized; the
    /// lookup is a pure function of the fare tables so cache state cannot
    /// change results.
    fn transfer_rule_between(
        &mut self,
        data: &TransitData,
        from_rule: u32,
        to_rule: u32,
    ) -> Option<u32> {
        if let Some(&cached) = self.transfer_rule_cache.get(&(from_rule, to_rule)) {
            return cached;
        }
        let from_group = data.fares.leg_rules[from_rule as usize].leg_group;
        let to_group = data.fares.leg_rules[to_rule as usize].leg_group;
        let mut best: Option<u32> = None;
        for &id in data
            .fares
            .transfer_rules_from_leg_group(from_group)
            .iter()
            .chain(data.fares.transfer_rules_from_leg_group(BLANK_FARE_ID))
        {
            let rule = &data.fares.transfer_rules[id as usize];
            if rule.to_leg_group != BLANK_FARE_ID && rule.to_leg_group != to_group {
                continue;
            }
            let better = match best {
                None => true,
                Some(current) => rule.order < data.fares.transfer_rules[current as usize].order,
            };
            if better {
                best = Some(id);
            }
        }
        self.transfer_rule_cache.put((from_rule, to_rule), best);
        best
    }
}

impl InRoutingFareCalculator for FaresV2Calculator {
    fn price(&mut self, data: &TransitData, rides: &[RideLeg]) -> Result<FarePrice, FareError> {
        let mut cumulative: i64 = 0;
        let mut previous_rule: Option<u32> = None;
        let mut allowance = TransferAllowance::default();

        let mut index = 0;
        while index < rides.len() {
            let leg = rides[index];

            // As-route splicing: greedily consume following rides whose
            // patterns stay inside the running network intersection.
            let mut running = self.as_route_networks_of(data, leg.pattern);
            let mut last = index;
            while !running.is_empty() && last + 1 < rides.len() {
                let next_networks = self.as_route_networks_of(data, rides[last + 1].pattern);
                let intersection: NetworkSet = running
                    .iter()
                    .copied()
                    .filter(|n| next_networks.contains(n))
                    .collect();
                if intersection.is_empty() {
                    break;
                }
                running = intersection;
                last += 1;
            }

            let board_stop = leg.board_stop;
            let alight_stop = rides[last].alight_stop;
            let spliced = &rides[index..=last];

            let networks: NetworkSet = if running.is_empty() {
                let route = data.patterns[leg.pattern].route;
                data.fare_networks_for_route(route)
                    .iter()
                    .copied()
                    .take(MAX_FARE_NETWORKS)
                    .collect()
            } else {
                running.clone()
            };

            let (rule_id, potential_rules) = if self.use_all_stops && !running.is_empty() {
                let from_stops: Vec<StopId> = spliced.iter().map(|r| r.board_stop).collect();
                let to_stops: Vec<StopId> = spliced.iter().map(|r| r.alight_stop).collect();
                match_leg_rule_all_stops(data, &networks, &from_stops, &to_stops)
                    .ok_or(FareError::NoLegRuleMatch {
                        from_stop: board_stop,
                        to_stop: alight_stop,
                    })?
            } else {
                let rule = match_leg_rule(data, &networks, board_stop, alight_stop).ok_or(
                    FareError::NoLegRuleMatch {
                        from_stop: board_stop,
                        to_stop: alight_stop,
                    },
                )?;
                (rule, ArrayVec::new())
            };

            let leg_amount = i64::from(data.fares.leg_rules[rule_id as usize].amount);
            let increment = match previous_rule {
                None => leg_amount,
                Some(prev) => match self.transfer_rule_between(data, prev, rule_id) {
                    None => leg_amount,
                    Some(transfer_id) => {
                        let rule = &data.fares.transfer_rules[transfer_id as usize];
                        if rule.amount < 0 {
                            warn!(
                                "Transfer rule {transfer_id} discounts fare by {}",
                                -rule.amount
                            );
                        }
                        match rule.transfer_type {
                            FareTransferType::TotalCostPlusAmount => {
                                leg_amount + i64::from(rule.amount)
                            }
                            FareTransferType::FirstLegPlusAmount => i64::from(rule.amount),
                            other => return Err(FareError::UnsupportedFareRule(other)),
                        }
                    }
                },
            };
            if increment < 0 {
                warn!("Negative fare increment {increment} for leg rule {rule_id}");
            }
            cumulative += increment;

            allowance = TransferAllowance {
                leg_rule: Some(rule_id),
                as_route: if running.is_empty() {
                    None
                } else {
                    Some(AsRouteAllowance {
                        networks: running,
                        board_stop,
                        potential_leg_rules: potential_rules,
                    })
                },
            };
            previous_rule = Some(rule_id);
            index = last + 1;
        }

        Ok(FarePrice {
            cumulative: clamp_amount(cumulative),
            allowance,
        })
    }
}

fn clamp_amount(amount: i64) -> FareAmount {
    amount.clamp(i64::from(FareAmount::MIN), i64::from(FareAmount::MAX)) as FareAmount
}

fn stop_matches(rule_stop: u32, stop: StopId) -> bool {
    rule_stop == BLANK_FARE_ID || rule_stop as usize == stop
}

/// Candidate leg rules within the active networks, deduplicated in ascending
/// rule order. Includes rules with a blank wildcard network.
fn candidate_leg_rules(data: &TransitData, networks: &NetworkSet) -> Vec<u32> {
    let mut candidates: Vec<u32> = networks
        .iter()
        .flat_map(|&network| data.fares.leg_rules_for_network(network))
        .chain(data.fares.leg_rules_for_network(BLANK_FARE_ID))
        .copied()
        .collect();
    candidates.sort_unstable();
    candidates.dedup();
    candidates
}

/// Option A: endpoint match, lowest order wins. Equal orders are allowed;
/// the first encountered is returned.
fn match_leg_rule(
    data: &TransitData,
    networks: &NetworkSet,
    board_stop: StopId,
    alight_stop: StopId,
) -> Option<u32> {
    let mut best: Option<u32> = None;
    for id in candidate_leg_rules(data, networks) {
        let rule = &data.fares.leg_rules[id as usize];
        if stop_matches(rule.from_stop, board_stop) && stop_matches(rule.to_stop, alight_stop) {
            let better = match best {
                None => true,
                Some(current) => rule.order < data.fares.leg_rules[current as usize].order,
            };
            if better {
                best = Some(id);
            }
        }
    }
    best
}

/// Option B: match from any boarding of the spliced trajectory to any
/// alighting, lowest order first. All equal-order matches are retained as
/// potential rules; the charged rule is the tie with the highest amount,
/// keeping the charged fare deterministic.
fn match_leg_rule_all_stops(
    data: &TransitData,
    networks: &NetworkSet,
    from_stops: &[StopId],
    to_stops: &[StopId],
) -> Option<(u32, ArrayVec<u32, MAX_FARE_NETWORKS>)> {
    let mut best_order = u32::MAX;
    let mut ties: ArrayVec<u32, MAX_FARE_NETWORKS> = ArrayVec::new();
    for id in candidate_leg_rules(data, networks) {
        let rule = &data.fares.leg_rules[id as usize];
        let matches = (rule.from_stop == BLANK_FARE_ID
            || from_stops.iter().any(|&s| rule.from_stop as usize == s))
            && (rule.to_stop == BLANK_FARE_ID
                || to_stops.iter().any(|&s| rule.to_stop as usize == s));
        if !matches {
            continue;
        }
        if rule.order < best_order {
            best_order = rule.order;
            ties.clear();
        }
        if rule.order == best_order && ties.try_push(id).is_err() {
            warn!("More than {MAX_FARE_NETWORKS} equal-order leg rules, ignoring rule {id}");
        }
    }
    let charged = ties
        .iter()
        .copied()
        .max_by_key(|&id| data.fares.leg_rules[id as usize].amount)?;
    Some((charged, ties))
}
