//! Discrete probability distributions over arrival times
//!
//! Each distribution holds a density per second starting at `min_time`. The
//! cumulative function is non-decreasing, zero before `min_time` and reaches
//! the distribution's total mass at `max_time`.

use crate::model::transit::types::Time;

#[derive(Debug, Clone, PartialEq)]
pub struct ArrivalDistribution {
    min_time: Time,
    densities: Vec<f64>,
}

impl ArrivalDistribution {
    pub fn new(min_time: Time, densities: Vec<f64>) -> Self {
        ArrivalDistribution {
            min_time,
            densities,
        }
    }

    /// Point mass at a single arrival time.
    pub fn point(time: Time) -> Self {
        ArrivalDistribution {
            min_time: time,
            densities: vec![1.0],
        }
    }

    pub fn min_time(&self) -> Time {
        self.min_time
    }

    pub fn max_time(&self) -> Time {
        self.min_time + self.densities.len().saturating_sub(1) as Time
    }

    /// Total probability mass.
    pub fn max_cumulative_probability(&self) -> f64 {
        self.densities.iter().sum()
    }

    pub fn density_at(&self, time: Time) -> f64 {
        if time < self.min_time {
            return 0.0;
        }
        self.densities
            .get((time - self.min_time) as usize)
            .copied()
            .unwrap_or(0.0)
    }

    pub fn cumulative_at(&self, time: Time) -> f64 {
        if time < self.min_time {
            return 0.0;
        }
        let upto = ((time - self.min_time) as usize + 1).min(self.densities.len());
        self.densities[..upto].iter().sum()
    }

    /// Shift the whole distribution later by `delta` seconds.
    pub fn right_shift(&self, delta: Time) -> Self {
        ArrivalDistribution {
            min_time: self.min_time.saturating_add(delta),
            densities: self.densities.clone(),
        }
    }

    /// Equal-weight mixture of several distributions, e.g. one per departure
    /// minute of a window.
    pub fn sum(distributions: &[ArrivalDistribution]) -> Option<Self> {
        if distributions.is_empty() {
            return None;
        }
        let min_time = distributions.iter().map(|d| d.min_time).min()?;
        let max_time = distributions.iter().map(|d| d.max_time()).max()?;
        let mut densities = vec![0.0; (max_time - min_time + 1) as usize];
        let weight = 1.0 / distributions.len() as f64;
        for distribution in distributions {
            let offset = (distribution.min_time - min_time) as usize;
            for (index, density) in distribution.densities.iter().enumerate() {
                densities[offset + index] += density * weight;
            }
        }
        Some(ArrivalDistribution {
            min_time,
            densities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cumulative_is_monotone_and_reaches_total_mass() {
        let distribution = ArrivalDistribution::new(100, vec![0.25, 0.25, 0.5]);
        assert_eq!(distribution.cumulative_at(99), 0.0);
        let mut previous = 0.0;
        for time in 100..=102 {
            let value = distribution.cumulative_at(time);
            assert!(value >= previous);
            previous = value;
        }
        let total = distribution.cumulative_at(distribution.max_time());
        assert!((total - distribution.max_cumulative_probability()).abs() < 1e-9);
    }

    #[test]
    fn right_shift_moves_support() {
        let distribution = ArrivalDistribution::point(100).right_shift(30);
        assert_eq!(distribution.min_time(), 130);
        assert_eq!(distribution.density_at(130), 1.0);
        assert_eq!(distribution.density_at(100), 0.0);
    }

    #[test]
    fn sum_mixes_with_equal_weights() {
        let mixed = ArrivalDistribution::sum(&[
            ArrivalDistribution::point(100),
            ArrivalDistribution::point(102),
        ])
        .unwrap();
        assert_eq!(mixed.min_time(), 100);
        assert_eq!(mixed.max_time(), 102);
        assert!((mixed.density_at(100) - 0.5).abs() < 1e-9);
        assert!((mixed.density_at(102) - 0.5).abs() < 1e-9);
        assert!((mixed.max_cumulative_probability() - 1.0).abs() < 1e-9);
    }
}
