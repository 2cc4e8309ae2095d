//! Per-item daily demand draws.
//!
//! Model:
//! - Base draw ~ Normal(forecast, forecast × spread), rounded, floor 1 unit.
//! - With probability `spike_probability` the draw is multiplied by a factor
//!   drawn uniformly from `[spike_min, spike_max]`.
//!
//! Sources are injectable so the engine can be driven by a deterministic
//! stream in tests.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::item::Item;

/// One day's demand for one item.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DemandDraw {
    pub quantity: u32,
    /// Spike multiplier applied to this draw, if any.
    pub spike: Option<f64>,
}

impl DemandDraw {
    pub fn steady(quantity: u32) -> Self {
        Self { quantity, spike: None }
    }
}

/// Supplier of daily demand.
pub trait DemandSource: Send {
    fn draw(&mut self, item: &Item) -> DemandDraw;
}

/// Shape parameters for [`StochasticDemand`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandProfile {
    /// Standard deviation as a fraction of the forecast.
    pub spread: f64,
    pub spike_probability: f64,
    pub spike_min: f64,
    pub spike_max: f64,
}

impl Default for DemandProfile {
    fn default() -> Self {
        Self {
            spread: 0.3,
            spike_probability: 0.05,
            spike_min: 1.8,
            spike_max: 3.0,
        }
    }
}

/// Seeded stochastic demand (reproducible given the same seed).
#[derive(Debug, Clone)]
pub struct StochasticDemand {
    rng: StdRng,
    profile: DemandProfile,
}

impl StochasticDemand {
    pub fn new(seed: u64, profile: DemandProfile) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            profile,
        }
    }
}

impl DemandSource for StochasticDemand {
    fn draw(&mut self, item: &Item) -> DemandDraw {
        let mean = item.forecast();
        let sd = (mean * self.profile.spread).max(0.0);

        let base = match Normal::new(mean, sd) {
            Ok(normal) => normal.sample(&mut self.rng),
            Err(_) => mean,
        };

        let spike = if self.rng.gen_bool(self.profile.spike_probability.clamp(0.0, 1.0)) {
            let lo = self.profile.spike_min.min(self.profile.spike_max);
            let hi = self.profile.spike_min.max(self.profile.spike_max);
            Some(self.rng.gen_range(lo..=hi))
        } else {
            None
        };

        let raw = base * spike.unwrap_or(1.0);
        let quantity = raw.round().clamp(1.0, u32::MAX as f64) as u32;

        DemandDraw { quantity, spike }
    }
}

/// Fixed demand every day, for every item.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ConstantDemand(pub u32);

impl DemandSource for ConstantDemand {
    fn draw(&mut self, _item: &Item) -> DemandDraw {
        DemandDraw::steady(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use procura_core::ItemId;

    fn item(forecast: f64) -> Item {
        Item::new(ItemId::from_u128(7), "Gloves", "Safety", 3.0, 5, forecast)
            .unwrap()
            .with_stock(100)
    }

    #[test]
    fn draws_are_reproducible_for_a_seed() {
        let it = item(8.0);
        let mut a = StochasticDemand::new(11, DemandProfile::default());
        let mut b = StochasticDemand::new(11, DemandProfile::default());
        for _ in 0..100 {
            assert_eq!(a.draw(&it), b.draw(&it));
        }
    }

    #[test]
    fn draws_have_a_floor_of_one_unit() {
        let it = item(0.05);
        let mut src = StochasticDemand::new(3, DemandProfile::default());
        for _ in 0..500 {
            assert!(src.draw(&it).quantity >= 1);
        }
    }

    #[test]
    fn mean_draw_tracks_forecast() {
        let it = item(20.0);
        let profile = DemandProfile {
            spike_probability: 0.0,
            ..DemandProfile::default()
        };
        let mut src = StochasticDemand::new(99, profile);
        let n = 5_000;
        let total: u64 = (0..n).map(|_| src.draw(&it).quantity as u64).sum();
        let mean = total as f64 / n as f64;
        assert!((mean - 20.0).abs() < 0.5, "mean draw {mean}");
    }

    #[test]
    fn spikes_stay_within_configured_range() {
        let it = item(10.0);
        let profile = DemandProfile {
            spread: 0.0,
            spike_probability: 1.0,
            spike_min: 1.8,
            spike_max: 3.0,
        };
        let mut src = StochasticDemand::new(5, profile);
        for _ in 0..200 {
            let d = src.draw(&it);
            let m = d.spike.expect("every draw spikes");
            assert!((1.8..=3.0).contains(&m));
            assert!((18..=30).contains(&d.quantity));
        }
    }

    #[test]
    fn constant_demand_ignores_item() {
        let mut src = ConstantDemand(4);
        assert_eq!(src.draw(&item(100.0)), DemandDraw::steady(4));
    }
}
