//! Inventory domain module.
//!
//! Stocked items, the per-item demand model and the consumption forecast.
//! Pure domain logic: no IO, no clocks, randomness only through an injected
//! [`DemandSource`].

pub mod demand;
pub mod forecast;
pub mod item;

pub use demand::{ConstantDemand, DemandDraw, DemandProfile, DemandSource, StochasticDemand};
pub use forecast::{ema, predict_runways, Runway, RunwayStatus};
pub use item::{Consumption, Item, MIN_FORECAST};
