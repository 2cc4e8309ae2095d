//! Simulation tunables.
//!
//! Defaults are usable as-is; `from_env` overlays `PROCURA_*` variables.
//! Malformed values are logged and ignored, out-of-range values are rejected
//! by [`SimulationConfig::validate`].

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use procura_inventory::DemandProfile;
use procura_observability::TracingConfig;
use procura_purchasing::{ReorderPolicy, SourcingSelector};

use crate::error::{TwinError, TwinResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Simulated date before the first tick.
    pub start_date: NaiveDate,
    /// Wall-clock time between ticks while running.
    pub tick_interval_ms: u64,
    /// Seed for demand draws and delay perturbation.
    pub seed: u64,
    /// EMA smoothing factor for the consumption forecast.
    pub ema_alpha: f64,
    pub demand: DemandProfile,
    pub policy: ReorderPolicy,
    pub sourcing: SourcingSelector,
    /// Orders above this total go to `pending_approval`.
    pub large_order_threshold: f64,
    pub delay_probability: f64,
    pub delay_min_days: u32,
    pub delay_max_days: u32,
    pub event_capacity: usize,
    pub tracing: TracingConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default(),
            tick_interval_ms: 1_000,
            seed: 42,
            ema_alpha: 0.1,
            demand: DemandProfile::default(),
            policy: ReorderPolicy::default(),
            sourcing: SourcingSelector::default(),
            large_order_threshold: 25_000.0,
            delay_probability: 0.15,
            delay_min_days: 2,
            delay_max_days: 4,
            event_capacity: 50,
            tracing: TracingConfig::default(),
        }
    }
}

impl SimulationConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Defaults overlaid with `PROCURA_*` process environment variables.
    pub fn from_env() -> TwinResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup` (keyed like the
    /// environment variables), then validated.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> TwinResult<Self> {
        let mut cfg = Self::default();

        overlay(&lookup, "PROCURA_START_DATE", &mut cfg.start_date);
        overlay(&lookup, "PROCURA_TICK_MS", &mut cfg.tick_interval_ms);
        overlay(&lookup, "PROCURA_SEED", &mut cfg.seed);
        overlay(&lookup, "PROCURA_EMA_ALPHA", &mut cfg.ema_alpha);
        overlay(&lookup, "PROCURA_DEMAND_SPREAD", &mut cfg.demand.spread);
        overlay(&lookup, "PROCURA_SPIKE_PROBABILITY", &mut cfg.demand.spike_probability);
        overlay(&lookup, "PROCURA_SAFETY_MULTIPLIER", &mut cfg.policy.safety_multiplier);
        overlay(&lookup, "PROCURA_CRITICAL_DAYS", &mut cfg.policy.critical_days);
        overlay(&lookup, "PROCURA_FALLBACK_WINDOW_DAYS", &mut cfg.policy.fallback_window_days);
        overlay(&lookup, "PROCURA_BUFFER_DAYS", &mut cfg.sourcing.buffer_days);
        overlay(&lookup, "PROCURA_MIN_ORDER_QTY", &mut cfg.sourcing.min_order_quantity);
        overlay(&lookup, "PROCURA_EMERGENCY_PREMIUM", &mut cfg.sourcing.emergency_premium);
        overlay(&lookup, "PROCURA_EMERGENCY_LEAD_DAYS", &mut cfg.sourcing.emergency_lead_days);
        overlay(&lookup, "PROCURA_LARGE_ORDER_THRESHOLD", &mut cfg.large_order_threshold);
        overlay(&lookup, "PROCURA_DELAY_PROBABILITY", &mut cfg.delay_probability);
        overlay(&lookup, "PROCURA_DELAY_MIN_DAYS", &mut cfg.delay_min_days);
        overlay(&lookup, "PROCURA_DELAY_MAX_DAYS", &mut cfg.delay_max_days);
        overlay(&lookup, "PROCURA_EVENT_CAPACITY", &mut cfg.event_capacity);
        overlay(&lookup, "PROCURA_LOG_FORMAT", &mut cfg.tracing.format);
        if let Some(filter) = lookup("PROCURA_LOG_FILTER") {
            cfg.tracing.default_filter = filter;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> TwinResult<()> {
        fn unit_interval(name: &str, v: f64) -> TwinResult<()> {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(TwinError::Config(format!("{name} must be within [0, 1], got {v}")))
            }
        }

        if !(self.ema_alpha > 0.0 && self.ema_alpha <= 1.0) {
            return Err(TwinError::Config(format!(
                "ema_alpha must be within (0, 1], got {}",
                self.ema_alpha
            )));
        }
        unit_interval("spike_probability", self.demand.spike_probability)?;
        unit_interval("delay_probability", self.delay_probability)?;

        if !(self.demand.spread.is_finite() && self.demand.spread >= 0.0) {
            return Err(TwinError::Config("demand spread must be non-negative".to_string()));
        }
        if !(self.demand.spike_min > 0.0 && self.demand.spike_min <= self.demand.spike_max) {
            return Err(TwinError::Config("spike range must be positive and ordered".to_string()));
        }
        if !(self.policy.safety_multiplier.is_finite() && self.policy.safety_multiplier >= 0.0) {
            return Err(TwinError::Config("safety_multiplier must be non-negative".to_string()));
        }
        if !(self.policy.critical_days.is_finite() && self.policy.critical_days >= 0.0) {
            return Err(TwinError::Config("critical_days must be non-negative".to_string()));
        }
        if self.policy.fallback_window_days == 0 {
            return Err(TwinError::Config("fallback_window_days must be at least 1".to_string()));
        }
        if !(self.sourcing.buffer_days.is_finite() && self.sourcing.buffer_days >= 0.0) {
            return Err(TwinError::Config("buffer_days must be non-negative".to_string()));
        }
        if !(self.sourcing.emergency_premium.is_finite() && self.sourcing.emergency_premium >= 1.0) {
            return Err(TwinError::Config("emergency_premium must be at least 1".to_string()));
        }
        if self.sourcing.emergency_lead_days == 0 {
            return Err(TwinError::Config("emergency_lead_days must be at least 1".to_string()));
        }
        if self.sourcing.min_order_quantity == 0 || self.sourcing.emergency_min_quantity == 0 {
            return Err(TwinError::Config("minimum order quantities must be at least 1".to_string()));
        }
        if !(self.large_order_threshold.is_finite() && self.large_order_threshold > 0.0) {
            return Err(TwinError::Config("large_order_threshold must be positive".to_string()));
        }
        if self.delay_min_days == 0 || self.delay_min_days > self.delay_max_days {
            return Err(TwinError::Config(format!(
                "delay range {}..={} is invalid",
                self.delay_min_days, self.delay_max_days
            )));
        }
        if self.event_capacity == 0 {
            return Err(TwinError::Config("event_capacity must be at least 1".to_string()));
        }
        if self.tick_interval_ms == 0 {
            return Err(TwinError::Config("tick interval must be at least 1ms".to_string()));
        }
        Ok(())
    }
}

fn overlay<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, target: &mut T)
where
    T: FromStr,
    T::Err: Display,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *target = value,
        Err(e) => tracing::warn!(key, value = %raw, error = %e, "ignoring malformed setting"),
    }
}
