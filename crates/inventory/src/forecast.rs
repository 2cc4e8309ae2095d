//! Consumption forecast (EMA) and stock runway predictions.

use serde::{Deserialize, Serialize};

use procura_core::ItemId;

use crate::item::Item;

/// Burn rate floor used for runway predictions.
const RUNWAY_MIN_BURN: f64 = 0.1;

/// Exponential moving average step: `alpha·observed + (1-alpha)·previous`.
///
/// Smaller `alpha` gives a more stable, slower-adapting forecast.
pub fn ema(previous: f64, observed: f64, alpha: f64) -> f64 {
    alpha * observed + (1.0 - alpha) * previous
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunwayStatus {
    Safe,
    Warning,
    Critical,
}

/// How long an item's physical stock lasts at the learned burn rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Runway {
    pub item_id: ItemId,
    pub item_name: String,
    pub stock: u32,
    pub burn_rate: f64,
    pub days_left: f64,
    pub status: RunwayStatus,
    pub restock_recommended: bool,
}

impl Runway {
    /// - `critical`: stock runs out before a new delivery could arrive
    /// - `warning`: within 1.5× the lead time
    pub fn for_item(item: &Item) -> Self {
        let burn_rate = item.forecast().max(RUNWAY_MIN_BURN);
        let days_left = item.stock() as f64 / burn_rate;
        let lead = item.lead_time_days() as f64;

        let status = if days_left < lead {
            RunwayStatus::Critical
        } else if days_left < lead * 1.5 {
            RunwayStatus::Warning
        } else {
            RunwayStatus::Safe
        };

        Self {
            item_id: item.id_typed(),
            item_name: item.name().to_string(),
            stock: item.stock(),
            burn_rate,
            days_left,
            status,
            restock_recommended: status == RunwayStatus::Critical,
        }
    }
}

/// Runways for all items, shortest first, at most `limit`.
pub fn predict_runways<'a>(items: impl IntoIterator<Item = &'a Item>, limit: usize) -> Vec<Runway> {
    let mut runways: Vec<Runway> = items.into_iter().map(Runway::for_item).collect();
    runways.sort_by(|a, b| a.days_left.total_cmp(&b.days_left));
    runways.truncate(limit);
    runways
}
