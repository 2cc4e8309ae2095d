//! Reorder policy: when to replenish, and how urgently.
//!
//! - Inventory position = physical stock + quantity on open orders
//!   (`ordered` or `pending_approval`).
//! - Reorder point = burn × (lead + safety_multiplier × lead).
//! - Standard trigger: position < reorder point.
//! - Emergency trigger: days of stock ≤ `critical_days` and no placed order
//!   arrives within `arrival_horizon_days`. Emergency wins when both hold.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use procura_inventory::Item;

use crate::order::{OrderStatus, PurchaseOrder, SourcingMode};

/// Replenishment decision for one item on one day.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    Standard {
        position: u64,
        reorder_point: f64,
    },
    Emergency {
        days_of_stock: f64,
        /// Days until the next placed order lands (or the fallback window).
        gap_days: u32,
    },
}

impl Trigger {
    pub fn mode(&self) -> SourcingMode {
        match self {
            Trigger::Standard { .. } => SourcingMode::Cost,
            Trigger::Emergency { .. } => SourcingMode::Emergency,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReorderPolicy {
    pub safety_multiplier: f64,
    pub critical_days: f64,
    pub arrival_horizon_days: u32,
    pub fallback_window_days: u32,
}

impl Default for ReorderPolicy {
    fn default() -> Self {
        Self {
            safety_multiplier: 1.5,
            critical_days: 1.2,
            arrival_horizon_days: 1,
            fallback_window_days: 7,
        }
    }
}

/// Stock plus quantity still on open orders for `item`.
pub fn inventory_position<'a>(item: &Item, orders: impl IntoIterator<Item = &'a PurchaseOrder>) -> u64 {
    let on_order: u64 = orders
        .into_iter()
        .filter(|o| o.item_id() == item.id_typed() && o.status().is_open())
        .map(|o| o.quantity() as u64)
        .sum();
    item.stock() as u64 + on_order
}

impl ReorderPolicy {
    pub fn reorder_point(&self, item: &Item) -> f64 {
        let lead = item.lead_time_days() as f64;
        item.forecast() * (lead + self.safety_multiplier * lead)
    }

    /// Decide whether `item` needs an order today.
    ///
    /// `orders` may contain orders of any item and status; only the item's
    /// own orders are considered. Returns at most one trigger.
    pub fn evaluate(&self, item: &Item, orders: &[&PurchaseOrder], today: NaiveDate) -> Option<Trigger> {
        let own: Vec<&PurchaseOrder> = orders
            .iter()
            .copied()
            .filter(|o| o.item_id() == item.id_typed())
            .collect();

        if let Some(trigger) = self.emergency(item, &own, today) {
            return Some(trigger);
        }

        let position = inventory_position(item, own.iter().copied());
        let reorder_point = self.reorder_point(item);
        if (position as f64) < reorder_point {
            return Some(Trigger::Standard {
                position,
                reorder_point,
            });
        }
        None
    }

    fn emergency(&self, item: &Item, own: &[&PurchaseOrder], today: NaiveDate) -> Option<Trigger> {
        let days_of_stock = item.days_of_stock();
        if days_of_stock > self.critical_days {
            return None;
        }

        // One expedited order in flight per item is enough.
        let expedite_open = own
            .iter()
            .any(|o| o.mode() == SourcingMode::Emergency && o.status().is_open());
        if expedite_open {
            return None;
        }

        if own.iter().any(|o| o.arrives_within(today, self.arrival_horizon_days)) {
            return None;
        }

        let gap_days = own
            .iter()
            .filter(|o| o.status() == OrderStatus::Ordered)
            .map(|o| (o.estimated_delivery() - today).num_days().max(0) as u32)
            .min()
            .unwrap_or(self.fallback_window_days)
            .min(self.fallback_window_days);

        Some(Trigger::Emergency {
            days_of_stock,
            gap_days,
        })
    }
}
