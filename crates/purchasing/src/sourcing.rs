//! Sourcing selector: which contract, how much, how fast.
//!
//! - Cost mode: cheapest active contract (ties → lowest supplier id), sized
//!   to cover `lead + buffer_days` of burn, normal lead time.
//! - Emergency mode: same contract choice at an expedite premium, sized to
//!   bridge the shortfall until the next arrival, short fixed lead time.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use procura_core::{ContractId, ItemId, SupplierId};
use procura_inventory::Item;

use crate::contract::ContractOffer;
use crate::order::{OrderDraft, SourcingMode};
use crate::policy::Trigger;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourcingError {
    #[error("no active contract for item {0}")]
    NoActiveContract(ItemId),
}

/// A sized, priced sourcing choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcingDecision {
    pub contract_id: ContractId,
    pub supplier_id: SupplierId,
    /// Contract price before any premium.
    pub list_price: f64,
    pub unit_price: f64,
    pub quantity: u32,
    pub lead_days: u32,
    pub mode: SourcingMode,
    pub payment_terms_days: u32,
}

impl SourcingDecision {
    pub fn into_draft(self, item_id: ItemId) -> OrderDraft {
        OrderDraft {
            item_id,
            supplier_id: Some(self.supplier_id),
            quantity: self.quantity,
            unit_price: self.unit_price,
            lead_days: self.lead_days,
            mode: self.mode,
            payment_terms_days: self.payment_terms_days,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcingSelector {
    /// Extra days of burn on top of lead time for cost-mode orders.
    pub buffer_days: f64,
    pub min_order_quantity: u32,
    pub emergency_premium: f64,
    pub emergency_lead_days: u32,
    pub emergency_min_quantity: u32,
}

impl Default for SourcingSelector {
    fn default() -> Self {
        Self {
            buffer_days: 14.0,
            min_order_quantity: 10,
            emergency_premium: 1.5,
            emergency_lead_days: 1,
            emergency_min_quantity: 5,
        }
    }
}

/// Cheapest offer; ties go to the lowest supplier id, then lowest contract id.
pub fn cheapest_offer(offers: &[ContractOffer]) -> Option<&ContractOffer> {
    offers.iter().min_by(|a, b| {
        a.unit_price
            .total_cmp(&b.unit_price)
            .then_with(|| a.supplier_id.cmp(&b.supplier_id))
            .then_with(|| a.contract_id.cmp(&b.contract_id))
    })
}

impl SourcingSelector {
    pub fn select(
        &self,
        item: &Item,
        trigger: &Trigger,
        offers: &[ContractOffer],
    ) -> Result<SourcingDecision, SourcingError> {
        let offer = cheapest_offer(offers).ok_or(SourcingError::NoActiveContract(item.id_typed()))?;

        let decision = match *trigger {
            Trigger::Standard {
                position,
                reorder_point,
            } => SourcingDecision {
                contract_id: offer.contract_id,
                supplier_id: offer.supplier_id,
                list_price: offer.unit_price,
                unit_price: offer.unit_price,
                quantity: self.cost_quantity(item, position, reorder_point),
                lead_days: item.lead_time_days(),
                mode: SourcingMode::Cost,
                payment_terms_days: offer.payment_terms_days,
            },
            Trigger::Emergency { gap_days, .. } => SourcingDecision {
                contract_id: offer.contract_id,
                supplier_id: offer.supplier_id,
                list_price: offer.unit_price,
                unit_price: round_cents(offer.unit_price * self.emergency_premium),
                quantity: self.bridge_quantity(item, gap_days),
                lead_days: self.emergency_lead_days,
                mode: SourcingMode::Emergency,
                payment_terms_days: offer.payment_terms_days,
            },
        };

        Ok(decision)
    }

    /// Top the position up to `burn × (lead + buffer_days)`.
    ///
    /// The coverage window never ends at or below the reorder point, so a
    /// filled order always clears the standard trigger.
    fn cost_quantity(&self, item: &Item, position: u64, reorder_point: f64) -> u32 {
        let burn = item.forecast();
        let reorder_days = reorder_point / burn;
        let coverage_days = (item.lead_time_days() as f64 + self.buffer_days).max(reorder_days + 1.0);
        let shortfall = (burn * coverage_days - position as f64).ceil();
        clamp_quantity(shortfall).max(self.min_order_quantity)
    }

    /// Units needed to last `gap_days` beyond what is on the shelf.
    fn bridge_quantity(&self, item: &Item, gap_days: u32) -> u32 {
        let need = (gap_days as f64 * item.forecast() - item.stock() as f64).ceil();
        clamp_quantity(need).max(self.emergency_min_quantity)
    }
}

fn clamp_quantity(value: f64) -> u32 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, u32::MAX as f64) as u32
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ReorderPolicy;

    fn item(stock: u32, forecast: f64, lead: u32) -> Item {
        Item::new(ItemId::from_u128(1), "Hydraulic oil 5L", "Consumables", 40.0, lead, forecast)
            .unwrap()
            .with_stock(stock)
    }

    fn offer(supplier: u128, price: f64) -> ContractOffer {
        ContractOffer {
            contract_id: ContractId::from_u128(1000 + supplier),
            supplier_id: SupplierId::from_u128(supplier),
            unit_price: price,
            payment_terms_days: 30,
        }
    }

    #[test]
    fn cheapest_offer_breaks_ties_by_supplier_id() {
        let offers = vec![offer(3, 8.0), offer(2, 10.0), offer(1, 8.0)];
        assert_eq!(cheapest_offer(&offers).unwrap().supplier_id, SupplierId::from_u128(1));
    }

    #[test]
    fn cost_mode_picks_cheapest_and_covers_window() {
        let selector = SourcingSelector::default();
        let it = item(10, 2.0, 4);
        let trigger = Trigger::Standard {
            position: 10,
            reorder_point: 20.0,
        };
        let d = selector
            .select(&it, &trigger, &[offer(1, 10.0), offer(2, 8.0)])
            .unwrap();
        assert_eq!(d.supplier_id, SupplierId::from_u128(2));
        assert_eq!(d.unit_price, 8.0);
        assert_eq!(d.mode, SourcingMode::Cost);
        assert_eq!(d.lead_days, 4);
        // 2 × (4 + 14) − 10 = 26
        assert_eq!(d.quantity, 26);
    }

    #[test]
    fn cost_quantity_clears_the_reorder_point() {
        let selector = SourcingSelector {
            buffer_days: 0.0,
            min_order_quantity: 1,
            ..SourcingSelector::default()
        };
        let policy = ReorderPolicy::default();
        let it = item(0, 3.0, 10);
        let rop = policy.reorder_point(&it);
        let trigger = Trigger::Standard {
            position: 0,
            reorder_point: rop,
        };
        let d = selector.select(&it, &trigger, &[offer(1, 1.0)]).unwrap();
        assert!(d.quantity as f64 >= rop);
    }

    #[test]
    fn cost_quantity_has_a_floor() {
        let selector = SourcingSelector::default();
        let it = item(0, 0.1, 2);
        let trigger = Trigger::Standard {
            position: 0,
            reorder_point: 0.5,
        };
        let d = selector.select(&it, &trigger, &[offer(1, 1.0)]).unwrap();
        assert_eq!(d.quantity, 10);
    }

    #[test]
    fn emergency_mode_applies_premium_and_bridges_gap() {
        let selector = SourcingSelector::default();
        let it = item(5, 5.0, 7);
        let trigger = Trigger::Emergency {
            days_of_stock: 1.0,
            gap_days: 7,
        };
        let d = selector.select(&it, &trigger, &[offer(1, 10.0)]).unwrap();
        assert_eq!(d.mode, SourcingMode::Emergency);
        assert_eq!(d.unit_price, 15.0);
        assert_eq!(d.list_price, 10.0);
        assert_eq!(d.lead_days, 1);
        assert_eq!(d.quantity, 30);
        assert!(d.quantity < 35);
    }

    #[test]
    fn emergency_quantity_has_a_floor() {
        let selector = SourcingSelector::default();
        let it = item(5, 5.0, 7);
        let trigger = Trigger::Emergency {
            days_of_stock: 1.0,
            gap_days: 1,
        };
        let d = selector.select(&it, &trigger, &[offer(1, 10.0)]).unwrap();
        assert_eq!(d.quantity, 5);
    }

    #[test]
    fn no_offers_is_an_error() {
        let selector = SourcingSelector::default();
        let it = item(5, 5.0, 7);
        let trigger = Trigger::Standard {
            position: 5,
            reorder_point: 80.0,
        };
        assert_eq!(
            selector.select(&it, &trigger, &[]),
            Err(SourcingError::NoActiveContract(ItemId::from_u128(1)))
        );
    }

    #[test]
    fn selection_is_deterministic() {
        let selector = SourcingSelector::default();
        let it = item(3, 4.0, 6);
        let trigger = Trigger::Standard {
            position: 3,
            reorder_point: 60.0,
        };
        let offers = vec![offer(4, 9.0), offer(2, 9.0), offer(7, 12.0)];
        let a = selector.select(&it, &trigger, &offers).unwrap();
        let mut reversed = offers.clone();
        reversed.reverse();
        let b = selector.select(&it, &trigger, &reversed).unwrap();
        assert_eq!(a, b);
    }
}
