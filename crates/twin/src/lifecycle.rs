//! Order lifecycle: approval routing at creation, deliveries, supplier delays.

use rand::Rng;
use tracing::{info, warn};

use procura_ai::{AnomalyGate, OrderCandidate};
use procura_purchasing::{OrderDraft, OrderStatus};

use crate::config::SimulationConfig;
use crate::event_log::EventCategory;
use crate::ledger::DayLedger;
use crate::state::SimulationState;

/// Why a new order does or does not need manual approval.
#[derive(Debug, Clone, PartialEq)]
pub enum ApprovalCheck {
    Clear,
    Flagged(String),
    LargeOrder { total_price: f64, threshold: f64 },
}

impl ApprovalCheck {
    pub fn needs_approval(&self) -> bool {
        !matches!(self, ApprovalCheck::Clear)
    }

    pub fn reason(&self) -> Option<String> {
        match self {
            ApprovalCheck::Clear => None,
            ApprovalCheck::Flagged(why) => Some(format!("anomaly gate: {why}")),
            ApprovalCheck::LargeOrder { total_price, threshold } => {
                Some(format!("value {total_price:.2} exceeds {threshold:.2}"))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderLifecycle {
    pub large_order_threshold: f64,
    pub delay_probability: f64,
    pub delay_min_days: u32,
    pub delay_max_days: u32,
}

impl OrderLifecycle {
    pub fn from_config(cfg: &SimulationConfig) -> Self {
        Self {
            large_order_threshold: cfg.large_order_threshold,
            delay_probability: cfg.delay_probability,
            delay_min_days: cfg.delay_min_days,
            delay_max_days: cfg.delay_max_days,
        }
    }

    /// Gate faults are fail-open: the order proceeds unless it is large.
    pub fn approval_check<G>(&self, gate: &G, draft: &OrderDraft, reference_price: Option<f64>) -> ApprovalCheck
    where
        G: AnomalyGate + ?Sized,
    {
        let total_price = draft.total_price();
        let candidate = OrderCandidate {
            quantity: draft.quantity as f64,
            total_price,
            reference_price,
        };

        match gate.assess(&candidate) {
            Ok(verdict) if verdict.anomalous => return ApprovalCheck::Flagged(verdict.explanation),
            Ok(_) => {}
            Err(e) => {
                warn!(item = %draft.item_id, error = %e, "anomaly gate failed; proceeding without it");
            }
        }

        if total_price > self.large_order_threshold {
            return ApprovalCheck::LargeOrder {
                total_price,
                threshold: self.large_order_threshold,
            };
        }
        ApprovalCheck::Clear
    }

    /// Deliver every `ordered` order due on or before the ledger date.
    ///
    /// Orders whose item is missing are skipped; the rest continue.
    pub(crate) fn deliver_due(&self, state: &mut SimulationState, ledger: &mut DayLedger) {
        let SimulationState { items, orders, .. } = state;
        let today = ledger.date;

        for order in orders.iter_mut().filter(|o| o.is_due(today)) {
            let Some(item) = items.get_mut(&order.item_id()) else {
                warn!(order = %order.reference(), item = %order.item_id(), "order references a missing item; skipped");
                continue;
            };

            match order.deliver(item, today) {
                Ok(quantity) => {
                    info!(order = %order.reference(), item = %item.id_typed(), quantity, stock = item.stock(), "delivery received");
                    ledger.deliveries += 1;
                    ledger.touch(order.id_typed());
                    ledger.touch_item(item.id_typed());
                    ledger.event(
                        EventCategory::Delivery,
                        format!("Delivered {quantity} x {} ({})", item.name(), order.reference()),
                    );
                }
                Err(e) => {
                    warn!(order = %order.reference(), error = %e, "delivery skipped");
                }
            }
        }
    }

    /// Each undelayed `ordered` order may slip once.
    pub(crate) fn perturb_delays<R: Rng>(&self, state: &mut SimulationState, rng: &mut R, ledger: &mut DayLedger) {
        let probability = self.delay_probability.clamp(0.0, 1.0);
        if probability == 0.0 {
            return;
        }
        let lo = self.delay_min_days.max(1);
        let hi = self.delay_max_days.max(lo);

        for order in state
            .orders
            .iter_mut()
            .filter(|o| o.status() == OrderStatus::Ordered && !o.delay_applied())
        {
            if !rng.gen_bool(probability) {
                continue;
            }
            let days = rng.gen_range(lo..=hi);
            match order.apply_delay(days) {
                Ok(true) => {
                    info!(order = %order.reference(), days, eta = %order.estimated_delivery(), "supplier delay");
                    ledger.delays += 1;
                    ledger.touch(order.id_typed());
                    ledger.event(
                        EventCategory::Delay,
                        format!(
                            "{} delayed by {days} day(s), now due {}",
                            order.reference(),
                            order.estimated_delivery()
                        ),
                    );
                }
                Ok(false) => {}
                Err(e) => warn!(order = %order.reference(), error = %e, "delay not applied"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use procura_ai::{AiError, AnomalyVerdict, PassThroughGate};
    use procura_core::{ItemId, OrderId, SupplierId};
    use procura_inventory::Item;
    use procura_purchasing::{PurchaseOrder, SourcingMode};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    struct AlwaysFlag;

    impl AnomalyGate for AlwaysFlag {
        fn assess(&self, _c: &OrderCandidate) -> Result<AnomalyVerdict, AiError> {
            Ok(AnomalyVerdict::flagged(2.0, "quantity far above baseline"))
        }
    }

    struct Broken;

    impl AnomalyGate for Broken {
        fn assess(&self, _c: &OrderCandidate) -> Result<AnomalyVerdict, AiError> {
            Err(AiError::Unavailable("model offline".to_string()))
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn lifecycle() -> OrderLifecycle {
        OrderLifecycle::from_config(&SimulationConfig::default())
    }

    fn draft(item: u128, qty: u32, price: f64, lead: u32) -> OrderDraft {
        OrderDraft {
            item_id: ItemId::from_u128(item),
            supplier_id: Some(SupplierId::from_u128(1)),
            quantity: qty,
            unit_price: price,
            lead_days: lead,
            mode: SourcingMode::Cost,
            payment_terms_days: 30,
        }
    }

    fn state_with_order(item_known: bool, lead: u32) -> SimulationState {
        let mut s = SimulationState::new();
        if item_known {
            s.add_item(
                Item::new(ItemId::from_u128(1), "Gasket", "Seals", 1.0, 3, 2.0)
                    .unwrap()
                    .with_stock(4),
            )
            .unwrap();
        }
        let o = PurchaseOrder::place(OrderId::from_u128(1), 1, draft(1, 20, 1.0, lead), day(1), false).unwrap();
        s.orders.push(o);
        s
    }

    #[test]
    fn clear_order_needs_no_approval() {
        let check = lifecycle().approval_check(&PassThroughGate, &draft(1, 10, 2.0, 3), Some(2.0));
        assert_eq!(check, ApprovalCheck::Clear);
        assert!(!check.needs_approval());
    }

    #[test]
    fn flagged_order_needs_approval() {
        let check = lifecycle().approval_check(&AlwaysFlag, &draft(1, 10, 2.0, 3), None);
        assert!(check.needs_approval());
        assert!(check.reason().unwrap().contains("baseline"));
    }

    #[test]
    fn large_order_needs_approval() {
        let check = lifecycle().approval_check(&PassThroughGate, &draft(1, 1_000, 30.0, 3), None);
        assert!(matches!(check, ApprovalCheck::LargeOrder { .. }));
    }

    #[test]
    fn gate_fault_is_fail_open() {
        let check = lifecycle().approval_check(&Broken, &draft(1, 10, 2.0, 3), None);
        assert_eq!(check, ApprovalCheck::Clear);
    }

    #[test]
    fn delivery_on_eta_credits_stock() {
        let mut s = state_with_order(true, 2);
        let mut ledger = DayLedger::new(day(3));
        lifecycle().deliver_due(&mut s, &mut ledger);
        assert_eq!(s.orders[0].status(), OrderStatus::Delivered);
        assert_eq!(s.items[&ItemId::from_u128(1)].stock(), 24);
        assert_eq!(ledger.deliveries, 1);
        assert!(ledger.touched.contains(&OrderId::from_u128(1)));
    }

    #[test]
    fn delivery_waits_for_eta() {
        let mut s = state_with_order(true, 2);
        let mut ledger = DayLedger::new(day(2));
        lifecycle().deliver_due(&mut s, &mut ledger);
        assert_eq!(s.orders[0].status(), OrderStatus::Ordered);
        assert_eq!(ledger.deliveries, 0);
    }

    #[test]
    fn missing_item_is_skipped() {
        let mut s = state_with_order(false, 1);
        let mut ledger = DayLedger::new(day(5));
        lifecycle().deliver_due(&mut s, &mut ledger);
        assert_eq!(s.orders[0].status(), OrderStatus::Ordered);
        assert!(ledger.touched.is_empty());
    }

    #[test]
    fn delay_is_applied_at_most_once() {
        let mut s = state_with_order(true, 5);
        let lc = OrderLifecycle {
            delay_probability: 1.0,
            ..lifecycle()
        };
        let mut rng = StdRng::seed_from_u64(1);

        let mut ledger = DayLedger::new(day(2));
        lc.perturb_delays(&mut s, &mut rng, &mut ledger);
        let first = s.orders[0].delay_days();
        assert!((2..=4).contains(&first));
        assert_eq!(ledger.delays, 1);

        let mut ledger = DayLedger::new(day(3));
        lc.perturb_delays(&mut s, &mut rng, &mut ledger);
        assert_eq!(s.orders[0].delay_days(), first);
        assert_eq!(ledger.delays, 0);
    }

    #[test]
    fn zero_probability_never_delays() {
        let mut s = state_with_order(true, 5);
        let lc = OrderLifecycle {
            delay_probability: 0.0,
            ..lifecycle()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let mut ledger = DayLedger::new(day(2));
        lc.perturb_delays(&mut s, &mut rng, &mut ledger);
        assert!(!s.orders[0].delay_applied());
    }
}
