use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use procura_core::{DomainError, DomainResult, Entity, ItemId, OrderId, SupplierId};
use procura_inventory::Item;

/// Purchase order status lifecycle.
///
/// `PendingApproval → Ordered | Cancelled`, `Ordered → Delivered`.
/// `Delivered` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Ordered,
    PendingApproval,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Ordered => "ordered",
            OrderStatus::PendingApproval => "pending_approval",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Counts towards the inventory position.
    pub fn is_open(&self) -> bool {
        matches!(self, OrderStatus::Ordered | OrderStatus::PendingApproval)
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an order was sourced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourcingMode {
    /// Cheapest active contract, normal lead time.
    Cost,
    /// Expedited gap-bridging order at a premium.
    Emergency,
    /// Generated automatically outside the contract-driven policy (imported rows).
    Auto,
    /// Placed by a person.
    Manual,
    /// Seeded history (anomaly gate training data).
    Historical,
}

impl SourcingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourcingMode::Cost => "cost",
            SourcingMode::Emergency => "emergency",
            SourcingMode::Auto => "auto",
            SourcingMode::Manual => "manual",
            SourcingMode::Historical => "historical",
        }
    }

    fn reference_prefix(&self) -> &'static str {
        match self {
            SourcingMode::Cost => "COST",
            SourcingMode::Emergency => "EXPR",
            SourcingMode::Auto => "AUTO",
            SourcingMode::Manual => "MAN",
            SourcingMode::Historical => "HIST",
        }
    }
}

impl core::fmt::Display for SourcingMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to place an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub item_id: ItemId,
    pub supplier_id: Option<SupplierId>,
    pub quantity: u32,
    pub unit_price: f64,
    pub lead_days: u32,
    pub mode: SourcingMode,
    pub payment_terms_days: u32,
}

impl OrderDraft {
    pub fn total_price(&self) -> f64 {
        round_cents(self.unit_price * self.quantity as f64)
    }
}

/// Entity: PurchaseOrder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    id: OrderId,
    reference: String,
    item_id: ItemId,
    supplier_id: Option<SupplierId>,
    quantity: u32,
    unit_price: f64,
    total_price: f64,
    status: OrderStatus,
    mode: SourcingMode,
    created_at: NaiveDate,
    estimated_delivery: NaiveDate,
    delay_days: u32,
    delay_applied: bool,
    payment_terms_days: u32,
}

impl PurchaseOrder {
    /// Place a new order.
    ///
    /// `needs_approval` routes the order to `PendingApproval` instead of
    /// `Ordered` (anomaly gate flag or large-order threshold).
    pub fn place(
        id: OrderId,
        sequence: u64,
        draft: OrderDraft,
        created_at: NaiveDate,
        needs_approval: bool,
    ) -> DomainResult<Self> {
        if draft.quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if !(draft.unit_price.is_finite() && draft.unit_price >= 0.0) {
            return Err(DomainError::validation("unit price must be a finite non-negative number"));
        }
        let estimated_delivery = created_at
            .checked_add_days(Days::new(draft.lead_days as u64))
            .ok_or_else(|| DomainError::validation("delivery date out of range"))?;

        let status = if needs_approval {
            OrderStatus::PendingApproval
        } else {
            OrderStatus::Ordered
        };

        Ok(Self {
            id,
            reference: format!("{}-{sequence:06}", draft.mode.reference_prefix()),
            item_id: draft.item_id,
            supplier_id: draft.supplier_id,
            quantity: draft.quantity,
            unit_price: draft.unit_price,
            total_price: draft.total_price(),
            status,
            mode: draft.mode,
            created_at,
            estimated_delivery,
            delay_days: 0,
            delay_applied: false,
            payment_terms_days: draft.payment_terms_days,
        })
    }

    /// Record an already-delivered order (history import).
    pub fn historical(
        id: OrderId,
        sequence: u64,
        draft: OrderDraft,
        created_at: NaiveDate,
    ) -> DomainResult<Self> {
        let mut order = Self::place(id, sequence, draft, created_at, false)?;
        order.status = OrderStatus::Delivered;
        Ok(order)
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    /// Human-readable order number (e.g. `EXPR-000042`).
    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn unit_price(&self) -> f64 {
        self.unit_price
    }

    pub fn total_price(&self) -> f64 {
        self.total_price
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn mode(&self) -> SourcingMode {
        self.mode
    }

    pub fn created_at(&self) -> NaiveDate {
        self.created_at
    }

    pub fn estimated_delivery(&self) -> NaiveDate {
        self.estimated_delivery
    }

    pub fn delay_days(&self) -> u32 {
        self.delay_days
    }

    pub fn delay_applied(&self) -> bool {
        self.delay_applied
    }

    pub fn payment_terms_days(&self) -> u32 {
        self.payment_terms_days
    }

    /// `Ordered` and due on or before `today`.
    pub fn is_due(&self, today: NaiveDate) -> bool {
        self.status == OrderStatus::Ordered && self.estimated_delivery <= today
    }

    /// `Ordered` and arriving no later than `today + horizon_days`.
    pub fn arrives_within(&self, today: NaiveDate, horizon_days: u32) -> bool {
        self.status == OrderStatus::Ordered
            && today
                .checked_add_days(Days::new(horizon_days as u64))
                .is_some_and(|limit| self.estimated_delivery <= limit)
    }

    /// `pending_approval → ordered`.
    ///
    /// The delivery estimate is re-based on the approval date, keeping the
    /// original lead time span.
    pub fn approve(&mut self, on: NaiveDate) -> DomainResult<()> {
        if self.status != OrderStatus::PendingApproval {
            return Err(DomainError::invalid_transition(self.status, "approve"));
        }
        let lead = (self.estimated_delivery - self.created_at).num_days().max(0) as u64;
        self.estimated_delivery = on
            .checked_add_days(Days::new(lead))
            .ok_or_else(|| DomainError::validation("delivery date out of range"))?;
        self.status = OrderStatus::Ordered;
        Ok(())
    }

    /// `pending_approval → cancelled`.
    pub fn reject(&mut self) -> DomainResult<()> {
        if self.status != OrderStatus::PendingApproval {
            return Err(DomainError::invalid_transition(self.status, "reject"));
        }
        self.status = OrderStatus::Cancelled;
        Ok(())
    }

    /// `ordered → delivered`, crediting the item's stock in the same operation.
    ///
    /// On error neither the order nor the item is modified.
    pub fn deliver(&mut self, item: &mut Item, today: NaiveDate) -> DomainResult<u32> {
        if self.status != OrderStatus::Ordered {
            return Err(DomainError::invalid_transition(self.status, "deliver"));
        }
        if item.id_typed() != self.item_id {
            return Err(DomainError::invariant("order delivered to the wrong item"));
        }
        if self.estimated_delivery > today {
            return Err(DomainError::invariant(format!(
                "order {} is not due until {}",
                self.reference, self.estimated_delivery
            )));
        }

        item.receive(self.quantity)?;
        self.status = OrderStatus::Delivered;
        Ok(self.quantity)
    }

    /// Push the delivery estimate back by `days`, at most once per order.
    ///
    /// Returns `Ok(false)` if a delay was already recorded.
    pub fn apply_delay(&mut self, days: u32) -> DomainResult<bool> {
        if self.status != OrderStatus::Ordered {
            return Err(DomainError::invalid_transition(self.status, "delay"));
        }
        if self.delay_applied {
            return Ok(false);
        }
        if days == 0 {
            return Err(DomainError::validation("delay must be at least one day"));
        }
        self.estimated_delivery = self
            .estimated_delivery
            .checked_add_days(Days::new(days as u64))
            .ok_or_else(|| DomainError::validation("delivery date out of range"))?;
        self.delay_days += days;
        self.delay_applied = true;
        Ok(true)
    }
}

impl Entity for PurchaseOrder {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn item() -> Item {
        Item::new(ItemId::from_u128(1), "Drill bit 8mm", "Tools", 4.0, 5, 3.0)
            .unwrap()
            .with_stock(10)
    }

    fn draft(mode: SourcingMode) -> OrderDraft {
        OrderDraft {
            item_id: ItemId::from_u128(1),
            supplier_id: Some(SupplierId::from_u128(9)),
            quantity: 20,
            unit_price: 3.5,
            lead_days: 5,
            mode,
            payment_terms_days: 30,
        }
    }

    fn ordered() -> PurchaseOrder {
        PurchaseOrder::place(OrderId::from_u128(100), 1, draft(SourcingMode::Cost), day(1), false).unwrap()
    }

    fn pending() -> PurchaseOrder {
        PurchaseOrder::place(OrderId::from_u128(101), 2, draft(SourcingMode::Cost), day(1), true).unwrap()
    }

    #[test]
    fn place_computes_total_eta_and_reference() {
        let order = ordered();
        assert_eq!(order.status(), OrderStatus::Ordered);
        assert_eq!(order.total_price(), 70.0);
        assert_eq!(order.estimated_delivery(), day(6));
        assert_eq!(order.reference(), "COST-000001");
        assert_eq!(pending().status(), OrderStatus::PendingApproval);
    }

    #[test]
    fn place_rejects_zero_quantity() {
        let mut d = draft(SourcingMode::Manual);
        d.quantity = 0;
        let err = PurchaseOrder::place(OrderId::from_u128(1), 1, d, day(1), false).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn deliver_credits_stock_and_marks_delivered() {
        let mut order = ordered();
        let mut it = item();
        let credited = order.deliver(&mut it, day(6)).unwrap();
        assert_eq!(credited, 20);
        assert_eq!(it.stock(), 30);
        assert_eq!(order.status(), OrderStatus::Delivered);
    }

    #[test]
    fn deliver_before_eta_changes_nothing() {
        let mut order = ordered();
        let mut it = item();
        assert!(order.deliver(&mut it, day(5)).is_err());
        assert_eq!(it.stock(), 10);
        assert_eq!(order.status(), OrderStatus::Ordered);
    }

    #[test]
    fn deliver_to_wrong_item_changes_nothing() {
        let mut order = ordered();
        let mut other = Item::new(ItemId::from_u128(2), "Other", "Tools", 1.0, 3, 1.0).unwrap();
        assert!(order.deliver(&mut other, day(9)).is_err());
        assert_eq!(other.stock(), 0);
        assert_eq!(order.status(), OrderStatus::Ordered);
    }

    #[test]
    fn terminal_orders_accept_no_transitions() {
        let mut order = ordered();
        let mut it = item();
        order.deliver(&mut it, day(6)).unwrap();

        assert!(order.deliver(&mut it, day(7)).is_err());
        assert!(order.approve(day(7)).is_err());
        assert!(order.reject().is_err());
        assert!(order.apply_delay(2).is_err());
        assert_eq!(it.stock(), 30);

        let mut cancelled = pending();
        cancelled.reject().unwrap();
        assert_eq!(cancelled.status(), OrderStatus::Cancelled);
        assert!(cancelled.approve(day(2)).is_err());
        assert!(cancelled.reject().is_err());
    }

    #[test]
    fn approve_rebases_eta_on_approval_date() {
        let mut order = pending();
        order.approve(day(4)).unwrap();
        assert_eq!(order.status(), OrderStatus::Ordered);
        assert_eq!(order.estimated_delivery(), day(9));
    }

    #[test]
    fn approve_requires_pending_approval() {
        let mut order = ordered();
        match order.approve(day(2)).unwrap_err() {
            DomainError::InvalidTransition { from, action } => {
                assert_eq!(from, "ordered");
                assert_eq!(action, "approve");
            }
            other => panic!("expected InvalidTransition, got {other:?}"),
        }
    }

    #[test]
    fn delay_is_applied_at_most_once() {
        let mut order = ordered();
        assert!(order.apply_delay(3).unwrap());
        assert!(!order.apply_delay(4).unwrap());
        assert_eq!(order.delay_days(), 3);
        assert_eq!(order.estimated_delivery(), day(9));
        assert!(order.delay_applied());
    }

    #[test]
    fn pending_orders_cannot_be_delayed() {
        let mut order = pending();
        assert!(order.apply_delay(2).is_err());
    }

    #[test]
    fn arrival_window_only_counts_ordered() {
        let order = ordered();
        assert!(order.arrives_within(day(5), 1));
        assert!(!order.arrives_within(day(4), 1));
        assert!(!pending().arrives_within(day(5), 1));
    }

    #[test]
    fn historical_orders_are_delivered() {
        let order =
            PurchaseOrder::historical(OrderId::from_u128(5), 5, draft(SourcingMode::Historical), day(1))
                .unwrap();
        assert_eq!(order.status(), OrderStatus::Delivered);
        assert_eq!(order.reference(), "HIST-000005");
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(OrderStatus::PendingApproval.to_string(), "pending_approval");
        assert!(OrderStatus::PendingApproval.is_open());
        assert!(!OrderStatus::Delivered.is_open());
    }
}
