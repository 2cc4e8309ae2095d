//! Committed simulation state.
//!
//! A step works on a clone and swaps it in only after the store accepted the
//! day's batch, so readers only ever see whole days.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use procura_ai::OrderSample;
use procura_core::{DomainError, DomainResult, ItemId, OrderId};
use procura_inventory::Item;
use procura_purchasing::{ContractBook, OrderDraft, OrderStatus, PurchaseOrder, SourcingMode, SupplyContract};

/// One row of the daily audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStat {
    pub date: NaiveDate,
    /// Σ stock × unit cost after the day's deliveries.
    pub inventory_value: f64,
    /// Units actually consumed (capped at stock).
    pub consumption: u64,
    /// Items whose inventory position is below the reorder point at close.
    pub low_stock_count: u32,
    pub orders_created: u32,
}

#[derive(Debug, Clone, Default)]
pub struct SimulationState {
    pub(crate) items: BTreeMap<ItemId, Item>,
    /// Creation order.
    pub(crate) orders: Vec<PurchaseOrder>,
    pub(crate) contracts: ContractBook,
    pub(crate) stats: Vec<DailyStat>,
    pub(crate) last_sequence: u64,
    /// Items already reported as having no usable contract.
    pub(crate) unsourced: BTreeSet<ItemId>,
}

impl SimulationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_item(&mut self, item: Item) -> DomainResult<()> {
        let id = item.id_typed();
        if self.items.contains_key(&id) {
            return Err(DomainError::invariant(format!("item {id} already registered")));
        }
        self.items.insert(id, item);
        Ok(())
    }

    pub fn add_contract(&mut self, contract: SupplyContract) -> DomainResult<()> {
        if !self.items.contains_key(&contract.item_id()) {
            return Err(DomainError::not_found(format!("item {}", contract.item_id())));
        }
        self.contracts.add(contract)
    }

    /// Import a past, already-delivered order.
    pub fn record_history(&mut self, mut draft: OrderDraft, created_at: NaiveDate) -> DomainResult<OrderId> {
        if !self.items.contains_key(&draft.item_id) {
            return Err(DomainError::not_found(format!("item {}", draft.item_id)));
        }
        draft.mode = SourcingMode::Historical;
        let sequence = self.next_sequence();
        let order = PurchaseOrder::historical(OrderId::new(), sequence, draft, created_at)?;
        let id = order.id_typed();
        self.orders.push(order);
        Ok(id)
    }

    pub(crate) fn next_sequence(&mut self) -> u64 {
        self.last_sequence += 1;
        self.last_sequence
    }

    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    pub fn orders(&self) -> &[PurchaseOrder] {
        &self.orders
    }

    pub fn order(&self, id: OrderId) -> Option<&PurchaseOrder> {
        self.orders.iter().find(|o| o.id_typed() == id)
    }

    pub fn contracts(&self) -> &ContractBook {
        &self.contracts
    }

    pub fn stats(&self) -> &[DailyStat] {
        &self.stats
    }

    /// Delivered orders as anomaly-detector training rows.
    pub fn training_samples(&self) -> Vec<OrderSample> {
        self.orders
            .iter()
            .filter(|o| o.status() == OrderStatus::Delivered)
            .map(|o| OrderSample {
                quantity: o.quantity() as f64,
                total_price: o.total_price(),
            })
            .collect()
    }
}
