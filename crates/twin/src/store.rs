//! Persistence boundary.
//!
//! The engine hands the store one batch per simulated day (or per external
//! mutation). A batch is accepted whole or rejected whole; on rejection the
//! engine discards its working copy.

use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::NaiveDate;

use procura_core::{Entity, ItemId, OrderId};
use procura_inventory::Item;
use procura_purchasing::PurchaseOrder;

use crate::error::StoreError;
use crate::state::DailyStat;

/// Rows written in one transaction.
#[derive(Debug, Clone, Default)]
pub struct CommitBatch {
    pub date: Option<NaiveDate>,
    pub items: Vec<Item>,
    /// New or changed orders only.
    pub orders: Vec<PurchaseOrder>,
    pub stat: Option<DailyStat>,
}

impl CommitBatch {
    pub fn on(date: NaiveDate) -> Self {
        Self {
            date: Some(date),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.orders.is_empty() && self.stat.is_none()
    }
}

/// Transactional write of Item, PurchaseOrder and DailyStat rows.
pub trait TwinStore: Send + Sync {
    fn commit(&self, batch: &CommitBatch) -> Result<(), StoreError>;
}

impl<S> TwinStore for std::sync::Arc<S>
where
    S: TwinStore + ?Sized,
{
    fn commit(&self, batch: &CommitBatch) -> Result<(), StoreError> {
        (**self).commit(batch)
    }
}

#[derive(Debug, Default)]
struct Tables {
    items: BTreeMap<ItemId, Item>,
    orders: BTreeMap<OrderId, PurchaseOrder>,
    stats: Vec<DailyStat>,
    commits: u64,
}

/// In-memory store.
///
/// Intended for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryTwinStore {
    tables: RwLock<Tables>,
}

impl InMemoryTwinStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn item(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        Ok(self.read()?.items.get(&id).cloned())
    }

    pub fn order(&self, id: OrderId) -> Result<Option<PurchaseOrder>, StoreError> {
        Ok(self.read()?.orders.get(&id).cloned())
    }

    pub fn order_count(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.orders.len())
    }

    pub fn stats(&self) -> Result<Vec<DailyStat>, StoreError> {
        Ok(self.read()?.stats.clone())
    }

    pub fn commit_count(&self) -> Result<u64, StoreError> {
        Ok(self.read()?.commits)
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }
}

impl TwinStore for InMemoryTwinStore {
    fn commit(&self, batch: &CommitBatch) -> Result<(), StoreError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;

        if let (Some(stat), Some(last)) = (&batch.stat, tables.stats.last()) {
            if stat.date <= last.date {
                return Err(StoreError::Rejected(format!(
                    "daily stat for {} is not after {}",
                    stat.date, last.date
                )));
            }
        }

        upsert(&mut tables.items, &batch.items);
        upsert(&mut tables.orders, &batch.orders);
        if let Some(stat) = &batch.stat {
            tables.stats.push(stat.clone());
        }
        tables.commits += 1;
        Ok(())
    }
}

fn upsert<E: Entity + Clone>(table: &mut BTreeMap<E::Id, E>, rows: &[E]) {
    for row in rows {
        table.insert(*row.id(), row.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn stat(d: u32) -> DailyStat {
        DailyStat {
            date: day(d),
            inventory_value: 0.0,
            consumption: 0,
            low_stock_count: 0,
            orders_created: 0,
        }
    }

    #[test]
    fn commit_upserts_rows() {
        let store = InMemoryTwinStore::new();
        let item = Item::new(ItemId::from_u128(1), "Fuse 10A", "Electrical", 0.5, 2, 3.0)
            .unwrap()
            .with_stock(10);

        let mut batch = CommitBatch::on(day(1));
        batch.items.push(item.clone());
        store.commit(&batch).unwrap();

        let mut batch = CommitBatch::on(day(2));
        batch.items.push(item.with_stock(4));
        store.commit(&batch).unwrap();

        assert_eq!(store.item(ItemId::from_u128(1)).unwrap().unwrap().stock(), 4);
        assert_eq!(store.commit_count().unwrap(), 2);
    }

    #[test]
    fn stale_daily_stat_is_rejected_whole() {
        let store = InMemoryTwinStore::new();
        let mut batch = CommitBatch::on(day(2));
        batch.stat = Some(stat(2));
        store.commit(&batch).unwrap();

        let mut batch = CommitBatch::on(day(2));
        batch.stat = Some(stat(2));
        batch.items.push(Item::new(ItemId::from_u128(1), "Fuse 10A", "Electrical", 0.5, 2, 3.0).unwrap());
        assert!(matches!(store.commit(&batch), Err(StoreError::Rejected(_))));
        assert!(store.item(ItemId::from_u128(1)).unwrap().is_none());
        assert_eq!(store.stats().unwrap().len(), 1);
    }
}
