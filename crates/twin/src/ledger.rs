use std::collections::BTreeSet;

use chrono::NaiveDate;

use procura_core::{ItemId, OrderId};

use crate::event_log::EventCategory;

/// Everything a step (or external mutation) did, held back until commit.
#[derive(Debug)]
pub(crate) struct DayLedger {
    pub date: NaiveDate,
    pub events: Vec<(EventCategory, String)>,
    /// Orders created or changed; only these go into the batch.
    pub touched: BTreeSet<OrderId>,
    pub touched_items: BTreeSet<ItemId>,
    pub consumption: u64,
    pub stockouts: u32,
    pub deliveries: u32,
    pub delays: u32,
    pub orders_created: u32,
    pub held_for_approval: u32,
}

impl DayLedger {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            events: Vec::new(),
            touched: BTreeSet::new(),
            touched_items: BTreeSet::new(),
            consumption: 0,
            stockouts: 0,
            deliveries: 0,
            delays: 0,
            orders_created: 0,
            held_for_approval: 0,
        }
    }

    pub fn event(&mut self, category: EventCategory, message: impl Into<String>) {
        self.events.push((category, message.into()));
    }

    pub fn touch(&mut self, id: OrderId) {
        self.touched.insert(id);
    }

    pub fn touch_item(&mut self, id: ItemId) {
        self.touched_items.insert(id);
    }
}
