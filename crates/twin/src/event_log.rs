//! Bounded, newest-first log of human-readable simulation events.

use std::collections::VecDeque;

use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Delivery,
    Order,
    Emergency,
    StockOut,
    Delay,
    Anomaly,
    Approval,
    Sourcing,
    Error,
    System,
}

impl EventCategory {
    pub fn icon(&self) -> &'static str {
        match self {
            EventCategory::Delivery => "📦",
            EventCategory::Order => "🛒",
            EventCategory::Emergency => "🚨",
            EventCategory::StockOut => "⚠️",
            EventCategory::Delay => "⏳",
            EventCategory::Anomaly => "🛡️",
            EventCategory::Approval => "✅",
            EventCategory::Sourcing => "📄",
            EventCategory::Error => "❌",
            EventCategory::System => "⚙️",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimEvent {
    pub id: u64,
    /// Simulated date the event happened on.
    pub date: NaiveDate,
    pub category: EventCategory,
    pub icon: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct EventLog {
    capacity: usize,
    next_id: u64,
    events: VecDeque<SimEvent>,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            next_id: 1,
            events: VecDeque::with_capacity(capacity),
        }
    }

    /// Insert at the front; the oldest entry is evicted when full.
    pub fn push(&mut self, date: NaiveDate, category: EventCategory, message: impl Into<String>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.events.push_front(SimEvent {
            id,
            date,
            category,
            icon: category.icon(),
            message: message.into(),
        });
        self.events.truncate(self.capacity);
        id
    }

    /// Up to `n` events, newest first.
    pub fn recent(&self, n: usize) -> Vec<SimEvent> {
        self.events.iter().take(n).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
