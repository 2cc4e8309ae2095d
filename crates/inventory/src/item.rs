use serde::{Deserialize, Serialize};

use procura_core::{DomainError, DomainResult, Entity, ItemId};

use crate::forecast::ema;

/// Lower bound for the consumption forecast.
///
/// The forecast must stay strictly positive: it is a divisor for days-of-stock
/// and a factor of every reorder point.
pub const MIN_FORECAST: f64 = 0.01;

/// A stocked item.
///
/// Stock is a `u32` so it can never go negative; consumption is capped at the
/// physical stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    id: ItemId,
    name: String,
    category: String,
    unit_cost: f64,
    stock: u32,
    avg_daily_consumption: f64,
    lead_time_days: u32,
}

/// Outcome of applying one day of demand to an item.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Consumption {
    pub demanded: u32,
    pub consumed: u32,
    /// Stock hit zero on this draw with demand left unmet (or exactly drained).
    pub stocked_out: bool,
}

impl Consumption {
    pub fn unmet(&self) -> u32 {
        self.demanded - self.consumed
    }
}

impl Item {
    pub fn new(
        id: ItemId,
        name: impl Into<String>,
        category: impl Into<String>,
        unit_cost: f64,
        lead_time_days: u32,
        avg_daily_consumption: f64,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if !(unit_cost.is_finite() && unit_cost >= 0.0) {
            return Err(DomainError::validation("unit cost must be a finite non-negative number"));
        }
        if lead_time_days == 0 {
            return Err(DomainError::validation("lead time must be at least one day"));
        }
        if !(avg_daily_consumption.is_finite() && avg_daily_consumption > 0.0) {
            return Err(DomainError::validation("consumption forecast must be positive"));
        }

        Ok(Self {
            id,
            name,
            category: category.into(),
            unit_cost,
            stock: 0,
            avg_daily_consumption,
            lead_time_days,
        })
    }

    pub fn with_stock(mut self, stock: u32) -> Self {
        self.stock = stock;
        self
    }

    pub fn id_typed(&self) -> ItemId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn unit_cost(&self) -> f64 {
        self.unit_cost
    }

    pub fn stock(&self) -> u32 {
        self.stock
    }

    /// Current average daily consumption forecast ("burn rate").
    pub fn forecast(&self) -> f64 {
        self.avg_daily_consumption
    }

    pub fn lead_time_days(&self) -> u32 {
        self.lead_time_days
    }

    /// Physical days of stock at the current burn rate.
    pub fn days_of_stock(&self) -> f64 {
        self.stock as f64 / self.avg_daily_consumption
    }

    pub fn inventory_value(&self) -> f64 {
        self.stock as f64 * self.unit_cost
    }

    /// Remove up to `demanded` units from stock.
    pub fn consume(&mut self, demanded: u32) -> Consumption {
        let consumed = demanded.min(self.stock);
        self.stock -= consumed;
        Consumption {
            demanded,
            consumed,
            stocked_out: demanded > 0 && self.stock == 0,
        }
    }

    /// Credit delivered units to stock.
    pub fn receive(&mut self, quantity: u32) -> DomainResult<()> {
        self.stock = self
            .stock
            .checked_add(quantity)
            .ok_or_else(|| DomainError::invariant(format!("stock overflow on item {}", self.id)))?;
        Ok(())
    }

    /// Fold one day's observed demand into the forecast (EMA).
    pub fn observe_demand(&mut self, observed: f64, alpha: f64) {
        self.avg_daily_consumption = ema(self.avg_daily_consumption, observed, alpha).max(MIN_FORECAST);
    }
}

impl Entity for Item {
    type Id = ItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn item(stock: u32) -> Item {
        Item::new(ItemId::from_u128(1), "Bearing 6204", "Mechanics", 12.5, 7, 5.0)
            .unwrap()
            .with_stock(stock)
    }

    #[test]
    fn new_rejects_invalid_attributes() {
        let id = ItemId::from_u128(1);
        assert!(Item::new(id, " ", "c", 1.0, 7, 1.0).is_err());
        assert!(Item::new(id, "x", "c", -1.0, 7, 1.0).is_err());
        assert!(Item::new(id, "x", "c", 1.0, 0, 1.0).is_err());
        assert!(Item::new(id, "x", "c", 1.0, 7, 0.0).is_err());
        assert!(Item::new(id, "x", "c", 1.0, 7, f64::NAN).is_err());
    }

    #[test]
    fn consume_caps_at_stock_and_reports_stock_out() {
        let mut it = item(3);
        let c = it.consume(5);
        assert_eq!(c.consumed, 3);
        assert_eq!(c.unmet(), 2);
        assert!(c.stocked_out);
        assert_eq!(it.stock(), 0);
    }

    #[test]
    fn consume_within_stock_is_not_a_stock_out() {
        let mut it = item(10);
        let c = it.consume(4);
        assert_eq!(c.consumed, 4);
        assert!(!c.stocked_out);
        assert_eq!(it.stock(), 6);
    }

    #[test]
    fn receive_adds_to_stock() {
        let mut it = item(2);
        it.receive(40).unwrap();
        assert_eq!(it.stock(), 42);
    }

    #[test]
    fn receive_overflow_is_an_invariant_violation() {
        let mut it = item(u32::MAX);
        assert!(matches!(it.receive(1), Err(DomainError::InvariantViolation(_))));
        assert_eq!(it.stock(), u32::MAX);
    }

    #[test]
    fn forecast_never_reaches_zero() {
        let mut it = item(0);
        for _ in 0..10_000 {
            it.observe_demand(0.0, 0.5);
        }
        assert!(it.forecast() >= MIN_FORECAST);
        assert!(it.days_of_stock().is_finite());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        #[test]
        fn stock_stays_within_bounds(start in 0u32..500, draws in proptest::collection::vec(0u32..200, 1..60)) {
            let mut it = item(start);
            let mut consumed_total = 0u64;
            for d in draws {
                let c = it.consume(d);
                prop_assert!(c.consumed <= d);
                consumed_total += c.consumed as u64;
            }
            prop_assert_eq!(start as u64 - consumed_total, it.stock() as u64);
        }
    }
}
