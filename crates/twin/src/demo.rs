//! Seeded demo catalogue: MRO items, multi-sourced contracts, order history.

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use procura_core::{ContractId, ItemId, SupplierId};
use procura_inventory::Item;
use procura_purchasing::{OrderDraft, SourcingMode, SupplyContract};

use crate::error::{TwinError, TwinResult};
use crate::state::SimulationState;

const SUPPLIERS: u128 = 5;

const CATALOGUE: &[(&str, &str, f64, u32)] = &[
    ("Ball bearing 6204-2RS", "Bearings", 4.20, 5),
    ("Tapered roller bearing 30205", "Bearings", 11.80, 7),
    ("V-belt SPA 1250", "Transmission", 9.50, 4),
    ("Hydraulic oil HLP 46, 20L", "Lubricants", 78.00, 3),
    ("Grease cartridge EP2", "Lubricants", 6.40, 2),
    ("Contactor 3P 25A", "Electrical", 34.90, 6),
    ("Fuse gG 16A", "Electrical", 1.10, 2),
    ("Proximity sensor M18 PNP", "Automation", 42.00, 8),
    ("O-ring kit NBR", "Seals", 15.30, 3),
    ("Shaft seal 40x62x8", "Seals", 3.70, 4),
    ("Nitrile gloves (box)", "Safety", 8.90, 2),
    ("Hex bolt M12x40 8.8 (100)", "Fasteners", 12.60, 3),
];

fn shift(date: NaiveDate, days: i64) -> TwinResult<NaiveDate> {
    date.checked_add_signed(Duration::days(days))
        .ok_or_else(|| TwinError::Config(format!("date {date} {days:+} days is out of range")))
}

fn cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Build a reproducible catalogue around `today`.
pub fn demo_state(seed: u64, today: NaiveDate) -> TwinResult<SimulationState> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut state = SimulationState::new();
    let mut next_contract: u128 = 1;

    for (n, &(name, category, unit_cost, lead)) in CATALOGUE.iter().enumerate() {
        let item_id = ItemId::from_u128(n as u128 + 1);
        let forecast = cents(rng.gen_range(1.5..6.0));
        let stock = rng.gen_range(30..=100);
        state.add_item(Item::new(item_id, name, category, unit_cost, lead, forecast)?.with_stock(stock))?;

        let mut prices = Vec::new();
        for _ in 0..rng.gen_range(1..=3) {
            let supplier_id = SupplierId::from_u128(100 + rng.gen_range(1..=SUPPLIERS));
            let price = cents(unit_cost * rng.gen_range(0.85..1.15));
            let valid_from = shift(today, -rng.gen_range(60..=120))?;
            let valid_until = shift(today, rng.gen_range(30..=180))?;
            let terms = [14, 30, 45, 60][rng.gen_range(0..4)];
            state.add_contract(SupplyContract::new(
                ContractId::from_u128(1_000 + next_contract),
                item_id,
                supplier_id,
                price,
                terms,
                valid_from,
                Some(valid_until),
            )?)?;
            next_contract += 1;
            prices.push((supplier_id, price, terms));
        }

        // Typical orders cover one to two lead times of demand.
        let typical = (forecast * lead as f64).ceil().max(5.0) as u32;
        for _ in 0..rng.gen_range(3..=6) {
            let (supplier_id, price, terms) = prices[rng.gen_range(0..prices.len())];
            let draft = OrderDraft {
                item_id,
                supplier_id: Some(supplier_id),
                quantity: rng.gen_range(typical..=typical * 2),
                unit_price: price,
                lead_days: lead,
                mode: SourcingMode::Historical,
                payment_terms_days: terms,
            };
            state.record_history(draft, shift(today, -rng.gen_range(1..=90))?)?;
        }
    }

    Ok(state)
}
