//! The digital twin: one simulated day per `step()`.
//!
//! Step phases, in order:
//! 1. demand draw + EMA forecast update (items with stock only)
//! 2. deliveries due today
//! 3. supplier delay perturbation
//! 4. replenishment (policy → sourcing → anomaly gate), one order per item max
//! 5. daily statistics
//!
//! A step works on a copy of the committed state. The copy is swapped in only
//! after the store accepts the day's batch; otherwise the whole day is dropped
//! and an error event is recorded. The clock advances either way, but only
//! once the day is settled: readers see day D or day D+1, never a mix.

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::NaiveDate;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::{debug, error, info, info_span, warn};

use procura_ai::{AnomalyGate, OrderSample};
use procura_core::{ContractId, ItemId, OrderId};
use procura_inventory::{DemandSource, Item, Runway, StochasticDemand, predict_runways};
use procura_purchasing::{
    ContractRegistry, OrderDraft, OrderStatus, PurchaseOrder, ReorderPolicy, SourcingMode, SourcingSelector,
    SupplyContract, cheapest_offer, inventory_position,
};

use crate::clock::SimulationClock;
use crate::config::SimulationConfig;
use crate::error::{TwinError, TwinResult};
use crate::event_log::{EventCategory, EventLog, SimEvent};
use crate::ledger::DayLedger;
use crate::lifecycle::OrderLifecycle;
use crate::state::{DailyStat, SimulationState};
use crate::store::{CommitBatch, TwinStore};

/// Payment terms for manual orders placed without a contract.
pub const DEFAULT_PAYMENT_TERMS_DAYS: u32 = 30;

/// Read-side snapshot of the simulation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationStatus {
    pub current_date: NaiveDate,
    pub running: bool,
    /// Newest first.
    pub events: Vec<SimEvent>,
}

/// What one `step()` did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepOutcome {
    pub date: NaiveDate,
    pub committed: bool,
    pub consumption: u64,
    pub stockouts: u32,
    pub deliveries: u32,
    pub delays: u32,
    pub orders_created: u32,
    pub held_for_approval: u32,
    pub error: Option<String>,
}

impl StepOutcome {
    fn committed(ledger: &DayLedger) -> Self {
        Self {
            date: ledger.date,
            committed: true,
            consumption: ledger.consumption,
            stockouts: ledger.stockouts,
            deliveries: ledger.deliveries,
            delays: ledger.delays,
            orders_created: ledger.orders_created,
            held_for_approval: ledger.held_for_approval,
            error: None,
        }
    }

    fn rolled_back(date: NaiveDate, error: String) -> Self {
        Self {
            date,
            committed: false,
            consumption: 0,
            stockouts: 0,
            deliveries: 0,
            delays: 0,
            orders_created: 0,
            held_for_approval: 0,
            error: Some(error),
        }
    }
}

struct StepContext {
    demand: Box<dyn DemandSource>,
    rng: StdRng,
}

pub struct DigitalTwin<S, G> {
    config: SimulationConfig,
    policy: ReorderPolicy,
    selector: SourcingSelector,
    lifecycle: OrderLifecycle,
    store: S,
    gate: G,
    clock: SimulationClock,
    state: RwLock<SimulationState>,
    /// Held for the whole of a step or external mutation.
    step_ctx: Mutex<StepContext>,
    events: Mutex<EventLog>,
}

impl<S, G> std::fmt::Debug for DigitalTwin<S, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigitalTwin")
            .field("today", &self.clock.today())
            .field("running", &self.clock.is_running())
            .finish_non_exhaustive()
    }
}

impl<S, G> DigitalTwin<S, G>
where
    S: TwinStore,
    G: AnomalyGate,
{
    pub fn new(config: SimulationConfig, store: S, gate: G) -> TwinResult<Self> {
        Self::with_state(config, store, gate, SimulationState::new())
    }

    /// Start from a seeded state (catalogue, contracts, history).
    ///
    /// The initial items and orders are committed to `store` first.
    pub fn with_state(config: SimulationConfig, store: S, gate: G, state: SimulationState) -> TwinResult<Self> {
        config.validate()?;

        let mut batch = CommitBatch::on(config.start_date);
        batch.items = state.items.values().cloned().collect();
        batch.orders = state.orders.clone();
        if !batch.is_empty() {
            store.commit(&batch)?;
        }

        let ctx = StepContext {
            demand: Box::new(StochasticDemand::new(config.seed, config.demand.clone())),
            rng: StdRng::seed_from_u64(config.seed.wrapping_add(1)),
        };

        info!(
            start = %config.start_date,
            items = state.items.len(),
            contracts = state.contracts.len(),
            "digital twin initialised"
        );

        Ok(Self {
            policy: config.policy.clone(),
            selector: config.sourcing.clone(),
            lifecycle: OrderLifecycle::from_config(&config),
            clock: SimulationClock::new(config.start_date),
            events: Mutex::new(EventLog::new(config.event_capacity)),
            state: RwLock::new(state),
            step_ctx: Mutex::new(ctx),
            config,
            store,
            gate,
        })
    }

    /// Replace the demand generator (e.g. with a deterministic one in tests).
    pub fn with_demand(mut self, source: impl DemandSource + 'static) -> Self {
        self.step_ctx
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .demand = Box::new(source);
        self
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }


    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn is_running(&self) -> bool {
        self.clock.is_running()
    }

    pub fn status(&self) -> SimulationStatus {
        let events = lock(&self.events);
        SimulationStatus {
            current_date: self.clock.today(),
            running: self.clock.is_running(),
            events: events.recent(events.capacity()),
        }
    }

    pub fn recent_events(&self, n: usize) -> Vec<SimEvent> {
        lock(&self.events).recent(n)
    }

    pub fn item(&self, id: ItemId) -> Option<Item> {
        read(&self.state).item(id).cloned()
    }

    pub fn items(&self) -> Vec<Item> {
        read(&self.state).items().cloned().collect()
    }

    /// All orders, newest first.
    pub fn orders(&self) -> Vec<PurchaseOrder> {
        read(&self.state).orders().iter().rev().cloned().collect()
    }

    pub fn order(&self, id: OrderId) -> Option<PurchaseOrder> {
        read(&self.state).order(id).cloned()
    }

    pub fn pending_approvals(&self) -> Vec<PurchaseOrder> {
        read(&self.state)
            .orders()
            .iter()
            .rev()
            .filter(|o| o.status() == OrderStatus::PendingApproval)
            .cloned()
            .collect()
    }

    pub fn daily_stats(&self) -> Vec<DailyStat> {
        read(&self.state).stats().to_vec()
    }

    /// Items whose inventory position is below their reorder point.
    pub fn low_stock_items(&self) -> Vec<Item> {
        let state = read(&self.state);
        state
            .items()
            .filter(|item| self.is_low_stock(item, state.orders()))
            .cloned()
            .collect()
    }

    /// Items closest to running out, shortest runway first.
    pub fn predictions(&self, limit: usize) -> Vec<Runway> {
        predict_runways(read(&self.state).items(), limit)
    }

    pub fn training_samples(&self) -> Vec<OrderSample> {
        read(&self.state).training_samples()
    }

    pub fn snapshot(&self) -> SimulationState {
        read(&self.state).clone()
    }


    /// Start or pause the scheduler. Idempotent; returns whether the flag
    /// changed.
    pub fn toggle(&self, run: bool) -> bool {
        let changed = self.clock.set_running(run);
        if changed {
            let today = self.clock.today();
            info!(running = run, date = %today, "simulation toggled");
            let message = if run { "Simulation started" } else { "Simulation paused" };
            lock(&self.events).push(today, EventCategory::System, message);
        }
        changed
    }

    /// Close out a day whose step panicked: nothing from it is kept, the
    /// clock still moves on and the fault is logged as an error event.
    pub fn abort_day(&self, message: impl Into<String>) -> NaiveDate {
        let _guard = lock(&self.step_ctx);
        let mut events = lock(&self.events);
        let today = self.clock.advance();
        events.push(today, EventCategory::Error, message);
        today
    }

    /// Advance exactly one simulated day.
    pub fn step(&self) -> StepOutcome {
        let mut guard = lock(&self.step_ctx);
        let ctx = &mut *guard;

        let today = self.clock.tomorrow();
        let span = info_span!("step", date = %today);
        let _entered = span.enter();

        let mut working = read(&self.state).clone();
        let mut ledger = DayLedger::new(today);

        self.consume(&mut working, ctx.demand.as_mut(), &mut ledger);
        self.lifecycle.deliver_due(&mut working, &mut ledger);
        self.lifecycle.perturb_delays(&mut working, &mut ctx.rng, &mut ledger);
        self.replenish(&mut working, &mut ledger);
        let stat = self.close_day(&mut working, &ledger);

        let mut batch = batch_for(&working, &ledger);
        batch.stat = Some(stat);

        match self.store.commit(&batch) {
            Ok(()) => {
                self.publish(working, &ledger, true);
                info!(
                    consumption = ledger.consumption,
                    deliveries = ledger.deliveries,
                    orders = ledger.orders_created,
                    stockouts = ledger.stockouts,
                    "day committed"
                );
                StepOutcome::committed(&ledger)
            }
            Err(e) => {
                error!(error = %e, "day rolled back");
                let mut events = lock(&self.events);
                self.clock.advance();
                events.push(today, EventCategory::Error, format!("Day {today} rolled back: {e}"));
                StepOutcome::rolled_back(today, e.to_string())
            }
        }
    }


    pub fn add_item(&self, item: Item) -> TwinResult<()> {
        self.transact(|state, ledger| {
            let id = item.id_typed();
            let name = item.name().to_string();
            state.add_item(item)?;
            ledger.touch_item(id);
            ledger.event(EventCategory::System, format!("Item {name} added"));
            Ok(())
        })
    }

    pub fn add_contract(&self, contract: SupplyContract) -> TwinResult<()> {
        self.transact(|state, ledger| {
            let message = format!(
                "Contract {} added: {:.2}/unit from supplier {}",
                contract.id_typed(),
                contract.unit_price(),
                contract.supplier_id()
            );
            state.add_contract(contract)?;
            ledger.event(EventCategory::Sourcing, message);
            Ok(())
        })
    }

    pub fn deactivate_contract(&self, id: ContractId) -> TwinResult<()> {
        self.transact(|state, ledger| {
            state.contracts.deactivate(id)?;
            ledger.event(EventCategory::Sourcing, format!("Contract {id} deactivated"));
            Ok(())
        })
    }

    /// `pending_approval → ordered`; the delivery estimate restarts today.
    pub fn approve(&self, id: OrderId) -> TwinResult<PurchaseOrder> {
        self.transact(|state, ledger| {
            let order = find_order(state, id)?;
            order.approve(ledger.date)?;
            info!(order = %order.reference(), eta = %order.estimated_delivery(), "order approved");
            ledger.touch(id);
            ledger.event(
                EventCategory::Approval,
                format!("{} approved, due {}", order.reference(), order.estimated_delivery()),
            );
            Ok(order.clone())
        })
    }

    /// `pending_approval → cancelled`.
    pub fn reject(&self, id: OrderId) -> TwinResult<PurchaseOrder> {
        self.transact(|state, ledger| {
            let order = find_order(state, id)?;
            order.reject()?;
            info!(order = %order.reference(), "order rejected");
            ledger.touch(id);
            ledger.event(EventCategory::Approval, format!("{} rejected", order.reference()));
            Ok(order.clone())
        })
    }

    /// Manual order from the cheapest active contract, or at the item's
    /// unit cost without a supplier when none exists.
    pub fn place_manual_order(&self, item_id: ItemId, quantity: u32) -> TwinResult<PurchaseOrder> {
        self.transact(|state, ledger| {
            let item = state.items.get(&item_id).ok_or(TwinError::UnknownItem(item_id))?;
            let offers = state.contracts.active_contracts(item_id, ledger.date);

            let (supplier_id, unit_price, payment_terms_days) = match cheapest_offer(&offers) {
                Some(offer) => (Some(offer.supplier_id), offer.unit_price, offer.payment_terms_days),
                None => (None, item.unit_cost(), DEFAULT_PAYMENT_TERMS_DAYS),
            };
            let draft = OrderDraft {
                item_id,
                supplier_id,
                quantity,
                unit_price,
                lead_days: item.lead_time_days(),
                mode: SourcingMode::Manual,
                payment_terms_days,
            };
            let reference_price = Some(item.unit_cost()).filter(|p| *p > 0.0);
            let item_name = item.name().to_string();

            self.place(state, draft, reference_price, &item_name, ledger)
        })
    }


    /// Apply `f` to a copy of the state at today's date and commit it.
    fn transact<T>(&self, f: impl FnOnce(&mut SimulationState, &mut DayLedger) -> TwinResult<T>) -> TwinResult<T> {
        let _guard = lock(&self.step_ctx);
        let today = self.clock.today();

        let mut working = read(&self.state).clone();
        let mut ledger = DayLedger::new(today);
        let value = f(&mut working, &mut ledger)?;

        let batch = batch_for(&working, &ledger);
        if !batch.is_empty() {
            if let Err(e) = self.store.commit(&batch) {
                error!(error = %e, "mutation rolled back");
                lock(&self.events).push(today, EventCategory::Error, format!("Change rolled back: {e}"));
                return Err(e.into());
            }
        }

        self.publish(working, &ledger, false);
        Ok(value)
    }

    /// Swap in a committed working copy. State, date and events change under
    /// the event-log lock, so `status()` never mixes two days.
    fn publish(&self, working: SimulationState, ledger: &DayLedger, advance: bool) {
        let mut events = lock(&self.events);
        *write(&self.state) = working;
        if advance {
            self.clock.advance();
        }
        for (category, message) in &ledger.events {
            events.push(ledger.date, *category, message.clone());
        }
    }

    fn consume(&self, state: &mut SimulationState, demand: &mut dyn DemandSource, ledger: &mut DayLedger) {
        for item in state.items.values_mut().filter(|i| i.stock() > 0) {
            let draw = demand.draw(item);
            let used = item.consume(draw.quantity);
            item.observe_demand(draw.quantity as f64, self.config.ema_alpha);

            ledger.consumption += used.consumed as u64;
            ledger.touch_item(item.id_typed());

            if let Some(factor) = draw.spike {
                info!(item = %item.id_typed(), factor, quantity = draw.quantity, "demand spike");
            }
            debug!(
                item = %item.id_typed(),
                demanded = used.demanded,
                consumed = used.consumed,
                forecast = item.forecast(),
                "demand drawn"
            );

            if used.stocked_out {
                warn!(item = %item.id_typed(), unmet = used.unmet(), "stock-out");
                ledger.stockouts += 1;
                ledger.event(
                    EventCategory::StockOut,
                    format!("Stock-out: {} ({} unit(s) unmet)", item.name(), used.unmet()),
                );
            }
        }
    }

    fn replenish(&self, state: &mut SimulationState, ledger: &mut DayLedger) {
        let today = ledger.date;
        let ids: Vec<ItemId> = state.items.keys().copied().collect();

        for id in ids {
            let Some(item) = state.items.get(&id) else {
                continue;
            };
            let own: Vec<&PurchaseOrder> = state.orders.iter().filter(|o| o.item_id() == id).collect();
            let Some(trigger) = self.policy.evaluate(item, &own, today) else {
                continue;
            };

            let offers = state.contracts.active_contracts(id, today);
            let decision = match self.selector.select(item, &trigger, &offers) {
                Ok(decision) => decision,
                Err(e) => {
                    if state.unsourced.insert(id) {
                        warn!(item = %id, error = %e, "replenishment skipped");
                        ledger.event(
                            EventCategory::Sourcing,
                            format!("No active contract for {}; replenishment skipped", item.name()),
                        );
                    } else {
                        debug!(item = %id, "still no active contract");
                    }
                    continue;
                }
            };
            state.unsourced.remove(&id);

            let reference_price = Some(item.unit_cost()).filter(|p| *p > 0.0);
            let item_name = item.name().to_string();
            let draft = decision.into_draft(id);

            if let Err(e) = self.place(state, draft, reference_price, &item_name, ledger) {
                warn!(item = %id, error = %e, "order not placed");
            }
        }
    }

    /// Route through the gate, create the order, record it.
    fn place(
        &self,
        state: &mut SimulationState,
        draft: OrderDraft,
        reference_price: Option<f64>,
        item_name: &str,
        ledger: &mut DayLedger,
    ) -> TwinResult<PurchaseOrder> {
        let check = self.lifecycle.approval_check(&self.gate, &draft, reference_price);
        let sequence = state.next_sequence();
        let order = PurchaseOrder::place(OrderId::new(), sequence, draft, ledger.date, check.needs_approval())?;

        info!(
            order = %order.reference(),
            item = %order.item_id(),
            mode = %order.mode(),
            quantity = order.quantity(),
            total = order.total_price(),
            status = %order.status(),
            "order placed"
        );

        let category = match order.mode() {
            SourcingMode::Emergency => EventCategory::Emergency,
            _ => EventCategory::Order,
        };
        ledger.event(
            category,
            format!(
                "{} {}: {} x {} @ {:.2}, due {}",
                order.mode(),
                order.reference(),
                order.quantity(),
                item_name,
                order.unit_price(),
                order.estimated_delivery()
            ),
        );
        if let Some(reason) = check.reason() {
            ledger.held_for_approval += 1;
            ledger.event(
                EventCategory::Anomaly,
                format!("{} held for approval ({reason})", order.reference()),
            );
        }

        ledger.orders_created += 1;
        ledger.touch(order.id_typed());
        state.orders.push(order.clone());
        Ok(order)
    }

    fn is_low_stock(&self, item: &Item, orders: &[PurchaseOrder]) -> bool {
        (inventory_position(item, orders) as f64) < self.policy.reorder_point(item)
    }

    fn close_day(&self, state: &mut SimulationState, ledger: &DayLedger) -> DailyStat {
        let inventory_value = state.items.values().map(Item::inventory_value).sum::<f64>();
        let low_stock_count = state
            .items
            .values()
            .filter(|item| self.is_low_stock(item, &state.orders))
            .count() as u32;

        let stat = DailyStat {
            date: ledger.date,
            inventory_value,
            consumption: ledger.consumption,
            low_stock_count,
            orders_created: ledger.orders_created,
        };
        state.stats.push(stat.clone());
        stat
    }
}

fn find_order(state: &mut SimulationState, id: OrderId) -> TwinResult<&mut PurchaseOrder> {
    state
        .orders
        .iter_mut()
        .find(|o| o.id_typed() == id)
        .ok_or(TwinError::UnknownOrder(id))
}

fn batch_for(state: &SimulationState, ledger: &DayLedger) -> CommitBatch {
    let mut batch = CommitBatch::on(ledger.date);
    batch.items = ledger
        .touched_items
        .iter()
        .filter_map(|id| state.items.get(id).cloned())
        .collect();
    batch.orders = state
        .orders
        .iter()
        .filter(|o| ledger.touched.contains(&o.id_typed()))
        .cloned()
        .collect();
    batch
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(l: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    l.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(l: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    l.write().unwrap_or_else(PoisonError::into_inner)
}
