//! `procura-twin`
//!
//! **Responsibility:** the procurement digital twin.
//!
//! A time-stepped simulation over the inventory and purchasing domains:
//! stochastic demand, learned consumption rates, reorder decisions, dual-mode
//! sourcing, anomaly-gated order creation and the order lifecycle, one
//! simulated day per [`DigitalTwin::step`].

pub mod clock;
pub mod config;
pub mod demo;
pub mod engine;
pub mod error;
pub mod event_log;
pub mod lifecycle;
pub mod runner;
pub mod state;
pub mod store;

mod ledger;


pub use clock::SimulationClock;
pub use config::SimulationConfig;
pub use engine::{DigitalTwin, SimulationStatus, StepOutcome};
pub use error::{StoreError, TwinError, TwinResult};
pub use event_log::{EventCategory, EventLog, SimEvent};
pub use lifecycle::{ApprovalCheck, OrderLifecycle};
pub use runner::{SimulationRunner, SimulationRunnerHandle};
pub use state::{DailyStat, SimulationState};
pub use store::{CommitBatch, InMemoryTwinStore, TwinStore};
