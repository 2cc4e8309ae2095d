//! `procura-ai`
//!
//! **Responsibility:** anomaly gate for purchase orders.
//!
//! This crate is intentionally **not** part of the domain model:
//! - It must not depend on ERP entities (items, orders, contracts).
//! - It must not mutate domain state.
//! - It answers "does this order look abnormal?"; callers decide what to do.

pub mod gate;
pub mod order_anomaly;
pub mod result;

pub use gate::{AnomalyGate, AnomalyVerdict, OrderCandidate, PassThroughGate};
pub use order_anomaly::{OrderAnomalyDetector, OrderSample};
pub use result::AiError;
