//! Purchasing domain module.
//!
//! Purchase orders and their lifecycle, supply contracts, the reorder policy
//! and the sourcing selector. Deterministic domain logic only (no IO, no
//! randomness, no storage).

pub mod contract;
pub mod order;
pub mod policy;
pub mod sourcing;

pub use contract::{ContractBook, ContractOffer, ContractRegistry, SupplyContract};
pub use order::{OrderDraft, OrderStatus, PurchaseOrder, SourcingMode};
pub use policy::{ReorderPolicy, Trigger, inventory_position};
pub use sourcing::{SourcingDecision, SourcingError, SourcingSelector, cheapest_offer};
