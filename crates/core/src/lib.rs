//! `procura-core`: identifiers, errors and the entity trait shared by the domain crates.
//!
//! Pure domain primitives; nothing here knows about the engine or storage.

pub mod entity;
pub mod error;
pub mod id;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{ContractId, ItemId, OrderId, SupplierId};
