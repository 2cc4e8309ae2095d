use thiserror::Error;

use procura_core::{DomainError, ItemId, OrderId};

/// Persistence collaborator fault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("commit rejected: {0}")]
    Rejected(String),
}

/// Engine API error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TwinError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unknown item {0}")]
    UnknownItem(ItemId),

    #[error("unknown order {0}")]
    UnknownOrder(OrderId),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type TwinResult<T> = Result<T, TwinError>;
