//! Domain error types.

use common::ProductId;
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during domain operations.
///
/// The first four variants are caller mistakes and map to 4xx responses;
/// `Store` covers infrastructure failures.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A business rule was violated.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A quantity was zero or otherwise unusable.
    #[error("invalid amount: {amount}")]
    InvalidAmount { amount: u32 },

    /// Requested more units than are in stock.
    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// The actor is not allowed to perform this operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Entity not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// An error occurred in the storage layer.
    #[error("storage error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InvalidAmount { amount } => DomainError::InvalidAmount { amount },
            StoreError::InsufficientStock {
                product_id,
                requested,
                available,
            } => DomainError::InsufficientStock {
                product_id,
                requested,
                available,
            },
            StoreError::NotFound { entity, id } => DomainError::NotFound { entity, id },
            other => DomainError::Store(other),
        }
    }
}
