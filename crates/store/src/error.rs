use common::ProductId;
use thiserror::Error;

/// Errors that can occur when interacting with the market store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A record with the same identity already exists.
    #[error("{entity} already exists: {id}")]
    Conflict { entity: &'static str, id: String },

    /// A stock decrement was requested with a non-positive amount.
    #[error("invalid stock decrement amount: {amount} (must be greater than 0)")]
    InvalidAmount { amount: u32 },

    /// A stock decrement would drive the quantity negative. Nothing was
    /// written.
    #[error(
        "insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// A stored value could not be decoded into its typed form.
    #[error("decode error: {0}")]
    Decode(String),

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
