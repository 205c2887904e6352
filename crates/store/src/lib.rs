//! Persistence layer for the dorm marketplace.
//!
//! The [`MarketStore`] trait is the single seam between business services
//! and storage. Two implementations ship: [`InMemoryStore`] for tests and
//! default wiring, and [`PostgresStore`] backed by sqlx. Multi-step
//! operations (order creation, status transitions, stock decrements) are
//! atomic in both.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod records;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use records::{
    Category, ChatMessage, Dorm, Order, OrderItem, OrderStatusLog, Product, SellerProfile,
    SellerSubscription, SubscriptionPlan, UsageTracking, User,
};
pub use store::{
    CreatedOrder, MarketStore, NewOrder, NewOrderItem, StatusLogEntry, StockDecrement,
};
