//! Domain layer for the dorm marketplace.
//!
//! Services in this crate wrap a [`store::MarketStore`] and add the
//! business rules: order validation and the status FSM, the stock ledger,
//! the subscription gate, and product management. State changes that other
//! parts of the system react to are published on an injectable
//! [`EventBus`] after the storage transaction commits.

pub mod bus;
pub mod error;
pub mod event;
pub mod orders;
pub mod products;
pub mod stock;
pub mod subscriptions;
pub mod tasks;

pub use bus::{EventBus, EventHandler, EventWorker, RecordingHandler};
pub use error::DomainError;
pub use event::{EventEnvelope, MarketEvent};
pub use orders::{CreateOrderInput, OrderDetails, OrderItemInput, OrderService};
pub use products::{NewProductInput, ProductService, ProductUpdate, FREE_PRODUCT_QUOTA};
pub use stock::StockLedger;
pub use subscriptions::{SubscriptionService, SubscriptionStatus};
pub use tasks::{NoopTaskRunner, TaskRunner};
