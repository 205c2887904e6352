//! Shared vocabulary for the dorm marketplace.
//!
//! This crate provides the typed identifiers, the fixed-point [`Money`]
//! type, and the enums shared between the persistence and domain layers.

pub mod ids;
pub mod kinds;
pub mod money;

pub use ids::{CategoryId, DormId, OrderId, PlanId, ProductId, UserId};
pub use kinds::{ChatSender, DeliveryType, OrderStatus, PaymentMethod, Role};
pub use money::Money;
