pub mod health;
pub mod metrics;
pub mod orders;
pub mod popular;
pub mod products;
pub mod subscriptions;
