//! Popular-sellers analytics.
//!
//! The read model is recomputed per dorm from approved orders of the last
//! 30 days. Recomputation happens off the request path: domain code sends
//! a dorm id through [`AnalyticsWorker`] and the result lands in the
//! shared [`PopularSellersView`].

pub mod service;
pub mod view;
pub mod worker;

pub use service::AnalyticsService;
pub use view::{PopularSellersView, SellerRank};
pub use worker::AnalyticsWorker;
