//! HTTP API server with observability for the dorm marketplace.
//!
//! Provides REST endpoints for orders, products, and subscriptions, with
//! structured logging (tracing) and Prometheus metrics. Actor identity
//! arrives as an explicit field or query parameter; token issuance sits
//! behind a separate gateway.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use analytics::{AnalyticsWorker, PopularSellersView};
use axum::Router;
use axum::routing::{get, post};
use domain::{
    EventBus, EventWorker, OrderService, ProductService, SubscriptionService,
};
use metrics_exporter_prometheus::PrometheusHandle;
use notify::{LogMailer, OrderCreatedNotifier, StockLogHandler};
use store::MarketStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S: MarketStore> {
    pub orders: OrderService<S>,
    pub products: ProductService<S>,
    pub subscriptions: SubscriptionService<S>,
    pub popular_sellers: PopularSellersView,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: MarketStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create::<S>))
        .route("/orders", get(routes::orders::list::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/logs", get(routes::orders::logs::<S>))
        .route("/orders/{id}/approve", post(routes::orders::approve::<S>))
        .route("/orders/{id}/reject", post(routes::orders::reject::<S>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S>))
        .route("/orders/{id}/complete", post(routes::orders::complete::<S>))
        .route("/products", post(routes::products::create::<S>))
        .route("/products", get(routes::products::list::<S>))
        .route(
            "/subscriptions",
            post(routes::subscriptions::start::<S>),
        )
        .route(
            "/subscriptions/status",
            get(routes::subscriptions::status::<S>),
        )
        .route(
            "/dorms/{id}/popular-sellers",
            get(routes::popular::get::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires services, event handlers, and the analytics worker over a store.
///
/// The returned [`EventWorker`] is not yet running: spawn `run()` in
/// production or drive `run_until_idle()` in tests.
pub fn create_default_state<S: MarketStore + 'static>(
    store: Arc<S>,
) -> (Arc<AppState<S>>, EventWorker) {
    let (bus, mut worker) = EventBus::channel();

    let notifier = Arc::new(OrderCreatedNotifier::new(
        store.clone(),
        Arc::new(LogMailer),
    ));
    worker.subscribe("order_created", notifier);
    let stock_log = Arc::new(StockLogHandler);
    worker.subscribe("stock_decreased", stock_log.clone());
    worker.subscribe("product_out_of_stock", stock_log);

    let popular_sellers = PopularSellersView::new();
    let analytics = Arc::new(AnalyticsWorker::spawn(
        store.clone(),
        popular_sellers.clone(),
    ));

    let subscriptions = SubscriptionService::new(store.clone(), bus.clone());
    let state = Arc::new(AppState {
        orders: OrderService::new(store.clone(), bus.clone(), analytics),
        products: ProductService::new(store.clone(), subscriptions.clone()),
        subscriptions,
        popular_sellers,
    });

    (state, worker)
}
