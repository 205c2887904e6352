//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{Money, Role};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use store::records::{Category, Dorm, Product, SellerProfile, SubscriptionPlan, User};
use store::{InMemoryStore, MarketStore};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct Fixture {
    app: axum::Router,
    store: Arc<InMemoryStore>,
    dorm: Dorm,
    customer: User,
    seller: User,
    product: Product,
}

async fn setup() -> Fixture {
    let store = Arc::new(InMemoryStore::new());

    let dorm = Dorm::new("North Hall");
    store.insert_dorm(dorm.clone()).await.unwrap();
    let customer = User::new("customer@campus.edu", Role::Student, Some(dorm.id));
    let seller = User::new("seller@campus.edu", Role::Seller, Some(dorm.id));
    store.insert_user(customer.clone()).await.unwrap();
    store.insert_user(seller.clone()).await.unwrap();
    store
        .upsert_seller_profile(SellerProfile::new(seller.id, dorm.id, "5550002"))
        .await
        .unwrap();
    let category = Category::new(dorm.id, "Snacks", "snacks");
    store.insert_category(category.clone()).await.unwrap();
    let product = Product::new(
        seller.id,
        dorm.id,
        category.id,
        "Instant Noodles",
        Money::from_cents(500),
    );
    store.insert_product(product.clone(), 10).await.unwrap();

    let (state, worker) = api::create_default_state(store.clone());
    tokio::spawn(worker.run());
    let app = api::create_app(state, get_metrics_handle());

    Fixture {
        app,
        store,
        dorm,
        customer,
        seller,
        product,
    }
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn place_order(fixture: &Fixture, quantity: u32) -> Value {
    let response = fixture
        .app
        .clone()
        .oneshot(post(
            "/orders",
            json!({
                "customer_id": fixture.customer.id,
                "items": [{ "product_id": fixture.product.id, "quantity": quantity }],
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    json_body(response).await
}

#[tokio::test]
async fn health_check() {
    let fixture = setup().await;

    let response = fixture.app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "marketplace-api");
}

#[tokio::test]
async fn metrics_endpoint_renders() {
    let fixture = setup().await;

    let response = fixture.app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn create_order_returns_created_with_total() {
    let fixture = setup().await;

    let body = place_order(&fixture, 3).await;
    assert_eq!(body["status"], "PENDING");
    assert_eq!(body["total_cents"], 1500);
    assert_eq!(body["seller_id"], fixture.seller.id.to_string());

    let remaining = fixture
        .store
        .stock_quantity(fixture.product.id)
        .await
        .unwrap();
    assert_eq!(remaining, Some(7));
}

#[tokio::test]
async fn empty_basket_is_bad_request() {
    let fixture = setup().await;

    let response = fixture
        .app
        .clone()
        .oneshot(post(
            "/orders",
            json!({ "customer_id": fixture.customer.id, "items": [] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn overselling_is_bad_request() {
    let fixture = setup().await;

    let response = fixture
        .app
        .clone()
        .oneshot(post(
            "/orders",
            json!({
                "customer_id": fixture.customer.id,
                "items": [{ "product_id": fixture.product.id, "quantity": 99 }],
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn seller_only_transitions_are_forbidden_for_customer() {
    let fixture = setup().await;
    let order = place_order(&fixture, 1).await;
    let id = order["id"].as_str().unwrap().to_string();

    for action in ["approve", "reject", "complete"] {
        let response = fixture
            .app
            .clone()
            .oneshot(post(
                &format!("/orders/{id}/{action}"),
                json!({ "actor_id": fixture.customer.id }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{action}");
    }
}

#[tokio::test]
async fn seller_drives_order_to_completion() {
    let fixture = setup().await;
    let order = place_order(&fixture, 1).await;
    let id = order["id"].as_str().unwrap().to_string();

    let response = fixture
        .app
        .clone()
        .oneshot(post(
            &format!("/orders/{id}/approve"),
            json!({ "actor_id": fixture.seller.id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ONAY");

    let response = fixture
        .app
        .clone()
        .oneshot(post(
            &format!("/orders/{id}/complete"),
            json!({ "actor_id": fixture.seller.id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "COMPLETED");

    let response = fixture
        .app
        .clone()
        .oneshot(get(&format!("/orders/{id}/logs")))
        .await
        .unwrap();
    let logs = json_body(response).await;
    assert_eq!(logs.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn completing_a_pending_order_is_bad_request() {
    let fixture = setup().await;
    let order = place_order(&fixture, 1).await;

    let response = fixture
        .app
        .clone()
        .oneshot(post(
            &format!("/orders/{}/complete", order["id"].as_str().unwrap()),
            json!({ "actor_id": fixture.seller.id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_order_is_not_found() {
    let fixture = setup().await;

    let response = fixture
        .app
        .oneshot(get(&format!("/orders/{}", uuid::Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn order_detail_includes_items_and_logs() {
    let fixture = setup().await;
    let order = place_order(&fixture, 2).await;

    let response = fixture
        .app
        .clone()
        .oneshot(get(&format!("/orders/{}", order["id"].as_str().unwrap())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["items"][0]["unit_price_cents"], 500);
    assert_eq!(body["logs"][0]["status"], "PENDING");
}

#[tokio::test]
async fn listing_requires_a_known_role() {
    let fixture = setup().await;
    place_order(&fixture, 1).await;

    let response = fixture
        .app
        .clone()
        .oneshot(get(&format!(
            "/orders?role=customer&user_id={}",
            fixture.customer.id
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await.as_array().unwrap().len(), 1);

    let response = fixture
        .app
        .clone()
        .oneshot(get(&format!(
            "/orders?role=admin&user_id={}",
            fixture.customer.id
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn product_below_price_floor_is_bad_request() {
    let fixture = setup().await;

    let response = fixture
        .app
        .clone()
        .oneshot(post(
            "/products",
            json!({
                "seller_id": fixture.seller.id,
                "category_id": fixture.product.category_id,
                "name": "Gum",
                "price_cents": 49,
                "quantity": 5,
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn product_listing_by_dorm() {
    let fixture = setup().await;

    let response = fixture
        .app
        .clone()
        .oneshot(get(&format!("/products?dorm_id={}", fixture.dorm.id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["name"], "Instant Noodles");
}

#[tokio::test]
async fn subscription_gate_opens_after_signup() {
    let fixture = setup().await;

    // Fill the free quota (the fixture product takes one slot already).
    for name in ["B", "C"] {
        let response = fixture
            .app
            .clone()
            .oneshot(post(
                "/products",
                json!({
                    "seller_id": fixture.seller.id,
                    "category_id": fixture.product.category_id,
                    "name": name,
                    "price_cents": 100,
                    "quantity": 5,
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let fourth = json!({
        "seller_id": fixture.seller.id,
        "category_id": fixture.product.category_id,
        "name": "D",
        "price_cents": 100,
        "quantity": 5,
    });
    let response = fixture
        .app
        .clone()
        .oneshot(post("/products", fourth.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let plan = SubscriptionPlan::new("Pro", Money::from_cents(9900), 30, 50);
    fixture.store.insert_plan(plan.clone()).await.unwrap();
    let response = fixture
        .app
        .clone()
        .oneshot(post(
            "/subscriptions",
            json!({ "seller_id": fixture.seller.id, "plan_id": plan.id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = fixture
        .app
        .clone()
        .oneshot(post("/products", fourth))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = fixture
        .app
        .clone()
        .oneshot(get(&format!(
            "/subscriptions/status?seller_id={}",
            fixture.seller.id
        )))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["active"], true);
    assert_eq!(body["plan_name"], "Pro");
}

#[tokio::test]
async fn approval_feeds_the_popular_sellers_view() {
    let fixture = setup().await;
    let order = place_order(&fixture, 1).await;

    let response = fixture
        .app
        .clone()
        .oneshot(post(
            &format!("/orders/{}/approve", order["id"].as_str().unwrap()),
            json!({ "actor_id": fixture.seller.id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The refresh runs on a background worker; poll briefly.
    let uri = format!("/dorms/{}/popular-sellers", fixture.dorm.id);
    for _ in 0..50 {
        let response = fixture.app.clone().oneshot(get(&uri)).await.unwrap();
        let body = json_body(response).await;
        if let Some(ranks) = body.as_array()
            && !ranks.is_empty()
        {
            assert_eq!(ranks[0]["seller_id"], fixture.seller.id.to_string());
            assert_eq!(ranks[0]["revenue_cents"], 500);
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("popular sellers view never refreshed");
}
