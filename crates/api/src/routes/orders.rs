//! Order placement, listing, and status transition endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{DeliveryType, OrderId, PaymentMethod, ProductId, UserId};
use serde::{Deserialize, Serialize};
use store::MarketStore;
use store::records::{Order, OrderItem, OrderStatusLog};

use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: UserId,
    pub items: Vec<OrderItemRequest>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub delivery_type: DeliveryType,
    #[serde(default)]
    pub delivery_address: String,
    #[serde(default)]
    pub delivery_phone: String,
}

#[derive(Deserialize)]
pub struct OrderItemRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Body for all four status transitions.
#[derive(Deserialize)]
pub struct TransitionRequest {
    pub actor_id: UserId,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub role: String,
    pub user_id: UserId,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub customer_id: String,
    pub seller_id: String,
    pub status: String,
    pub total_cents: i64,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

#[derive(Serialize)]
pub struct OrderDetailResponse {
    #[serde(flatten)]
    pub order: OrderResponse,
    pub items: Vec<OrderItemResponse>,
    pub logs: Vec<StatusLogResponse>,
}

#[derive(Serialize)]
pub struct StatusLogResponse {
    pub status: String,
    pub changed_by: Option<String>,
    pub note: String,
    pub created_at: String,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.to_string(),
            customer_id: order.customer_id.to_string(),
            seller_id: order.seller_id.to_string(),
            status: order.status.as_str().to_string(),
            total_cents: order.total_amount.cents(),
            created_at: order.created_at.to_rfc3339(),
        }
    }
}

impl From<&OrderItem> for OrderItemResponse {
    fn from(item: &OrderItem) -> Self {
        Self {
            product_id: item.product_id.to_string(),
            quantity: item.quantity,
            unit_price_cents: item.unit_price.cents(),
        }
    }
}

impl From<&OrderStatusLog> for StatusLogResponse {
    fn from(log: &OrderStatusLog) -> Self {
        Self {
            status: log.status.as_str().to_string(),
            changed_by: log.changed_by.map(|id| id.to_string()),
            note: log.note.clone(),
            created_at: log.created_at.to_rfc3339(),
        }
    }
}

// -- Handlers --

/// POST /orders — place an order.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let order = state
        .orders
        .create_order(domain::CreateOrderInput {
            customer_id: req.customer_id,
            items: req
                .items
                .into_iter()
                .map(|item| domain::OrderItemInput {
                    product_id: item.product_id,
                    quantity: item.quantity,
                })
                .collect(),
            notes: req.notes,
            payment_method: req.payment_method,
            delivery_type: req.delivery_type,
            delivery_address: req.delivery_address,
            delivery_phone: req.delivery_phone,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(OrderResponse::from(&order))))
}

/// GET /orders?role=customer|seller&user_id= — list a party's orders.
#[tracing::instrument(skip(state))]
pub async fn list<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = match query.role.as_str() {
        "customer" => state.orders.list_for_customer(query.user_id).await?,
        "seller" => state.orders.list_for_seller(query.user_id).await?,
        other => {
            return Err(ApiError::BadRequest(format!(
                "unknown role {other:?}, expected \"customer\" or \"seller\""
            )));
        }
    };
    Ok(Json(orders.iter().map(OrderResponse::from).collect()))
}

/// GET /orders/:id — order with items and audit trail.
#[tracing::instrument(skip(state))]
pub async fn get<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetailResponse>, ApiError> {
    let details = state.orders.get(id).await?;
    Ok(Json(OrderDetailResponse {
        order: OrderResponse::from(&details.order),
        items: details.items.iter().map(OrderItemResponse::from).collect(),
        logs: details.logs.iter().map(StatusLogResponse::from).collect(),
    }))
}

/// GET /orders/:id/logs — status history only.
#[tracing::instrument(skip(state))]
pub async fn logs<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<OrderId>,
) -> Result<Json<Vec<StatusLogResponse>>, ApiError> {
    let logs = state.orders.status_logs(id).await?;
    Ok(Json(logs.iter().map(StatusLogResponse::from).collect()))
}

/// POST /orders/:id/approve
#[tracing::instrument(skip(state, req))]
pub async fn approve<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<OrderId>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.orders.approve(id, req.actor_id, req.note).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/:id/reject
#[tracing::instrument(skip(state, req))]
pub async fn reject<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<OrderId>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.orders.reject(id, req.actor_id, req.note).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/:id/cancel
#[tracing::instrument(skip(state, req))]
pub async fn cancel<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<OrderId>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.orders.cancel(id, req.actor_id, req.note).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/:id/complete
#[tracing::instrument(skip(state, req))]
pub async fn complete<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<OrderId>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.orders.complete(id, req.actor_id, req.note).await?;
    Ok(Json(OrderResponse::from(&order)))
}
