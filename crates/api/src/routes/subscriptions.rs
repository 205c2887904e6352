//! Seller subscription endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use common::{PlanId, UserId};
use serde::{Deserialize, Serialize};
use store::MarketStore;

use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct StartRequest {
    pub seller_id: UserId,
    pub plan_id: PlanId,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub seller_id: UserId,
}

#[derive(Serialize)]
pub struct SubscriptionResponse {
    pub seller_id: String,
    pub plan_id: String,
    pub expires_at: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub active: bool,
    pub expires_at: Option<String>,
    pub plan_name: Option<String>,
    pub slots_in_use: u64,
}

/// POST /subscriptions — start a subscription on a plan.
#[tracing::instrument(skip(state, req))]
pub async fn start<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<StartRequest>,
) -> Result<(StatusCode, Json<SubscriptionResponse>), ApiError> {
    let subscription = state
        .subscriptions
        .start_subscription(req.seller_id, req.plan_id)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(SubscriptionResponse {
            seller_id: subscription.seller_id.to_string(),
            plan_id: subscription.plan_id.to_string(),
            expires_at: subscription.expires_at.to_rfc3339(),
        }),
    ))
}

/// GET /subscriptions/status?seller_id= — current subscription state.
#[tracing::instrument(skip(state))]
pub async fn status<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<StatusResponse>, ApiError> {
    let status = state
        .subscriptions
        .subscription_status(query.seller_id)
        .await?;
    Ok(Json(StatusResponse {
        active: status.active,
        expires_at: status.expires_at.map(|t| t.to_rfc3339()),
        plan_name: status.plan.map(|plan| plan.name),
        slots_in_use: status.slots_in_use,
    }))
}
