//! Popular sellers read endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::DormId;
use serde::Serialize;
use store::MarketStore;

use crate::AppState;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct SellerRankResponse {
    pub seller_id: String,
    pub order_count: u64,
    pub revenue_cents: i64,
}

/// GET /dorms/:id/popular-sellers — the dorm's 30-day top sellers.
#[tracing::instrument(skip(state))]
pub async fn get<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(dorm_id): Path<DormId>,
) -> Result<Json<Vec<SellerRankResponse>>, ApiError> {
    let ranks = state.popular_sellers.top_sellers(dorm_id).await;
    Ok(Json(
        ranks
            .into_iter()
            .map(|rank| SellerRankResponse {
                seller_id: rank.seller_id.to_string(),
                order_count: rank.order_count,
                revenue_cents: rank.revenue.cents(),
            })
            .collect(),
    ))
}
