//! Product listing endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use common::{CategoryId, DormId, Money, UserId};
use serde::{Deserialize, Serialize};
use store::MarketStore;
use store::records::Product;

use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub seller_id: UserId,
    pub category_id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price_cents: i64,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub dorm_id: DormId,
}

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: String,
    pub seller_id: String,
    pub name: String,
    pub price_cents: i64,
    pub is_active: bool,
    pub is_out_of_stock: bool,
}

impl From<&Product> for ProductResponse {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.to_string(),
            seller_id: product.seller_id.to_string(),
            name: product.name.clone(),
            price_cents: product.price.cents(),
            is_active: product.is_active,
            is_out_of_stock: product.is_out_of_stock,
        }
    }
}

/// POST /products — create a listing with initial stock.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let product = state
        .products
        .create_product(domain::NewProductInput {
            seller_id: req.seller_id,
            category_id: req.category_id,
            name: req.name,
            description: req.description,
            price: Money::from_cents(req.price_cents),
            quantity: req.quantity,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(ProductResponse::from(&product))))
}

/// GET /products?dorm_id= — a dorm's listings.
#[tracing::instrument(skip(state))]
pub async fn list<S: MarketStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let products = state.products.list_for_dorm(query.dorm_id).await?;
    Ok(Json(products.iter().map(ProductResponse::from).collect()))
}
