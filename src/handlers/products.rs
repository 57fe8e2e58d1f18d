use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{post, get},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{created, ok, ApiResponse, ApiResult};
use crate::app::products::{self, StockUpdate};
use crate::domain::{Actor, NewProduct, Product};
use crate::error::{MarketError, Result};
use crate::state::SharedState;

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/products", post(create))
        .route("/products/:id", get(show).put(update))
}

#[derive(Debug, Deserialize)]
struct CreateProductBody {
    shop_id: Uuid,
    #[serde(flatten)]
    product: NewProduct,
}

async fn create(
    State(state): State<SharedState>,
    actor: Actor,
    Json(body): Json<CreateProductBody>,
) -> Result<(StatusCode, Json<ApiResponse<Product>>)> {
    let product =
        products::create_product(state.storage(), &actor, body.shop_id, body.product).await?;
    Ok(created(product))
}

async fn show(State(state): State<SharedState>, Path(id): Path<Uuid>) -> ApiResult<Product> {
    let product = state
        .storage
        .get_product(id)
        .await?
        .ok_or_else(|| MarketError::not_found("Product", id))?;
    Ok(ok(product))
}

async fn update(
    State(state): State<SharedState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<StockUpdate>,
) -> ApiResult<Product> {
    Ok(ok(products::update_product(state.storage(), &actor, id, body).await?))
}
