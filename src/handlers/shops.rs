use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{created, ok, ApiResponse, ApiResult};
use crate::app::access::{load_shop, require_admin};
use crate::app::{orders, products, sellers};
use crate::domain::*;
use crate::error::Result;
use crate::state::SharedState;

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/shops", post(register).get(list))
        .route("/shops/:id", get(show))
        .route("/shops/:id/approve", put(approve))
        .route("/shops/:id/reject", put(reject))
        .route("/shops/:id/resubmit", put(resubmit))
        .route("/shops/:id/ad-fee-exempt", put(ad_fee_exempt))
        .route("/shops/:id/delivery", put(delivery))
        .route("/shops/:id/dashboard", get(dashboard))
        .route("/shops/:id/products", get(shop_products))
        .route("/shops/:id/orders", get(shop_orders))
}

async fn register(
    State(state): State<SharedState>,
    actor: Actor,
    Json(body): Json<NewShop>,
) -> Result<(StatusCode, Json<ApiResponse<Shop>>)> {
    let shop = sellers::register_shop(state.storage(), &actor, body).await?;
    Ok(created(shop))
}

#[derive(Debug, Deserialize)]
struct ShopQuery {
    status: Option<ApprovalStatus>,
}

async fn list(
    State(state): State<SharedState>,
    actor: Actor,
    Query(query): Query<ShopQuery>,
) -> ApiResult<Vec<Shop>> {
    require_admin(&actor)?;
    Ok(ok(state.storage.list_shops(query.status).await?))
}

async fn show(State(state): State<SharedState>, Path(id): Path<Uuid>) -> ApiResult<Shop> {
    Ok(ok(load_shop(state.storage(), id).await?))
}

async fn approve(
    State(state): State<SharedState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Shop> {
    Ok(ok(sellers::approve_shop(state.storage(), &actor, id).await?))
}

#[derive(Debug, Deserialize)]
pub struct ReasonBody {
    pub reason: String,
}

async fn reject(
    State(state): State<SharedState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<ReasonBody>,
) -> ApiResult<Shop> {
    Ok(ok(
        sellers::reject_shop(state.storage(), &actor, id, &body.reason).await?,
    ))
}

async fn resubmit(
    State(state): State<SharedState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Shop> {
    Ok(ok(sellers::resubmit_shop(state.storage(), &actor, id).await?))
}

#[derive(Debug, Deserialize)]
struct ExemptBody {
    exempt: bool,
}

async fn ad_fee_exempt(
    State(state): State<SharedState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<ExemptBody>,
) -> ApiResult<Shop> {
    Ok(ok(
        sellers::set_ad_fee_exempt(state.storage(), &actor, id, body.exempt).await?,
    ))
}

async fn delivery(
    State(state): State<SharedState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<DeliveryConfig>,
) -> ApiResult<Shop> {
    Ok(ok(
        sellers::update_delivery_config(state.storage(), &actor, id, body).await?,
    ))
}

async fn dashboard(
    State(state): State<SharedState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<sellers::DashboardSummary> {
    Ok(ok(sellers::dashboard(state.storage(), &actor, id).await?))
}

async fn shop_products(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<Product>> {
    Ok(ok(products::list_shop_products(state.storage(), id).await?))
}

#[derive(Debug, Deserialize)]
struct OrderQuery {
    status: Option<OrderStatus>,
}

async fn shop_orders(
    State(state): State<SharedState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Query(query): Query<OrderQuery>,
) -> ApiResult<Vec<Order>> {
    Ok(ok(
        orders::list_shop_orders(state.storage(), &actor, id, query.status).await?,
    ))
}
