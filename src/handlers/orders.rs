use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use uuid::Uuid;

use super::{created, ok, ApiResponse, ApiResult};
use crate::app::checkout::{self, CheckoutReceipt, CheckoutRequest, QuoteRequest};
use crate::app::delivery::DeliveryQuote;
use crate::app::orders::{self, PaymentCapture, StatusUpdate};
use crate::domain::{Actor, Order};
use crate::error::Result;
use crate::state::SharedState;

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/orders/checkout", post(place))
        .route("/orders/delivery-quote", post(quote))
        .route("/orders/mine", get(mine))
        .route("/orders/:id", get(show))
        .route("/orders/:id/status", put(update_status))
        .route("/orders/:id/payment", post(payment))
}

async fn place(
    State(state): State<SharedState>,
    actor: Actor,
    Json(body): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CheckoutReceipt>>)> {
    let receipt = checkout::checkout(state.storage(), &state.numbering, &actor, body).await?;
    Ok(created(receipt))
}

async fn quote(
    State(state): State<SharedState>,
    Json(body): Json<QuoteRequest>,
) -> ApiResult<DeliveryQuote> {
    Ok(ok(checkout::delivery_quote(state.storage(), body).await?))
}

async fn mine(State(state): State<SharedState>, actor: Actor) -> ApiResult<Vec<Order>> {
    Ok(ok(orders::list_my_orders(state.storage(), &actor).await?))
}

async fn show(
    State(state): State<SharedState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Order> {
    Ok(ok(orders::get_order(state.storage(), &actor, id).await?))
}

async fn update_status(
    State(state): State<SharedState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusUpdate>,
) -> ApiResult<Order> {
    Ok(ok(orders::update_status(state.storage(), &actor, id, body).await?))
}

async fn payment(
    State(state): State<SharedState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<PaymentCapture>,
) -> ApiResult<Order> {
    Ok(ok(orders::record_payment(state.storage(), &actor, id, body).await?))
}
