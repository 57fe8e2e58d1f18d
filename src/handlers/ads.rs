use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use super::shops::ReasonBody;
use super::{created, ok, ApiResponse, ApiResult};
use crate::app::ads::{self, AdAnalytics, AdPayment, AdQuote, NewAd};
use crate::domain::{Actor, AdCounter, AdType, Advertisement, SlotKey};
use crate::error::{MarketError, Result};
use crate::state::SharedState;
use crate::storage::AdFilter;

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/advertisements", post(create).get(list))
        .route("/advertisements/quote", get(quote))
        .route("/advertisements/slots/:ad_type/:slot", get(slot))
        .route("/advertisements/:id/approve", put(approve))
        .route("/advertisements/:id/reject", put(reject))
        .route("/advertisements/:id/payment", post(payment))
        .route("/advertisements/:id/pause", put(pause))
        .route("/advertisements/:id/view", post(view))
        .route("/advertisements/:id/click", post(click))
        .route("/advertisements/:id/analytics", get(analytics))
}

async fn create(
    State(state): State<SharedState>,
    actor: Actor,
    Json(body): Json<NewAd>,
) -> Result<(StatusCode, Json<ApiResponse<Advertisement>>)> {
    let ad = ads::create_ad(state.storage(), &state.config.ads, &actor, body).await?;
    Ok(created(ad))
}

async fn list(
    State(state): State<SharedState>,
    actor: Actor,
    Query(filter): Query<AdFilter>,
) -> ApiResult<Vec<Advertisement>> {
    Ok(ok(ads::list_ads(state.storage(), &actor, filter).await?))
}

#[derive(Debug, Deserialize)]
struct QuoteQuery {
    ad_type: AdType,
    months: u32,
}

async fn quote(
    State(state): State<SharedState>,
    Query(query): Query<QuoteQuery>,
) -> ApiResult<AdQuote> {
    Ok(ok(ads::quote_price(
        &state.config.ads,
        query.ad_type,
        query.months,
    )?))
}

/// The ad currently on screen in a homepage slot (`null` when empty).
async fn slot(
    State(state): State<SharedState>,
    Path((ad_type, slot)): Path<(String, u32)>,
) -> ApiResult<Option<Advertisement>> {
    let ad_type = ad_type.parse::<AdType>().map_err(MarketError::Validation)?;
    let key = SlotKey { ad_type, slot };
    Ok(ok(state.rotator.current_ad(key).await?))
}

async fn approve(
    State(state): State<SharedState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Advertisement> {
    Ok(ok(ads::approve_ad(state.storage(), &actor, id).await?))
}

async fn reject(
    State(state): State<SharedState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<ReasonBody>,
) -> ApiResult<Advertisement> {
    Ok(ok(
        ads::reject_ad(state.storage(), &actor, id, &body.reason).await?,
    ))
}

async fn payment(
    State(state): State<SharedState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<AdPayment>,
) -> ApiResult<Advertisement> {
    Ok(ok(ads::record_ad_payment(state.storage(), &actor, id, body).await?))
}

#[derive(Debug, Deserialize)]
struct PauseBody {
    paused: bool,
}

async fn pause(
    State(state): State<SharedState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<PauseBody>,
) -> ApiResult<Advertisement> {
    Ok(ok(
        ads::set_paused(state.storage(), &actor, id, body.paused).await?,
    ))
}

async fn view(State(state): State<SharedState>, Path(id): Path<Uuid>) -> ApiResult<Advertisement> {
    Ok(ok(
        ads::record_counter(state.storage(), id, AdCounter::View).await?,
    ))
}

async fn click(State(state): State<SharedState>, Path(id): Path<Uuid>) -> ApiResult<Advertisement> {
    Ok(ok(
        ads::record_counter(state.storage(), id, AdCounter::Click).await?,
    ))
}

async fn analytics(
    State(state): State<SharedState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<AdAnalytics> {
    Ok(ok(ads::analytics(state.storage(), &actor, id).await?))
}
