use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use uuid::Uuid;

use super::{created, ok, ApiResponse, ApiResult};
use crate::app::properties::{self, PropertyStatusUpdate};
use crate::domain::{Actor, Property, PropertyInput};
use crate::error::Result;
use crate::state::SharedState;
use crate::storage::PropertyFilter;

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/properties", get(list).post(create))
        .route("/properties/:id", get(show).put(update).delete(remove))
        .route("/properties/:id/status", put(update_status))
}

async fn list(
    State(state): State<SharedState>,
    Query(filter): Query<PropertyFilter>,
) -> ApiResult<Vec<Property>> {
    Ok(ok(properties::list_properties(state.storage(), &filter).await?))
}

async fn show(State(state): State<SharedState>, Path(id): Path<Uuid>) -> ApiResult<Property> {
    Ok(ok(properties::get_property(state.storage(), id).await?))
}

async fn create(
    State(state): State<SharedState>,
    actor: Actor,
    Json(body): Json<PropertyInput>,
) -> Result<(StatusCode, Json<ApiResponse<Property>>)> {
    Ok(created(
        properties::create_property(state.storage(), &actor, body).await?,
    ))
}

async fn update(
    State(state): State<SharedState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<PropertyInput>,
) -> ApiResult<Property> {
    Ok(ok(
        properties::update_property(state.storage(), &actor, id, body).await?,
    ))
}

async fn update_status(
    State(state): State<SharedState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<PropertyStatusUpdate>,
) -> ApiResult<Property> {
    Ok(ok(
        properties::update_property_status(state.storage(), &actor, id, body).await?,
    ))
}

async fn remove(
    State(state): State<SharedState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    properties::delete_property(state.storage(), &actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
