use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use super::{created, ok, ApiResponse, ApiResult};
use crate::app::faqs::{self, BulkDeleteRequest, BulkDeleteResult};
use crate::domain::{Actor, Faq, FaqInput};
use crate::error::Result;
use crate::state::SharedState;

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/faqs", get(list).post(create))
        .route("/faqs/bulk-delete", post(bulk_delete))
        .route("/faqs/:id", get(show).put(update).delete(remove))
}

async fn list(State(state): State<SharedState>, actor: Option<Actor>) -> ApiResult<Vec<Faq>> {
    Ok(ok(faqs::list_faqs(state.storage(), actor.as_ref()).await?))
}

async fn show(
    State(state): State<SharedState>,
    actor: Option<Actor>,
    Path(id): Path<Uuid>,
) -> ApiResult<Faq> {
    Ok(ok(faqs::get_faq(state.storage(), actor.as_ref(), id).await?))
}

async fn create(
    State(state): State<SharedState>,
    actor: Actor,
    Json(body): Json<FaqInput>,
) -> Result<(StatusCode, Json<ApiResponse<Faq>>)> {
    Ok(created(faqs::create_faq(state.storage(), &actor, body).await?))
}

async fn update(
    State(state): State<SharedState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<FaqInput>,
) -> ApiResult<Faq> {
    Ok(ok(faqs::update_faq(state.storage(), &actor, id, body).await?))
}

async fn remove(
    State(state): State<SharedState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    faqs::delete_faq(state.storage(), &actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn bulk_delete(
    State(state): State<SharedState>,
    actor: Actor,
    Json(body): Json<BulkDeleteRequest>,
) -> ApiResult<BulkDeleteResult> {
    Ok(ok(faqs::bulk_delete(state.storage(), &actor, body).await?))
}
