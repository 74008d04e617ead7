use axum::{
    extract::{Path, State},
    routing::{delete, get},
    Extension, Json, Router,
};
use tracing::info;

use signage_core::projection::Projection;

use crate::{
    error::{ApiResult, AppError},
    routes::MiddlewareAck,
    state::{AppState, RequestId},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/channels/{id}/public", get(public_channel))
        .route("/v1/channels/{id}/middleware", delete(remove_channel))
        .with_state(state)
}

async fn public_channel(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(request_id): Extension<RequestId>,
) -> ApiResult<Json<Projection>> {
    let projection = state
        .projector
        .project_channel_public(id)
        .await
        .map_err(|err| AppError::from(err).with_request_id(&request_id.0))?;
    Ok(Json(projection))
}

/// Takes the channel off every screen. The next push cycle re-adds it if it
/// is still assigned.
async fn remove_channel(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(request_id): Extension<RequestId>,
) -> ApiResult<Json<MiddlewareAck>> {
    state
        .store
        .channel(id)
        .await
        .map_err(|err| AppError::from(err).with_request_id(&request_id.0))?
        .ok_or_else(|| {
            AppError::NotFound(format!("channel {}", id)).with_request_id(&request_id.0)
        })?;

    state
        .middleware
        .remove_channel(&id.to_string())
        .await
        .map_err(|err| AppError::from(err).with_request_id(&request_id.0))?;

    info!(channel_id = id, "channel removed from middleware");
    Ok(Json(MiddlewareAck {
        id,
        status: "removed",
    }))
}
