use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Extension, Json, Router,
};
use tracing::info;

use signage_core::projection::Projection;
use signage_core::types::Screen;

use crate::{
    error::{ApiResult, AppError},
    routes::MiddlewareAck,
    state::{AppState, RequestId},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/screens/{id}/current", get(current_screen))
        .route(
            "/v1/screens/{id}/middleware",
            put(push_screen).delete(remove_screen),
        )
        .route("/v1/screens/{id}/reload", post(reload_screen))
        .with_state(state)
}

async fn current_screen(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(request_id): Extension<RequestId>,
) -> ApiResult<Json<Projection>> {
    let projection = state
        .projector
        .project_screen(id)
        .await
        .map_err(|err| AppError::from(err).with_request_id(&request_id.0))?;
    Ok(Json(projection))
}

async fn load_screen(state: &AppState, id: i64, request_id: &RequestId) -> ApiResult<Screen> {
    state
        .store
        .screen(id)
        .await
        .map_err(|err| AppError::from(err).with_request_id(&request_id.0))?
        .ok_or_else(|| {
            AppError::NotFound(format!("screen {}", id)).with_request_id(&request_id.0)
        })
}

async fn push_screen(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(request_id): Extension<RequestId>,
) -> ApiResult<Json<MiddlewareAck>> {
    let screen = load_screen(&state, id, &request_id).await?;
    state
        .middleware
        .push_screen(&screen)
        .await
        .map_err(|err| AppError::from(err).with_request_id(&request_id.0))?;

    info!(screen_id = id, "screen pushed to middleware");
    Ok(Json(MiddlewareAck {
        id,
        status: "pushed",
    }))
}

async fn reload_screen(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(request_id): Extension<RequestId>,
) -> ApiResult<Json<MiddlewareAck>> {
    load_screen(&state, id, &request_id).await?;
    state
        .middleware
        .reload_screen(id)
        .await
        .map_err(|err| AppError::from(err).with_request_id(&request_id.0))?;

    info!(screen_id = id, "screen reload requested");
    Ok(Json(MiddlewareAck {
        id,
        status: "reloaded",
    }))
}

async fn remove_screen(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(request_id): Extension<RequestId>,
) -> ApiResult<Json<MiddlewareAck>> {
    let screen = load_screen(&state, id, &request_id).await?;
    let activation_code = screen.activation_code.as_deref().ok_or_else(|| {
        AppError::BadRequest(format!("screen {} has no activation code", id))
            .with_request_id(&request_id.0)
    })?;

    state
        .middleware
        .remove_screen(id, activation_code)
        .await
        .map_err(|err| AppError::from(err).with_request_id(&request_id.0))?;

    info!(screen_id = id, "screen removed from middleware");
    Ok(Json(MiddlewareAck {
        id,
        status: "removed",
    }))
}
