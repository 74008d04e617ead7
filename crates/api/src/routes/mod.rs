pub mod channels;
pub mod health;
pub mod screens;

use axum::Router;

use crate::state::AppState;

pub fn v1_router(state: AppState) -> Router {
    Router::new()
        .merge(screens::router(state.clone()))
        .merge(channels::router(state))
}

pub fn health_router(state: AppState) -> Router {
    health::router(state)
}

/// Body returned by the middleware pass-through routes.
#[derive(Debug, serde::Serialize)]
pub struct MiddlewareAck {
    pub id: i64,
    pub status: &'static str,
}
