use axum::{middleware::from_fn, Router};
use signage_core::cache::{MemoryProjectionCache, ProjectionCache};
use signage_core::config::Settings;
use signage_core::middleware::{HttpTransport, MiddlewareClient};
use signage_core::projection::ScreenProjector;
use signage_db::PgStore;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

mod cache;
mod error;
mod middleware;
mod routes;
mod state;

use crate::cache::RedisProjectionCache;
use crate::middleware::request_id::request_id;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let settings = Settings::from_env()?;

    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&settings.database_url)
        .await?;
    let store = Arc::new(PgStore::new(db));

    let projection_cache: Arc<dyn ProjectionCache> = match &settings.redis_url {
        Some(redis_url) => Arc::new(RedisProjectionCache::new(redis::Client::open(
            redis_url.as_str(),
        )?)),
        None => {
            info!("no redis configured, caching projections in process");
            Arc::new(MemoryProjectionCache::new())
        }
    };

    let projector = ScreenProjector::new(store.clone(), projection_cache, settings.cache_ttl());
    let transport = HttpTransport::new(settings.middleware.timeout())?;

    let state = AppState {
        store,
        projector: Arc::new(projector),
        middleware: MiddlewareClient::new(Arc::new(transport), settings.middleware.base_url()),
        signage_env: settings.signage_env.clone(),
    };

    let app = Router::new()
        .merge(routes::health_router(state.clone()))
        .merge(routes::v1_router(state))
        .layer(from_fn(request_id));

    let addr: SocketAddr = settings.api_bind.parse()?;
    info!(%addr, env = %settings.signage_env, "starting api");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
