use std::sync::Arc;

use signage_core::middleware::MiddlewareClient;
use signage_core::projection::ScreenProjector;
use signage_core::store::ContentStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ContentStore>,
    pub projector: Arc<ScreenProjector>,
    pub middleware: MiddlewareClient,
    pub signage_env: String,
}

#[derive(Debug, Clone)]
pub struct RequestId(pub String);
