use std::sync::Arc;

use modelbay_lifecycle::service::ModelService;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ModelService>,
    pub config: Arc<ServerConfig>,
}
