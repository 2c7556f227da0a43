use std::sync::Arc;

use crate::config::ServerConfig;

/// Handler state: the connection pool every planning operation runs
/// against, plus the configuration the router is built from.
#[derive(Clone)]
pub struct AppState {
    pub pool: capplan_db::DbPool,
    pub config: Arc<ServerConfig>,
}
