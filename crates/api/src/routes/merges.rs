//! Route definitions for merge attempts and their conflicts.
//!
//! ```text
//! MERGES (mounted at /merges):
//! GET  /{id}                 get_merge
//!
//! CONFLICTS (mounted at /conflicts):
//! POST /{id}/resolve         resolve_conflict
//! ```

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::merges;
use crate::state::AppState;

pub fn merge_router() -> Router<AppState> {
    Router::new().route("/{id}", get(merges::get_merge))
}

pub fn conflict_router() -> Router<AppState> {
    Router::new().route("/{id}/resolve", post(merges::resolve_conflict))
}
