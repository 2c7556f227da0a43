pub mod health;
pub mod merges;
pub mod scenarios;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /scenarios                                       create baseline, list
/// /scenarios/{id}                                  get
/// /scenarios/{id}/fork                             fork (POST)
/// /scenarios/{id}/archive                          archive (POST)
/// /scenarios/{id}/ancestors                        ancestor path
/// /scenarios/{id}/effective/{entity_type}          effective state
/// /scenarios/{id}/overlays/{entity_type}           overlay log, upsert (PUT)
/// /scenarios/{id}/overlays/{entity_type}/{eid}     remove (DELETE)
/// /scenarios/{id}/compare/{other_id}               comparison
/// /scenarios/{id}/merge/{target_id}                merge (POST)
/// /scenarios/{id}/merges                           merge attempts
/// /scenarios/{id}/conflicts                        pending conflicts (as target)
///
/// /merges/{id}                                     attempt with its conflicts
///
/// /conflicts/{id}/resolve                          resolve (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/scenarios", scenarios::router())
        .nest("/merges", merges::merge_router())
        .nest("/conflicts", merges::conflict_router())
}
