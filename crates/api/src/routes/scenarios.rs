//! Route definitions for scenarios.
//!
//! ```text
//! POST   /                                        create_baseline
//! GET    /                                        list_scenarios (?include_archived)
//! GET    /{id}                                    get_scenario
//! POST   /{id}/fork                               fork_scenario
//! POST   /{id}/archive                            archive_scenario
//! GET    /{id}/ancestors                          get_ancestors
//! GET    /{id}/effective/{entity_type}            get_effective_state
//! GET    /{id}/overlays/{entity_type}             list_overlays
//! PUT    /{id}/overlays/{entity_type}             upsert_overlay
//! DELETE /{id}/overlays/{entity_type}/{entity_id} remove_overlay
//! GET    /{id}/compare/{other_id}                 compare
//! POST   /{id}/merge/{target_id}                  merge_scenario
//! GET    /{id}/merges                             list_merges
//! GET    /{id}/conflicts                          list_pending_conflicts
//! ```

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::{merges, overlays, scenarios};
use crate::state::AppState;

/// Scenario routes, mounted at `/scenarios`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(scenarios::create_baseline).get(scenarios::list_scenarios),
        )
        .route("/{id}", get(scenarios::get_scenario))
        .route("/{id}/fork", post(scenarios::fork_scenario))
        .route("/{id}/archive", post(scenarios::archive_scenario))
        .route("/{id}/ancestors", get(scenarios::get_ancestors))
        .route(
            "/{id}/effective/{entity_type}",
            get(scenarios::get_effective_state),
        )
        .route(
            "/{id}/overlays/{entity_type}",
            get(scenarios::list_overlays).put(overlays::upsert_overlay),
        )
        .route(
            "/{id}/overlays/{entity_type}/{entity_id}",
            delete(overlays::remove_overlay),
        )
        .route("/{id}/compare/{other_id}", get(scenarios::compare))
        .route("/{id}/merge/{target_id}", post(merges::merge_scenario))
        .route("/{id}/merges", get(merges::list_merges))
        .route("/{id}/conflicts", get(merges::list_pending_conflicts))
}
