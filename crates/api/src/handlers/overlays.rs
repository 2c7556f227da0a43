//! Handlers for writing entities into a scenario.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use capplan_core::overlay::{ChangeType, EntityType};
use capplan_core::types::DbId;
use capplan_db::models::overlay::UpsertOverlay;

use crate::error::AppResult;
use crate::planning::overlay;
use crate::query::RemoveOverlayParams;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// PUT /scenarios/{id}/overlays/{entity_type}
// ---------------------------------------------------------------------------

/// Add or change an entity in a scenario. Responds 201 when a new entity
/// was added.
pub async fn upsert_overlay(
    State(state): State<AppState>,
    Path((id, entity_type)): Path<(DbId, String)>,
    Json(body): Json<UpsertOverlay>,
) -> AppResult<impl IntoResponse> {
    let entity_type = EntityType::from_str_db(&entity_type)?;
    let applied = overlay::upsert_scenario_overlay(&state.pool, id, entity_type, &body).await?;

    let status = if body.entity_id.is_none() && applied.change_type == ChangeType::Added {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(DataResponse { data: applied })))
}

// ---------------------------------------------------------------------------
// DELETE /scenarios/{id}/overlays/{entity_type}/{entity_id}
// ---------------------------------------------------------------------------

/// Remove an entity from a scenario. `?removed_by=` names the actor.
pub async fn remove_overlay(
    State(state): State<AppState>,
    Path((id, entity_type, entity_id)): Path<(DbId, String, DbId)>,
    Query(params): Query<RemoveOverlayParams>,
) -> AppResult<impl IntoResponse> {
    let entity_type = EntityType::from_str_db(&entity_type)?;
    let applied = overlay::remove_scenario_overlay(
        &state.pool,
        id,
        entity_type,
        entity_id,
        params.removed_by.as_deref(),
    )
    .await?;
    Ok(Json(DataResponse { data: applied }))
}
