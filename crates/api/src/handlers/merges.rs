//! Handlers for merging scenarios and resolving merge conflicts.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;

use capplan_core::types::DbId;
use capplan_db::models::merge::{MergeOptions, MergeWithConflicts, ResolveConflict};
use capplan_db::repositories::{MergeConflictRepo, MergeRepo};

use crate::error::{AppError, AppResult};
use crate::handlers::scenarios::ensure_scenario_exists;
use crate::planning::merge;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// POST /scenarios/{id}/merge/{target_id}
// ---------------------------------------------------------------------------

/// Merge scenario `id` into `target_id`. Conflicts are part of a
/// successful response, not an error.
///
/// The body is optional; without one, conflicts are left `pending`.
pub async fn merge_scenario(
    State(state): State<AppState>,
    Path((id, target_id)): Path<(DbId, DbId)>,
    body: Option<Json<MergeOptions>>,
) -> AppResult<impl IntoResponse> {
    let options = body.map(|Json(o)| o).unwrap_or_default();
    let outcome = merge::merge_scenario(&state.pool, id, target_id, &options).await?;
    Ok(Json(DataResponse { data: outcome }))
}

// ---------------------------------------------------------------------------
// GET /scenarios/{id}/merges
// ---------------------------------------------------------------------------

/// Merge attempts the scenario took part in, as source or target.
pub async fn list_merges(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    ensure_scenario_exists(&state.pool, id).await?;
    let merges = MergeRepo::list_by_scenario(&state.pool, id).await?;

    tracing::debug!(scenario_id = id, count = merges.len(), "Listed merge attempts");

    Ok(Json(DataResponse { data: merges }))
}

// ---------------------------------------------------------------------------
// GET /scenarios/{id}/conflicts
// ---------------------------------------------------------------------------

/// Pending conflicts of open merge attempts targeting the scenario.
pub async fn list_pending_conflicts(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    ensure_scenario_exists(&state.pool, id).await?;
    let conflicts = MergeConflictRepo::list_pending_for_target(&state.pool, id).await?;
    Ok(Json(DataResponse { data: conflicts }))
}

// ---------------------------------------------------------------------------
// GET /merges/{id}
// ---------------------------------------------------------------------------

pub async fn get_merge(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let merge = MergeRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("ScenarioMerge", id))?;
    let conflicts = MergeConflictRepo::list_by_merge(&state.pool, id).await?;

    Ok(Json(DataResponse {
        data: MergeWithConflicts { merge, conflicts },
    }))
}

// ---------------------------------------------------------------------------
// POST /conflicts/{id}/resolve
// ---------------------------------------------------------------------------

pub async fn resolve_conflict(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(body): Json<ResolveConflict>,
) -> AppResult<impl IntoResponse> {
    let resolved = merge::resolve_conflict(&state.pool, id, &body).await?;
    Ok(Json(DataResponse { data: resolved }))
}
