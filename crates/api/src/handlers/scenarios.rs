//! Handlers for the scenario hierarchy and read-only plan views.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use capplan_core::comparison::compare_scenarios;
use capplan_core::overlay::EntityType;
use capplan_core::scenario::{validate_scenario_description, validate_scenario_name};
use capplan_core::types::DbId;
use capplan_db::models::scenario::{CreateScenario, ForkScenario, Scenario};
use capplan_db::repositories::{OverlayRepo, ScenarioRepo};

use crate::error::{AppError, AppResult};
use crate::planning::{scenario as lifecycle, snapshot};
use crate::query::IncludeArchivedParams;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Verify that a scenario exists, returning the full row.
pub(crate) async fn ensure_scenario_exists(pool: &sqlx::PgPool, id: DbId) -> AppResult<Scenario> {
    ScenarioRepo::find_by_id(pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("Scenario", id))
}

// ---------------------------------------------------------------------------
// POST /scenarios
// ---------------------------------------------------------------------------

/// Create the baseline scenario. A second baseline is a 409.
pub async fn create_baseline(
    State(state): State<AppState>,
    Json(body): Json<CreateScenario>,
) -> AppResult<impl IntoResponse> {
    validate_scenario_name(&body.name)?;
    validate_scenario_description(body.description.as_deref())?;

    let scenario = ScenarioRepo::create_baseline(&state.pool, &body).await?;

    tracing::info!(scenario_id = scenario.id, name = %scenario.name, "Baseline scenario created");

    Ok((StatusCode::CREATED, Json(DataResponse { data: scenario })))
}

// ---------------------------------------------------------------------------
// GET /scenarios
// ---------------------------------------------------------------------------

pub async fn list_scenarios(
    State(state): State<AppState>,
    Query(params): Query<IncludeArchivedParams>,
) -> AppResult<impl IntoResponse> {
    let scenarios = ScenarioRepo::list(&state.pool, params.include_archived).await?;

    tracing::debug!(
        count = scenarios.len(),
        include_archived = params.include_archived,
        "Listed scenarios"
    );

    Ok(Json(DataResponse { data: scenarios }))
}

// ---------------------------------------------------------------------------
// GET /scenarios/{id}
// ---------------------------------------------------------------------------

pub async fn get_scenario(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let scenario = ensure_scenario_exists(&state.pool, id).await?;
    Ok(Json(DataResponse { data: scenario }))
}

// ---------------------------------------------------------------------------
// POST /scenarios/{id}/fork
// ---------------------------------------------------------------------------

/// Fork a branch (default) or sandbox from an existing scenario.
pub async fn fork_scenario(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(body): Json<ForkScenario>,
) -> AppResult<impl IntoResponse> {
    let scenario = lifecycle::fork_scenario(&state.pool, id, &body).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: scenario })))
}

// ---------------------------------------------------------------------------
// POST /scenarios/{id}/archive
// ---------------------------------------------------------------------------

pub async fn archive_scenario(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let scenario = lifecycle::archive_scenario(&state.pool, id).await?;
    Ok(Json(DataResponse { data: scenario }))
}

// ---------------------------------------------------------------------------
// GET /scenarios/{id}/ancestors
// ---------------------------------------------------------------------------

/// The scenario followed by each of its ancestors up to the baseline.
pub async fn get_ancestors(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let mut conn = state.pool.acquire().await?;
    let rows = ScenarioRepo::list_all(&mut *conn).await?;

    let path = snapshot::graph_from_rows(&rows)?.ancestor_path(id)?;
    let ancestors: Vec<Scenario> = path
        .iter()
        .filter_map(|sid| rows.iter().find(|s| s.id == *sid).cloned())
        .collect();

    Ok(Json(DataResponse { data: ancestors }))
}

// ---------------------------------------------------------------------------
// GET /scenarios/{id}/effective/{entity_type}
// ---------------------------------------------------------------------------

/// The scenario's resolved records of one entity type.
pub async fn get_effective_state(
    State(state): State<AppState>,
    Path((id, entity_type)): Path<(DbId, String)>,
) -> AppResult<impl IntoResponse> {
    let entity_type = EntityType::from_str_db(&entity_type)?;
    let data = snapshot::read_plan(&state.pool, &[id]).await?;
    let effective = data.resolve(id, entity_type)?;

    tracing::debug!(
        scenario_id = id,
        entity_type = %entity_type,
        count = effective.len(),
        "Resolved effective state"
    );

    Ok(Json(DataResponse {
        data: effective.entities(),
    }))
}

// ---------------------------------------------------------------------------
// GET /scenarios/{id}/overlays/{entity_type}
// ---------------------------------------------------------------------------

/// The scenario's own overlay log for one entity type, oldest first.
pub async fn list_overlays(
    State(state): State<AppState>,
    Path((id, entity_type)): Path<(DbId, String)>,
) -> AppResult<impl IntoResponse> {
    let entity_type = EntityType::from_str_db(&entity_type)?;
    ensure_scenario_exists(&state.pool, id).await?;

    let mut conn = state.pool.acquire().await?;
    let overlays = OverlayRepo::list_by_scenario(&mut *conn, entity_type, id).await?;

    Ok(Json(DataResponse { data: overlays }))
}

// ---------------------------------------------------------------------------
// GET /scenarios/{id}/compare/{other_id}
// ---------------------------------------------------------------------------

/// Compare scenario `id` (source) against `other_id` (target).
pub async fn compare(
    State(state): State<AppState>,
    Path((id, other_id)): Path<(DbId, DbId)>,
) -> AppResult<impl IntoResponse> {
    let data = snapshot::read_plan(&state.pool, &[id, other_id]).await?;
    let comparison = compare_scenarios(&data, id, other_id)?;

    tracing::debug!(
        source_id = id,
        target_id = other_id,
        total_changes = comparison.total_changes,
        "Compared scenarios"
    );

    Ok(Json(DataResponse { data: comparison }))
}
