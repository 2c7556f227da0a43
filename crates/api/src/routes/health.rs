//! Liveness endpoint, mounted at the root rather than under `/api/v1`.

use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use capplan_core::types::DbId;
use capplan_db::repositories::ScenarioRepo;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the database cannot be reached.
    pub status: &'static str,
    pub version: &'static str,
    pub db_healthy: bool,
    /// `None` until the plan of record has been created.
    pub baseline_scenario_id: Option<DbId>,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let baseline = match capplan_db::health_check(&state.pool).await {
        Ok(()) => ScenarioRepo::find_baseline(&state.pool).await.map(|b| b.map(|s| s.id)),
        Err(e) => Err(e),
    };

    let (status, db_healthy, baseline_scenario_id) = match baseline {
        Ok(id) => ("ok", true, id),
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not reach the database");
            ("degraded", false, None)
        }
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        baseline_scenario_id,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
