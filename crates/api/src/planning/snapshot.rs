//! Loading plan snapshots from the database.

use std::collections::BTreeSet;

use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use capplan_core::error::CoreError;
use capplan_core::overlay::ALL_ENTITY_TYPES;
use capplan_core::resolver::PlanData;
use capplan_core::scenario::ScenarioGraph;
use capplan_core::types::DbId;
use capplan_db::models::scenario::Scenario;
use capplan_db::repositories::{BaselineRepo, OverlayRepo, ScenarioRepo};

use crate::error::AppResult;

/// Begin a read-only transaction that sees one consistent snapshot.
pub async fn begin_read(pool: &PgPool) -> Result<Transaction<'_, Postgres>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
        .execute(&mut *tx)
        .await?;
    Ok(tx)
}

/// Begin a planning write transaction. Every read it makes sees the
/// snapshot taken by its first statement, which is the scenario lock.
pub async fn begin_write(pool: &PgPool) -> Result<Transaction<'_, Postgres>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
        .execute(&mut *tx)
        .await?;
    Ok(tx)
}

/// Build the hierarchy from scenario rows.
pub fn graph_from_rows(rows: &[Scenario]) -> AppResult<ScenarioGraph> {
    let nodes = rows
        .iter()
        .map(Scenario::to_node)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| CoreError::Internal(format!("Stored scenario row is malformed: {e}")))?;
    Ok(ScenarioGraph::new(nodes))
}

/// The full scenario hierarchy.
pub async fn load_graph(conn: &mut PgConnection) -> AppResult<ScenarioGraph> {
    let rows = ScenarioRepo::list_all(conn).await?;
    graph_from_rows(&rows)
}

/// Load everything needed to resolve the given scenarios: the hierarchy,
/// the baseline tables and the overlays held by any scenario on their
/// ancestor paths.
///
/// Unknown scenarios are reported as not found, broken hierarchies as
/// structural errors.
pub async fn load_plan_data(conn: &mut PgConnection, scenario_ids: &[DbId]) -> AppResult<PlanData> {
    let graph = load_graph(&mut *conn).await?;

    let mut on_paths = BTreeSet::new();
    for &id in scenario_ids {
        on_paths.extend(graph.ancestor_path(id)?);
    }
    let on_paths: Vec<DbId> = on_paths.into_iter().collect();

    let mut data = PlanData::new(graph);
    for entity_type in ALL_ENTITY_TYPES {
        let baseline = BaselineRepo::list_all(&mut *conn, entity_type).await?;
        data.insert_baseline(entity_type, baseline);

        let overlays = OverlayRepo::list_for_scenarios(&mut *conn, entity_type, &on_paths).await?;
        data.insert_overlays(overlays.into_iter().map(|e| e.overlay))?;
    }

    tracing::debug!(
        scenarios = on_paths.len(),
        "Loaded plan snapshot"
    );
    Ok(data)
}

/// Load a plan snapshot in its own read-only transaction.
pub async fn read_plan(pool: &PgPool, scenario_ids: &[DbId]) -> AppResult<PlanData> {
    let mut tx = begin_read(pool).await?;
    let data = load_plan_data(&mut *tx, scenario_ids).await?;
    tx.commit().await?;
    Ok(data)
}
