//! Scenario lifecycle: fork and archive.

use sqlx::PgPool;

use capplan_core::scenario::{
    validate_archive, validate_fork, validate_scenario_description, validate_scenario_name,
    ScenarioStatus, ScenarioType,
};
use capplan_core::types::DbId;
use capplan_db::models::scenario::{ForkScenario, Scenario};
use capplan_db::repositories::{MergeRepo, ScenarioRepo};

use super::lock_scenario;
use super::snapshot::{begin_write, load_graph};
use crate::error::AppResult;

/// Fork a new branch or sandbox off `parent_id`. Its branch point is a
/// fresh revision, so the parent's later changes are visible to it but are
/// reported as the parent's changes when merging.
pub async fn fork_scenario(pool: &PgPool, parent_id: DbId, input: &ForkScenario) -> AppResult<Scenario> {
    validate_scenario_name(&input.name)?;
    validate_scenario_description(input.description.as_deref())?;
    let scenario_type = match input.scenario_type.as_deref() {
        Some(s) => ScenarioType::from_str_db(s)?,
        None => ScenarioType::Branch,
    };

    let mut tx = begin_write(pool).await?;
    let parent = lock_scenario(&mut *tx, parent_id).await?.to_node()?;
    let graph = load_graph(&mut *tx).await?;
    validate_fork(&parent, graph.depth(parent_id)?, scenario_type)?;

    let scenario = ScenarioRepo::fork(
        &mut *tx,
        parent_id,
        &input.name,
        input.description.as_deref(),
        scenario_type,
        input.created_by.as_deref(),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        scenario_id = scenario.id,
        parent_id,
        scenario_type = %scenario.scenario_type,
        branch_point = scenario.branch_point,
        "Scenario forked"
    );

    Ok(scenario)
}

/// Archive a scenario. Archived scenarios stay readable but accept no
/// writes, forks or merges. Open merge attempts it takes part in are
/// superseded, so their conflicts can no longer be resolved.
pub async fn archive_scenario(pool: &PgPool, id: DbId) -> AppResult<Scenario> {
    let mut tx = begin_write(pool).await?;
    let node = lock_scenario(&mut *tx, id).await?.to_node()?;
    validate_archive(&node)?;

    let superseded = MergeRepo::supersede_involving(&mut *tx, id).await?;
    let scenario = ScenarioRepo::set_status(&mut *tx, id, ScenarioStatus::Archived)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;
    tx.commit().await?;

    tracing::info!(scenario_id = id, superseded, "Scenario archived");
    Ok(scenario)
}
