//! Writes into a scenario: overlay rows for branches and sandboxes,
//! revision-stamped baseline records for the baseline.

use serde::Serialize;
use sqlx::{PgConnection, PgPool};

use capplan_core::error::CoreError;
use capplan_core::merge::PlannedWrite;
use capplan_core::overlay::{ChangeType, EntityRecord, EntityType};
use capplan_core::resolver::PlanData;
use capplan_core::scenario::{ensure_writable, ScenarioNode};
use capplan_core::types::{DbId, Revision};
use capplan_db::models::overlay::UpsertOverlay;
use capplan_db::repositories::{BaselineRepo, OverlayRepo, RevisionRepo};

use super::lock_scenario;
use super::snapshot::{begin_write, load_plan_data};
use crate::error::AppResult;

/// A change recorded in a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct AppliedWrite {
    pub scenario_id: DbId,
    pub entity_type: EntityType,
    pub entity_id: DbId,
    pub change_type: ChangeType,
    pub data: Option<EntityRecord>,
    pub revision: Revision,
}

/// Record `write` in `target`. The baseline gets its record inserted,
/// updated or soft-deleted directly; any other scenario gets an overlay.
pub(crate) async fn apply_write(
    conn: &mut PgConnection,
    target: &ScenarioNode,
    write: &PlannedWrite,
    created_by: Option<&str>,
) -> AppResult<AppliedWrite> {
    if !target.is_baseline() {
        let overlay = OverlayRepo::insert(
            conn,
            target.id,
            write.entity_type,
            write.entity_id,
            write.change_type,
            write.data.as_ref(),
            created_by,
        )
        .await?;
        return Ok(AppliedWrite {
            scenario_id: overlay.scenario_id,
            entity_type: overlay.entity_type,
            entity_id: overlay.entity_id,
            change_type: overlay.change_type,
            data: overlay.data,
            revision: overlay.revision,
        });
    }

    let revision = RevisionRepo::next(&mut *conn).await?;
    match &write.data {
        Some(record) => {
            BaselineRepo::upsert(&mut *conn, write.entity_id, record, revision).await?;
        }
        None => {
            BaselineRepo::soft_delete(&mut *conn, write.entity_type, write.entity_id, revision)
                .await?;
        }
    }
    Ok(AppliedWrite {
        scenario_id: target.id,
        entity_type: write.entity_type,
        entity_id: write.entity_id,
        change_type: write.change_type,
        data: write.data.clone(),
        revision,
    })
}

/// Whether `scenario_id` itself introduced the entity with an `added`
/// overlay.
fn introduced_in(data: &PlanData, scenario_id: DbId, entity_type: EntityType, entity_id: DbId) -> bool {
    data.overlays(entity_type).iter().any(|o| {
        o.scenario_id == scenario_id && o.entity_id == entity_id && o.change_type == ChangeType::Added
    })
}

/// Add an entity to a scenario, or change one the scenario can see.
///
/// In the baseline this writes the baseline record itself. Elsewhere an
/// entity visible in the parent is `modified`, one this scenario added is
/// re-stated as `added`, and anything else is rejected.
pub async fn upsert_scenario_overlay(
    pool: &PgPool,
    scenario_id: DbId,
    entity_type: EntityType,
    input: &UpsertOverlay,
) -> AppResult<AppliedWrite> {
    input.data.ensure_type(entity_type)?;
    input.data.validate()?;

    let mut tx = begin_write(pool).await?;
    let node = lock_scenario(&mut *tx, scenario_id).await?.to_node()?;
    ensure_writable(&node)?;

    let (entity_id, change_type) = match input.entity_id {
        None => (
            BaselineRepo::mint_entity_id(&mut *tx, entity_type).await?,
            ChangeType::Added,
        ),
        Some(entity_id) => {
            let data = load_plan_data(&mut *tx, &[scenario_id]).await?;
            // The baseline changes its own records; others shadow the parent's.
            let base_scenario = node.parent_id.unwrap_or(scenario_id);
            let change_type = if data
                .effective_record(base_scenario, entity_type, entity_id)?
                .is_some()
            {
                ChangeType::Modified
            } else if !node.is_baseline()
                && introduced_in(&data, scenario_id, entity_type, entity_id)
            {
                ChangeType::Added
            } else {
                return Err(CoreError::Validation(format!(
                    "{} {entity_id} is not visible in scenario {scenario_id}",
                    entity_type.label()
                ))
                .into());
            };
            (entity_id, change_type)
        }
    };

    let write = PlannedWrite {
        entity_type,
        entity_id,
        change_type,
        data: Some(input.data.clone()),
    };
    let applied = apply_write(&mut *tx, &node, &write, input.created_by.as_deref()).await?;
    tx.commit().await?;

    tracing::info!(
        scenario_id,
        entity_type = %entity_type,
        entity_id,
        change_type = %change_type,
        revision = applied.revision,
        "Scenario entity written"
    );

    Ok(applied)
}

/// Remove an entity from a scenario. The entity must be part of the
/// scenario's effective state. `removed_by` is recorded as the author of
/// the `removed` overlay.
pub async fn remove_scenario_overlay(
    pool: &PgPool,
    scenario_id: DbId,
    entity_type: EntityType,
    entity_id: DbId,
    removed_by: Option<&str>,
) -> AppResult<AppliedWrite> {
    let mut tx = begin_write(pool).await?;
    let node = lock_scenario(&mut *tx, scenario_id).await?.to_node()?;
    ensure_writable(&node)?;

    let data = load_plan_data(&mut *tx, &[scenario_id]).await?;
    if data.effective_record(scenario_id, entity_type, entity_id)?.is_none() {
        return Err(CoreError::Validation(format!(
            "{} {entity_id} is not visible in scenario {scenario_id}",
            entity_type.label()
        ))
        .into());
    }

    let write = PlannedWrite {
        entity_type,
        entity_id,
        change_type: ChangeType::Removed,
        data: None,
    };
    let applied = apply_write(&mut *tx, &node, &write, removed_by).await?;
    tx.commit().await?;

    tracing::info!(
        scenario_id,
        entity_type = %entity_type,
        entity_id,
        revision = applied.revision,
        "Scenario entity removed"
    );

    Ok(applied)
}
