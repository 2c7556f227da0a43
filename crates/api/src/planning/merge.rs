//! Merge execution and conflict resolution.
//!
//! A merge is one transaction: the clean writes into the target, the
//! conflict rows, the attempt row and the status changes commit together.

use serde::Serialize;
use sqlx::{PgConnection, PgPool};

use capplan_core::merge::{
    choose_resolution, ensure_resolvable, plan_merge, status_after, write_for, ConflictStrategy,
    MergeStatus, Resolution,
};
use capplan_core::scenario::{ensure_writable, validate_merge_pair};
use capplan_core::types::DbId;
use capplan_db::models::merge::{
    CreateMergeConflict, CreateScenarioMerge, MergeConflict, MergeOptions, ResolveConflict,
    ScenarioMerge,
};
use capplan_db::repositories::{MergeConflictRepo, MergeRepo, ScenarioRepo};

use super::lock_pair;
use super::overlay::apply_write;
use super::snapshot::{begin_write, load_plan_data};
use crate::error::{AppError, AppResult};

/// Result of `POST /scenarios/{id}/merge/{target_id}`.
#[derive(Debug, Serialize)]
pub struct MergeOutcome {
    pub merge_result: ScenarioMerge,
    pub conflicts: Vec<MergeConflict>,
}

/// Result of `POST /conflicts/{id}/resolve`.
#[derive(Debug, Serialize)]
pub struct ResolvedConflict {
    pub conflict: MergeConflict,
    pub merge: ScenarioMerge,
}

/// Mark the source of a completed merge as merged. Only an active,
/// non-baseline source changes status.
async fn retire_source(conn: &mut PgConnection, merge: &ScenarioMerge) -> AppResult<()> {
    let retired = ScenarioRepo::retire(conn, merge.source_scenario_id).await?;
    if retired.is_none() {
        tracing::debug!(
            merge_id = merge.id,
            source_id = merge.source_scenario_id,
            "Merge source kept its status"
        );
    }
    Ok(())
}

/// Merge `source_id` into `target_id`.
///
/// Prior open attempts between the same pair are superseded. Conflicts are
/// stored as `pending` unless `options.conflict_strategy` settles them.
pub async fn merge_scenario(
    pool: &PgPool,
    source_id: DbId,
    target_id: DbId,
    options: &MergeOptions,
) -> AppResult<MergeOutcome> {
    let strategy = options
        .conflict_strategy
        .as_deref()
        .map(ConflictStrategy::from_str_db)
        .transpose()?;

    let mut tx = begin_write(pool).await?;
    lock_pair(&mut *tx, source_id, target_id).await?;

    let data = load_plan_data(&mut *tx, &[source_id, target_id]).await?;
    let plan = plan_merge(&data, source_id, target_id, strategy)?;
    let target = data.graph().get(target_id)?;

    let superseded = MergeRepo::supersede_open(&mut *tx, source_id, target_id).await?;

    let merge = MergeRepo::create(
        &mut *tx,
        &CreateScenarioMerge {
            source_scenario_id: source_id,
            target_scenario_id: target_id,
            common_ancestor_id: plan.common_ancestor_id,
            conflict_strategy: strategy.map(|s| s.as_str().to_string()),
            initiated_by: options.initiated_by.clone(),
        },
    )
    .await?;

    for write in &plan.writes {
        apply_write(&mut *tx, target, write, options.initiated_by.as_deref()).await?;
    }

    let status = plan.status();
    let mut conflicts = Vec::with_capacity(plan.conflicts.len());
    for planned in plan.conflicts {
        let resolved_by = if planned.resolution.is_terminal() {
            options.initiated_by.clone()
        } else {
            None
        };
        let conflict = MergeConflictRepo::create(
            &mut *tx,
            &CreateMergeConflict {
                merge_id: merge.id,
                source_scenario_id: source_id,
                target_scenario_id: target_id,
                conflict: planned.conflict,
                resolution: planned.resolution,
                resolved_data: planned.resolved_data,
                resolved_by,
            },
        )
        .await?;
        conflicts.push(conflict);
    }

    let merge = MergeRepo::finish(
        &mut *tx,
        merge.id,
        status,
        plan.writes.len() as i32,
        conflicts.len() as i32,
    )
    .await?;
    if status == MergeStatus::Completed {
        retire_source(&mut *tx, &merge).await?;
    }
    tx.commit().await?;

    tracing::info!(
        merge_id = merge.id,
        source_id,
        target_id,
        common_ancestor_id = merge.common_ancestor_id,
        applied = merge.applied_count,
        conflicts = merge.conflict_count,
        skipped = plan.skipped,
        superseded,
        status = %status,
        "Merge executed"
    );

    Ok(MergeOutcome {
        merge_result: merge,
        conflicts,
    })
}

/// Settle one pending conflict and apply the chosen record to the target.
///
/// `use_target` keeps the target as it is. The attempt completes (and its
/// source becomes merged) once no pending conflicts remain.
pub async fn resolve_conflict(
    pool: &PgPool,
    conflict_id: DbId,
    input: &ResolveConflict,
) -> AppResult<ResolvedConflict> {
    let resolution = Resolution::from_str_db(&input.resolution)?;

    let not_found = || AppError::not_found("MergeConflict", conflict_id);
    let stored = MergeConflictRepo::find_by_id(pool, conflict_id)
        .await?
        .ok_or_else(not_found)?;

    let mut tx = begin_write(pool).await?;
    lock_pair(&mut *tx, stored.source_scenario_id, stored.target_scenario_id).await?;

    let conflict = MergeConflictRepo::lock(&mut *tx, conflict_id)
        .await?
        .ok_or_else(not_found)?;
    let merge = MergeRepo::lock(&mut *tx, conflict.merge_id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;
    ensure_resolvable(conflict_id, conflict.resolution()?, merge.merge_status()?)?;

    let detected = conflict.to_detected()?;
    let chosen = choose_resolution(&detected, resolution, input.resolved_data.clone())?;

    let target_id = conflict.target_scenario_id;
    let data = load_plan_data(&mut *tx, &[target_id]).await?;
    let target = data.graph().get(target_id)?;
    ensure_writable(target)?;
    validate_merge_pair(data.graph().get(conflict.source_scenario_id)?, target)?;

    let mut applied = 0;
    if resolution != Resolution::UseTarget {
        let current = data.effective_record(target_id, detected.entity_type, detected.entity_id)?;
        if let Some(write) = write_for(
            detected.entity_type,
            detected.entity_id,
            chosen.as_ref(),
            current.as_ref(),
        ) {
            apply_write(&mut *tx, target, &write, input.resolved_by.as_deref()).await?;
            applied = 1;
        }
    }

    let conflict = MergeConflictRepo::resolve(
        &mut *tx,
        conflict_id,
        resolution,
        chosen.as_ref(),
        input.resolved_by.as_deref(),
    )
    .await?;

    let pending = MergeConflictRepo::count_pending(&mut *tx, merge.id).await?;
    let status = status_after(pending as usize);
    let merge = MergeRepo::finish(
        &mut *tx,
        merge.id,
        status,
        merge.applied_count + applied,
        merge.conflict_count,
    )
    .await?;
    if status == MergeStatus::Completed {
        retire_source(&mut *tx, &merge).await?;
    }
    tx.commit().await?;

    tracing::info!(
        conflict_id,
        merge_id = merge.id,
        entity_type = %detected.entity_type,
        entity_id = detected.entity_id,
        resolution = %resolution,
        applied,
        pending,
        "Merge conflict resolved"
    );

    Ok(ResolvedConflict { conflict, merge })
}
