//! Conflict detection between two scenarios that share a common ancestor.
//!
//! Each side's changes are measured against the common ancestor `C`:
//!
//! - a side that is not `C` changed every entity overlaid on its path
//!   strictly below `C`;
//! - a side that *is* `C` changed whatever was written on `C` after the
//!   other side forked from it (overlays, or baseline record writes when
//!   `C` is the baseline).
//!
//! An entity changed on both sides is a conflict unless both sides removed
//! it or both sides arrived at the same record with the same change type.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::CoreError;
use crate::overlay::{ChangeType, EntityRecord, EntityType, ALL_ENTITY_TYPES};
use crate::resolver::{PlanData, PlanSnapshot};
use crate::types::{DbId, Revision};

/// One side's change to an entity since the common ancestor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SideChange {
    pub entity_type: EntityType,
    pub entity_id: DbId,
    pub change_type: ChangeType,
    /// The side's effective record; `None` when the side removed it.
    pub record: Option<EntityRecord>,
}

/// An entity both sides changed in incompatible ways.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedConflict {
    pub entity_type: EntityType,
    pub entity_id: DbId,
    pub source_change: ChangeType,
    pub target_change: ChangeType,
    pub source_data: Option<EntityRecord>,
    pub target_data: Option<EntityRecord>,
}

/// Result of comparing both sides' changes.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictReport {
    pub source_id: DbId,
    pub target_id: DbId,
    pub common_ancestor_id: DbId,
    /// Source changes the target never touched, in apply order.
    pub clean: Vec<SideChange>,
    pub conflicts: Vec<DetectedConflict>,
    /// Entities both sides changed identically.
    pub in_sync: usize,
}

impl ConflictReport {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

type ChangeSet = BTreeMap<(EntityType, DbId), SideChange>;

/// Detect conflicts for merging `source_id` into `target_id`.
pub fn detect_conflicts(
    data: &PlanData,
    source_id: DbId,
    target_id: DbId,
) -> Result<ConflictReport, CoreError> {
    let source = data.snapshot(source_id)?;
    let target = data.snapshot(target_id)?;
    detect_between(data, &source, &target)
}

/// Detect conflicts between two already-resolved snapshots of `data`.
pub fn detect_between(
    data: &PlanData,
    source: &PlanSnapshot,
    target: &PlanSnapshot,
) -> Result<ConflictReport, CoreError> {
    let graph = data.graph();
    let ancestor = graph.common_ancestor(source.scenario_id, target.scenario_id)?;
    let source_path = graph.ancestor_path(source.scenario_id)?;
    let target_path = graph.ancestor_path(target.scenario_id)?;

    let source_changes = side_changes(data, source, &source_path, &target_path, ancestor)?;
    let target_changes = side_changes(data, target, &target_path, &source_path, ancestor)?;

    let mut clean = Vec::new();
    let mut conflicts = Vec::new();
    let mut in_sync = 0;

    for (key, change) in source_changes {
        match target_changes.get(&key) {
            None => clean.push(change),
            Some(other)
                if change.change_type == ChangeType::Removed
                    && other.change_type == ChangeType::Removed =>
            {
                in_sync += 1;
            }
            Some(other)
                if change.change_type == other.change_type && change.record == other.record =>
            {
                in_sync += 1;
            }
            Some(other) => conflicts.push(DetectedConflict {
                entity_type: change.entity_type,
                entity_id: change.entity_id,
                source_change: change.change_type,
                target_change: other.change_type,
                source_data: change.record,
                target_data: other.record.clone(),
            }),
        }
    }

    Ok(ConflictReport {
        source_id: source.scenario_id,
        target_id: target.scenario_id,
        common_ancestor_id: ancestor,
        clean,
        conflicts,
        in_sync,
    })
}

/// Changes made on `path` (whose head is `side`) since `ancestor`.
/// `other_path` is the opposite side's path; it determines the fork
/// revision when `side` is the ancestor itself.
fn side_changes(
    data: &PlanData,
    side: &PlanSnapshot,
    path: &[DbId],
    other_path: &[DbId],
    ancestor: DbId,
) -> Result<ChangeSet, CoreError> {
    let mut changes = ChangeSet::new();

    if side.scenario_id != ancestor {
        let below: Vec<DbId> = path.iter().copied().take_while(|id| *id != ancestor).collect();
        for entity_type in ALL_ENTITY_TYPES {
            let index = data.overlay_index(entity_type);
            for entity_id in index.entities_on(&below) {
                if let Some(overlay) = index.nearest(&below, entity_id) {
                    record_change(&mut changes, side, entity_type, entity_id, overlay.change_type);
                }
            }
        }
        return Ok(changes);
    }

    // Merging between a scenario and its own ancestor: the other side
    // forked at a known revision, anything the ancestor wrote later counts.
    let Some(fork) = data.graph().fork_revision(other_path, ancestor) else {
        return Ok(changes);
    };
    let node = data.graph().get(ancestor)?;

    for entity_type in ALL_ENTITY_TYPES {
        if node.is_baseline() {
            for record in data.baseline_records(entity_type) {
                let change = baseline_change_since(
                    record.is_deleted(),
                    record.created_revision,
                    record.revision,
                    fork,
                );
                if let Some(change_type) = change {
                    record_change(&mut changes, side, entity_type, record.entity_id, change_type);
                }
            }
        }

        let index = data.overlay_index(entity_type);
        for entity_id in index.entities_on(&[ancestor]) {
            if let Some(overlay) = index.latest(ancestor, entity_id) {
                if overlay.revision > fork {
                    record_change(&mut changes, side, entity_type, entity_id, overlay.change_type);
                }
            }
        }
    }
    Ok(changes)
}

fn record_change(
    changes: &mut ChangeSet,
    side: &PlanSnapshot,
    entity_type: EntityType,
    entity_id: DbId,
    change_type: ChangeType,
) {
    changes.insert(
        (entity_type, entity_id),
        SideChange {
            entity_type,
            entity_id,
            change_type,
            record: side.state(entity_type).get(entity_id).cloned(),
        },
    );
}

/// Classify a baseline record write relative to `fork`. A record created and
/// deleted after the fork never existed from the other side's view.
fn baseline_change_since(
    deleted: bool,
    created_revision: Revision,
    revision: Revision,
    fork: Revision,
) -> Option<ChangeType> {
    if revision <= fork {
        return None;
    }
    match (deleted, created_revision > fork) {
        (true, true) => None,
        (true, false) => Some(ChangeType::Removed),
        (false, true) => Some(ChangeType::Added),
        (false, false) => Some(ChangeType::Modified),
    }
}
