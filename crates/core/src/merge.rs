//! Merge planning: turning a conflict report into the writes a merge makes.
//!
//! Planning is pure. The service layer persists the resulting
//! [`MergePlan`] (overlay or baseline writes, conflict rows, attempt status)
//! inside one transaction.

use serde::{Deserialize, Serialize};

use crate::conflict::{detect_between, DetectedConflict};
use crate::error::CoreError;
use crate::overlay::{ChangeType, EntityRecord, EntityType};
use crate::resolver::PlanData;
use crate::scenario::validate_merge_pair;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Merge status
// ---------------------------------------------------------------------------

/// Lifecycle of one merge attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStatus {
    Initiated,
    ConflictsDetected,
    Completed,
    /// Replaced by a newer attempt between the same pair.
    Superseded,
}

impl MergeStatus {
    pub fn from_str_db(s: &str) -> Result<Self, CoreError> {
        match s {
            "initiated" => Ok(Self::Initiated),
            "conflicts_detected" => Ok(Self::ConflictsDetected),
            "completed" => Ok(Self::Completed),
            "superseded" => Ok(Self::Superseded),
            _ => Err(CoreError::Validation(format!(
                "Invalid merge status '{s}'. Must be one of: initiated, conflicts_detected, completed, superseded"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::ConflictsDetected => "conflicts_detected",
            Self::Completed => "completed",
            Self::Superseded => "superseded",
        }
    }

    /// Attempts that may still receive conflict resolutions.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Initiated | Self::ConflictsDetected)
    }
}

impl std::fmt::Display for MergeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status an attempt settles in once `pending` conflicts remain.
pub fn status_after(pending: usize) -> MergeStatus {
    if pending == 0 {
        MergeStatus::Completed
    } else {
        MergeStatus::ConflictsDetected
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// How a merge conflict was (or is yet to be) resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    UseSource,
    UseTarget,
    Manual,
    Pending,
}

impl Resolution {
    pub fn from_str_db(s: &str) -> Result<Self, CoreError> {
        match s {
            "use_source" => Ok(Self::UseSource),
            "use_target" => Ok(Self::UseTarget),
            "manual" => Ok(Self::Manual),
            "pending" => Ok(Self::Pending),
            _ => Err(CoreError::Validation(format!(
                "Invalid resolution '{s}'. Must be one of: use_source, use_target, manual, pending"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UseSource => "use_source",
            Self::UseTarget => "use_target",
            Self::Manual => "manual",
            Self::Pending => "pending",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Automatic conflict handling requested when a merge starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    UseSource,
    UseTarget,
}

impl ConflictStrategy {
    pub fn from_str_db(s: &str) -> Result<Self, CoreError> {
        match s {
            "use_source" => Ok(Self::UseSource),
            "use_target" => Ok(Self::UseTarget),
            _ => Err(CoreError::Validation(format!(
                "Invalid conflict strategy '{s}'. Must be one of: use_source, use_target"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UseSource => "use_source",
            Self::UseTarget => "use_target",
        }
    }

    pub fn resolution(self) -> Resolution {
        match self {
            Self::UseSource => Resolution::UseSource,
            Self::UseTarget => Resolution::UseTarget,
        }
    }
}

/// The record a conflict resolution settles on: the source's or target's
/// snapshot, or the caller's `manual` record. `None` means the entity is
/// removed from the target.
pub fn choose_resolution(
    conflict: &DetectedConflict,
    resolution: Resolution,
    manual: Option<EntityRecord>,
) -> Result<Option<EntityRecord>, CoreError> {
    match (resolution, manual) {
        (Resolution::Pending, _) => Err(CoreError::Validation(
            "A conflict cannot be resolved to 'pending'".to_string(),
        )),
        (Resolution::Manual, None) => Err(CoreError::Validation(
            "A manual resolution requires resolved_data".to_string(),
        )),
        (Resolution::Manual, Some(record)) => {
            record.ensure_type(conflict.entity_type)?;
            record.validate()?;
            Ok(Some(record))
        }
        (_, Some(_)) => Err(CoreError::Validation(format!(
            "resolved_data is only accepted with a manual resolution, got '{resolution}'"
        ))),
        (Resolution::UseSource, None) => Ok(conflict.source_data.clone()),
        (Resolution::UseTarget, None) => Ok(conflict.target_data.clone()),
    }
}

/// Reject resolutions of conflicts that are already settled or whose merge
/// attempt is no longer open.
pub fn ensure_resolvable(
    conflict_id: DbId,
    current: Resolution,
    merge_status: MergeStatus,
) -> Result<(), CoreError> {
    if current.is_terminal() {
        return Err(CoreError::Conflict(format!(
            "Merge conflict {conflict_id} is already resolved ({current})"
        )));
    }
    if !merge_status.is_open() {
        return Err(CoreError::Conflict(format!(
            "Merge conflict {conflict_id} belongs to a {merge_status} merge and can no longer be resolved"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// One write a merge makes into the target scenario.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedWrite {
    pub entity_type: EntityType,
    pub entity_id: DbId,
    /// Chosen from the target's point of view.
    pub change_type: ChangeType,
    pub data: Option<EntityRecord>,
}

/// A detected conflict plus its resolution at plan time (`Pending` unless a
/// [`ConflictStrategy`] settled it).
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedConflict {
    pub conflict: DetectedConflict,
    pub resolution: Resolution,
    pub resolved_data: Option<EntityRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergePlan {
    pub source_id: DbId,
    pub target_id: DbId,
    pub common_ancestor_id: DbId,
    /// Projects first, then phase timelines, then assignments.
    pub writes: Vec<PlannedWrite>,
    pub conflicts: Vec<PlannedConflict>,
    /// Source changes the target already reflects.
    pub skipped: usize,
}

impl MergePlan {
    pub fn pending_count(&self) -> usize {
        self.conflicts
            .iter()
            .filter(|c| !c.resolution.is_terminal())
            .count()
    }

    pub fn status(&self) -> MergeStatus {
        status_after(self.pending_count())
    }
}

/// The write that moves the target's `current` record to `desired`, or
/// `None` when they already agree.
pub fn write_for(
    entity_type: EntityType,
    entity_id: DbId,
    desired: Option<&EntityRecord>,
    current: Option<&EntityRecord>,
) -> Option<PlannedWrite> {
    let change_type = match (desired, current) {
        (None, None) => return None,
        (Some(d), Some(c)) if d == c => return None,
        (None, Some(_)) => ChangeType::Removed,
        (Some(_), None) => ChangeType::Added,
        (Some(_), Some(_)) => ChangeType::Modified,
    };
    Some(PlannedWrite {
        entity_type,
        entity_id,
        change_type,
        data: desired.cloned(),
    })
}

/// Plan merging `source_id` into `target_id`.
///
/// Clean source changes become writes; conflicts stay `pending` unless
/// `strategy` picks a side for all of them.
pub fn plan_merge(
    data: &PlanData,
    source_id: DbId,
    target_id: DbId,
    strategy: Option<ConflictStrategy>,
) -> Result<MergePlan, CoreError> {
    let graph = data.graph();
    validate_merge_pair(graph.get(source_id)?, graph.get(target_id)?)?;

    let source = data.snapshot(source_id)?;
    let target = data.snapshot(target_id)?;
    let report = detect_between(data, &source, &target)?;

    let mut writes = Vec::new();
    let mut skipped = report.in_sync;

    for change in &report.clean {
        let current = target.state(change.entity_type).get(change.entity_id);
        match write_for(change.entity_type, change.entity_id, change.record.as_ref(), current) {
            Some(write) => writes.push(write),
            None => skipped += 1,
        }
    }

    let mut conflicts = Vec::with_capacity(report.conflicts.len());
    for conflict in report.conflicts {
        let planned = match strategy {
            None => PlannedConflict {
                conflict,
                resolution: Resolution::Pending,
                resolved_data: None,
            },
            Some(strategy) => {
                let resolution = strategy.resolution();
                let resolved_data = choose_resolution(&conflict, resolution, None)?;
                if let Some(write) = write_for(
                    conflict.entity_type,
                    conflict.entity_id,
                    resolved_data.as_ref(),
                    conflict.target_data.as_ref(),
                ) {
                    writes.push(write);
                }
                PlannedConflict {
                    conflict,
                    resolution,
                    resolved_data,
                }
            }
        };
        conflicts.push(planned);
    }

    // Strategy writes were appended after the clean ones; restore apply order.
    writes.sort_by_key(|w| (w.entity_type, w.entity_id));

    Ok(MergePlan {
        source_id,
        target_id,
        common_ancestor_id: report.common_ancestor_id,
        writes,
        conflicts,
        skipped,
    })
}
