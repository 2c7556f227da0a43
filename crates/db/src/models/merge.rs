//! Merge attempt and merge conflict rows, plus their DTOs.

use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

use capplan_core::conflict::DetectedConflict;
use capplan_core::error::CoreError;
use capplan_core::merge::{MergeStatus, Resolution};
use capplan_core::overlay::{ChangeType, EntityRecord, EntityType};
use capplan_core::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Merge attempt
// ---------------------------------------------------------------------------

/// A row from the `scenario_merges` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ScenarioMerge {
    pub id: DbId,
    pub source_scenario_id: DbId,
    pub target_scenario_id: DbId,
    pub common_ancestor_id: DbId,
    pub status: String,
    pub conflict_strategy: Option<String>,
    pub applied_count: i32,
    pub conflict_count: i32,
    pub initiated_by: Option<String>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ScenarioMerge {
    pub fn merge_status(&self) -> Result<MergeStatus, CoreError> {
        MergeStatus::from_str_db(&self.status)
    }
}

/// Input for recording a new merge attempt.
#[derive(Debug, Clone)]
pub struct CreateScenarioMerge {
    pub source_scenario_id: DbId,
    pub target_scenario_id: DbId,
    pub common_ancestor_id: DbId,
    pub conflict_strategy: Option<String>,
    pub initiated_by: Option<String>,
}

/// Request body for `POST /scenarios/{id}/merge/{target_id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MergeOptions {
    /// `use_source` or `use_target` to settle every conflict immediately.
    pub conflict_strategy: Option<String>,
    pub initiated_by: Option<String>,
}

// ---------------------------------------------------------------------------
// Merge conflict
// ---------------------------------------------------------------------------

/// A row from the `merge_conflicts` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MergeConflict {
    pub id: DbId,
    pub merge_id: DbId,
    pub source_scenario_id: DbId,
    pub target_scenario_id: DbId,
    pub conflict_type: String,
    pub entity_id: DbId,
    pub source_change_type: String,
    pub target_change_type: String,
    pub source_data: Option<Json<EntityRecord>>,
    pub target_data: Option<Json<EntityRecord>>,
    pub resolution: String,
    pub resolved_data: Option<Json<EntityRecord>>,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl MergeConflict {
    pub fn resolution(&self) -> Result<Resolution, CoreError> {
        Resolution::from_str_db(&self.resolution)
    }

    /// The stored conflict as the core resolution logic sees it.
    pub fn to_detected(&self) -> Result<DetectedConflict, CoreError> {
        Ok(DetectedConflict {
            entity_type: EntityType::from_str_db(&self.conflict_type)?,
            entity_id: self.entity_id,
            source_change: ChangeType::from_str_db(&self.source_change_type)?,
            target_change: ChangeType::from_str_db(&self.target_change_type)?,
            source_data: self.source_data.as_ref().map(|j| j.0.clone()),
            target_data: self.target_data.as_ref().map(|j| j.0.clone()),
        })
    }
}

/// Input for persisting a conflict found by a merge attempt.
#[derive(Debug, Clone)]
pub struct CreateMergeConflict {
    pub merge_id: DbId,
    pub source_scenario_id: DbId,
    pub target_scenario_id: DbId,
    pub conflict: DetectedConflict,
    pub resolution: Resolution,
    pub resolved_data: Option<EntityRecord>,
    pub resolved_by: Option<String>,
}

/// Request body for `POST /conflicts/{id}/resolve`.
#[derive(Debug, Clone, Deserialize)]
pub struct ResolveConflict {
    pub resolution: String,
    pub resolved_data: Option<EntityRecord>,
    pub resolved_by: Option<String>,
}

/// A merge attempt with its conflicts.
#[derive(Debug, Serialize)]
pub struct MergeWithConflicts {
    #[serde(flatten)]
    pub merge: ScenarioMerge,
    pub conflicts: Vec<MergeConflict>,
}
