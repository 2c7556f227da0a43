//! Overlay rows for the three `*_overlays` tables.
//!
//! The tables store concrete nullable columns; [`OverlayEntry`] turns a row
//! back into the typed [`Overlay`] the resolver works with.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use capplan_core::error::CoreError;
use capplan_core::overlay::{
    AssignmentFields, ChangeType, EntityRecord, EntityType, Overlay, PhaseTimelineFields,
    ProjectFields,
};
use capplan_core::types::{DbId, Revision, Timestamp};

/// An overlay together with its audit columns, as listed by the overlay log.
#[derive(Debug, Clone, Serialize)]
pub struct OverlayEntry {
    #[serde(flatten)]
    pub overlay: Overlay,
    pub created_by: Option<String>,
    pub created_at: Timestamp,
}

/// Request body for `PUT /scenarios/{id}/overlays/{entity_type}`.
///
/// Without `entity_id` a new entity is added; with it, the entity is
/// changed in the scenario.
#[derive(Debug, Clone, Deserialize)]
pub struct UpsertOverlay {
    pub entity_id: Option<DbId>,
    pub data: EntityRecord,
    pub created_by: Option<String>,
}

/// Unwrap a payload column that must be present on non-`removed` rows.
fn required<T>(value: Option<T>, table: &str, column: &str, id: DbId) -> Result<T, CoreError> {
    value.ok_or_else(|| {
        CoreError::Internal(format!("{table} row {id} is missing {column}"))
    })
}

// ---------------------------------------------------------------------------
// Project overlays
// ---------------------------------------------------------------------------

/// A row from the `project_overlays` table.
#[derive(Debug, Clone, FromRow)]
pub struct ProjectOverlayRow {
    pub id: DbId,
    pub scenario_id: DbId,
    pub entity_id: DbId,
    pub change_type: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub priority: Option<i32>,
    pub include_in_demand: Option<bool>,
    pub target_start: Option<NaiveDate>,
    pub target_end: Option<NaiveDate>,
    pub revision: Revision,
    pub created_by: Option<String>,
    pub created_at: Timestamp,
}

impl ProjectOverlayRow {
    pub fn into_entry(self) -> Result<OverlayEntry, CoreError> {
        const TABLE: &str = "project_overlays";
        let change_type = ChangeType::from_str_db(&self.change_type)?;
        let data = match change_type {
            ChangeType::Removed => None,
            ChangeType::Added | ChangeType::Modified => Some(EntityRecord::Project(ProjectFields {
                name: required(self.name, TABLE, "name", self.id)?,
                description: self.description,
                priority: required(self.priority, TABLE, "priority", self.id)?,
                include_in_demand: required(
                    self.include_in_demand,
                    TABLE,
                    "include_in_demand",
                    self.id,
                )?,
                target_start: self.target_start,
                target_end: self.target_end,
            })),
        };
        Ok(OverlayEntry {
            overlay: Overlay {
                id: self.id,
                scenario_id: self.scenario_id,
                entity_type: EntityType::Project,
                entity_id: self.entity_id,
                change_type,
                data,
                revision: self.revision,
            },
            created_by: self.created_by,
            created_at: self.created_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Phase timeline overlays
// ---------------------------------------------------------------------------

/// A row from the `phase_timeline_overlays` table.
#[derive(Debug, Clone, FromRow)]
pub struct PhaseTimelineOverlayRow {
    pub id: DbId,
    pub scenario_id: DbId,
    pub entity_id: DbId,
    pub change_type: String,
    pub project_id: Option<DbId>,
    pub phase_id: Option<DbId>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub revision: Revision,
    pub created_by: Option<String>,
    pub created_at: Timestamp,
}

impl PhaseTimelineOverlayRow {
    pub fn into_entry(self) -> Result<OverlayEntry, CoreError> {
        const TABLE: &str = "phase_timeline_overlays";
        let change_type = ChangeType::from_str_db(&self.change_type)?;
        let data = match change_type {
            ChangeType::Removed => None,
            ChangeType::Added | ChangeType::Modified => {
                Some(EntityRecord::PhaseTimeline(PhaseTimelineFields {
                    project_id: required(self.project_id, TABLE, "project_id", self.id)?,
                    phase_id: required(self.phase_id, TABLE, "phase_id", self.id)?,
                    start_date: required(self.start_date, TABLE, "start_date", self.id)?,
                    end_date: required(self.end_date, TABLE, "end_date", self.id)?,
                }))
            }
        };
        Ok(OverlayEntry {
            overlay: Overlay {
                id: self.id,
                scenario_id: self.scenario_id,
                entity_type: EntityType::PhaseTimeline,
                entity_id: self.entity_id,
                change_type,
                data,
                revision: self.revision,
            },
            created_by: self.created_by,
            created_at: self.created_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Assignment overlays
// ---------------------------------------------------------------------------

/// A row from the `assignment_overlays` table.
#[derive(Debug, Clone, FromRow)]
pub struct AssignmentOverlayRow {
    pub id: DbId,
    pub scenario_id: DbId,
    pub entity_id: DbId,
    pub change_type: String,
    pub project_id: Option<DbId>,
    pub person_id: Option<DbId>,
    pub role_id: Option<DbId>,
    pub phase_id: Option<DbId>,
    pub allocation_percentage: Option<f64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub revision: Revision,
    pub created_by: Option<String>,
    pub created_at: Timestamp,
}

impl AssignmentOverlayRow {
    pub fn into_entry(self) -> Result<OverlayEntry, CoreError> {
        const TABLE: &str = "assignment_overlays";
        let change_type = ChangeType::from_str_db(&self.change_type)?;
        let data = match change_type {
            ChangeType::Removed => None,
            ChangeType::Added | ChangeType::Modified => {
                Some(EntityRecord::Assignment(AssignmentFields {
                    project_id: required(self.project_id, TABLE, "project_id", self.id)?,
                    person_id: required(self.person_id, TABLE, "person_id", self.id)?,
                    role_id: self.role_id,
                    phase_id: self.phase_id,
                    allocation_percentage: required(
                        self.allocation_percentage,
                        TABLE,
                        "allocation_percentage",
                        self.id,
                    )?,
                    start_date: required(self.start_date, TABLE, "start_date", self.id)?,
                    end_date: required(self.end_date, TABLE, "end_date", self.id)?,
                    notes: self.notes,
                }))
            }
        };
        Ok(OverlayEntry {
            overlay: Overlay {
                id: self.id,
                scenario_id: self.scenario_id,
                entity_type: EntityType::Assignment,
                entity_id: self.entity_id,
                change_type,
                data,
                revision: self.revision,
            },
            created_by: self.created_by,
            created_at: self.created_at,
        })
    }
}
