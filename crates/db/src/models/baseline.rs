//! Baseline plan rows: `projects`, `phase_timelines`, `assignments`.
//!
//! The baseline scenario owns these tables directly. Every write stamps a
//! fresh `revision`; removals set `deleted_at` instead of deleting the row.

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::FromRow;

use capplan_core::overlay::{
    AssignmentFields, BaselineRecord, EntityRecord, PhaseTimelineFields, ProjectFields,
};
use capplan_core::types::{DbId, Revision, Timestamp};

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

/// A row from the `projects` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProjectRow {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub priority: i32,
    pub include_in_demand: bool,
    pub target_start: Option<NaiveDate>,
    pub target_end: Option<NaiveDate>,
    pub created_revision: Revision,
    pub revision: Revision,
    pub deleted_at: Option<Timestamp>,
}

impl ProjectRow {
    pub fn into_baseline_record(self) -> BaselineRecord {
        let record = self.deleted_at.is_none().then(|| {
            EntityRecord::Project(ProjectFields {
                name: self.name,
                description: self.description,
                priority: self.priority,
                include_in_demand: self.include_in_demand,
                target_start: self.target_start,
                target_end: self.target_end,
            })
        });
        BaselineRecord {
            entity_id: self.id,
            record,
            created_revision: self.created_revision,
            revision: self.revision,
        }
    }
}

// ---------------------------------------------------------------------------
// Phase timelines
// ---------------------------------------------------------------------------

/// A row from the `phase_timelines` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PhaseTimelineRow {
    pub id: DbId,
    pub project_id: DbId,
    pub phase_id: DbId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_revision: Revision,
    pub revision: Revision,
    pub deleted_at: Option<Timestamp>,
}

impl PhaseTimelineRow {
    pub fn into_baseline_record(self) -> BaselineRecord {
        let record = self.deleted_at.is_none().then(|| {
            EntityRecord::PhaseTimeline(PhaseTimelineFields {
                project_id: self.project_id,
                phase_id: self.phase_id,
                start_date: self.start_date,
                end_date: self.end_date,
            })
        });
        BaselineRecord {
            entity_id: self.id,
            record,
            created_revision: self.created_revision,
            revision: self.revision,
        }
    }
}

// ---------------------------------------------------------------------------
// Assignments
// ---------------------------------------------------------------------------

/// A row from the `assignments` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AssignmentRow {
    pub id: DbId,
    pub project_id: DbId,
    pub person_id: DbId,
    pub role_id: Option<DbId>,
    pub phase_id: Option<DbId>,
    pub allocation_percentage: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub notes: Option<String>,
    pub created_revision: Revision,
    pub revision: Revision,
    pub deleted_at: Option<Timestamp>,
}

impl AssignmentRow {
    pub fn into_baseline_record(self) -> BaselineRecord {
        let record = self.deleted_at.is_none().then(|| {
            EntityRecord::Assignment(AssignmentFields {
                project_id: self.project_id,
                person_id: self.person_id,
                role_id: self.role_id,
                phase_id: self.phase_id,
                allocation_percentage: self.allocation_percentage,
                start_date: self.start_date,
                end_date: self.end_date,
                notes: self.notes,
            })
        });
        BaselineRecord {
            entity_id: self.id,
            record,
            created_revision: self.created_revision,
            revision: self.revision,
        }
    }
}
