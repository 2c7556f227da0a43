//! Repository for the baseline tables (`projects`, `phase_timelines`,
//! `assignments`).
//!
//! Entity ids for all three kinds come from the tables' own id sequences,
//! including ids minted for entities a scenario adds, so a merged entity
//! keeps its id when it lands in the baseline.

use sqlx::PgConnection;

use capplan_core::overlay::{BaselineRecord, EntityRecord, EntityType};
use capplan_core::types::{DbId, Revision};

use crate::models::baseline::{AssignmentRow, PhaseTimelineRow, ProjectRow};

const PROJECT_COLUMNS: &str = "id, name, description, priority, include_in_demand, \
    target_start, target_end, created_revision, revision, deleted_at";

const PHASE_TIMELINE_COLUMNS: &str = "id, project_id, phase_id, start_date, end_date, \
    created_revision, revision, deleted_at";

const ASSIGNMENT_COLUMNS: &str = "id, project_id, person_id, role_id, phase_id, \
    allocation_percentage, start_date, end_date, notes, created_revision, revision, deleted_at";

/// The baseline table holding entities of `entity_type`.
pub fn baseline_table(entity_type: EntityType) -> &'static str {
    match entity_type {
        EntityType::Project => "projects",
        EntityType::PhaseTimeline => "phase_timelines",
        EntityType::Assignment => "assignments",
    }
}

/// Provides reads and revision-stamped writes on baseline records.
pub struct BaselineRepo;

impl BaselineRepo {
    /// Every baseline record of one type, soft-deleted rows included (as
    /// records with no data) so merges can see baseline removals.
    pub async fn list_all(
        conn: &mut PgConnection,
        entity_type: EntityType,
    ) -> Result<Vec<BaselineRecord>, sqlx::Error> {
        let records = match entity_type {
            EntityType::Project => {
                let query = format!("SELECT {PROJECT_COLUMNS} FROM projects ORDER BY id");
                sqlx::query_as::<_, ProjectRow>(&query)
                    .fetch_all(conn)
                    .await?
                    .into_iter()
                    .map(ProjectRow::into_baseline_record)
                    .collect()
            }
            EntityType::PhaseTimeline => {
                let query =
                    format!("SELECT {PHASE_TIMELINE_COLUMNS} FROM phase_timelines ORDER BY id");
                sqlx::query_as::<_, PhaseTimelineRow>(&query)
                    .fetch_all(conn)
                    .await?
                    .into_iter()
                    .map(PhaseTimelineRow::into_baseline_record)
                    .collect()
            }
            EntityType::Assignment => {
                let query = format!("SELECT {ASSIGNMENT_COLUMNS} FROM assignments ORDER BY id");
                sqlx::query_as::<_, AssignmentRow>(&query)
                    .fetch_all(conn)
                    .await?
                    .into_iter()
                    .map(AssignmentRow::into_baseline_record)
                    .collect()
            }
        };
        Ok(records)
    }

    /// Reserve a new logical entity id from the baseline table's sequence.
    pub async fn mint_entity_id(
        conn: &mut PgConnection,
        entity_type: EntityType,
    ) -> Result<DbId, sqlx::Error> {
        let row: (DbId,) = sqlx::query_as("SELECT nextval(pg_get_serial_sequence($1, 'id'))")
            .bind(baseline_table(entity_type))
            .fetch_one(conn)
            .await?;
        Ok(row.0)
    }

    /// Insert or overwrite the baseline record `entity_id`.
    ///
    /// Re-inserting a soft-deleted record revives it and resets its
    /// `created_revision`, so it reads as newly added from then on.
    pub async fn upsert(
        conn: &mut PgConnection,
        entity_id: DbId,
        record: &EntityRecord,
        revision: Revision,
    ) -> Result<BaselineRecord, sqlx::Error> {
        let stored = match record {
            EntityRecord::Project(f) => {
                let query = format!(
                    "INSERT INTO projects
                        (id, name, description, priority, include_in_demand,
                         target_start, target_end, created_revision, revision)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
                     ON CONFLICT (id) DO UPDATE SET
                        name = EXCLUDED.name,
                        description = EXCLUDED.description,
                        priority = EXCLUDED.priority,
                        include_in_demand = EXCLUDED.include_in_demand,
                        target_start = EXCLUDED.target_start,
                        target_end = EXCLUDED.target_end,
                        created_revision = CASE WHEN projects.deleted_at IS NULL
                            THEN projects.created_revision ELSE EXCLUDED.created_revision END,
                        revision = EXCLUDED.revision,
                        deleted_at = NULL
                     RETURNING {PROJECT_COLUMNS}"
                );
                sqlx::query_as::<_, ProjectRow>(&query)
                    .bind(entity_id)
                    .bind(&f.name)
                    .bind(&f.description)
                    .bind(f.priority)
                    .bind(f.include_in_demand)
                    .bind(f.target_start)
                    .bind(f.target_end)
                    .bind(revision)
                    .fetch_one(conn)
                    .await?
                    .into_baseline_record()
            }
            EntityRecord::PhaseTimeline(f) => {
                let query = format!(
                    "INSERT INTO phase_timelines
                        (id, project_id, phase_id, start_date, end_date,
                         created_revision, revision)
                     VALUES ($1, $2, $3, $4, $5, $6, $6)
                     ON CONFLICT (id) DO UPDATE SET
                        project_id = EXCLUDED.project_id,
                        phase_id = EXCLUDED.phase_id,
                        start_date = EXCLUDED.start_date,
                        end_date = EXCLUDED.end_date,
                        created_revision = CASE WHEN phase_timelines.deleted_at IS NULL
                            THEN phase_timelines.created_revision ELSE EXCLUDED.created_revision END,
                        revision = EXCLUDED.revision,
                        deleted_at = NULL
                     RETURNING {PHASE_TIMELINE_COLUMNS}"
                );
                sqlx::query_as::<_, PhaseTimelineRow>(&query)
                    .bind(entity_id)
                    .bind(f.project_id)
                    .bind(f.phase_id)
                    .bind(f.start_date)
                    .bind(f.end_date)
                    .bind(revision)
                    .fetch_one(conn)
                    .await?
                    .into_baseline_record()
            }
            EntityRecord::Assignment(f) => {
                let query = format!(
                    "INSERT INTO assignments
                        (id, project_id, person_id, role_id, phase_id, allocation_percentage,
                         start_date, end_date, notes, created_revision, revision)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
                     ON CONFLICT (id) DO UPDATE SET
                        project_id = EXCLUDED.project_id,
                        person_id = EXCLUDED.person_id,
                        role_id = EXCLUDED.role_id,
                        phase_id = EXCLUDED.phase_id,
                        allocation_percentage = EXCLUDED.allocation_percentage,
                        start_date = EXCLUDED.start_date,
                        end_date = EXCLUDED.end_date,
                        notes = EXCLUDED.notes,
                        created_revision = CASE WHEN assignments.deleted_at IS NULL
                            THEN assignments.created_revision ELSE EXCLUDED.created_revision END,
                        revision = EXCLUDED.revision,
                        deleted_at = NULL
                     RETURNING {ASSIGNMENT_COLUMNS}"
                );
                sqlx::query_as::<_, AssignmentRow>(&query)
                    .bind(entity_id)
                    .bind(f.project_id)
                    .bind(f.person_id)
                    .bind(f.role_id)
                    .bind(f.phase_id)
                    .bind(f.allocation_percentage)
                    .bind(f.start_date)
                    .bind(f.end_date)
                    .bind(&f.notes)
                    .bind(revision)
                    .fetch_one(conn)
                    .await?
                    .into_baseline_record()
            }
        };
        Ok(stored)
    }

    /// Soft-delete a baseline record. Returns `false` if it was not live.
    pub async fn soft_delete(
        conn: &mut PgConnection,
        entity_type: EntityType,
        entity_id: DbId,
        revision: Revision,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE {} SET deleted_at = NOW(), revision = $2
             WHERE id = $1 AND deleted_at IS NULL",
            baseline_table(entity_type)
        );
        let result = sqlx::query(&query)
            .bind(entity_id)
            .bind(revision)
            .execute(conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
