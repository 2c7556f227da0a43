//! Repository for the three overlay tables.
//!
//! Overlays are append-only: there is no update or delete here. A correction
//! is a new row with a higher revision.

use sqlx::PgConnection;

use capplan_core::overlay::{ChangeType, EntityRecord, EntityType, Overlay};
use capplan_core::types::{DbId, Revision};

use crate::models::overlay::{
    AssignmentOverlayRow, OverlayEntry, PhaseTimelineOverlayRow, ProjectOverlayRow,
};

const PROJECT_COLUMNS: &str = "id, scenario_id, entity_id, change_type, name, description, \
    priority, include_in_demand, target_start, target_end, revision, created_by, created_at";

const PHASE_TIMELINE_COLUMNS: &str = "id, scenario_id, entity_id, change_type, project_id, \
    phase_id, start_date, end_date, revision, created_by, created_at";

const ASSIGNMENT_COLUMNS: &str = "id, scenario_id, entity_id, change_type, project_id, \
    person_id, role_id, phase_id, allocation_percentage, start_date, end_date, notes, \
    revision, created_by, created_at";

/// Provides append and list operations on scenario overlays.
pub struct OverlayRepo;

impl OverlayRepo {
    /// Append an overlay. `data` must be `None` for `removed` and a record
    /// of `entity_type` otherwise; the table CHECK constraints reject
    /// anything else.
    pub async fn insert(
        conn: &mut PgConnection,
        scenario_id: DbId,
        entity_type: EntityType,
        entity_id: DbId,
        change_type: ChangeType,
        data: Option<&EntityRecord>,
        created_by: Option<&str>,
    ) -> Result<Overlay, sqlx::Error> {
        let base_id = (change_type != ChangeType::Added).then_some(entity_id);

        let (id, revision): (DbId, Revision) = match entity_type {
            EntityType::Project => {
                let f = data.and_then(EntityRecord::as_project);
                sqlx::query_as(
                    "INSERT INTO project_overlays
                        (scenario_id, entity_id, change_type, base_project_id, name, description,
                         priority, include_in_demand, target_start, target_end, created_by)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                     RETURNING id, revision",
                )
                .bind(scenario_id)
                .bind(entity_id)
                .bind(change_type.as_str())
                .bind(base_id)
                .bind(f.map(|f| f.name.as_str()))
                .bind(f.and_then(|f| f.description.as_deref()))
                .bind(f.map(|f| f.priority))
                .bind(f.map(|f| f.include_in_demand))
                .bind(f.and_then(|f| f.target_start))
                .bind(f.and_then(|f| f.target_end))
                .bind(created_by)
                .fetch_one(conn)
                .await?
            }
            EntityType::PhaseTimeline => {
                let f = data.and_then(EntityRecord::as_phase_timeline);
                sqlx::query_as(
                    "INSERT INTO phase_timeline_overlays
                        (scenario_id, entity_id, change_type, base_phase_timeline_id,
                         project_id, phase_id, start_date, end_date, created_by)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                     RETURNING id, revision",
                )
                .bind(scenario_id)
                .bind(entity_id)
                .bind(change_type.as_str())
                .bind(base_id)
                .bind(f.map(|f| f.project_id))
                .bind(f.map(|f| f.phase_id))
                .bind(f.map(|f| f.start_date))
                .bind(f.map(|f| f.end_date))
                .bind(created_by)
                .fetch_one(conn)
                .await?
            }
            EntityType::Assignment => {
                let f = data.and_then(EntityRecord::as_assignment);
                sqlx::query_as(
                    "INSERT INTO assignment_overlays
                        (scenario_id, entity_id, change_type, base_assignment_id, project_id,
                         person_id, role_id, phase_id, allocation_percentage, start_date,
                         end_date, notes, created_by)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                     RETURNING id, revision",
                )
                .bind(scenario_id)
                .bind(entity_id)
                .bind(change_type.as_str())
                .bind(base_id)
                .bind(f.map(|f| f.project_id))
                .bind(f.map(|f| f.person_id))
                .bind(f.and_then(|f| f.role_id))
                .bind(f.and_then(|f| f.phase_id))
                .bind(f.map(|f| f.allocation_percentage))
                .bind(f.map(|f| f.start_date))
                .bind(f.map(|f| f.end_date))
                .bind(f.and_then(|f| f.notes.as_deref()))
                .bind(created_by)
                .fetch_one(conn)
                .await?
            }
        };

        Ok(Overlay {
            id,
            scenario_id,
            entity_type,
            entity_id,
            change_type,
            data: data.cloned(),
            revision,
        })
    }

    /// All overlays of one type held by any of `scenario_ids`, oldest first.
    ///
    /// A stored row that cannot be turned back into a typed overlay is
    /// reported as a decode error.
    pub async fn list_for_scenarios(
        conn: &mut PgConnection,
        entity_type: EntityType,
        scenario_ids: &[DbId],
    ) -> Result<Vec<OverlayEntry>, sqlx::Error> {
        let entries = match entity_type {
            EntityType::Project => {
                let query = format!(
                    "SELECT {PROJECT_COLUMNS} FROM project_overlays
                     WHERE scenario_id = ANY($1) ORDER BY revision"
                );
                sqlx::query_as::<_, ProjectOverlayRow>(&query)
                    .bind(scenario_ids)
                    .fetch_all(conn)
                    .await?
                    .into_iter()
                    .map(ProjectOverlayRow::into_entry)
                    .collect::<Result<Vec<_>, _>>()
            }
            EntityType::PhaseTimeline => {
                let query = format!(
                    "SELECT {PHASE_TIMELINE_COLUMNS} FROM phase_timeline_overlays
                     WHERE scenario_id = ANY($1) ORDER BY revision"
                );
                sqlx::query_as::<_, PhaseTimelineOverlayRow>(&query)
                    .bind(scenario_ids)
                    .fetch_all(conn)
                    .await?
                    .into_iter()
                    .map(PhaseTimelineOverlayRow::into_entry)
                    .collect::<Result<Vec<_>, _>>()
            }
            EntityType::Assignment => {
                let query = format!(
                    "SELECT {ASSIGNMENT_COLUMNS} FROM assignment_overlays
                     WHERE scenario_id = ANY($1) ORDER BY revision"
                );
                sqlx::query_as::<_, AssignmentOverlayRow>(&query)
                    .bind(scenario_ids)
                    .fetch_all(conn)
                    .await?
                    .into_iter()
                    .map(AssignmentOverlayRow::into_entry)
                    .collect::<Result<Vec<_>, _>>()
            }
        };
        entries.map_err(|e| sqlx::Error::Decode(Box::new(e)))
    }

    /// The overlay log of a single scenario, oldest first.
    pub async fn list_by_scenario(
        conn: &mut PgConnection,
        entity_type: EntityType,
        scenario_id: DbId,
    ) -> Result<Vec<OverlayEntry>, sqlx::Error> {
        Self::list_for_scenarios(conn, entity_type, &[scenario_id]).await
    }
}
