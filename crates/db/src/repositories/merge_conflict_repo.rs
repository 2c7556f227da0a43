//! Repository for the `merge_conflicts` table.

use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use capplan_core::merge::Resolution;
use capplan_core::overlay::EntityRecord;
use capplan_core::types::DbId;

use crate::models::merge::{CreateMergeConflict, MergeConflict};

const COLUMNS: &str = "id, merge_id, source_scenario_id, target_scenario_id, conflict_type, \
    entity_id, source_change_type, target_change_type, source_data, target_data, resolution, \
    resolved_data, resolved_by, resolved_at, created_at, updated_at";

/// Provides queries for merge conflicts.
pub struct MergeConflictRepo;

impl MergeConflictRepo {
    /// Persist a conflict. `resolved_at` is stamped unless the resolution is
    /// `pending`.
    pub async fn create(
        conn: &mut PgConnection,
        input: &CreateMergeConflict,
    ) -> Result<MergeConflict, sqlx::Error> {
        let query = format!(
            "INSERT INTO merge_conflicts
                (merge_id, source_scenario_id, target_scenario_id, conflict_type, entity_id,
                 source_change_type, target_change_type, source_data, target_data,
                 resolution, resolved_data, resolved_by, resolved_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                     CASE WHEN $10 = 'pending' THEN NULL ELSE NOW() END)
             RETURNING {COLUMNS}"
        );
        let conflict = &input.conflict;
        sqlx::query_as::<_, MergeConflict>(&query)
            .bind(input.merge_id)
            .bind(input.source_scenario_id)
            .bind(input.target_scenario_id)
            .bind(conflict.entity_type.as_str())
            .bind(conflict.entity_id)
            .bind(conflict.source_change.as_str())
            .bind(conflict.target_change.as_str())
            .bind(conflict.source_data.as_ref().map(Json))
            .bind(conflict.target_data.as_ref().map(Json))
            .bind(input.resolution.as_str())
            .bind(input.resolved_data.as_ref().map(Json))
            .bind(&input.resolved_by)
            .fetch_one(conn)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<MergeConflict>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM merge_conflicts WHERE id = $1");
        sqlx::query_as::<_, MergeConflict>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lock a conflict row for the rest of the transaction.
    pub async fn lock(conn: &mut PgConnection, id: DbId) -> Result<Option<MergeConflict>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM merge_conflicts WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, MergeConflict>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Conflicts of one merge attempt, in entity order.
    pub async fn list_by_merge(
        pool: &PgPool,
        merge_id: DbId,
    ) -> Result<Vec<MergeConflict>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM merge_conflicts
             WHERE merge_id = $1
             ORDER BY id"
        );
        sqlx::query_as::<_, MergeConflict>(&query)
            .bind(merge_id)
            .fetch_all(pool)
            .await
    }

    /// Pending conflicts of open attempts that target `scenario_id`.
    pub async fn list_pending_for_target(
        pool: &PgPool,
        scenario_id: DbId,
    ) -> Result<Vec<MergeConflict>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM merge_conflicts c
             WHERE c.target_scenario_id = $1
               AND c.resolution = 'pending'
               AND EXISTS (
                   SELECT 1 FROM scenario_merges m
                   WHERE m.id = c.merge_id
                     AND m.status IN ('initiated', 'conflicts_detected')
               )
             ORDER BY c.merge_id, c.id"
        );
        sqlx::query_as::<_, MergeConflict>(&query)
            .bind(scenario_id)
            .fetch_all(pool)
            .await
    }

    pub async fn count_pending(conn: &mut PgConnection, merge_id: DbId) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM merge_conflicts WHERE merge_id = $1 AND resolution = 'pending'",
        )
        .bind(merge_id)
        .fetch_one(conn)
        .await?;
        Ok(row.0)
    }

    /// Record a terminal resolution.
    pub async fn resolve(
        conn: &mut PgConnection,
        id: DbId,
        resolution: Resolution,
        resolved_data: Option<&EntityRecord>,
        resolved_by: Option<&str>,
    ) -> Result<MergeConflict, sqlx::Error> {
        let query = format!(
            "UPDATE merge_conflicts SET
                resolution = $2,
                resolved_data = $3,
                resolved_by = $4,
                resolved_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MergeConflict>(&query)
            .bind(id)
            .bind(resolution.as_str())
            .bind(resolved_data.map(Json))
            .bind(resolved_by)
            .fetch_one(conn)
            .await
    }
}
