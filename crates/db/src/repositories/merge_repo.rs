//! Repository for the `scenario_merges` table.

use sqlx::{PgConnection, PgPool};

use capplan_core::merge::MergeStatus;
use capplan_core::types::DbId;

use crate::models::merge::{CreateScenarioMerge, ScenarioMerge};

const COLUMNS: &str = "id, source_scenario_id, target_scenario_id, common_ancestor_id, status, \
    conflict_strategy, applied_count, conflict_count, initiated_by, completed_at, \
    created_at, updated_at";

/// Provides queries for merge attempts.
pub struct MergeRepo;

impl MergeRepo {
    /// Record a new attempt in `initiated` state.
    pub async fn create(
        conn: &mut PgConnection,
        input: &CreateScenarioMerge,
    ) -> Result<ScenarioMerge, sqlx::Error> {
        let query = format!(
            "INSERT INTO scenario_merges
                (source_scenario_id, target_scenario_id, common_ancestor_id,
                 conflict_strategy, initiated_by)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ScenarioMerge>(&query)
            .bind(input.source_scenario_id)
            .bind(input.target_scenario_id)
            .bind(input.common_ancestor_id)
            .bind(&input.conflict_strategy)
            .bind(&input.initiated_by)
            .fetch_one(conn)
            .await
    }

    /// Mark every open attempt between the same pair as `superseded`.
    /// Returns the number of attempts affected.
    pub async fn supersede_open(
        conn: &mut PgConnection,
        source_scenario_id: DbId,
        target_scenario_id: DbId,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE scenario_merges SET status = 'superseded'
             WHERE source_scenario_id = $1 AND target_scenario_id = $2
               AND status IN ('initiated', 'conflicts_detected')",
        )
        .bind(source_scenario_id)
        .bind(target_scenario_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Mark every open attempt with the scenario on either side as
    /// `superseded`. Returns the number of attempts affected.
    pub async fn supersede_involving(
        conn: &mut PgConnection,
        scenario_id: DbId,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE scenario_merges SET status = 'superseded'
             WHERE (source_scenario_id = $1 OR target_scenario_id = $1)
               AND status IN ('initiated', 'conflicts_detected')",
        )
        .bind(scenario_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Store the outcome of an attempt. `completed_at` is stamped when the
    /// status is `completed`.
    pub async fn finish(
        conn: &mut PgConnection,
        id: DbId,
        status: MergeStatus,
        applied_count: i32,
        conflict_count: i32,
    ) -> Result<ScenarioMerge, sqlx::Error> {
        let query = format!(
            "UPDATE scenario_merges SET
                status = $2,
                applied_count = $3,
                conflict_count = $4,
                completed_at = CASE WHEN $2 = 'completed' THEN NOW() ELSE NULL END
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ScenarioMerge>(&query)
            .bind(id)
            .bind(status.as_str())
            .bind(applied_count)
            .bind(conflict_count)
            .fetch_one(conn)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<ScenarioMerge>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM scenario_merges WHERE id = $1");
        sqlx::query_as::<_, ScenarioMerge>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lock an attempt row for the rest of the transaction.
    pub async fn lock(conn: &mut PgConnection, id: DbId) -> Result<Option<ScenarioMerge>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM scenario_merges WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, ScenarioMerge>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Attempts where the scenario was source or target, newest first.
    pub async fn list_by_scenario(
        pool: &PgPool,
        scenario_id: DbId,
    ) -> Result<Vec<ScenarioMerge>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM scenario_merges
             WHERE source_scenario_id = $1 OR target_scenario_id = $1
             ORDER BY id DESC"
        );
        sqlx::query_as::<_, ScenarioMerge>(&query)
            .bind(scenario_id)
            .fetch_all(pool)
            .await
    }
}
