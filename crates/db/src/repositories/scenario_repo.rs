//! Repository for the `scenarios` table.

use sqlx::{PgConnection, PgPool};

use capplan_core::scenario::{ScenarioStatus, ScenarioType};
use capplan_core::types::DbId;

use crate::models::scenario::{CreateScenario, Scenario};

/// Column list shared across queries.
const COLUMNS: &str = "id, name, description, parent_scenario_id, scenario_type, status, \
    branch_point, created_by, created_at, updated_at";

/// Provides queries for the scenario hierarchy.
pub struct ScenarioRepo;

impl ScenarioRepo {
    /// Insert the root baseline scenario.
    ///
    /// A second baseline violates `uq_scenarios_single_baseline`.
    pub async fn create_baseline(
        pool: &PgPool,
        input: &CreateScenario,
    ) -> Result<Scenario, sqlx::Error> {
        let query = format!(
            "INSERT INTO scenarios (name, description, scenario_type, created_by)
             VALUES ($1, $2, 'baseline', $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Scenario>(&query)
            .bind(&input.name)
            .bind(&input.description)
            .bind(&input.created_by)
            .fetch_one(pool)
            .await
    }

    /// Insert a child of `parent_id`. The branch point is drawn from the
    /// revision sequence by the column default.
    pub async fn fork(
        conn: &mut PgConnection,
        parent_id: DbId,
        name: &str,
        description: Option<&str>,
        scenario_type: ScenarioType,
        created_by: Option<&str>,
    ) -> Result<Scenario, sqlx::Error> {
        let query = format!(
            "INSERT INTO scenarios (name, description, parent_scenario_id, scenario_type, created_by)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Scenario>(&query)
            .bind(name)
            .bind(description)
            .bind(parent_id)
            .bind(scenario_type.as_str())
            .bind(created_by)
            .fetch_one(conn)
            .await
    }

    /// Find a scenario by its primary key.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Scenario>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM scenarios WHERE id = $1");
        sqlx::query_as::<_, Scenario>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// The root baseline, if one has been created.
    pub async fn find_baseline(pool: &PgPool) -> Result<Option<Scenario>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM scenarios WHERE scenario_type = 'baseline'");
        sqlx::query_as::<_, Scenario>(&query)
            .fetch_optional(pool)
            .await
    }

    /// Lock a scenario row for the rest of the transaction by touching its
    /// `updated_at`. Writes to a scenario serialize on this lock, and a
    /// `REPEATABLE READ` writer whose snapshot predates another writer's
    /// commit to the same scenario fails with `40001` instead of planning
    /// from stale data.
    pub async fn lock(conn: &mut PgConnection, id: DbId) -> Result<Option<Scenario>, sqlx::Error> {
        let query = format!(
            "UPDATE scenarios SET updated_at = NOW() WHERE id = $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Scenario>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// List scenarios, baseline first, then by creation order.
    pub async fn list(pool: &PgPool, include_archived: bool) -> Result<Vec<Scenario>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM scenarios
             WHERE $1 OR status <> 'archived'
             ORDER BY parent_scenario_id IS NOT NULL, id"
        );
        sqlx::query_as::<_, Scenario>(&query)
            .bind(include_archived)
            .fetch_all(pool)
            .await
    }

    /// Every scenario, archived ones included, for building the hierarchy.
    pub async fn list_all(conn: &mut PgConnection) -> Result<Vec<Scenario>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM scenarios ORDER BY id");
        sqlx::query_as::<_, Scenario>(&query).fetch_all(conn).await
    }

    /// Mark an active, non-baseline scenario as merged. Returns `None` when
    /// the scenario is the baseline or no longer active.
    pub async fn retire(conn: &mut PgConnection, id: DbId) -> Result<Option<Scenario>, sqlx::Error> {
        let query = format!(
            "UPDATE scenarios SET status = 'merged'
             WHERE id = $1 AND status = 'active' AND parent_scenario_id IS NOT NULL
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Scenario>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Set a scenario's status. Returns `None` if the row does not exist.
    pub async fn set_status(
        conn: &mut PgConnection,
        id: DbId,
        status: ScenarioStatus,
    ) -> Result<Option<Scenario>, sqlx::Error> {
        let query = format!(
            "UPDATE scenarios SET status = $2 WHERE id = $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Scenario>(&query)
            .bind(id)
            .bind(status.as_str())
            .fetch_optional(conn)
            .await
    }
}
