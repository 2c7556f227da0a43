//! Scenario row model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use capplan_core::error::CoreError;
use capplan_core::scenario::{ScenarioNode, ScenarioStatus, ScenarioType};
use capplan_core::types::{DbId, Revision, Timestamp};

/// A row from the `scenarios` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Scenario {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub parent_scenario_id: Option<DbId>,
    pub scenario_type: String,
    pub status: String,
    pub branch_point: Revision,
    pub created_by: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Scenario {
    /// The hierarchy view of this row used by the core algorithms.
    pub fn to_node(&self) -> Result<ScenarioNode, CoreError> {
        Ok(ScenarioNode {
            id: self.id,
            parent_id: self.parent_scenario_id,
            scenario_type: ScenarioType::from_str_db(&self.scenario_type)?,
            status: ScenarioStatus::from_str_db(&self.status)?,
            branch_point: self.branch_point,
        })
    }
}

/// Input for creating the baseline scenario.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateScenario {
    pub name: String,
    pub description: Option<String>,
    pub created_by: Option<String>,
}

/// Input for forking a scenario from an existing one.
#[derive(Debug, Clone, Deserialize)]
pub struct ForkScenario {
    pub name: String,
    pub description: Option<String>,
    /// `branch` (default) or `sandbox`.
    pub scenario_type: Option<String>,
    pub created_by: Option<String>,
}
