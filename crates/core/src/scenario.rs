//! Scenario registry: the parent-pointer hierarchy of plans.
//!
//! Scenarios are held in a flat arena keyed by id ([`ScenarioGraph`]) and
//! ancestry is resolved by repeated lookup. The baseline is structural: it is
//! the one scenario without a parent, and every other scenario's parent chain
//! must end there.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Revision};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum allowed length for a scenario name.
pub const MAX_SCENARIO_NAME_LENGTH: usize = 100;

/// Maximum allowed length for a scenario description.
pub const MAX_SCENARIO_DESCRIPTION_LENGTH: usize = 1000;

/// Maximum number of forks between a scenario and the baseline.
pub const MAX_BRANCH_DEPTH: usize = 8;

// ---------------------------------------------------------------------------
// Scenario type / status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioType {
    Baseline,
    Branch,
    /// Branch-like, intended to be disposable.
    Sandbox,
}

impl ScenarioType {
    pub fn from_str_db(s: &str) -> Result<Self, CoreError> {
        match s {
            "baseline" => Ok(Self::Baseline),
            "branch" => Ok(Self::Branch),
            "sandbox" => Ok(Self::Sandbox),
            _ => Err(CoreError::Validation(format!(
                "Invalid scenario type '{s}'. Must be one of: baseline, branch, sandbox"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Branch => "branch",
            Self::Sandbox => "sandbox",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    Active,
    /// Terminal soft delete: readable, never written to or merged.
    Archived,
    /// Set on the source once a merge from it completes.
    Merged,
}

impl ScenarioStatus {
    pub fn from_str_db(s: &str) -> Result<Self, CoreError> {
        match s {
            "active" => Ok(Self::Active),
            "archived" => Ok(Self::Archived),
            "merged" => Ok(Self::Merged),
            _ => Err(CoreError::Validation(format!(
                "Invalid scenario status '{s}'. Must be one of: active, archived, merged"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
            Self::Merged => "merged",
        }
    }
}

impl std::fmt::Display for ScenarioStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// The parts of a scenario the hierarchy algorithms need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioNode {
    pub id: DbId,
    pub parent_id: Option<DbId>,
    pub scenario_type: ScenarioType,
    pub status: ScenarioStatus,
    /// Revision taken when this scenario was forked from its parent.
    pub branch_point: Revision,
}

impl ScenarioNode {
    pub fn is_baseline(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Arena of scenarios keyed by id.
#[derive(Debug, Clone, Default)]
pub struct ScenarioGraph {
    nodes: HashMap<DbId, ScenarioNode>,
}

impl ScenarioGraph {
    pub fn new(nodes: impl IntoIterator<Item = ScenarioNode>) -> Self {
        Self {
            nodes: nodes.into_iter().map(|n| (n.id, n)).collect(),
        }
    }

    pub fn get(&self, id: DbId) -> Result<&ScenarioNode, CoreError> {
        self.nodes.get(&id).ok_or(CoreError::NotFound {
            entity: "Scenario",
            id,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The path from `id` up to and including the baseline: `[id, parent, …,
    /// baseline]`.
    ///
    /// Fails with [`CoreError::Structural`] on a cycle, a dangling parent
    /// pointer, a root that is not a baseline, a baseline that has a parent,
    /// or a chain deeper than [`MAX_BRANCH_DEPTH`].
    pub fn ancestor_path(&self, id: DbId) -> Result<Vec<DbId>, CoreError> {
        let mut node = self.get(id)?;
        let mut path = vec![node.id];
        let mut seen = HashSet::from([node.id]);

        while let Some(parent_id) = node.parent_id {
            if node.scenario_type == ScenarioType::Baseline {
                return Err(CoreError::Structural(format!(
                    "Baseline scenario {} has a parent ({parent_id})",
                    node.id
                )));
            }
            let parent = self.nodes.get(&parent_id).ok_or_else(|| {
                CoreError::Structural(format!(
                    "Scenario {} references missing parent scenario {parent_id}",
                    node.id
                ))
            })?;
            if !seen.insert(parent_id) {
                return Err(CoreError::Structural(format!(
                    "Cyclic parent chain detected at scenario {parent_id} (starting from {id})"
                )));
            }
            path.push(parent_id);
            if path.len() > MAX_BRANCH_DEPTH + 1 {
                return Err(CoreError::Structural(format!(
                    "Scenario {id} is nested deeper than {MAX_BRANCH_DEPTH} levels"
                )));
            }
            node = parent;
        }

        if node.scenario_type != ScenarioType::Baseline {
            return Err(CoreError::Structural(format!(
                "Parent chain of scenario {id} ends at scenario {} which is not a baseline",
                node.id
            )));
        }
        Ok(path)
    }

    /// Number of forks between `id` and the baseline (the baseline is 0).
    pub fn depth(&self, id: DbId) -> Result<usize, CoreError> {
        Ok(self.ancestor_path(id)?.len() - 1)
    }

    /// Returns `true` if `ancestor` is on `id`'s path (a scenario is its own
    /// ancestor).
    pub fn is_ancestor(&self, ancestor: DbId, id: DbId) -> Result<bool, CoreError> {
        Ok(self.ancestor_path(id)?.contains(&ancestor))
    }

    /// The nearest scenario that is an ancestor of both `a` and `b`.
    pub fn common_ancestor(&self, a: DbId, b: DbId) -> Result<DbId, CoreError> {
        let path_a = self.ancestor_path(a)?;
        let path_b: HashSet<DbId> = self.ancestor_path(b)?.into_iter().collect();
        path_a
            .into_iter()
            .find(|id| path_b.contains(id))
            .ok_or_else(|| {
                CoreError::Structural(format!(
                    "Scenarios {a} and {b} share no common ancestor"
                ))
            })
    }

    /// The revision at which the lineage on `path` forked off `ancestor`:
    /// the `branch_point` of the child of `ancestor` on that path.
    ///
    /// Returns `None` when `ancestor` is the first element of `path` (no fork
    /// happened on that side) or is not on the path at all.
    pub fn fork_revision(&self, path: &[DbId], ancestor: DbId) -> Option<Revision> {
        let pos = path.iter().position(|id| *id == ancestor)?;
        let child = path.get(pos.checked_sub(1)?)?;
        self.nodes.get(child).map(|n| n.branch_point)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a scenario name: non-empty, trimmed, within
/// [`MAX_SCENARIO_NAME_LENGTH`].
pub fn validate_scenario_name(name: &str) -> Result<(), CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(
            "Scenario name must not be empty".to_string(),
        ));
    }
    if trimmed.len() != name.len() {
        return Err(CoreError::Validation(
            "Scenario name must not have leading or trailing whitespace".to_string(),
        ));
    }
    if name.len() > MAX_SCENARIO_NAME_LENGTH {
        return Err(CoreError::Validation(format!(
            "Scenario name must not exceed {MAX_SCENARIO_NAME_LENGTH} characters, got {}",
            name.len()
        )));
    }
    Ok(())
}

pub fn validate_scenario_description(description: Option<&str>) -> Result<(), CoreError> {
    match description {
        Some(d) if d.len() > MAX_SCENARIO_DESCRIPTION_LENGTH => Err(CoreError::Validation(
            format!(
                "Scenario description must not exceed {MAX_SCENARIO_DESCRIPTION_LENGTH} characters, got {}",
                d.len()
            ),
        )),
        _ => Ok(()),
    }
}

/// Validate forking a new scenario of `new_type` from `parent`, where
/// `parent_depth` is the parent's distance from the baseline.
pub fn validate_fork(
    parent: &ScenarioNode,
    parent_depth: usize,
    new_type: ScenarioType,
) -> Result<(), CoreError> {
    if new_type == ScenarioType::Baseline {
        return Err(CoreError::Validation(
            "A forked scenario cannot be a baseline; use branch or sandbox".to_string(),
        ));
    }
    if parent.status == ScenarioStatus::Archived {
        return Err(CoreError::Validation(format!(
            "Cannot fork archived scenario {}",
            parent.id
        )));
    }
    if parent_depth + 1 > MAX_BRANCH_DEPTH {
        return Err(CoreError::Validation(format!(
            "Maximum branch depth is {MAX_BRANCH_DEPTH}, scenario {} is already at depth {parent_depth}",
            parent.id
        )));
    }
    Ok(())
}

/// Only active scenarios accept overlay writes.
pub fn ensure_writable(node: &ScenarioNode) -> Result<(), CoreError> {
    match node.status {
        ScenarioStatus::Active => Ok(()),
        status => Err(CoreError::Validation(format!(
            "Scenario {} is {status} and cannot be modified",
            node.id
        ))),
    }
}

/// Validate that `source` may be merged into `target`.
pub fn validate_merge_pair(source: &ScenarioNode, target: &ScenarioNode) -> Result<(), CoreError> {
    if source.id == target.id {
        return Err(CoreError::Validation(format!(
            "Cannot merge scenario {} into itself",
            source.id
        )));
    }
    if target.status != ScenarioStatus::Active {
        return Err(CoreError::Validation(format!(
            "Merge target scenario {} is {} and cannot receive changes",
            target.id, target.status
        )));
    }
    if source.status != ScenarioStatus::Active {
        return Err(CoreError::Validation(format!(
            "Merge source scenario {} is {} and cannot be merged",
            source.id, source.status
        )));
    }
    Ok(())
}

/// The baseline is never archived; everything else may be archived once.
pub fn validate_archive(node: &ScenarioNode) -> Result<(), CoreError> {
    if node.is_baseline() {
        return Err(CoreError::Validation(
            "The baseline scenario cannot be archived".to_string(),
        ));
    }
    if node.status == ScenarioStatus::Archived {
        return Err(CoreError::Conflict(format!(
            "Scenario {} is already archived",
            node.id
        )));
    }
    Ok(())
}
