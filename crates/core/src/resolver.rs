//! Effective-state resolution.
//!
//! A scenario's effective state is what the plan would look like if that
//! scenario were adopted: for each logical entity, the nearest overlay on the
//! path from the scenario to the baseline wins, and entities with no overlay
//! anywhere on the path fall back to the baseline's own record.
//!
//! Resolution is a pure function of a [`PlanData`] snapshot, so resolving
//! twice without intervening writes always yields identical output.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::Serialize;

use crate::error::CoreError;
use crate::overlay::{BaselineRecord, ChangeType, EntityRecord, EntityType, Overlay};
use crate::scenario::ScenarioGraph;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Overlay index
// ---------------------------------------------------------------------------

/// Latest overlay per `(scenario_id, entity_id)`.
#[derive(Debug, Default)]
pub struct OverlayIndex<'a> {
    latest: HashMap<(DbId, DbId), &'a Overlay>,
}

impl<'a> OverlayIndex<'a> {
    pub fn build(overlays: impl IntoIterator<Item = &'a Overlay>) -> Self {
        let mut latest: HashMap<(DbId, DbId), &'a Overlay> = HashMap::new();
        for overlay in overlays {
            latest
                .entry((overlay.scenario_id, overlay.entity_id))
                .and_modify(|current| {
                    if overlay.revision > current.revision {
                        *current = overlay;
                    }
                })
                .or_insert(overlay);
        }
        Self { latest }
    }

    /// The current overlay a single scenario holds for an entity.
    pub fn latest(&self, scenario_id: DbId, entity_id: DbId) -> Option<&'a Overlay> {
        self.latest.get(&(scenario_id, entity_id)).copied()
    }

    /// Scan `path` from its first element toward the baseline and return
    /// the first overlay found for `entity_id`.
    pub fn nearest(&self, path: &[DbId], entity_id: DbId) -> Option<&'a Overlay> {
        path.iter()
            .find_map(|scenario_id| self.latest(*scenario_id, entity_id))
    }

    /// Every entity overlaid by at least one of `scenarios`.
    pub fn entities_on(&self, scenarios: &[DbId]) -> BTreeSet<DbId> {
        let wanted: HashSet<DbId> = scenarios.iter().copied().collect();
        self.latest
            .keys()
            .filter(|(scenario_id, _)| wanted.contains(scenario_id))
            .map(|(_, entity_id)| *entity_id)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Effective state
// ---------------------------------------------------------------------------

/// One resolved entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveEntity {
    pub entity_id: DbId,
    pub record: EntityRecord,
}

/// The resolved records of one entity type for one scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveState {
    pub scenario_id: DbId,
    pub entity_type: EntityType,
    pub records: BTreeMap<DbId, EntityRecord>,
}

impl EffectiveState {
    pub fn get(&self, entity_id: DbId) -> Option<&EntityRecord> {
        self.records.get(&entity_id)
    }

    pub fn contains(&self, entity_id: DbId) -> bool {
        self.records.contains_key(&entity_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records as a list ordered by entity id.
    pub fn entities(&self) -> Vec<EffectiveEntity> {
        self.records
            .iter()
            .map(|(entity_id, record)| EffectiveEntity {
                entity_id: *entity_id,
                record: record.clone(),
            })
            .collect()
    }
}

/// All three entity types resolved for one scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanSnapshot {
    pub scenario_id: DbId,
    pub projects: EffectiveState,
    pub phase_timelines: EffectiveState,
    pub assignments: EffectiveState,
}

impl PlanSnapshot {
    pub fn state(&self, entity_type: EntityType) -> &EffectiveState {
        match entity_type {
            EntityType::Project => &self.projects,
            EntityType::PhaseTimeline => &self.phase_timelines,
            EntityType::Assignment => &self.assignments,
        }
    }
}

// ---------------------------------------------------------------------------
// Plan data
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct EntityTables {
    baseline: BTreeMap<DbId, BaselineRecord>,
    overlays: Vec<Overlay>,
}

/// A consistent in-memory snapshot of everything resolution needs: the
/// scenario hierarchy, the baseline tables and the overlay logs.
#[derive(Debug, Clone, Default)]
pub struct PlanData {
    graph: ScenarioGraph,
    tables: HashMap<EntityType, EntityTables>,
}

impl PlanData {
    pub fn new(graph: ScenarioGraph) -> Self {
        Self {
            graph,
            tables: HashMap::new(),
        }
    }

    pub fn insert_baseline(
        &mut self,
        entity_type: EntityType,
        records: impl IntoIterator<Item = BaselineRecord>,
    ) {
        let table = self.tables.entry(entity_type).or_default();
        for record in records {
            table.baseline.insert(record.entity_id, record);
        }
    }

    /// Add overlays, validating each payload against its change type.
    pub fn insert_overlays(
        &mut self,
        overlays: impl IntoIterator<Item = Overlay>,
    ) -> Result<(), CoreError> {
        for overlay in overlays {
            overlay.validate_shape().map_err(|e| {
                CoreError::Internal(format!("Stored overlay {} is malformed: {e}", overlay.id))
            })?;
            self.tables
                .entry(overlay.entity_type)
                .or_default()
                .overlays
                .push(overlay);
        }
        Ok(())
    }

    pub fn graph(&self) -> &ScenarioGraph {
        &self.graph
    }

    pub fn baseline_records(&self, entity_type: EntityType) -> impl Iterator<Item = &BaselineRecord> {
        self.tables
            .get(&entity_type)
            .into_iter()
            .flat_map(|t| t.baseline.values())
    }

    pub fn baseline_record(&self, entity_type: EntityType, entity_id: DbId) -> Option<&BaselineRecord> {
        self.tables.get(&entity_type)?.baseline.get(&entity_id)
    }

    pub fn overlays(&self, entity_type: EntityType) -> &[Overlay] {
        self.tables
            .get(&entity_type)
            .map(|t| t.overlays.as_slice())
            .unwrap_or_default()
    }

    pub fn overlay_index(&self, entity_type: EntityType) -> OverlayIndex<'_> {
        OverlayIndex::build(self.overlays(entity_type))
    }

    /// Resolve the effective state of one entity type for `scenario_id`.
    pub fn resolve(
        &self,
        scenario_id: DbId,
        entity_type: EntityType,
    ) -> Result<EffectiveState, CoreError> {
        let path = self.graph.ancestor_path(scenario_id)?;
        let index = self.overlay_index(entity_type);

        let mut candidates: BTreeSet<DbId> = self
            .baseline_records(entity_type)
            .map(|b| b.entity_id)
            .collect();
        candidates.extend(index.entities_on(&path));

        let records = candidates
            .into_iter()
            .filter_map(|entity_id| {
                self.resolve_entity(&index, &path, entity_type, entity_id)
                    .map(|record| (entity_id, record))
            })
            .collect();

        Ok(EffectiveState {
            scenario_id,
            entity_type,
            records,
        })
    }

    /// Resolve all entity types for `scenario_id`.
    pub fn snapshot(&self, scenario_id: DbId) -> Result<PlanSnapshot, CoreError> {
        Ok(PlanSnapshot {
            scenario_id,
            projects: self.resolve(scenario_id, EntityType::Project)?,
            phase_timelines: self.resolve(scenario_id, EntityType::PhaseTimeline)?,
            assignments: self.resolve(scenario_id, EntityType::Assignment)?,
        })
    }

    /// Resolve a single entity for `scenario_id`; `None` if it does not exist
    /// in that scenario.
    pub fn effective_record(
        &self,
        scenario_id: DbId,
        entity_type: EntityType,
        entity_id: DbId,
    ) -> Result<Option<EntityRecord>, CoreError> {
        let path = self.graph.ancestor_path(scenario_id)?;
        let index = self.overlay_index(entity_type);
        Ok(self.resolve_entity(&index, &path, entity_type, entity_id))
    }

    fn resolve_entity(
        &self,
        index: &OverlayIndex<'_>,
        path: &[DbId],
        entity_type: EntityType,
        entity_id: DbId,
    ) -> Option<EntityRecord> {
        match index.nearest(path, entity_id) {
            Some(overlay) => match overlay.change_type {
                ChangeType::Removed => None,
                ChangeType::Added | ChangeType::Modified => overlay.data.clone(),
            },
            None => self
                .baseline_record(entity_type, entity_id)
                .and_then(|b| b.record.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use assert_matches::assert_matches;

    #[test]
    fn scenario_without_overlays_sees_baseline() {
        let data = PlanBuilder::new()
            .baseline(1)
            .branch(2, 1, 10)
            .assignment_baseline(100, assignment(50.0))
            .assignment_baseline(101, assignment(25.0))
            .build();

        let baseline = data.resolve(1, EntityType::Assignment).unwrap();
        let branch = data.resolve(2, EntityType::Assignment).unwrap();
        assert_eq!(branch.records, baseline.records);
        assert_eq!(branch.len(), 2);
    }

    #[test]
    fn resolution_is_idempotent() {
        let data = PlanBuilder::new()
            .baseline(1)
            .branch(2, 1, 10)
            .assignment_baseline(100, assignment(50.0))
            .overlay(2, 100, ChangeType::Modified, Some(assignment(70.0)))
            .overlay(2, 200, ChangeType::Added, Some(assignment(10.0)))
            .build();

        let first = data.snapshot(2).unwrap();
        let second = data.snapshot(2).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn nearest_overlay_wins() {
        let data = PlanBuilder::new()
            .baseline(1)
            .branch(2, 1, 10)
            .branch(3, 2, 20)
            .assignment_baseline(100, assignment(50.0))
            .overlay(2, 100, ChangeType::Modified, Some(assignment(60.0)))
            .overlay(3, 100, ChangeType::Modified, Some(assignment(80.0)))
            .build();

        assert_eq!(pct(&data, 1, 100), Some(50.0));
        assert_eq!(pct(&data, 2, 100), Some(60.0));
        assert_eq!(pct(&data, 3, 100), Some(80.0));
    }

    #[test]
    fn child_inherits_parent_overlay() {
        let data = PlanBuilder::new()
            .baseline(1)
            .branch(2, 1, 10)
            .branch(3, 2, 20)
            .assignment_baseline(100, assignment(50.0))
            .overlay(2, 100, ChangeType::Modified, Some(assignment(60.0)))
            .build();

        assert_eq!(pct(&data, 3, 100), Some(60.0));
    }

    #[test]
    fn removed_overlay_hides_entity() {
        let data = PlanBuilder::new()
            .baseline(1)
            .branch(2, 1, 10)
            .branch(3, 2, 20)
            .assignment_baseline(100, assignment(50.0))
            .overlay(2, 100, ChangeType::Removed, None)
            .build();

        assert!(!data.resolve(2, EntityType::Assignment).unwrap().contains(100));
        assert!(!data.resolve(3, EntityType::Assignment).unwrap().contains(100));
        assert!(data.resolve(1, EntityType::Assignment).unwrap().contains(100));
    }

    #[test]
    fn child_can_restore_entity_removed_by_parent() {
        let data = PlanBuilder::new()
            .baseline(1)
            .branch(2, 1, 10)
            .branch(3, 2, 20)
            .assignment_baseline(100, assignment(50.0))
            .overlay(2, 100, ChangeType::Removed, None)
            .overlay(3, 100, ChangeType::Added, Some(assignment(30.0)))
            .build();

        assert_eq!(pct(&data, 3, 100), Some(30.0));
    }

    #[test]
    fn added_entity_is_visible_only_below_its_scenario() {
        let data = PlanBuilder::new()
            .baseline(1)
            .branch(2, 1, 10)
            .branch(3, 2, 20)
            .branch(4, 1, 30)
            .overlay(2, 500, ChangeType::Added, Some(assignment(20.0)))
            .build();

        assert_eq!(pct(&data, 2, 500), Some(20.0));
        assert_eq!(pct(&data, 3, 500), Some(20.0));
        assert_eq!(pct(&data, 1, 500), None);
        assert_eq!(pct(&data, 4, 500), None);
    }

    #[test]
    fn latest_overlay_within_a_scenario_wins() {
        let data = PlanBuilder::new()
            .baseline(1)
            .branch(2, 1, 10)
            .assignment_baseline(100, assignment(50.0))
            .overlay_at(2, 100, ChangeType::Modified, Some(assignment(90.0)), 40)
            .overlay_at(2, 100, ChangeType::Modified, Some(assignment(70.0)), 30)
            .build();

        assert_eq!(pct(&data, 2, 100), Some(90.0));
    }

    #[test]
    fn soft_deleted_baseline_record_is_absent() {
        let data = PlanBuilder::new()
            .baseline(1)
            .branch(2, 1, 10)
            .deleted_baseline(EntityType::Assignment, 100, 5)
            .build();

        assert!(data.resolve(1, EntityType::Assignment).unwrap().is_empty());
        assert!(data.resolve(2, EntityType::Assignment).unwrap().is_empty());
    }

    #[test]
    fn entity_types_resolve_independently() {
        let data = PlanBuilder::new()
            .baseline(1)
            .branch(2, 1, 10)
            .assignment_baseline(100, assignment(50.0))
            .project_baseline(100, project("Apollo"))
            .build();

        let snapshot = data.snapshot(2).unwrap();
        assert_eq!(snapshot.assignments.len(), 1);
        assert_eq!(snapshot.projects.len(), 1);
        assert!(snapshot.phase_timelines.is_empty());
        assert_eq!(
            snapshot.state(EntityType::Project).get(100).unwrap().as_project().unwrap().name,
            "Apollo"
        );
    }

    #[test]
    fn unknown_scenario_fails() {
        let data = PlanBuilder::new().baseline(1).build();
        assert_matches!(
            data.resolve(9, EntityType::Assignment),
            Err(CoreError::NotFound { .. })
        );
    }

    #[test]
    fn malformed_stored_overlay_is_rejected_on_load() {
        let mut data = PlanData::new(ScenarioGraph::new([baseline_node(1)]));
        let result = data.insert_overlays([Overlay {
            id: 1,
            scenario_id: 1,
            entity_type: EntityType::Assignment,
            entity_id: 100,
            change_type: ChangeType::Modified,
            data: None,
            revision: 1,
        }]);
        assert_matches!(result, Err(CoreError::Internal(_)));
    }

    #[test]
    fn entities_are_listed_in_id_order() {
        let data = PlanBuilder::new()
            .baseline(1)
            .assignment_baseline(300, assignment(10.0))
            .assignment_baseline(100, assignment(20.0))
            .build();

        let ids: Vec<DbId> = data
            .resolve(1, EntityType::Assignment)
            .unwrap()
            .entities()
            .into_iter()
            .map(|e| e.entity_id)
            .collect();
        assert_eq!(ids, vec![100, 300]);
    }
}
