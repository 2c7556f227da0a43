//! Two-plan comparison.
//!
//! Compares the effective states of two scenarios entity type by entity
//! type. Records are compared by value over all user-editable fields, so two
//! different overlay chains that produce identical records are not reported
//! as modified. Impact metrics are signed `source - target` deltas.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::CoreError;
use crate::overlay::{EntityRecord, EntityType, ALL_ENTITY_TYPES};
use crate::resolver::{EffectiveEntity, EffectiveState, PlanData, PlanSnapshot};
use crate::types::DbId;

/// Deltas smaller than this are treated as zero and omitted.
const DELTA_EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// An entity present on both sides with different field values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModifiedEntity {
    pub entity_id: DbId,
    pub source: EntityRecord,
    pub target: EntityRecord,
}

/// Added / removed / modified buckets for one entity type.
///
/// - `added`    -- present in source, absent in target.
/// - `removed`  -- absent in source, present in target.
/// - `modified` -- present in both, field-different.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityDiff {
    pub entity_type: EntityType,
    pub added: Vec<EffectiveEntity>,
    pub removed: Vec<EffectiveEntity>,
    pub modified: Vec<ModifiedEntity>,
}

impl EntityDiff {
    pub fn change_count(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }

    pub fn is_empty(&self) -> bool {
        self.change_count() == 0
    }
}

/// Aggregate impact of adopting the source plan instead of the target plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImpactMetrics {
    /// Allocation percentage points per person.
    pub allocation_delta_by_person: BTreeMap<DbId, f64>,
    /// Capacity per role in full-time equivalents (allocation / 100).
    pub fte_delta_by_role: BTreeMap<DbId, f64>,
    /// FTE delta of assignments that carry no role.
    pub unassigned_role_fte_delta: f64,
    /// Allocation percentage points per project.
    pub allocation_delta_by_project: BTreeMap<DbId, f64>,
    pub net_allocation_delta: f64,
    /// Sum of phase durations (in days) in source minus target.
    pub phase_duration_delta_days: i64,
    pub projects_added: usize,
    pub projects_removed: usize,
    pub projects_modified: usize,
}

/// Full comparison of two scenarios.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioComparison {
    pub source_scenario_id: DbId,
    pub target_scenario_id: DbId,
    pub projects: EntityDiff,
    pub phase_timelines: EntityDiff,
    pub assignments: EntityDiff,
    pub impact: ImpactMetrics,
    pub total_changes: usize,
}

impl ScenarioComparison {
    pub fn diff(&self, entity_type: EntityType) -> &EntityDiff {
        match entity_type {
            EntityType::Project => &self.projects,
            EntityType::PhaseTimeline => &self.phase_timelines,
            EntityType::Assignment => &self.assignments,
        }
    }
}

// ---------------------------------------------------------------------------
// Diff
// ---------------------------------------------------------------------------

/// Partition two effective states of the same entity type into buckets.
pub fn diff_states(source: &EffectiveState, target: &EffectiveState) -> EntityDiff {
    let mut diff = EntityDiff {
        entity_type: source.entity_type,
        added: Vec::new(),
        removed: Vec::new(),
        modified: Vec::new(),
    };

    for (entity_id, pair) in paired(source, target) {
        match pair {
            (Some(s), None) => diff.added.push(EffectiveEntity {
                entity_id,
                record: s.clone(),
            }),
            (None, Some(t)) => diff.removed.push(EffectiveEntity {
                entity_id,
                record: t.clone(),
            }),
            (Some(s), Some(t)) if s != t => diff.modified.push(ModifiedEntity {
                entity_id,
                source: s.clone(),
                target: t.clone(),
            }),
            _ => {}
        }
    }
    diff
}

/// Every entity id of either side, in id order, with both sides' records.
fn paired<'a>(
    source: &'a EffectiveState,
    target: &'a EffectiveState,
) -> BTreeMap<DbId, (Option<&'a EntityRecord>, Option<&'a EntityRecord>)> {
    let mut pairs: BTreeMap<DbId, (Option<&EntityRecord>, Option<&EntityRecord>)> = BTreeMap::new();
    for (id, record) in &source.records {
        pairs.entry(*id).or_default().0 = Some(record);
    }
    for (id, record) in &target.records {
        pairs.entry(*id).or_default().1 = Some(record);
    }
    pairs
}

// ---------------------------------------------------------------------------
// Impact
// ---------------------------------------------------------------------------

fn add_delta(map: &mut BTreeMap<DbId, f64>, key: DbId, delta: f64) {
    *map.entry(key).or_insert(0.0) += delta;
}

fn drop_zero_deltas(map: &mut BTreeMap<DbId, f64>) {
    map.retain(|_, v| v.abs() >= DELTA_EPSILON);
}

fn zero_if_negligible(value: f64) -> f64 {
    if value.abs() < DELTA_EPSILON {
        0.0
    } else {
        value
    }
}

impl ImpactMetrics {
    /// Accumulate `sign * record` into the metrics. Role capacity is kept in
    /// percentage points until [`ImpactMetrics::finish`] converts it to FTE.
    fn accumulate(&mut self, record: &EntityRecord, sign: f64) {
        match record {
            EntityRecord::Assignment(a) => {
                let delta = sign * a.allocation_percentage;
                add_delta(&mut self.allocation_delta_by_person, a.person_id, delta);
                add_delta(&mut self.allocation_delta_by_project, a.project_id, delta);
                match a.role_id {
                    Some(role_id) => add_delta(&mut self.fte_delta_by_role, role_id, delta),
                    None => self.unassigned_role_fte_delta += delta,
                }
                self.net_allocation_delta += delta;
            }
            EntityRecord::PhaseTimeline(p) => {
                let days = (p.end_date - p.start_date).num_days();
                if sign > 0.0 {
                    self.phase_duration_delta_days += days;
                } else {
                    self.phase_duration_delta_days -= days;
                }
            }
            EntityRecord::Project(_) => {}
        }
    }

    /// Fold another (per-entity) set of deltas into this one.
    fn absorb(&mut self, other: ImpactMetrics) {
        for (k, v) in other.allocation_delta_by_person {
            add_delta(&mut self.allocation_delta_by_person, k, v);
        }
        for (k, v) in other.fte_delta_by_role {
            add_delta(&mut self.fte_delta_by_role, k, v);
        }
        for (k, v) in other.allocation_delta_by_project {
            add_delta(&mut self.allocation_delta_by_project, k, v);
        }
        self.unassigned_role_fte_delta += other.unassigned_role_fte_delta;
        self.net_allocation_delta += other.net_allocation_delta;
        self.phase_duration_delta_days += other.phase_duration_delta_days;
    }

    fn finish(mut self) -> Self {
        for v in self.fte_delta_by_role.values_mut() {
            *v /= 100.0;
        }
        self.unassigned_role_fte_delta /= 100.0;

        drop_zero_deltas(&mut self.allocation_delta_by_person);
        drop_zero_deltas(&mut self.fte_delta_by_role);
        drop_zero_deltas(&mut self.allocation_delta_by_project);
        self.unassigned_role_fte_delta = zero_if_negligible(self.unassigned_role_fte_delta);
        self.net_allocation_delta = zero_if_negligible(self.net_allocation_delta);
        self
    }
}

fn impact_of(diffs: &[&EntityDiff]) -> ImpactMetrics {
    let mut impact = ImpactMetrics::default();
    for diff in diffs {
        if diff.entity_type == EntityType::Project {
            impact.projects_added = diff.added.len();
            impact.projects_removed = diff.removed.len();
            impact.projects_modified = diff.modified.len();
        }

        // Each entity's net delta is computed on its own and folded in by
        // entity id, so swapping source and target yields exactly negated
        // metrics.
        let mut ordered: BTreeMap<DbId, (Option<&EntityRecord>, Option<&EntityRecord>)> =
            BTreeMap::new();
        for e in &diff.added {
            ordered.insert(e.entity_id, (Some(&e.record), None));
        }
        for e in &diff.removed {
            ordered.insert(e.entity_id, (None, Some(&e.record)));
        }
        for m in &diff.modified {
            ordered.insert(m.entity_id, (Some(&m.source), Some(&m.target)));
        }
        for (source, target) in ordered.values() {
            let mut entity = ImpactMetrics::default();
            if let Some(s) = source {
                entity.accumulate(s, 1.0);
            }
            if let Some(t) = target {
                entity.accumulate(t, -1.0);
            }
            impact.absorb(entity);
        }
    }
    impact.finish()
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Compare two resolved snapshots. Pure; performs no writes.
pub fn compare_snapshots(source: &PlanSnapshot, target: &PlanSnapshot) -> ScenarioComparison {
    let projects = diff_states(&source.projects, &target.projects);
    let phase_timelines = diff_states(&source.phase_timelines, &target.phase_timelines);
    let assignments = diff_states(&source.assignments, &target.assignments);

    let impact = impact_of(&[&projects, &phase_timelines, &assignments]);
    let total_changes = ALL_ENTITY_TYPES
        .iter()
        .map(|ty| match ty {
            EntityType::Project => projects.change_count(),
            EntityType::PhaseTimeline => phase_timelines.change_count(),
            EntityType::Assignment => assignments.change_count(),
        })
        .sum();

    ScenarioComparison {
        source_scenario_id: source.scenario_id,
        target_scenario_id: target.scenario_id,
        projects,
        phase_timelines,
        assignments,
        impact,
        total_changes,
    }
}

/// Resolve and compare two scenarios.
///
/// Scenarios without a common ancestor are refused with a structural error.
pub fn compare_scenarios(
    data: &PlanData,
    source_id: DbId,
    target_id: DbId,
) -> Result<ScenarioComparison, CoreError> {
    data.graph().common_ancestor(source_id, target_id)?;
    let source = data.snapshot(source_id)?;
    let target = data.snapshot(target_id)?;
    Ok(compare_snapshots(&source, &target))
}
