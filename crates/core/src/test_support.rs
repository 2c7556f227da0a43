//! Fixture builders shared by the unit tests of this crate.

use chrono::NaiveDate;

use crate::overlay::{
    AssignmentFields, BaselineRecord, ChangeType, EntityRecord, EntityType, Overlay,
    PhaseTimelineFields, ProjectFields,
};
use crate::resolver::PlanData;
use crate::scenario::{ScenarioGraph, ScenarioNode, ScenarioStatus, ScenarioType};
use crate::types::{DbId, Revision};

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn assignment(pct: f64) -> EntityRecord {
    assignment_for(7, Some(3), 1, pct)
}

pub fn assignment_for(person_id: DbId, role_id: Option<DbId>, project_id: DbId, pct: f64) -> EntityRecord {
    EntityRecord::Assignment(AssignmentFields {
        project_id,
        person_id,
        role_id,
        phase_id: None,
        allocation_percentage: pct,
        start_date: date("2026-01-01"),
        end_date: date("2026-06-30"),
        notes: None,
    })
}

pub fn phase(project_id: DbId, phase_id: DbId, start: &str, end: &str) -> EntityRecord {
    EntityRecord::PhaseTimeline(PhaseTimelineFields {
        project_id,
        phase_id,
        start_date: date(start),
        end_date: date(end),
    })
}

pub fn project(name: &str) -> EntityRecord {
    EntityRecord::Project(ProjectFields {
        name: name.to_string(),
        description: None,
        priority: 3,
        include_in_demand: true,
        target_start: None,
        target_end: None,
    })
}

pub fn baseline_node(id: DbId) -> ScenarioNode {
    ScenarioNode {
        id,
        parent_id: None,
        scenario_type: ScenarioType::Baseline,
        status: ScenarioStatus::Active,
        branch_point: 0,
    }
}

/// Allocation percentage of an assignment in a scenario's effective state.
pub fn pct(data: &PlanData, scenario_id: DbId, entity_id: DbId) -> Option<f64> {
    data.effective_record(scenario_id, EntityType::Assignment, entity_id)
        .unwrap()
        .and_then(|r| r.as_assignment().map(|a| a.allocation_percentage))
}

/// Builds a [`PlanData`] snapshot. Overlays added without an explicit
/// revision get increasing revisions starting at 1000, i.e. after every
/// branch point the tests use.
pub struct PlanBuilder {
    nodes: Vec<ScenarioNode>,
    baseline: Vec<(EntityType, BaselineRecord)>,
    overlays: Vec<Overlay>,
    next_revision: Revision,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            baseline: Vec::new(),
            overlays: Vec::new(),
            next_revision: 1000,
        }
    }

    pub fn baseline(mut self, id: DbId) -> Self {
        self.nodes.push(baseline_node(id));
        self
    }

    pub fn branch(mut self, id: DbId, parent_id: DbId, branch_point: Revision) -> Self {
        self.nodes.push(ScenarioNode {
            id,
            parent_id: Some(parent_id),
            scenario_type: ScenarioType::Branch,
            status: ScenarioStatus::Active,
            branch_point,
        });
        self
    }

    pub fn with_status(mut self, id: DbId, status: ScenarioStatus) -> Self {
        if let Some(node) = self.nodes.iter_mut().find(|n| n.id == id) {
            node.status = status;
        }
        self
    }

    pub fn baseline_at(
        mut self,
        entity_id: DbId,
        record: EntityRecord,
        created_revision: Revision,
        revision: Revision,
    ) -> Self {
        self.baseline.push((
            record.entity_type(),
            BaselineRecord {
                entity_id,
                record: Some(record),
                created_revision,
                revision,
            },
        ));
        self
    }

    pub fn assignment_baseline(self, entity_id: DbId, record: EntityRecord) -> Self {
        self.baseline_at(entity_id, record, 1, 1)
    }

    pub fn project_baseline(self, entity_id: DbId, record: EntityRecord) -> Self {
        self.baseline_at(entity_id, record, 1, 1)
    }

    pub fn phase_baseline(self, entity_id: DbId, record: EntityRecord) -> Self {
        self.baseline_at(entity_id, record, 1, 1)
    }

    pub fn deleted_baseline(mut self, entity_type: EntityType, entity_id: DbId, revision: Revision) -> Self {
        self.baseline.push((
            entity_type,
            BaselineRecord {
                entity_id,
                record: None,
                created_revision: 1,
                revision,
            },
        ));
        self
    }

    pub fn overlay(
        mut self,
        scenario_id: DbId,
        entity_id: DbId,
        change_type: ChangeType,
        data: Option<EntityRecord>,
    ) -> Self {
        let revision = self.next_revision;
        self.next_revision += 1;
        self.overlay_at(scenario_id, entity_id, change_type, data, revision)
    }

    pub fn overlay_at(
        mut self,
        scenario_id: DbId,
        entity_id: DbId,
        change_type: ChangeType,
        data: Option<EntityRecord>,
        revision: Revision,
    ) -> Self {
        let entity_type = data
            .as_ref()
            .map(EntityRecord::entity_type)
            .unwrap_or(EntityType::Assignment);
        self.overlays.push(Overlay {
            id: self.overlays.len() as DbId + 1,
            scenario_id,
            entity_type,
            entity_id,
            change_type,
            data,
            revision,
        });
        self
    }

    /// A `removed` overlay for a non-assignment entity type.
    pub fn removed(mut self, entity_type: EntityType, scenario_id: DbId, entity_id: DbId) -> Self {
        let revision = self.next_revision;
        self.next_revision += 1;
        self.overlays.push(Overlay {
            id: self.overlays.len() as DbId + 1,
            scenario_id,
            entity_type,
            entity_id,
            change_type: ChangeType::Removed,
            data: None,
            revision,
        });
        self
    }

    pub fn build(self) -> PlanData {
        let mut data = PlanData::new(ScenarioGraph::new(self.nodes));
        for (entity_type, record) in self.baseline {
            data.insert_baseline(entity_type, [record]);
        }
        data.insert_overlays(self.overlays).unwrap();
        data
    }
}
