//! Overlay model: the record shapes a scenario uses to shadow baseline data.
//!
//! A scenario never copies the plan it was forked from. Instead it records
//! one overlay per change (`added`, `modified`, `removed`) against a logical
//! entity. Payloads are the closed tagged variant [`EntityRecord`], one
//! concrete field set per entity type.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::types::{DbId, Revision};

// ---------------------------------------------------------------------------
// Entity type
// ---------------------------------------------------------------------------

/// The three kinds of plan entity a scenario can overlay.
///
/// The string form doubles as the merge conflict type and as the
/// `{entity_type}` path segment in the HTTP API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityType {
    // Declaration order is the derived `Ord`: projects sort before the
    // phases and assignments that reference them.
    #[serde(rename = "project_details")]
    Project,
    #[serde(rename = "phase_timeline")]
    PhaseTimeline,
    #[serde(rename = "assignment")]
    Assignment,
}

/// Every entity type, in the order merges apply them (projects before the
/// phases and assignments that reference them).
pub const ALL_ENTITY_TYPES: [EntityType; 3] = [
    EntityType::Project,
    EntityType::PhaseTimeline,
    EntityType::Assignment,
];

impl EntityType {
    /// Parse an entity type string from the database or a request path.
    pub fn from_str_db(s: &str) -> Result<Self, CoreError> {
        match s {
            "assignment" => Ok(Self::Assignment),
            "phase_timeline" => Ok(Self::PhaseTimeline),
            "project_details" => Ok(Self::Project),
            _ => Err(CoreError::Validation(format!(
                "Invalid entity type '{s}'. Must be one of: assignment, phase_timeline, project_details"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assignment => "assignment",
            Self::PhaseTimeline => "phase_timeline",
            Self::Project => "project_details",
        }
    }

    /// Human-readable entity name used in `NotFound` errors.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Assignment => "Assignment",
            Self::PhaseTimeline => "PhaseTimeline",
            Self::Project => "Project",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Change type
// ---------------------------------------------------------------------------

/// What an overlay does to the entity it shadows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Added,
    Modified,
    Removed,
}

impl ChangeType {
    pub fn from_str_db(s: &str) -> Result<Self, CoreError> {
        match s {
            "added" => Ok(Self::Added),
            "modified" => Ok(Self::Modified),
            "removed" => Ok(Self::Removed),
            _ => Err(CoreError::Validation(format!(
                "Invalid change type '{s}'. Must be one of: added, modified, removed"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Removed => "removed",
        }
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Field sets
// ---------------------------------------------------------------------------

/// A person's fractional allocation to a project, optionally scoped to a
/// role and a phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct AssignmentFields {
    pub project_id: DbId,
    pub person_id: DbId,
    pub role_id: Option<DbId>,
    pub phase_id: Option<DbId>,
    #[validate(range(min = 0.0, max = 100.0))]
    pub allocation_percentage: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// The dates a project phase runs between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct PhaseTimelineFields {
    pub project_id: DbId,
    pub phase_id: DbId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// User-editable project attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ProjectFields {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(range(min = 1, max = 10))]
    pub priority: i32,
    pub include_in_demand: bool,
    pub target_start: Option<NaiveDate>,
    pub target_end: Option<NaiveDate>,
}

// ---------------------------------------------------------------------------
// Entity record
// ---------------------------------------------------------------------------

/// The user-editable field values of one plan entity.
///
/// Serialized with an `entity_type` tag so a stored snapshot is
/// self-describing:
///
/// ```json
/// { "entity_type": "assignment", "project_id": 1, "person_id": 7, ... }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity_type")]
pub enum EntityRecord {
    #[serde(rename = "assignment")]
    Assignment(AssignmentFields),
    #[serde(rename = "phase_timeline")]
    PhaseTimeline(PhaseTimelineFields),
    #[serde(rename = "project_details")]
    Project(ProjectFields),
}

impl EntityRecord {
    pub fn entity_type(&self) -> EntityType {
        match self {
            Self::Assignment(_) => EntityType::Assignment,
            Self::PhaseTimeline(_) => EntityType::PhaseTimeline,
            Self::Project(_) => EntityType::Project,
        }
    }

    /// Run field-level validation plus the date-order rules.
    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            Self::Assignment(fields) => {
                fields.validate()?;
                if !fields.allocation_percentage.is_finite() {
                    return Err(CoreError::Validation(
                        "allocation_percentage must be a finite number".to_string(),
                    ));
                }
                validate_date_order(fields.start_date, fields.end_date)
            }
            Self::PhaseTimeline(fields) => {
                fields.validate()?;
                validate_date_order(fields.start_date, fields.end_date)
            }
            Self::Project(fields) => {
                fields.validate()?;
                if fields.name.trim() != fields.name {
                    return Err(CoreError::Validation(
                        "Project name must not have leading or trailing whitespace".to_string(),
                    ));
                }
                match (fields.target_start, fields.target_end) {
                    (Some(start), Some(end)) => validate_date_order(start, end),
                    _ => Ok(()),
                }
            }
        }
    }

    /// Fail unless this record is of the `expected` entity type.
    pub fn ensure_type(&self, expected: EntityType) -> Result<(), CoreError> {
        let actual = self.entity_type();
        if actual == expected {
            Ok(())
        } else {
            Err(CoreError::Validation(format!(
                "Payload entity_type '{actual}' does not match '{expected}'"
            )))
        }
    }

    pub fn as_assignment(&self) -> Option<&AssignmentFields> {
        match self {
            Self::Assignment(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_phase_timeline(&self) -> Option<&PhaseTimelineFields> {
        match self {
            Self::PhaseTimeline(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_project(&self) -> Option<&ProjectFields> {
        match self {
            Self::Project(fields) => Some(fields),
            _ => None,
        }
    }
}

fn validate_date_order(start: NaiveDate, end: NaiveDate) -> Result<(), CoreError> {
    if start > end {
        return Err(CoreError::Validation(format!(
            "start date {start} must not be after end date {end}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Overlay
// ---------------------------------------------------------------------------

/// One scenario-scoped change to one logical entity.
///
/// Overlays form an append-only log per scenario: when a scenario holds
/// several overlays for the same entity, the highest `revision` is current.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overlay {
    pub id: DbId,
    pub scenario_id: DbId,
    pub entity_type: EntityType,
    /// Logical entity id. For `added` overlays this is a freshly minted id;
    /// otherwise it is the base record being shadowed.
    pub entity_id: DbId,
    pub change_type: ChangeType,
    /// New field values; `None` for `removed`.
    pub data: Option<EntityRecord>,
    pub revision: Revision,
}

impl Overlay {
    /// The base record this overlay shadows. `added` overlays have none.
    pub fn base_id(&self) -> Option<DbId> {
        match self.change_type {
            ChangeType::Added => None,
            ChangeType::Modified | ChangeType::Removed => Some(self.entity_id),
        }
    }

    /// Check that the payload agrees with the change type and entity type.
    pub fn validate_shape(&self) -> Result<(), CoreError> {
        validate_change_payload(self.entity_type, self.change_type, self.data.as_ref())
    }
}

/// Shape rule shared by stored overlays and overlays about to be written:
/// `removed` carries nothing, `added`/`modified` carry a record of the
/// overlay's entity type.
pub fn validate_change_payload(
    entity_type: EntityType,
    change_type: ChangeType,
    data: Option<&EntityRecord>,
) -> Result<(), CoreError> {
    match (change_type, data) {
        (ChangeType::Removed, None) => Ok(()),
        (ChangeType::Removed, Some(_)) => Err(CoreError::Validation(
            "A removed overlay must not carry field values".to_string(),
        )),
        (_, None) => Err(CoreError::Validation(format!(
            "A {change_type} overlay must carry field values"
        ))),
        (_, Some(record)) => record.ensure_type(entity_type),
    }
}

// ---------------------------------------------------------------------------
// Baseline record
// ---------------------------------------------------------------------------

/// A baseline table row as the resolver sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct BaselineRecord {
    pub entity_id: DbId,
    /// `None` once the record has been soft-deleted.
    pub record: Option<EntityRecord>,
    pub created_revision: Revision,
    /// Revision of the last write (create, update or soft delete).
    pub revision: Revision,
}

impl BaselineRecord {
    pub fn is_deleted(&self) -> bool {
        self.record.is_none()
    }
}
